use serde::{Deserialize, Serialize};

/// Server-assigned marker identity. The client never mints one; ids only
/// come from server responses.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MarkerId(pub u64);

/// Point-of-interest categories. Wire form is the snake_case name, both in
/// HTTP bodies and in the comma-joined `categories` query parameter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    AccessibleToilet,
    FriendlyClinic,
    ConversionTherapy,
    SelfDefinition,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::AccessibleToilet,
        Category::FriendlyClinic,
        Category::ConversionTherapy,
        Category::SelfDefinition,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::AccessibleToilet => "accessible_toilet",
            Category::FriendlyClinic => "friendly_clinic",
            Category::ConversionTherapy => "conversion_therapy",
            Category::SelfDefinition => "self_definition",
        }
    }

    /// Marker dot color on the renderer side.
    pub fn color(self) -> &'static str {
        match self {
            Category::AccessibleToilet => "#2196f3",
            Category::FriendlyClinic => "#4caf50",
            Category::ConversionTherapy => "#f44336",
            Category::SelfDefinition => "#9c27b0",
        }
    }
}

/// A server-owned point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: MarkerId,
    pub lat: f64,
    pub lng: f64,
    pub category: Category,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_public: bool,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_time_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_time_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::{Category, Marker, MarkerId};

    #[test]
    fn category_wire_names_are_snake_case() {
        for cat in Category::ALL {
            let json = serde_json::to_string(&cat).unwrap();
            assert_eq!(json, format!("\"{}\"", cat.as_str()));
        }
    }

    #[test]
    fn marker_parses_with_optional_fields_absent() {
        let m: Marker = serde_json::from_str(
            r#"{"id":3,"lat":25.0,"lng":121.5,"category":"friendly_clinic",
                "title":"clinic","isPublic":true,"isActive":true}"#,
        )
        .unwrap();
        assert_eq!(m.id, MarkerId(3));
        assert_eq!(m.category, Category::FriendlyClinic);
        assert_eq!(m.description, None);
        assert_eq!(m.owner_id, None);
    }
}
