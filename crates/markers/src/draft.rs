//! Create/edit/delete lifecycle for a single point of interest.
//!
//! The workflow is a pure state machine: `submit` validates and hands back a
//! [`SubmitAction`] for the host to perform, and the host reports the result
//! through `submit_succeeded` / `submit_failed`. Validation never partially
//! applies; a draft that fails validation stays open and untouched.

use geo::LatLng;

use crate::model::{Category, Marker, MarkerId};
use crate::api::MarkerPayload;

/// An image picked for attachment. Uploaded strictly after the marker
/// exists, since the upload is keyed by marker id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftMode {
    New,
    Edit {
        id: MarkerId,
        owner_id: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftState {
    Closed,
    Open(DraftMode),
    /// Reachable only from `Open(Edit)`, and only for the marker's owner.
    ConfirmingDelete {
        id: MarkerId,
        owner_id: Option<u64>,
    },
    Submitting(DraftMode),
}

/// The four open-time text inputs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimeField {
    StartHour,
    StartMinute,
    EndHour,
    EndMinute,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftFields {
    pub lat: f64,
    pub lng: f64,
    pub category: Option<Category>,
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub start_hour: String,
    pub start_minute: String,
    pub end_hour: String,
    pub end_minute: String,
    pub image: Option<ImageAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    TitleRequired,
    CategoryRequired,
    /// Open-time start and end must be both present or both absent.
    UnpairedOpenTime,
    /// An hour was given without a minute (or vice versa) for `field`.
    IncompleteOpenTime { field: &'static str },
    /// A time component is not a number in 24-hour `HH:MM` range.
    InvalidOpenTime { field: &'static str },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::TitleRequired => write!(f, "title is required"),
            ValidationError::CategoryRequired => write!(f, "category is required"),
            ValidationError::UnpairedOpenTime => {
                write!(f, "open time needs both a start and an end")
            }
            ValidationError::IncompleteOpenTime { field } => {
                write!(f, "open {field} time needs both hour and minute")
            }
            ValidationError::InvalidOpenTime { field } => {
                write!(f, "open {field} time must be a valid 24-hour HH:MM")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    NotEditing,
    NotOwner,
    NotOpen,
}

impl std::fmt::Display for DraftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DraftError::NotEditing => write!(f, "no marker is being edited"),
            DraftError::NotOwner => write!(f, "only the marker's owner may delete it"),
            DraftError::NotOpen => write!(f, "no draft is open"),
        }
    }
}

impl std::error::Error for DraftError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    NotOpen,
    Invalid(ValidationError),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::NotOpen => write!(f, "no draft is open"),
            SubmitError::Invalid(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<ValidationError> for SubmitError {
    fn from(err: ValidationError) -> Self {
        SubmitError::Invalid(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitMethod {
    /// `POST /markers`
    Create,
    /// `PATCH /markers/{id}`
    Update(MarkerId),
}

/// A validated submission for the host to perform.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitAction {
    pub method: SubmitMethod,
    pub payload: MarkerPayload,
    pub image: Option<ImageAttachment>,
}

#[derive(Debug, Default)]
pub struct DraftWorkflow {
    state: DraftState,
    fields: DraftFields,
}

impl Default for DraftState {
    fn default() -> Self {
        DraftState::Closed
    }
}

impl DraftWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DraftState {
        &self.state
    }

    pub fn fields(&self) -> &DraftFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut DraftFields {
        &mut self.fields
    }

    /// Opens a creation draft seeded at `seed` — an explicit map tap in add
    /// mode, or the current camera center for a direct add.
    pub fn open_new(&mut self, seed: LatLng) {
        self.fields = DraftFields {
            lat: seed.lat,
            lng: seed.lng,
            is_public: true,
            ..DraftFields::default()
        };
        self.state = DraftState::Open(DraftMode::New);
    }

    /// Opens an edit draft seeded from the target marker.
    pub fn open_edit(&mut self, marker: &Marker) {
        let (start_hour, start_minute) = split_hhmm(marker.open_time_start.as_deref());
        let (end_hour, end_minute) = split_hhmm(marker.open_time_end.as_deref());
        self.fields = DraftFields {
            lat: marker.lat,
            lng: marker.lng,
            category: Some(marker.category),
            title: marker.title.clone(),
            description: marker.description.clone().unwrap_or_default(),
            is_public: marker.is_public,
            start_hour,
            start_minute,
            end_hour,
            end_minute,
            image: None,
        };
        self.state = DraftState::Open(DraftMode::Edit {
            id: marker.id,
            owner_id: marker.owner_id,
        });
    }

    pub fn close(&mut self) {
        self.state = DraftState::Closed;
        self.fields = DraftFields::default();
    }

    /// Clamps an out-of-range hour/minute on field blur (0–23 / 0–59) and
    /// returns a correction hint when a value was adjusted. Non-numeric
    /// input is left for validation to reject; nothing is dropped silently.
    pub fn blur_time_field(&mut self, field: TimeField) -> Option<String> {
        let (slot, max) = match field {
            TimeField::StartHour => (&mut self.fields.start_hour, 23u32),
            TimeField::StartMinute => (&mut self.fields.start_minute, 59),
            TimeField::EndHour => (&mut self.fields.end_hour, 23),
            TimeField::EndMinute => (&mut self.fields.end_minute, 59),
        };
        let trimmed = slot.trim();
        if trimmed.is_empty() {
            return None;
        }
        let value: i64 = trimmed.parse().ok()?;
        let clamped = value.clamp(0, max as i64);
        if clamped == value {
            return None;
        }
        *slot = clamped.to_string();
        Some(format!("adjusted to {clamped}"))
    }

    /// Builds the submit payload, checking every rule before anything is
    /// sent: title required (trimmed), open times both-or-neither, each a
    /// valid 24-hour `HH:MM`.
    pub fn validate(&self) -> Result<MarkerPayload, ValidationError> {
        let title = self.fields.title.trim();
        if title.is_empty() {
            return Err(ValidationError::TitleRequired);
        }
        let category = self
            .fields
            .category
            .ok_or(ValidationError::CategoryRequired)?;

        let start = compose_hhmm(&self.fields.start_hour, &self.fields.start_minute, "start")?;
        let end = compose_hhmm(&self.fields.end_hour, &self.fields.end_minute, "end")?;
        if start.is_some() != end.is_some() {
            return Err(ValidationError::UnpairedOpenTime);
        }

        let description = self.fields.description.trim();
        Ok(MarkerPayload {
            lat: self.fields.lat,
            lng: self.fields.lng,
            category,
            title: title.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            is_public: self.fields.is_public,
            open_time_start: start,
            open_time_end: end,
        })
    }

    /// Validates and moves to `Submitting`. The caller performs the action
    /// and reports back; a validation failure leaves the draft open.
    pub fn submit(&mut self) -> Result<SubmitAction, SubmitError> {
        let mode = match &self.state {
            DraftState::Open(mode) => mode.clone(),
            _ => return Err(SubmitError::NotOpen),
        };
        let payload = self.validate()?;
        let method = match &mode {
            DraftMode::New => SubmitMethod::Create,
            DraftMode::Edit { id, .. } => SubmitMethod::Update(*id),
        };
        self.state = DraftState::Submitting(mode);
        Ok(SubmitAction {
            method,
            payload,
            image: self.fields.image.clone(),
        })
    }

    /// Submit landed: the list updates optimistically and the draft closes.
    pub fn submit_succeeded(&mut self, marker: Marker, list: &mut Vec<Marker>) {
        apply_optimistic(list, marker);
        self.close();
    }

    /// Submit failed: back to the open draft, nothing lost.
    pub fn submit_failed(&mut self) {
        if let DraftState::Submitting(mode) = std::mem::take(&mut self.state) {
            self.state = DraftState::Open(mode);
        }
    }

    /// Requests deletion; permitted only while editing and only when the
    /// viewer owns the marker.
    pub fn request_delete(&mut self, viewer_id: Option<u64>) -> Result<(), DraftError> {
        let DraftState::Open(DraftMode::Edit { id, owner_id }) = &self.state else {
            return Err(DraftError::NotEditing);
        };
        if owner_id.is_none() || *owner_id != viewer_id {
            return Err(DraftError::NotOwner);
        }
        self.state = DraftState::ConfirmingDelete {
            id: *id,
            owner_id: *owner_id,
        };
        Ok(())
    }

    pub fn cancel_delete(&mut self) {
        if let DraftState::ConfirmingDelete { id, owner_id } = self.state {
            self.state = DraftState::Open(DraftMode::Edit { id, owner_id });
        }
    }

    /// Confirms deletion; returns the id to `DELETE` and moves to
    /// `Submitting` until the host reports the outcome.
    pub fn confirm_delete(&mut self) -> Option<MarkerId> {
        if let DraftState::ConfirmingDelete { id, owner_id } = self.state {
            self.state = DraftState::Submitting(DraftMode::Edit { id, owner_id });
            return Some(id);
        }
        None
    }

    /// Delete landed: remove from the list and close. The host also reloads
    /// the viewport and favorites, since the marker may have been favorited.
    pub fn delete_succeeded(&mut self, id: MarkerId, list: &mut Vec<Marker>) {
        list.retain(|m| m.id != id);
        self.close();
    }
}

/// Prepends (or replaces) `marker` in `list`, de-duplicated by id.
pub fn apply_optimistic(list: &mut Vec<Marker>, marker: Marker) {
    list.retain(|m| m.id != marker.id);
    list.insert(0, marker);
}

fn split_hhmm(value: Option<&str>) -> (String, String) {
    match value.and_then(|v| v.split_once(':')) {
        Some((h, m)) => (h.to_string(), m.to_string()),
        None => (String::new(), String::new()),
    }
}

fn compose_hhmm(
    hour: &str,
    minute: &str,
    field: &'static str,
) -> Result<Option<String>, ValidationError> {
    let hour = hour.trim();
    let minute = minute.trim();
    match (hour.is_empty(), minute.is_empty()) {
        (true, true) => return Ok(None),
        (false, false) => {}
        _ => return Err(ValidationError::IncompleteOpenTime { field }),
    }
    let h: u32 = hour
        .parse()
        .map_err(|_| ValidationError::InvalidOpenTime { field })?;
    let m: u32 = minute
        .parse()
        .map_err(|_| ValidationError::InvalidOpenTime { field })?;
    if h > 23 || m > 59 {
        return Err(ValidationError::InvalidOpenTime { field });
    }
    Ok(Some(format!("{h:02}:{m:02}")))
}

#[cfg(test)]
mod tests {
    use super::{
        DraftError, DraftMode, DraftState, DraftWorkflow, SubmitMethod, TimeField,
        ValidationError, apply_optimistic,
    };
    use crate::model::{Category, Marker, MarkerId};
    use geo::LatLng;
    use pretty_assertions::assert_eq;

    fn marker(id: u64, owner: Option<u64>) -> Marker {
        Marker {
            id: MarkerId(id),
            lat: 25.0,
            lng: 121.5,
            category: Category::AccessibleToilet,
            title: "station toilet".to_string(),
            description: Some("2F".to_string()),
            is_public: true,
            is_active: true,
            open_time_start: Some("09:00".to_string()),
            open_time_end: Some("18:30".to_string()),
            image: None,
            owner_id: owner,
        }
    }

    fn open_valid_new() -> DraftWorkflow {
        let mut wf = DraftWorkflow::new();
        wf.open_new(LatLng::new(25.0, 121.5));
        wf.fields_mut().title = "new place".to_string();
        wf.fields_mut().category = Some(Category::FriendlyClinic);
        wf
    }

    #[test]
    fn blur_clamps_out_of_range_hour_with_hint() {
        let mut wf = open_valid_new();
        wf.fields_mut().start_hour = "25".to_string();
        let hint = wf.blur_time_field(TimeField::StartHour);
        assert_eq!(wf.fields().start_hour, "23");
        assert!(hint.is_some(), "correction must be surfaced to the user");
    }

    #[test]
    fn blur_clamps_negative_minute() {
        let mut wf = open_valid_new();
        wf.fields_mut().end_minute = "-5".to_string();
        let hint = wf.blur_time_field(TimeField::EndMinute);
        assert_eq!(wf.fields().end_minute, "0");
        assert!(hint.is_some());
    }

    #[test]
    fn blur_leaves_in_range_and_non_numeric_values() {
        let mut wf = open_valid_new();
        wf.fields_mut().start_hour = "9".to_string();
        assert_eq!(wf.blur_time_field(TimeField::StartHour), None);
        assert_eq!(wf.fields().start_hour, "9");

        wf.fields_mut().start_minute = "ab".to_string();
        assert_eq!(wf.blur_time_field(TimeField::StartMinute), None);
        assert_eq!(wf.fields().start_minute, "ab", "left for validation");
    }

    #[test]
    fn hour_without_minute_fails_with_specific_error() {
        let mut wf = open_valid_new();
        wf.fields_mut().start_hour = "09".to_string();
        assert_eq!(
            wf.validate().unwrap_err(),
            ValidationError::IncompleteOpenTime { field: "start" }
        );
        // The partial value is still there, not silently dropped.
        assert_eq!(wf.fields().start_hour, "09");
    }

    #[test]
    fn start_without_end_fails() {
        let mut wf = open_valid_new();
        wf.fields_mut().start_hour = "09".to_string();
        wf.fields_mut().start_minute = "00".to_string();
        assert_eq!(wf.validate().unwrap_err(), ValidationError::UnpairedOpenTime);
    }

    #[test]
    fn whitespace_title_is_rejected() {
        let mut wf = open_valid_new();
        wf.fields_mut().title = "   ".to_string();
        assert_eq!(wf.validate().unwrap_err(), ValidationError::TitleRequired);
    }

    #[test]
    fn valid_times_compose_zero_padded() {
        let mut wf = open_valid_new();
        wf.fields_mut().start_hour = "9".to_string();
        wf.fields_mut().start_minute = "5".to_string();
        wf.fields_mut().end_hour = "18".to_string();
        wf.fields_mut().end_minute = "30".to_string();
        let payload = wf.validate().unwrap();
        assert_eq!(payload.open_time_start.as_deref(), Some("09:05"));
        assert_eq!(payload.open_time_end.as_deref(), Some("18:30"));
    }

    #[test]
    fn new_draft_submits_create_then_closes_on_success() {
        let mut wf = open_valid_new();
        let action = wf.submit().unwrap();
        assert_eq!(action.method, SubmitMethod::Create);
        assert!(matches!(wf.state(), DraftState::Submitting(DraftMode::New)));

        let mut list = vec![marker(1, None)];
        wf.submit_succeeded(marker(2, Some(7)), &mut list);
        assert_eq!(wf.state(), &DraftState::Closed);
        assert_eq!(list[0].id, MarkerId(2), "new marker prepended");
    }

    #[test]
    fn edit_draft_submits_patch_and_failure_reopens() {
        let mut wf = DraftWorkflow::new();
        wf.open_edit(&marker(5, Some(7)));
        assert_eq!(wf.fields().start_hour, "09");
        assert_eq!(wf.fields().end_minute, "30");

        let action = wf.submit().unwrap();
        assert_eq!(action.method, SubmitMethod::Update(MarkerId(5)));

        wf.submit_failed();
        assert!(
            matches!(wf.state(), DraftState::Open(DraftMode::Edit { id, .. }) if *id == MarkerId(5)),
            "failed submit returns to the open draft"
        );
        assert_eq!(wf.fields().title, "station toilet", "draft retained");
    }

    #[test]
    fn delete_requires_editing_and_ownership() {
        let mut wf = DraftWorkflow::new();
        assert_eq!(wf.request_delete(Some(7)), Err(DraftError::NotEditing));

        wf.open_edit(&marker(5, Some(7)));
        assert_eq!(wf.request_delete(Some(8)), Err(DraftError::NotOwner));
        assert_eq!(wf.request_delete(None), Err(DraftError::NotOwner));

        assert_eq!(wf.request_delete(Some(7)), Ok(()));
        assert!(matches!(wf.state(), DraftState::ConfirmingDelete { .. }));

        wf.cancel_delete();
        assert!(matches!(wf.state(), DraftState::Open(DraftMode::Edit { .. })));

        wf.request_delete(Some(7)).unwrap();
        assert_eq!(wf.confirm_delete(), Some(MarkerId(5)));

        let mut list = vec![marker(5, Some(7)), marker(6, None)];
        wf.delete_succeeded(MarkerId(5), &mut list);
        assert_eq!(list.len(), 1);
        assert_eq!(wf.state(), &DraftState::Closed);
    }

    #[test]
    fn optimistic_update_dedupes_by_id() {
        let mut list = vec![marker(1, None), marker(2, None)];
        let mut updated = marker(2, None);
        updated.title = "renamed".to_string();
        apply_optimistic(&mut list, updated);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, MarkerId(2));
        assert_eq!(list[0].title, "renamed");
    }
}
