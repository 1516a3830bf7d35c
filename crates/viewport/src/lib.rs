pub mod camera;
pub mod prefs;
pub mod store;

pub use camera::*;
pub use prefs::*;
pub use store::*;
