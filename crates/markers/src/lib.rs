pub mod api;
pub mod draft;
pub mod filter;
pub mod model;
pub mod query;

pub use api::*;
pub use draft::*;
pub use filter::*;
pub use model::*;
pub use query::*;
