pub mod bounds;
pub mod coords;
pub mod time;

// Geo crate: small, well-tested primitives only.
pub use bounds::*;
pub use coords::*;
pub use time::*;
