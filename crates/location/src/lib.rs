pub mod arbiter;
pub mod provider;

pub use arbiter::*;
pub use provider::*;
