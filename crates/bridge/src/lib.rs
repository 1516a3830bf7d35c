pub mod protocol;
pub mod renderer;

pub use protocol::*;
pub use renderer::*;
