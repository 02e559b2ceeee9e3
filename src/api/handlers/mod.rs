pub mod risk;
pub mod system;

pub use risk::*;
pub use system::*;
