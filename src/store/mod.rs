pub mod membership;
pub mod memory;
pub mod screens;
pub mod traits;

pub use membership::*;
pub use memory::*;
pub use screens::*;
pub use traits::*;
