pub mod common;
pub mod descriptor;
pub mod entity;
pub mod screen;
pub mod session;

pub use common::*;
pub use descriptor::*;
pub use entity::*;
pub use screen::*;
pub use session::*;
