pub mod catalog;
pub mod crud;
pub mod form;
pub mod grid;
pub mod listeners;
pub mod relation_panel;
pub mod screen_resolve;
pub mod validate;

pub use catalog::*;
pub use crud::*;
pub use form::*;
pub use grid::*;
pub use listeners::*;
pub use relation_panel::*;
pub use screen_resolve::*;
pub use validate::*;
