pub mod config;
pub mod domain;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export error types
pub use error::{EngineError, Result, StoreError};

// Export engine types
pub use logic::*;

// Export all model types
pub use model::*;

// Export store types
pub use store::*;
