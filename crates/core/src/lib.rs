pub mod config;
pub mod directory;
pub mod error;
pub mod event_bus;
pub mod types;

pub use config::AppConfig;
pub use directory::{ContactDirectory, InMemoryDirectory};
pub use error::{CadenceError, CadenceResult};
