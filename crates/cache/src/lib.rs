#![warn(clippy::unwrap_used)]

//! Read-through caching for contact/company lookups.

pub mod directory;
pub mod local;

pub use directory::CachedDirectory;
pub use local::LocalCache;
