#![warn(clippy::unwrap_used)]

pub mod enrollment_rest;
pub mod rest;
pub mod sequence_rest;
pub mod server;
pub mod swagger;
pub mod views;

pub use server::ApiServer;
pub use swagger::ApiDoc;
