//! HTTP surface: job endpoints, health and status.

pub mod error;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod status;

pub use routes::*;
