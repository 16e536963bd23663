//! HTTP API
//!
//! Thin translation from requests to store reads and engine operations.
//! Alarm transitions always go through the alarm controller.

pub mod handlers;
pub mod models;
pub mod routes;

pub use routes::create_router;
