//! care-api: HTTP API for CareConnect
//!
//! JSON REST endpoints over the [`care_core::Marketplace`].
//! Built with axum for async HTTP handling.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use error::{ApiError, Result};
pub use server::{app, start_server, AppState};
