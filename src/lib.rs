//! Band Office Form Service
//!
//! Staff create sign-up forms here; the service publishes them to the
//! community portal, takes submissions back through an authenticated
//! webhook, and can pull submissions it missed.
//!
//! # Modules
//!
//! - `client`: `PortalApi` and its reqwest-backed `PortalClient`
//! - `auth`: webhook secret checks and staff bearer sessions
//! - `services`: field schema translation, publishing, intake, pulling,
//!   CSV export, message dispatch and the CSV-backed `DatabaseService`
//! - `handlers` / `routes`: the axum HTTP surface
//!
//! # Portal identity
//!
//! A local form and its portal copy are linked by the portal's id once a
//! publish succeeds. Until then the portal knows the form by the local id.

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
pub mod client_mock;


// Re-export the main types for ease of use
pub use client::{PortalApi, PortalClient, PortalError};
pub use config::AppConfig;
pub use errors::AppError;
pub use handlers::AppState;
pub use routes::create_router;
