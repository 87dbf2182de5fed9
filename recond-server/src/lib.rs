//! # Recond Server
//!
//! Backend for the recon dashboard. Exposes:
//!
//! - an HTTP API for project and target-scope management (`/api/...`)
//! - a WebSocket endpoint (`/ws`) streaming live recon job output and
//!   accepting start/pause/resume/stop control messages
//!
//! The actual job orchestration lives in `recond-core`; this crate is the
//! transport layer: axum routes, the session gateway, configuration, and the
//! process entry point.

pub mod errors;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use errors::{AppError, AppResult};
pub use infra::app_state::AppState;
