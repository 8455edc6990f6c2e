//! IntentForge Gateway HTTP API Server
//!
//! `POST /interpret`, `GET /api/tools`, `GET /api/health`.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, start_server, GatewayState};
