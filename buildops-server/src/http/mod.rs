//! HTTP server layer
//!
//! Axum server with:
//! - `GET /health` and `POST /rpc/<namespace>.<procedure>`
//! - Session-cookie or bearer authentication with role gates
//! - Rate limiting, CORS and security headers
//! - JSON error responses

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, run_server, ServerConfig, ServerError};
