//! buildops-core: shared building blocks for the buildops workspace
//!
//! - [`config`] loads `~/.buildops/config.toml` with environment overrides
//! - [`error`] holds the structured error type for library consumers
//! - [`ids`] generates opaque tokens and URL slugs

pub mod config;
pub mod error;
pub mod ids;

pub use config::BuildopsConfig;
pub use error::{CoreError, Result};
pub use ids::{generate_token, slugify};
