//! Command implementations for the buildops CLI

pub mod admin;
pub mod migrate;
pub mod plans;
pub mod serve;

pub use admin::run_create_admin;
pub use migrate::run_migrate;
pub use plans::run_seed_plans;
pub use serve::run_serve;
