//! Database layer - connection pool, migrations and repositories
//!
//! # Design Principles
//!
//! - Every tenant-scoped query filters by `tenant_id`, or joins to a parent that does
//! - List operations use JOINs and `COUNT(*) OVER()` - no N+1 queries
//! - Rely on DB constraints, handle conflicts - no check-then-insert where a
//!   unique index exists
//! - Transactions for multi-step operations

pub mod migrate;
pub mod pool;
pub mod repos;

pub use migrate::{run_migrations, MIGRATOR};
pub use pool::{create_pool, create_pool_with_options};
pub use repos::*;
