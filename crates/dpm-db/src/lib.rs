//! DPM Database: SurrealDB persistence for the permissions manager.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Transactional cascade deletes ([`CascadeCoordinator`])
//! - Repository implementations of the `dpm-core` traits, bundled as a
//!   [`SurrealStore`]
//! - Error types ([`DbError`])

mod cascade;
mod connection;
mod error;
pub mod repository;
mod schema;
mod store;

pub use cascade::CascadeCoordinator;
pub use connection::{DbConfig, DbCredentials, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
pub use store::SurrealStore;
