//! # chat-db
//!
//! Read-only database access for the hub, via SQLx on PostgreSQL.
//!
//! The hub never writes: the API layer owns the schema and commits messages,
//! blocks and membership changes before it fires a trigger. This crate only
//! resolves conversation membership on demand.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_common::AppConfig;
//! use chat_db::{create_pool, PgParticipantView, PoolSettings};
//!
//! async fn example(config: &AppConfig) -> Result<(), sqlx::Error> {
//!     let pool = create_pool(&config.database, &PoolSettings::default()).await?;
//!     let participants = PgParticipantView::new(pool);
//!     Ok(())
//! }
//! ```

pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, PgPool, PoolSettings};
pub use repositories::PgParticipantView;
