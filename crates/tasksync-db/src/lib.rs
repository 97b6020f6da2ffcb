//! # tasksync-db
//!
//! SQLite access layer for tasksync.
//!
//! This crate provides:
//! - Connection pool management
//! - The column repository backing the derived board filter
//!
//! ## Example
//!
//! ```rust,ignore
//! use tasksync_db::{create_pool, SqliteColumnRepository};
//! use tasksync_core::BoardLookup;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool("sqlite://tasks.db").await?;
//!     let columns = SqliteColumnRepository::new(pool);
//!     println!("{:?}", columns.board_for_column(7).await?);
//!     Ok(())
//! }
//! ```
pub mod columns;
pub mod pool;

// Re-export core types
pub use tasksync_core::{BoardLookup, Error, Result};

pub use columns::SqliteColumnRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
