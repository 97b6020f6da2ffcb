//! Column repository: resolves task columns to their boards.
//!
//! The `columns` table belongs to the task/board service; this crate only
//! reads it.

use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use tracing::trace;

use tasksync_core::{BoardLookup, Error, Result};

/// SQLite column repository.
#[derive(Debug, Clone)]
pub struct SqliteColumnRepository {
    pool: Pool<Sqlite>,
}

impl SqliteColumnRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Board owning `column_id`, or `None` when the column does not exist.
    pub async fn board_id(&self, column_id: i64) -> Result<Option<i64>> {
        let board_id: Option<i64> =
            sqlx::query_scalar("SELECT board_id FROM columns WHERE id = ?")
                .bind(column_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        trace!(
            subsystem = "db",
            component = "columns",
            op = "board_lookup",
            column_id,
            ?board_id,
            "Column resolved"
        );
        Ok(board_id)
    }
}

#[async_trait]
impl BoardLookup for SqliteColumnRepository {
    async fn board_for_column(&self, column_id: i64) -> Result<Option<i64>> {
        self.board_id(column_id).await
    }
}
