//! Core traits for tasksync abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, so the sync filters can run against SQLite in production and
//! against in-memory fixtures in tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, Result};

// =============================================================================
// BOARD LOOKUP
// =============================================================================

/// Resolves which board a column belongs to.
///
/// Task events carry a `column_id` but not a `board_id`; the board filter
/// uses this lookup to join them to a board.
#[async_trait]
pub trait BoardLookup: Send + Sync {
    /// Board owning `column_id`, or `None` when the column does not exist.
    async fn board_for_column(&self, column_id: i64) -> Result<Option<i64>>;
}

/// Map-backed [`BoardLookup`] for tests and for running without a database.
#[derive(Debug, Default)]
pub struct InMemoryBoardLookup {
    columns: RwLock<HashMap<i64, i64>>,
}

impl InMemoryBoardLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(column_id, board_id)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i64, i64)>) -> Self {
        Self {
            columns: RwLock::new(pairs.into_iter().collect()),
        }
    }

    pub fn insert(&self, column_id: i64, board_id: i64) {
        self.columns
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(column_id, board_id);
    }
}

#[async_trait]
impl BoardLookup for InMemoryBoardLookup {
    async fn board_for_column(&self, column_id: i64) -> Result<Option<i64>> {
        let columns = self
            .columns
            .read()
            .map_err(|_| Error::Internal("column map lock poisoned".to_string()))?;
        Ok(columns.get(&column_id).copied())
    }
}
