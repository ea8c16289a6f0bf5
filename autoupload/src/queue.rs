//! Spreadsheet-backed job queue: cached reads, backoff retries, status writes.

use crate::cache::{CacheKey, RowCache, RowMatrix};
use crate::errors::AutomationError;
use crate::job::{source_col, SOURCE_SHEET};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::sheets::SheetBackend;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Cache purposes used by the orchestrator and the workflow engine.
pub mod purpose {
    pub const ROWS: &str = "rows";
    pub const SOURCE: &str = "source";
    pub const CLEANUP: &str = "cleanup";
}

#[derive(Clone)]
pub struct QueueClient {
    backend: Arc<dyn SheetBackend>,
    cache: Arc<RowCache>,
    retry: RetryPolicy,
}

impl QueueClient {
    pub fn new(backend: Arc<dyn SheetBackend>, cache: Arc<RowCache>) -> Self {
        Self {
            backend,
            cache,
            retry: RetryPolicy::default(),
        }
    }

    /// Rows of `sheet`, served from the `(sheet, purpose)` slot while fresh.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(
        &self,
        sheet: &str,
        purpose: &str,
    ) -> Result<Arc<RowMatrix>, AutomationError> {
        let key = CacheKey::new(sheet, purpose);
        if let Some(rows) = self.cache.get(&key) {
            return Ok(rows);
        }

        let backend = self.backend.clone();
        let rows = retry_with_backoff(self.retry, || {
            let backend = backend.clone();
            async move { backend.get_all_values(sheet).await }
        })
        .await?;
        debug!("Fetched {} rows for {key}", rows.len());
        Ok(self.cache.put(key, rows))
    }

    /// Writes `value` into `target_column` of the first data row whose
    /// `match_column` equals `match_value`. Columns are zero-based.
    ///
    /// Returns `Ok(false)` when no row matches.
    #[instrument(skip(self, value))]
    pub async fn write_status(
        &self,
        sheet: &str,
        match_column: usize,
        match_value: &str,
        target_column: usize,
        value: &str,
    ) -> Result<bool, AutomationError> {
        let rows = self.fetch(sheet, purpose::SOURCE).await?;
        let found = rows
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, row)| row.get(match_column).map(|c| c.trim()) == Some(match_value));

        let Some((idx, _)) = found else {
            warn!("Code {match_value} not found in sheet {sheet}");
            return Ok(false);
        };

        let backend = self.backend.clone();
        retry_with_backoff(self.retry, || {
            let backend = backend.clone();
            async move {
                backend
                    .update_cell(sheet, idx + 1, target_column + 1, value)
                    .await
            }
        })
        .await?;
        info!("Updated '{value}' for code {match_value}");
        self.cache.invalidate_sheet(sheet);
        Ok(true)
    }

    /// Marks `code` with `status` on the source sheet.
    pub async fn update_source_status(
        &self,
        code: &str,
        status: &str,
    ) -> Result<bool, AutomationError> {
        self.write_status(SOURCE_SHEET, source_col::CODE, code, source_col::STATUS, status)
            .await
    }
}
