//! Cursor-driven, paged iteration over the filtered `users` dataset.

use export_protocol::{ExportId, Filters};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, warn};

use crate::error::{DbError, Result};
use crate::query::{build_count_query, build_declare_cursor_query};

/// Default batch size when the caller does not override it.
pub const DEFAULT_BATCH_SIZE: u32 = 1000;

/// One exported row, with values already aligned to the requested column
/// order and rendered as their canonical textual representation. `None`
/// stands for SQL `NULL`, which renders as an empty CSV field.
pub type Record = Vec<Option<String>>;

/// Resolve `totalRows`: `SELECT COUNT(*)` over the same AND-combined
/// filters the row source will later page through.
pub async fn count_matching(pool: &PgPool, filters: &Filters) -> Result<u64> {
    let mut builder = build_count_query(filters);
    let row = builder.build().fetch_one(pool).await?;
    let count: i64 = row.try_get(0)?;
    Ok(count.max(0) as u64)
}

/// A forward-only, server-side cursor over one job's filtered result set.
///
/// Holds exactly one pooled connection for its lifetime (via the open
/// transaction the cursor lives in). Must be closed through [`RowSource::close`]
/// or [`RowSource::abort`] on every exit path so the cursor and the
/// connection are released; dropping it uncommitted also releases the
/// connection (`sqlx` rolls back the transaction), but without running the
/// explicit `CLOSE` this module issues for symmetry with the cursor's
/// `DECLARE`.
pub struct RowSource {
    tx: Option<Transaction<'static, Postgres>>,
    cursor_name: String,
    batch_size: i64,
    columns: Vec<&'static str>,
    exhausted: bool,
}

impl RowSource {
    /// Open a cursor for `job_id` over `columns` filtered by `filters`.
    /// The cursor name embeds the job id so concurrently-running exports
    /// never collide.
    pub async fn open(
        pool: &PgPool,
        job_id: ExportId,
        filters: &Filters,
        columns: &[&'static str],
        batch_size: u32,
    ) -> Result<Self> {
        let cursor_name = format!("export_cursor_{}", job_id.as_uuid().simple());
        let mut tx = pool.begin().await?;

        let mut builder = build_declare_cursor_query(&cursor_name, columns, filters);
        builder.build().execute(&mut *tx).await?;

        debug!(cursor = %cursor_name, "opened export cursor");

        Ok(Self {
            tx: Some(tx),
            cursor_name,
            batch_size: batch_size.max(1) as i64,
            columns: columns.to_vec(),
            exhausted: false,
        })
    }

    /// Fetch the next batch of up to `batch_size` records. Returns `None`
    /// once the cursor is exhausted, after which the cursor and connection
    /// have already been released.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Record>>> {
        if self.exhausted {
            return Ok(None);
        }

        let tx = self.tx.as_mut().ok_or(DbError::Cancelled)?;
        let sql = format!("FETCH FORWARD {} FROM {}", self.batch_size, self.cursor_name);
        let rows = sqlx::query(&sql).fetch_all(&mut **tx).await?;

        if rows.is_empty() {
            self.exhausted = true;
            self.close().await?;
            return Ok(None);
        }

        let mut batch = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = Vec::with_capacity(self.columns.len());
            for i in 0..self.columns.len() {
                record.push(row.try_get::<Option<String>, _>(i)?);
            }
            batch.push(record);
        }

        Ok(Some(batch))
    }

    /// Close the cursor and commit the transaction, releasing the
    /// connection back to the pool. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut tx) = self.tx.take() {
            let close_sql = format!("CLOSE {}", self.cursor_name);
            if let Err(err) = sqlx::query(&close_sql).execute(&mut *tx).await {
                warn!(cursor = %self.cursor_name, error = %err, "failed to close cursor explicitly");
            }
            tx.commit().await?;
        }
        Ok(())
    }

    /// Release the cursor and connection without committing -- used on the
    /// cancellation and failure paths, where the transaction carries no
    /// writes that need preserving.
    pub async fn abort(&mut self) {
        if let Some(tx) = self.tx.take() {
            if let Err(err) = tx.rollback().await {
                warn!(cursor = %self.cursor_name, error = %err, "failed to roll back cursor transaction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_batch_size_is_one_thousand() {
        assert_eq!(DEFAULT_BATCH_SIZE, 1000);
    }
}
