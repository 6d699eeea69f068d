//! The export pipeline: row source -> record channel -> CSV file writer,
//! with progress reporting and cooperative cancellation at batch
//! boundaries.

use std::path::{Path, PathBuf};

use export_csv::CsvDialect;
use export_db::{count_matching, RowSource};
use export_protocol::{ExportId, ExportJob, JobStatus};
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::registry::JobRegistry;
use crate::writer;

/// Owns the dependencies a running export needs: the database pool, the
/// job registry it reports into, and where finished files land.
#[derive(Clone)]
pub struct ExportPipeline {
    registry: JobRegistry,
    pool: PgPool,
    storage_path: PathBuf,
    batch_size: u32,
}

impl ExportPipeline {
    pub fn new(registry: JobRegistry, pool: PgPool, storage_path: PathBuf, batch_size: u32) -> Self {
        Self {
            registry,
            pool,
            storage_path,
            batch_size,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Run one job to completion, failure, or cancellation. Never returns
    /// an error: every failure path is reported through the registry
    /// instead, since this runs detached on its own `tokio::spawn`.
    pub async fn run(&self, id: ExportId) {
        if let Err(err) = self.try_run(id).await {
            error!(export_id = %id, error = %err, "export job failed");
            self.registry.fail_job(id, err.to_string()).await;
        }
    }

    async fn try_run(&self, id: ExportId) -> Result<(), ExportError> {
        let job = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| ExportError(format!("job {id} vanished before it could start")))?;

        self.registry
            .start_job(id)
            .await
            .map_err(|err| ExportError(err.to_string()))?;

        tokio::fs::create_dir_all(&self.storage_path)
            .await
            .map_err(|err| ExportError(format!("could not create storage directory: {err}")))?;

        // `filePath` is specified as absolute; canonicalize the (possibly
        // relative, e.g. the default "./exports") configured storage
        // directory once the directory is known to exist.
        let storage_path = tokio::fs::canonicalize(&self.storage_path)
            .await
            .map_err(|err| ExportError(format!("could not resolve storage directory: {err}")))?;

        let total_rows = count_matching(&self.pool, &job.spec.filters)
            .await
            .map_err(|err| ExportError(format!("could not count matching rows: {err}")))?;

        let dialect = CsvDialect::new(job.spec.delimiter, job.spec.quote_char)
            .map_err(|err| ExportError(err.to_string()))?;
        let path = output_path(&storage_path, id);

        if total_rows == 0 {
            info!(export_id = %id, "no matching rows; writing header-only file");
            writer::write_header_only(path.clone(), dialect, job.spec.columns.clone())
                .await
                .map_err(|err| ExportError(format!("could not write header: {err}")))?;
            self.registry
                .complete_job(id, path)
                .await
                .map_err(|err| ExportError(err.to_string()))?;
            return Ok(());
        }

        self.registry.update_progress(id, 0, total_rows).await;

        let (tx, rx) = mpsc::channel(writer::CHANNEL_CAPACITY);
        let writer_task = tokio::spawn(writer::run(
            path.clone(),
            dialect,
            job.spec.columns.clone(),
            rx,
        ));

        let outcome = self
            .drain_rows(id, &job, total_rows, tx)
            .await;

        let written = match writer_task.await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(err)) => Err(ExportError(format!("csv writer failed: {err}"))),
            Err(err) => Err(ExportError(format!("csv writer task panicked: {err}"))),
        };

        match (outcome, written) {
            (RowsOutcome::Completed, Ok(_)) => {
                self.registry
                    .complete_job(id, path)
                    .await
                    .map_err(|err| ExportError(err.to_string()))?;
                Ok(())
            }
            (RowsOutcome::Cancelled, _) => {
                info!(export_id = %id, "export cancelled mid-flight");
                cleanup_partial_file(&path).await;
                Ok(())
            }
            (RowsOutcome::Failed(err), _) => {
                cleanup_partial_file(&path).await;
                Err(err)
            }
            (RowsOutcome::Completed, Err(err)) => {
                cleanup_partial_file(&path).await;
                Err(err)
            }
        }
    }

    /// Page through the row source in batches, forwarding each row to the
    /// writer over `tx` and publishing progress after every batch. Checks
    /// the job's own status before each fetch so a cancellation observed
    /// between batches stops the pipeline without waiting for the next
    /// full batch to land.
    async fn drain_rows(
        &self,
        id: ExportId,
        job: &ExportJob,
        total_rows: u64,
        tx: mpsc::Sender<export_db::Record>,
    ) -> RowsOutcome {
        let columns: Vec<&'static str> = job.spec.columns.clone();
        let mut source = match RowSource::open(
            &self.pool,
            id,
            &job.spec.filters,
            &columns,
            self.batch_size,
        )
        .await
        {
            Ok(source) => source,
            Err(err) => return RowsOutcome::Failed(ExportError(format!("could not open row source: {err}"))),
        };

        let mut processed: u64 = 0;

        loop {
            if self.is_cancelled(id).await {
                source.abort().await;
                return RowsOutcome::Cancelled;
            }

            let batch = match source.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(err) => {
                    source.abort().await;
                    return RowsOutcome::Failed(ExportError(format!(
                        "could not fetch next batch: {err}"
                    )));
                }
            };

            for record in batch {
                if tx.send(record).await.is_err() {
                    // Writer task exited early (e.g. disk full). Its join
                    // result carries the real error; just stop producing.
                    source.abort().await;
                    return RowsOutcome::Failed(ExportError(
                        "csv writer channel closed unexpectedly".to_string(),
                    ));
                }
                processed += 1;
            }

            self.registry.update_progress(id, processed, total_rows).await;
        }

        drop(tx);
        if let Err(err) = source.close().await {
            warn!(export_id = %id, error = %err, "error closing row source cursor");
        }
        RowsOutcome::Completed
    }

    async fn is_cancelled(&self, id: ExportId) -> bool {
        matches!(
            self.registry.get(id).await.map(|job| job.status),
            Some(JobStatus::Cancelled)
        )
    }
}

enum RowsOutcome {
    Completed,
    Cancelled,
    Failed(ExportError),
}

/// Local error wrapper so `try_run` can return a single `Display`-able
/// error type without pulling in every upstream crate's error enum.
#[derive(Debug)]
struct ExportError(String);

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ExportError {}

fn output_path(storage_path: &Path, id: ExportId) -> PathBuf {
    storage_path.join(format!("{id}.csv"))
}

async fn cleanup_partial_file(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove partial export file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_uses_csv_extension() {
        let id = ExportId::new();
        let path = output_path(Path::new("/tmp/exports"), id);
        assert_eq!(path.extension().unwrap(), "csv");
        assert!(path.starts_with("/tmp/exports"));
    }
}
