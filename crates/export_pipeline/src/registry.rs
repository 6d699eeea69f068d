//! Process-local job registry: the state machine of §4.2.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use export_protocol::{ExportError, ExportId, ExportJob, ExportSpec, JobProgress, JobStatus};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// A process-local mapping from export identifier to job record.
///
/// Every mutation is mutually exclusive per job (each entry is its own
/// `Mutex`); reads return a consistent snapshot (a clone taken under that
/// job's lock). New entries can be inserted, and the whole map listed,
/// without blocking on any single job's lock.
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<ExportId, Arc<Mutex<ExportJob>>>>>,
    /// Advisory only -- see the open question in the design notes. Exposed
    /// so `initiate` can log when the soft cap is exceeded.
    soft_concurrency_cap: usize,
}

impl JobRegistry {
    pub fn new(soft_concurrency_cap: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            soft_concurrency_cap,
        }
    }

    pub fn soft_concurrency_cap(&self) -> usize {
        self.soft_concurrency_cap
    }

    /// Allocate a fresh identifier, insert a `pending` record, return it.
    pub async fn create(&self, spec: ExportSpec) -> ExportId {
        let id = ExportId::new();
        let job = ExportJob::new(id, spec, Utc::now());

        let active = self.active_count().await;
        if active >= self.soft_concurrency_cap {
            warn!(
                active,
                cap = self.soft_concurrency_cap,
                "soft concurrency cap exceeded; admitting job anyway"
            );
        }

        self.jobs.write().await.insert(id, Arc::new(Mutex::new(job)));
        info!(export_id = %id, "created export job");
        id
    }

    /// Return a consistent snapshot of the job, if it exists.
    pub async fn get(&self, id: ExportId) -> Option<ExportJob> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id)?;
        Some(job.lock().await.clone())
    }

    pub async fn list(&self) -> Vec<ExportJob> {
        let jobs = self.jobs.read().await;
        let mut snapshot = Vec::with_capacity(jobs.len());
        for job in jobs.values() {
            snapshot.push(job.lock().await.clone());
        }
        snapshot
    }

    /// Number of jobs currently in a non-terminal state.
    pub async fn active_count(&self) -> usize {
        let jobs = self.jobs.read().await;
        let mut count = 0;
        for job in jobs.values() {
            if !job.lock().await.status.is_terminal() {
                count += 1;
            }
        }
        count
    }

    /// `pending -> processing`, set `startedAt`.
    pub async fn start_job(&self, id: ExportId) -> Result<(), ExportError> {
        self.with_job(id, |job| {
            if job.status != JobStatus::Pending {
                return Err(ExportError::Internal(format!(
                    "cannot start job {id} from state {:?}",
                    job.status
                )));
            }
            job.status = JobStatus::Processing;
            job.started_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    /// Update `processedRows`/`totalRows`. A no-op once the job is
    /// terminal, since a racing cancellation or failure must win.
    pub async fn update_progress(&self, id: ExportId, processed: u64, total: u64) {
        let _ = self
            .with_job(id, |job| {
                if !job.status.is_terminal() {
                    job.progress = JobProgress::new(processed, total);
                }
                Ok(())
            })
            .await;
    }

    /// `processing -> completed`, set `filePath`, `completedAt`, 100%. A
    /// no-op if the job already reached a terminal state (e.g. a racing
    /// `cancelJob`), so a terminal transition can never be overwritten.
    pub async fn complete_job(&self, id: ExportId, file_path: std::path::PathBuf) -> Result<(), ExportError> {
        self.with_job(id, |job| {
            if job.status.is_terminal() {
                return Ok(());
            }
            let total = job.progress.total_rows;
            job.status = JobStatus::Completed;
            job.file_path = Some(file_path);
            job.completed_at = Some(Utc::now());
            job.progress = JobProgress::complete(total);
            Ok(())
        })
        .await
    }

    /// Any non-terminal state -> `failed`, set `error`, `completedAt`.
    pub async fn fail_job(&self, id: ExportId, error_message: impl Into<String>) {
        let message = error_message.into();
        let _ = self
            .with_job(id, |job| {
                if job.status.is_terminal() {
                    return Ok(());
                }
                job.status = JobStatus::Failed;
                job.error = Some(message.clone());
                job.completed_at = Some(Utc::now());
                Ok(())
            })
            .await;
    }

    /// Succeeds only from `pending` or `processing`. Returns whether the
    /// transition happened.
    pub async fn cancel_job(&self, id: ExportId) -> Result<bool, ExportError> {
        let jobs = self.jobs.read().await;
        let Some(job) = jobs.get(&id) else {
            return Err(ExportError::NotFound(id.to_string()));
        };
        let mut job = job.lock().await;
        if !job.status.is_cancellable() {
            return Ok(false);
        }
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(Utc::now());
        Ok(true)
    }

    async fn with_job(
        &self,
        id: ExportId,
        f: impl FnOnce(&mut ExportJob) -> Result<(), ExportError>,
    ) -> Result<(), ExportError> {
        let jobs = self.jobs.read().await;
        let job = jobs
            .get(&id)
            .ok_or_else(|| ExportError::NotFound(id.to_string()))?;
        let mut job = job.lock().await;
        f(&mut job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use export_protocol::Filters;

    fn spec() -> ExportSpec {
        ExportSpec {
            filters: Filters::default(),
            columns: export_protocol::filters::default_columns(),
            delimiter: ',',
            quote_char: '"',
        }
    }

    #[tokio::test]
    async fn create_then_get_returns_pending_job() {
        let registry = JobRegistry::new(5);
        let id = registry.create(spec()).await;
        let job = registry.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.file_path.is_none());
    }

    #[tokio::test]
    async fn unknown_id_returns_none() {
        let registry = JobRegistry::new(5);
        assert!(registry.get(ExportId::new()).await.is_none());
    }

    #[tokio::test]
    async fn full_lifecycle_to_completion() {
        let registry = JobRegistry::new(5);
        let id = registry.create(spec()).await;
        registry.start_job(id).await.unwrap();
        assert_eq!(registry.get(id).await.unwrap().status, JobStatus::Processing);

        registry.update_progress(id, 5, 10).await;
        assert_eq!(registry.get(id).await.unwrap().progress.processed_rows, 5);

        registry
            .complete_job(id, std::path::PathBuf::from("/tmp/x.csv"))
            .await
            .unwrap();
        let job = registry.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress.percentage, 100);
        assert!(job.completed_at.is_some());
        assert!(job.file_path.is_some());
    }

    #[tokio::test]
    async fn progress_is_frozen_once_terminal() {
        let registry = JobRegistry::new(5);
        let id = registry.create(spec()).await;
        registry.start_job(id).await.unwrap();
        registry.fail_job(id, "boom").await;
        registry.update_progress(id, 999, 1000).await;
        let job = registry.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress.processed_rows, 0);
    }

    #[tokio::test]
    async fn cancel_only_succeeds_from_non_terminal_states() {
        let registry = JobRegistry::new(5);
        let id = registry.create(spec()).await;
        assert!(registry.cancel_job(id).await.unwrap());
        assert_eq!(registry.get(id).await.unwrap().status, JobStatus::Cancelled);
        assert!(!registry.cancel_job(id).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_unknown_job_is_not_found() {
        let registry = JobRegistry::new(5);
        assert!(matches!(
            registry.cancel_job(ExportId::new()).await,
            Err(ExportError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn complete_job_cannot_overwrite_a_prior_cancellation() {
        let registry = JobRegistry::new(5);
        let id = registry.create(spec()).await;
        registry.start_job(id).await.unwrap();
        assert!(registry.cancel_job(id).await.unwrap());

        registry
            .complete_job(id, std::path::PathBuf::from("/tmp/x.csv"))
            .await
            .unwrap();

        let job = registry.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.file_path.is_none());
    }
}
