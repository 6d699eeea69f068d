use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filters::{ColumnSpec, Filters};
use crate::id::ExportId;

/// A job's position in the state machine of §4.2: `pending -> processing ->
/// completed`, with `pending|processing -> failed` and `pending|processing
/// -> cancelled` as the only other edges. There are no back-edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// `completed`, `failed`, and `cancelled` are terminal: no further
    /// transition is legal once a job reaches one of them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `cancelJob` may act on a job currently in this state.
    pub fn is_cancellable(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// `{ totalRows, processedRows, percentage }` as described in §3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub total_rows: u64,
    pub processed_rows: u64,
    pub percentage: u32,
}

impl JobProgress {
    pub fn new(processed_rows: u64, total_rows: u64) -> Self {
        let percentage = if total_rows > 0 {
            // round(processed*100/total), computed in integer arithmetic to
            // stay deterministic across platforms.
            (((processed_rows * 100) as f64) / (total_rows as f64)).round() as u32
        } else {
            0
        };
        Self {
            total_rows,
            processed_rows,
            percentage,
        }
    }

    /// Progress for a job that just reached `completed`. `percentage` is
    /// 100 except for the `totalRows == 0` special case, where it stays 0
    /// per §8's boundary behavior (`{0,0,0}`, not `{0,0,100}`).
    pub fn complete(total_rows: u64) -> Self {
        Self {
            total_rows,
            processed_rows: total_rows,
            percentage: if total_rows > 0 { 100 } else { 0 },
        }
    }
}

/// The normalized, validated input to `create`: everything needed to run
/// the pipeline for one export.
#[derive(Debug, Clone)]
pub struct ExportSpec {
    pub filters: Filters,
    pub columns: Vec<ColumnSpec>,
    pub delimiter: char,
    pub quote_char: char,
}

/// The full job record held by the registry and returned by `status`.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub id: ExportId,
    pub status: JobStatus,
    pub spec: ExportSpec,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub file_path: Option<std::path::PathBuf>,
}

impl ExportJob {
    pub fn new(id: ExportId, spec: ExportSpec, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            spec,
            progress: JobProgress::default(),
            created_at,
            started_at: None,
            completed_at: None,
            error: None,
            file_path: None,
        }
    }
}

/// Wire representation of a job snapshot, matching the §6 status payload
/// exactly (`exportId`, `status`, `progress`, `error`, `createdAt`,
/// `completedAt`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportStatusResponse {
    pub export_id: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&ExportJob> for ExportStatusResponse {
    fn from(job: &ExportJob) -> Self {
        Self {
            export_id: job.id.to_string(),
            status: job.status,
            progress: job.progress,
            error: job.error.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_zero_when_total_is_unknown() {
        let progress = JobProgress::new(0, 0);
        assert_eq!(progress.percentage, 0);
    }

    #[test]
    fn percentage_rounds_to_nearest_integer() {
        // 1/3 * 100 = 33.33... -> rounds to 33
        assert_eq!(JobProgress::new(1, 3).percentage, 33);
        // 2/3 * 100 = 66.66... -> rounds to 67
        assert_eq!(JobProgress::new(2, 3).percentage, 67);
    }

    #[test]
    fn complete_with_zero_total_rows_stays_at_zero_percent() {
        let progress = JobProgress::complete(0);
        assert_eq!(progress, JobProgress { total_rows: 0, processed_rows: 0, percentage: 0 });
    }

    #[test]
    fn complete_with_rows_is_one_hundred_percent() {
        let progress = JobProgress::complete(42);
        assert_eq!(progress, JobProgress { total_rows: 42, processed_rows: 42, percentage: 100 });
    }

    #[test]
    fn terminal_states_have_no_further_transitions() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn only_pending_and_processing_are_cancellable() {
        assert!(JobStatus::Pending.is_cancellable());
        assert!(JobStatus::Processing.is_cancellable());
        assert!(!JobStatus::Completed.is_cancellable());
    }
}
