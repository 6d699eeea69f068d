//! Shared types for the CSV export service.
//!
//! Used by the row source, the pipeline, the job registry, and the HTTP
//! surface so that a job's shape is defined exactly once.

pub mod error;
pub mod filters;
pub mod id;
pub mod job;

pub use error::ExportError;
pub use filters::{ColumnSpec, Filters, SubscriptionTier, COLUMN_ALLOW_LIST, DEFAULT_COLUMNS};
pub use id::ExportId;
pub use job::{ExportJob, ExportSpec, ExportStatusResponse, JobProgress, JobStatus};
