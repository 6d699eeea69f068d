//! Job registry and pipeline orchestration for the CSV export service.

pub mod pipeline;
pub mod registry;
pub mod writer;

pub use pipeline::ExportPipeline;
pub use registry::JobRegistry;
