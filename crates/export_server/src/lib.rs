//! HTTP surface and bootstrap plumbing for the CSV export service.

pub mod config;
pub mod download;
pub mod error;
pub mod http;

pub use config::Config;
pub use http::{router, AppState};
