//! Database access for the CSV export service: connection pool
//! construction, filter-to-SQL translation, and the cursor-driven row
//! source the export pipeline pages through.

pub mod error;
pub mod pool;
pub mod query;
pub mod row_source;
pub mod schema;

pub use error::DbError;
pub use pool::{build_pool, DbConfig};
pub use row_source::{count_matching, Record, RowSource, DEFAULT_BATCH_SIZE};
