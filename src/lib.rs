//! Export of time-stamped sensor record streams from a study database.
//!
//! Records are stored as tagged binary blobs. They are read back in bounded
//! batches and written out as CSV, JSON or gzip-JSON files, or uploaded chunk
//! by chunk to a collection server.

pub mod config;
pub mod domains;
pub mod errors;

pub use config::ExportConfig;
pub use domains::export::{ExportService, ExportSummary, ExportTargets};
pub use errors::{ExportError, ExportResult};
