pub mod row_source;
pub mod serializer;
pub mod service;
pub mod types;
pub mod writer;

pub use row_source::PagedRowSource;
pub use serializer::ChunkProducer;
pub use service::{ExportService, ExportSummary, ExportTargets};
pub use types::{Batch, Chunk, ExportFormat, ExportStats, SegmentOutcome};
pub use writer::{ExportedFile, FileExporter};
