use crate::domains::record::Value;

/// File formats produced by the exporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Csv,
    Json,
    GzipJson,
}

impl ExportFormat {
    /// Get file extension for this format
    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::GzipJson => "json.gz",
        }
    }
}

/// Decoded records pulled from a row source in one step.
///
/// `more_remaining` is false only for the final batch of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub values: Vec<Value>,
    pub more_remaining: bool,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One serialized batch, the unit of a single publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position of the chunk within its stream
    pub sequence: usize,
    pub records: usize,
    pub bytes: Vec<u8>,
    pub more_remaining: bool,
}

/// Result of one segmented serialization call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOutcome {
    pub records: usize,
    pub more_remaining: bool,
}

/// Export statistics for one stream and format
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub records_written: usize,
    pub records_skipped: u64,
    pub batches: usize,
    pub bytes_written: u64,
}
