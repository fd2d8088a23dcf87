use thiserror::Error;

/// Record decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown record tag: {0}")]
    UnknownTag(u8),

    #[error("Record truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        needed: usize,
        remaining: usize,
    },

    #[error("Record string payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Record JSON payload is invalid: {0}")]
    InvalidJson(String),

    #[error("Record has {0} trailing bytes after its payload")]
    TrailingBytes(usize),

    #[error("Payload length {0} exceeds the wire length limit")]
    TooLong(usize),
}

/// Database (row source) errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Record not found: {0} with ID {1}")]
    NotFound(String, String),

    #[error("Invalid datasource descriptor: {0}")]
    Descriptor(String),
}

/// Content digest errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DigestError {
    #[error("Digest algorithm not available: {0}")]
    Unsupported(String),
}

/// Upload transport errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Upload request failed: {0}")]
    Request(String),

    #[error("No response received from server")]
    NoResponse,

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Invalid multipart part: {0}")]
    InvalidPart(String),
}

/// Errors surfaced by a single stream export, file or publish
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Row source error: {0}")]
    RowSource(#[from] DbError),

    #[error("Digest error: {0}")]
    Digest(#[from] DigestError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Row source already exhausted")]
    SourceExhausted,

    #[error("Chunk {sequence} failed after {chunks_sent} chunks were sent: {source}")]
    Publish {
        sequence: usize,
        chunks_sent: usize,
        #[source]
        source: Box<ExportError>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
