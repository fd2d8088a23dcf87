mod error;

pub use error::{DbError, DecodeError, DigestError, ExportError, TransportError};

/// Result type for record decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;
