pub mod repository;
pub mod service;
pub mod types;

pub use repository::{RowCursor, SqliteStreamRepository, StreamRepository};
pub use service::{DatasourceService, RecordTables};
pub use types::{ExportHeader, RecordTable, StreamDescriptor, StudyInfo, UserInfo};
