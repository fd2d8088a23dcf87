use crate::domains::datasource::types::{
    DescriptorExtras, RecordTable, SourceComponent, StreamDescriptor,
};
use crate::errors::{DbError, DbResult};
use async_trait::async_trait;
use futures::stream::{BoxStream, TryStreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::time::Duration;

/// Forward-only cursor over the raw record blobs of one stream
#[async_trait]
pub trait RowCursor: Send {
    /// Next blob in stored order, `None` once the cursor has reached its end
    async fn next_blob(&mut self) -> DbResult<Option<Vec<u8>>>;
}

/// Access to the per-study record store
#[async_trait]
pub trait StreamRepository: Send + Sync {
    type Cursor<'a>: RowCursor + 'a
    where
        Self: 'a;

    /// All known stream ids
    async fn stream_ids(&self) -> DbResult<Vec<i64>>;

    /// Stream ids that have at least one record in `table`
    async fn stream_ids_with_records(&self, table: RecordTable) -> DbResult<Vec<i64>>;

    async fn find_descriptor(&self, id: i64) -> DbResult<StreamDescriptor>;

    /// Id of the stream whose datasource type equals `datasource_type`; the last match wins
    async fn find_stream_id_by_type(&self, datasource_type: &str) -> DbResult<Option<i64>>;

    /// Open a fresh cursor; every call yields an independent cursor
    fn open_cursor(&self, table: RecordTable, id: i64) -> Self::Cursor<'_>;
}

/// SQLite implementation over an mCerebrum-style study database
pub struct SqliteStreamRepository {
    pool: SqlitePool,
}

impl SqliteStreamRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the study database read-only
    pub async fn connect(path: &Path, query_timeout: Duration) -> DbResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .busy_timeout(query_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        log::debug!("Connected to study database {}", path.display());
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn descriptor_from_row(row: &SqliteRow) -> DbResult<StreamDescriptor> {
    let text = |column: &str| -> DbResult<Option<String>> {
        row.try_get::<Option<String>, _>(column).map_err(DbError::from)
    };

    let extras = match row.try_get::<Option<Vec<u8>>, _>("datasource")? {
        Some(raw) if !raw.is_empty() => serde_json::from_slice::<DescriptorExtras>(&raw)
            .map_err(|e| DbError::Descriptor(e.to_string()))?,
        _ => DescriptorExtras::default(),
    };

    Ok(StreamDescriptor {
        id: row.try_get("ds_id")?,
        datasource_id: text("datasource_id")?,
        datasource_type: text("datasource_type")?,
        platform: SourceComponent::new(text("platform_id")?, text("platform_type")?),
        platform_app: SourceComponent::new(text("platformapp_id")?, text("platformapp_type")?),
        application: SourceComponent::new(text("application_id")?, text("application_type")?),
        persistent: extras.persistent,
        data_descriptors: extras.data_descriptors,
    })
}

#[async_trait]
impl StreamRepository for SqliteStreamRepository {
    type Cursor<'a> = SqliteRowCursor<'a>;

    async fn stream_ids(&self) -> DbResult<Vec<i64>> {
        let rows = sqlx::query("SELECT ds_id FROM datasources ORDER BY ds_id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("ds_id").map_err(DbError::from))
            .collect()
    }

    async fn stream_ids_with_records(&self, table: RecordTable) -> DbResult<Vec<i64>> {
        let query = match table {
            RecordTable::Data => {
                "SELECT datasource_id AS ds_id FROM data GROUP BY datasource_id"
            }
            RecordTable::RawData => {
                "SELECT datasource_id AS ds_id FROM rawdata GROUP BY datasource_id"
            }
        };

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<i64, _>("ds_id").map_err(DbError::from))
            .collect()
    }

    async fn find_descriptor(&self, id: i64) -> DbResult<StreamDescriptor> {
        let row = sqlx::query(
            "SELECT ds_id, datasource_id, datasource_type, platform_id, platform_type,
                    platformapp_id, platformapp_type, application_id, application_type, datasource
             FROM datasources WHERE ds_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound("datasource".to_string(), id.to_string()))?;

        descriptor_from_row(&row)
    }

    async fn find_stream_id_by_type(&self, datasource_type: &str) -> DbResult<Option<i64>> {
        let rows = sqlx::query("SELECT ds_id FROM datasources WHERE datasource_type = ?")
            .bind(datasource_type)
            .fetch_all(&self.pool)
            .await?;

        match rows.last() {
            Some(row) => Ok(Some(row.try_get("ds_id")?)),
            None => Ok(None),
        }
    }

    fn open_cursor(&self, table: RecordTable, id: i64) -> SqliteRowCursor<'_> {
        let query = match table {
            RecordTable::Data => "SELECT sample FROM data WHERE datasource_id = ?",
            RecordTable::RawData => "SELECT sample FROM rawdata WHERE datasource_id = ?",
        };

        SqliteRowCursor {
            rows: sqlx::query(query).bind(id).fetch(&self.pool),
        }
    }
}

/// Streaming result set; the pooled connection is held until the cursor is dropped
pub struct SqliteRowCursor<'a> {
    rows: BoxStream<'a, Result<SqliteRow, sqlx::Error>>,
}

#[async_trait]
impl<'a> RowCursor for SqliteRowCursor<'a> {
    async fn next_blob(&mut self) -> DbResult<Option<Vec<u8>>> {
        match self.rows.try_next().await? {
            Some(row) => Ok(Some(row.try_get::<Vec<u8>, _>("sample")?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
pub use self::memory::{MemoryCursor, MemoryStreamRepository};
