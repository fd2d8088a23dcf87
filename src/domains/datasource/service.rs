use crate::domains::datasource::repository::StreamRepository;
use crate::domains::datasource::types::{
    ExportHeader, RecordTable, StudyInfo, UserInfo, STUDY_INFO_TYPE, USER_INFO_TYPE,
};
use crate::domains::export::row_source::PagedRowSource;
use crate::errors::{DbResult, ExportResult};
use crate::domains::record::Value;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Which record table each stream's rows live in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTables {
    data: BTreeSet<i64>,
    raw_data: BTreeSet<i64>,
}

impl RecordTables {
    pub async fn load<R: StreamRepository + ?Sized>(repo: &R) -> DbResult<Self> {
        Ok(Self {
            data: repo.stream_ids_with_records(RecordTable::Data).await?.into_iter().collect(),
            raw_data: repo
                .stream_ids_with_records(RecordTable::RawData)
                .await?
                .into_iter()
                .collect(),
        })
    }

    /// `data` when the stream has rows there, else `rawdata` when it has rows there, else `data`
    pub fn table_for(&self, id: i64) -> RecordTable {
        if self.data.contains(&id) {
            RecordTable::Data
        } else if self.raw_data.contains(&id) {
            RecordTable::RawData
        } else {
            RecordTable::Data
        }
    }

    pub fn has_records(&self, id: i64) -> bool {
        self.data.contains(&id) || self.raw_data.contains(&id)
    }
}

/// Descriptor and header metadata lookups
pub struct DatasourceService<R: StreamRepository> {
    repo: Arc<R>,
    metadata_capacity: usize,
}

impl<R: StreamRepository> DatasourceService<R> {
    pub fn new(repo: Arc<R>, metadata_capacity: usize) -> Self {
        Self {
            repo,
            metadata_capacity,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Descriptor plus user and study metadata for stream `id`
    pub async fn load_header(&self, id: i64, tables: &RecordTables) -> ExportResult<ExportHeader> {
        let datasource = self.repo.find_descriptor(id).await?;
        let userinfo = self.load_user_info(tables).await?;
        let studyinfo = self.load_study_info(tables).await?;

        Ok(ExportHeader {
            userinfo,
            studyinfo,
            datasource,
        })
    }

    pub async fn load_user_info(&self, tables: &RecordTables) -> ExportResult<UserInfo> {
        self.load_metadata(tables, USER_INFO_TYPE, |info: &UserInfo| !info.uuid.is_empty())
            .await
    }

    pub async fn load_study_info(&self, tables: &RecordTables) -> ExportResult<StudyInfo> {
        self.load_metadata(tables, STUDY_INFO_TYPE, |info: &StudyInfo| !info.id.is_empty())
            .await
    }

    async fn load_metadata<T>(
        &self,
        tables: &RecordTables,
        datasource_type: &str,
        is_set: fn(&T) -> bool,
    ) -> ExportResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let Some(id) = self.repo.find_stream_id_by_type(datasource_type).await? else {
            log::debug!("No {} stream; using empty metadata", datasource_type);
            return Ok(T::default());
        };

        let table = tables.table_for(id);
        let mut source =
            PagedRowSource::new(id, self.repo.open_cursor(table, id), self.metadata_capacity)?;

        while source.has_more().await? {
            for value in source.next_batch().await?.values {
                match parse_metadata::<T>(&value) {
                    Some(info) if is_set(&info) => {
                        source.close();
                        return Ok(info);
                    }
                    Some(_) => {}
                    None => log::debug!(
                        "Ignoring unparseable {} record at {}",
                        datasource_type,
                        value.timestamp
                    ),
                }
            }
        }

        log::info!("{} stream {} holds no usable record", datasource_type, id);
        Ok(T::default())
    }
}

/// Metadata records carry a JSON object after the timestamp in their text rendering
fn parse_metadata<T: DeserializeOwned>(value: &Value) -> Option<T> {
    let text = value.to_text();
    let (_, body) = text.split_once(',')?;
    serde_json::from_str(body.trim()).ok()
}
