use crate::config::ExportConfig;
use crate::domains::datasource::repository::StreamRepository;
use crate::domains::datasource::service::{DatasourceService, RecordTables};
use crate::domains::datasource::types::ExportHeader;
use crate::domains::export::row_source::PagedRowSource;
use crate::domains::export::types::ExportFormat;
use crate::domains::export::writer::{ExportedFile, FileExporter};
use crate::domains::publish::service::Publisher;
use crate::domains::publish::transport::ChunkTransport;
use crate::errors::{ExportError, ExportResult};
use std::sync::Arc;

/// What to produce for every stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportTargets {
    pub publish: bool,
    pub csv: bool,
    pub json: bool,
    pub gzip_json: bool,
}

impl ExportTargets {
    pub fn file_formats(&self) -> Vec<ExportFormat> {
        [
            (self.csv, ExportFormat::Csv),
            (self.json, ExportFormat::Json),
            (self.gzip_json, ExportFormat::GzipJson),
        ]
        .into_iter()
        .filter_map(|(wanted, format)| wanted.then_some(format))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        !self.publish && self.file_formats().is_empty()
    }
}

/// Per-run totals; `succeeded` and `failed` count (stream, target) runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub streams: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs every requested target for every stream in the store.
///
/// A failing stream or target is logged and counted; it never stops the
/// remaining work.
pub struct ExportService<R: StreamRepository, T: ChunkTransport> {
    repo: Arc<R>,
    datasources: DatasourceService<R>,
    files: FileExporter,
    publisher: Option<Publisher<R, T>>,
    config: ExportConfig,
}

impl<R: StreamRepository, T: ChunkTransport> ExportService<R, T> {
    pub fn new(repo: Arc<R>, config: ExportConfig, transport: Option<T>) -> Self {
        let publisher = transport.map(|t| Publisher::new(repo.clone(), t, &config));
        Self {
            datasources: DatasourceService::new(repo.clone(), config.metadata_batch_size),
            files: FileExporter::new(config.output_dir.clone()),
            repo,
            publisher,
            config,
        }
    }

    pub fn publisher(&self) -> Option<&Publisher<R, T>> {
        self.publisher.as_ref()
    }

    pub async fn run(&self, targets: ExportTargets) -> ExportResult<ExportSummary> {
        if targets.publish && self.publisher.is_none() {
            return Err(ExportError::InvalidConfig(
                "publishing requested without an upload target".to_string(),
            ));
        }

        let ids = self.repo.stream_ids().await?;
        let tables = RecordTables::load(self.repo.as_ref()).await?;
        log::info!("Exporting {} streams", ids.len());

        let mut summary = ExportSummary::default();
        for id in ids {
            summary.streams += 1;
            self.export_stream(id, &tables, targets, &mut summary).await;
        }

        log::info!(
            "Export finished: {} streams, {} succeeded, {} failed",
            summary.streams,
            summary.succeeded,
            summary.failed
        );
        Ok(summary)
    }

    async fn export_stream(
        &self,
        id: i64,
        tables: &RecordTables,
        targets: ExportTargets,
        summary: &mut ExportSummary,
    ) {
        if let Some(publisher) = &self.publisher {
            if targets.publish {
                match publisher.publish_stream(id, tables).await {
                    Ok(_) => summary.succeeded += 1,
                    Err(e) => {
                        log::error!("Publishing stream {} failed: {}", id, e);
                        summary.failed += 1;
                    }
                }
            }
        }

        let formats = targets.file_formats();
        if formats.is_empty() {
            return;
        }

        let header = match self.datasources.load_header(id, tables).await {
            Ok(header) => header,
            Err(e) => {
                log::error!("Cannot load header of stream {}: {}", id, e);
                summary.failed += formats.len();
                return;
            }
        };

        for format in formats {
            match self.export_file(id, tables, format, &header).await {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    log::error!("{:?} export of stream {} failed: {}", format, id, e);
                    summary.failed += 1;
                }
            }
        }
    }

    /// One file for one stream; every call opens a fresh cursor
    pub async fn export_file(
        &self,
        id: i64,
        tables: &RecordTables,
        format: ExportFormat,
        header: &ExportHeader,
    ) -> ExportResult<ExportedFile> {
        let capacity = match format {
            ExportFormat::Csv => self.config.csv_batch_size,
            ExportFormat::Json | ExportFormat::GzipJson => self.config.json_batch_size,
        };
        let table = tables.table_for(id);
        let mut source = PagedRowSource::new(id, self.repo.open_cursor(table, id), capacity)?;

        self.files.export(format, header, &mut source).await
    }
}
