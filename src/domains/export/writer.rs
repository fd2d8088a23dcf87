use crate::domains::datasource::repository::RowCursor;
use crate::domains::datasource::types::ExportHeader;
use crate::domains::export::row_source::PagedRowSource;
use crate::domains::export::serializer::{write_csv, write_gzip_json, write_json};
use crate::domains::export::types::{ExportFormat, ExportStats};
use crate::errors::ExportResult;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// A finished export file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub stats: ExportStats,
}

/// Writes one file per stream and format under `output_dir`
#[derive(Debug, Clone)]
pub struct FileExporter {
    output_dir: PathBuf,
}

impl FileExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output_dir>/<descriptor stem>.<extension>`
    pub fn path_for(&self, header: &ExportHeader, format: ExportFormat) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{}",
            header.datasource.file_stem(),
            format.file_extension()
        ))
    }

    /// Drain `source` into a new file. A partially written file is left in place on failure.
    pub async fn export<C: RowCursor>(
        &self,
        format: ExportFormat,
        header: &ExportHeader,
        source: &mut PagedRowSource<C>,
    ) -> ExportResult<ExportedFile> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.path_for(header, format);
        let out = BufWriter::new(File::create(&path)?);

        log::debug!("Writing stream {} to {}", header.datasource.id, path.display());
        let stats = match format {
            ExportFormat::Csv => write_csv(source, out).await?,
            ExportFormat::Json => write_json(header, source, out).await?,
            ExportFormat::GzipJson => write_gzip_json(header, source, out).await?,
        };

        log::info!(
            "Exported {} records of stream {} to {} ({} bytes, {} skipped)",
            stats.records_written,
            header.datasource.id,
            path.display(),
            stats.bytes_written,
            stats.records_skipped
        );

        Ok(ExportedFile {
            path,
            format,
            stats,
        })
    }
}
