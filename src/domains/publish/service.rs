use crate::config::ExportConfig;
use crate::domains::datasource::repository::StreamRepository;
use crate::domains::datasource::service::{DatasourceService, RecordTables};
use crate::domains::export::row_source::PagedRowSource;
use crate::domains::export::serializer::ChunkProducer;
use crate::domains::export::types::ExportFormat;
use crate::domains::publish::digest::hex_digest;
use crate::domains::publish::transport::ChunkTransport;
use crate::domains::publish::types::{DigestAlgorithm, PublishReport, PublishState};
use crate::errors::{ExportError, ExportResult};
use std::sync::Arc;

/// Chunked upload of one stream at a time.
///
/// Runs `INIT -> FETCH -> SEND -> (FETCH | DONE | FAILED)`. Each chunk is a
/// self-contained gzip-JSON document sent in a single attempt; the first
/// failed attempt ends the stream and later chunks are never tried.
pub struct Publisher<R: StreamRepository, T: ChunkTransport> {
    repo: Arc<R>,
    datasources: DatasourceService<R>,
    transport: T,
    capacity: usize,
    digest_algorithm: String,
}

impl<R: StreamRepository, T: ChunkTransport> Publisher<R, T> {
    pub fn new(repo: Arc<R>, transport: T, config: &ExportConfig) -> Self {
        Self {
            datasources: DatasourceService::new(repo.clone(), config.metadata_batch_size),
            repo,
            transport,
            capacity: config.publish_batch_size,
            digest_algorithm: config.digest_algorithm.clone(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `tables` tells which record table holds each stream
    pub async fn publish_stream(
        &self,
        id: i64,
        tables: &RecordTables,
    ) -> ExportResult<PublishReport> {
        let mut state = PublishState::Init;
        log::debug!("Publishing stream {}: {}", id, state);

        let algorithm: DigestAlgorithm = match self.digest_algorithm.parse() {
            Ok(algorithm) => algorithm,
            Err(e) => return Err(init_failed(id, &mut state, ExportError::from(e))),
        };
        let header = match self.datasources.load_header(id, tables).await {
            Ok(header) => header,
            Err(e) => return Err(init_failed(id, &mut state, e)),
        };
        let table = tables.table_for(id);
        let cursor = self.repo.open_cursor(table, id);
        let source = match PagedRowSource::new(id, cursor, self.capacity) {
            Ok(source) => source,
            Err(e) => return Err(init_failed(id, &mut state, e)),
        };
        let mut producer = ChunkProducer::new(&header, source, ExportFormat::GzipJson);

        let mut report = PublishReport {
            stream_id: id,
            chunks_sent: 0,
            records_sent: 0,
            records_skipped: 0,
            bytes_sent: 0,
            state,
        };

        loop {
            advance(id, &mut state, PublishState::Fetch);
            let chunk = match producer.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    let sequence = report.chunks_sent;
                    return Err(failed(id, &mut state, sequence, report.chunks_sent, e));
                }
            };

            advance(id, &mut state, PublishState::Send);
            let digest = hex_digest(algorithm, &chunk.bytes);
            if let Err(e) = self.transport.send_chunk(&chunk, &digest).await {
                return Err(failed(id, &mut state, chunk.sequence, report.chunks_sent, e.into()));
            }

            report.chunks_sent += 1;
            report.records_sent += chunk.records;
            report.bytes_sent += chunk.bytes.len() as u64;
            log::info!(
                "Stream {}: sent chunk {} ({} records, {} bytes, {} {})",
                id,
                chunk.sequence,
                chunk.records,
                chunk.bytes.len(),
                algorithm.name(),
                digest
            );

            if !chunk.more_remaining {
                break;
            }
        }

        advance(id, &mut state, PublishState::Done);
        report.records_skipped = producer.source().records_skipped();
        report.state = state;
        log::info!(
            "Stream {} published: {} chunks, {} records",
            id,
            report.chunks_sent,
            report.records_sent
        );
        Ok(report)
    }
}

fn advance(id: i64, state: &mut PublishState, next: PublishState) {
    log::debug!("Stream {}: {} -> {}", id, state, next);
    *state = next;
}

/// Failures before the first chunk keep their own error
fn init_failed(id: i64, state: &mut PublishState, error: ExportError) -> ExportError {
    log::error!("Stream {}: cannot publish, {} failed: {}", id, state, error);
    advance(id, state, PublishState::Failed);
    error
}

fn failed(
    id: i64,
    state: &mut PublishState,
    sequence: usize,
    chunks_sent: usize,
    error: ExportError,
) -> ExportError {
    log::error!(
        "Stream {}: chunk {} failed in {} after {} chunks sent: {}",
        id,
        sequence,
        state,
        chunks_sent,
        error
    );
    advance(id, state, PublishState::Failed);
    ExportError::Publish {
        sequence,
        chunks_sent,
        source: Box::new(error),
    }
}
