use crate::domains::datasource::repository::RowCursor;
use crate::domains::datasource::types::ExportHeader;
use crate::domains::export::row_source::PagedRowSource;
use crate::domains::export::types::{Batch, Chunk, ExportFormat, ExportStats, SegmentOutcome};
use crate::domains::record::Value;
use crate::errors::{ExportError, ExportResult};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::io::{self, Write};

/// Incremental writer for `{userinfo, studyinfo, datasource, data: [...]}`.
///
/// The header is written by [`JsonDocumentWriter::begin`], entries are
/// appended one by one and [`JsonDocumentWriter::finish`] closes the array and
/// the object. Header members are pretty-printed with two-space indentation;
/// each data entry is a single `[timestamp, [payload...]]` line.
pub struct JsonDocumentWriter<W: Write> {
    out: W,
    entries: usize,
}

impl<W: Write> JsonDocumentWriter<W> {
    pub fn begin(mut out: W, header: &ExportHeader) -> ExportResult<Self> {
        out.write_all(b"{\n")?;
        write_member(&mut out, "userinfo", &header.userinfo)?;
        write_member(&mut out, "studyinfo", &header.studyinfo)?;
        write_member(&mut out, "datasource", &header.datasource)?;
        out.write_all(b"  \"data\": [")?;
        Ok(Self { out, entries: 0 })
    }

    pub fn write_entry(&mut self, value: &Value) -> ExportResult<()> {
        let separator: &[u8] = if self.entries == 0 { b"\n    " } else { b",\n    " };
        self.out.write_all(separator)?;
        serde_json::to_writer(&mut self.out, &(value.timestamp, value.to_json_array()))?;
        self.entries += 1;
        Ok(())
    }

    pub fn write_batch(&mut self, batch: &Batch) -> ExportResult<()> {
        batch.values.iter().try_for_each(|value| self.write_entry(value))
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn finish(mut self) -> ExportResult<W> {
        if self.entries > 0 {
            self.out.write_all(b"\n  ")?;
        }
        self.out.write_all(b"]\n}\n")?;
        Ok(self.out)
    }
}

/// Writes `"key": <pretty value>,` nested one level inside the document object
fn write_member<W: Write, T: Serialize>(out: &mut W, key: &str, value: &T) -> ExportResult<()> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"  "));
    value.serialize(&mut ser)?;

    write!(out, "  {}: ", serde_json::to_string(key)?)?;
    // Raw newlines only appear as formatting; string newlines are escaped
    for (i, line) in buf.split(|b| *b == b'\n').enumerate() {
        if i > 0 {
            out.write_all(b"\n  ")?;
        }
        out.write_all(line)?;
    }
    out.write_all(b",\n")?;
    Ok(())
}

/// Byte counter around the final output
struct CountingWriter<W: Write> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn write_csv_lines<W: Write>(out: &mut W, batch: &Batch) -> io::Result<()> {
    for value in &batch.values {
        out.write_all(value.to_text().as_bytes())?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn finish_gzip<W: Write>(encoder: GzEncoder<W>) -> ExportResult<W> {
    encoder
        .finish()
        .map_err(|e| ExportError::Compression(format!("Failed to finish gzip stream: {}", e)))
}

/// Stream every remaining record as CSV lines, one batch at a time
pub async fn write_csv<C: RowCursor, W: Write>(
    source: &mut PagedRowSource<C>,
    out: W,
) -> ExportResult<ExportStats> {
    let mut out = CountingWriter::new(out);
    let mut stats = ExportStats::default();

    while source.has_more().await? {
        let batch = source.next_batch().await?;
        write_csv_lines(&mut out, &batch)?;
        stats.records_written += batch.len();
        stats.batches += 1;
    }
    out.flush()?;

    stats.records_skipped = source.records_skipped();
    stats.bytes_written = out.count;
    Ok(stats)
}

/// Stream the whole source as one JSON document
pub async fn write_json<C: RowCursor, W: Write>(
    header: &ExportHeader,
    source: &mut PagedRowSource<C>,
    out: W,
) -> ExportResult<ExportStats> {
    let mut document = JsonDocumentWriter::begin(CountingWriter::new(out), header)?;
    let mut stats = ExportStats::default();

    while source.has_more().await? {
        let batch = source.next_batch().await?;
        document.write_batch(&batch)?;
        stats.records_written += batch.len();
        stats.batches += 1;
    }

    let mut out = document.finish()?;
    out.flush()?;

    stats.records_skipped = source.records_skipped();
    stats.bytes_written = out.count;
    Ok(stats)
}

/// Same document as [`write_json`], gzip-compressed; `bytes_written` counts compressed bytes
pub async fn write_gzip_json<C: RowCursor, W: Write>(
    header: &ExportHeader,
    source: &mut PagedRowSource<C>,
    out: W,
) -> ExportResult<ExportStats> {
    let mut encoder = GzEncoder::new(CountingWriter::new(out), Compression::default());
    let mut stats = write_json(header, source, &mut encoder).await?;

    let mut out = finish_gzip(encoder)?;
    out.flush()?;
    stats.bytes_written = out.count;
    Ok(stats)
}

/// Segmented mode: a self-contained document holding exactly the next batch.
///
/// The batch is pulled before anything is written, so a cursor failure
/// leaves `out` untouched. Fails with [`ExportError::SourceExhausted`] once
/// the source has nothing left.
pub async fn write_json_segment<C: RowCursor, W: Write>(
    header: &ExportHeader,
    source: &mut PagedRowSource<C>,
    out: W,
) -> ExportResult<SegmentOutcome> {
    let batch = source.next_batch().await?;

    let mut document = JsonDocumentWriter::begin(out, header)?;
    document.write_batch(&batch)?;
    document.finish()?.flush()?;

    Ok(SegmentOutcome {
        records: batch.len(),
        more_remaining: batch.more_remaining,
    })
}

/// Segmented CSV: the next batch's lines with no envelope
pub async fn write_csv_segment<C: RowCursor, W: Write>(
    source: &mut PagedRowSource<C>,
    mut out: W,
) -> ExportResult<SegmentOutcome> {
    let batch = source.next_batch().await?;
    write_csv_lines(&mut out, &batch)?;
    out.flush()?;

    Ok(SegmentOutcome {
        records: batch.len(),
        more_remaining: batch.more_remaining,
    })
}

/// Pull-based sequence of serialized chunks, one per batch.
///
/// `next_chunk` yields `Ok(None)` once the source is exhausted; after that,
/// or after any error, the producer stays exhausted.
pub struct ChunkProducer<'h, C: RowCursor> {
    header: &'h ExportHeader,
    source: PagedRowSource<C>,
    format: ExportFormat,
    next_sequence: usize,
    exhausted: bool,
}

impl<'h, C: RowCursor> ChunkProducer<'h, C> {
    pub fn new(header: &'h ExportHeader, source: PagedRowSource<C>, format: ExportFormat) -> Self {
        Self {
            header,
            source,
            format,
            next_sequence: 0,
            exhausted: false,
        }
    }

    /// True once the final chunk has been produced or the source failed
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn source(&self) -> &PagedRowSource<C> {
        &self.source
    }

    pub async fn next_chunk(&mut self) -> ExportResult<Option<Chunk>> {
        if self.exhausted {
            return Ok(None);
        }

        let produced = self.produce().await;
        match &produced {
            Ok(Some(chunk)) if chunk.more_remaining => {}
            _ => self.exhausted = true,
        }
        produced
    }

    async fn produce(&mut self) -> ExportResult<Option<Chunk>> {
        if !self.source.has_more().await? {
            return Ok(None);
        }

        let (bytes, outcome) = match self.format {
            ExportFormat::Csv => {
                let mut bytes = Vec::new();
                let outcome = write_csv_segment(&mut self.source, &mut bytes).await?;
                (bytes, outcome)
            }
            ExportFormat::Json => {
                let mut bytes = Vec::new();
                let outcome = write_json_segment(self.header, &mut self.source, &mut bytes).await?;
                (bytes, outcome)
            }
            ExportFormat::GzipJson => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                let outcome =
                    write_json_segment(self.header, &mut self.source, &mut encoder).await?;
                (finish_gzip(encoder)?, outcome)
            }
        };

        let chunk = Chunk {
            sequence: self.next_sequence,
            records: outcome.records,
            bytes,
            more_remaining: outcome.more_remaining,
        };
        self.next_sequence += 1;
        Ok(Some(chunk))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domains::datasource::repository::MemoryCursor;
    use crate::domains::datasource::types::{SourceComponent, StreamDescriptor, StudyInfo, UserInfo};
    use crate::domains::export::row_source::tests::int_array_blobs;
    use flate2::read::GzDecoder;
    use serde_json::{json, Value as JsonValue};
    use std::io::Read;

    pub(crate) fn sample_header(id: i64) -> ExportHeader {
        let mut userinfo = UserInfo {
            uuid: "3f5c7a1e".to_string(),
            ..UserInfo::default()
        };
        userinfo.extra.insert("note".to_string(), json!("line one\nline two"));

        ExportHeader {
            userinfo,
            studyinfo: StudyInfo {
                id: "study-1".to_string(),
                name: "Smoking Cessation".to_string(),
                ..StudyInfo::default()
            },
            datasource: StreamDescriptor {
                id,
                datasource_id: Some("acc".to_string()),
                datasource_type: Some("ACCELEROMETER".to_string()),
                platform: SourceComponent::new(Some("LEFT_WRIST".into()), Some("MICROSOFT_BAND".into())),
                platform_app: None,
                application: None,
                persistent: true,
                data_descriptors: vec![[("UNIT".to_string(), "g".to_string())].into()],
            },
        }
    }

    fn source(count: usize, capacity: usize) -> PagedRowSource<MemoryCursor> {
        PagedRowSource::new(1, MemoryCursor::new(int_array_blobs(count)), capacity).unwrap()
    }

    fn gunzip(bytes: &[u8]) -> String {
        let mut text = String::new();
        GzDecoder::new(bytes).read_to_string(&mut text).unwrap();
        text
    }

    #[tokio::test]
    async fn test_csv_lines_match_records() {
        let mut out = Vec::new();
        let stats = write_csv(&mut source(2500, 1000), &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2500);
        assert_eq!(stats.records_written, 2500);
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.bytes_written, text.len() as u64);
        assert_eq!(lines[0], "1450000000000, 0, 0");
        assert_eq!(lines[2], "1450000000002, 2, -2");
        for line in lines {
            let (timestamp, _) = line.split_once(", ").unwrap();
            timestamp.parse::<i64>().unwrap();
        }
    }

    #[tokio::test]
    async fn test_json_document_structure() {
        let header = sample_header(1);
        let mut out = Vec::new();
        let stats = write_json(&header, &mut source(2500, 1000), &mut out).await.unwrap();

        let doc: JsonValue = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["data"].as_array().unwrap().len(), 2500);
        assert_eq!(stats.records_written, 2500);
        assert_eq!(doc["userinfo"], serde_json::to_value(&header.userinfo).unwrap());
        assert_eq!(doc["studyinfo"], serde_json::to_value(&header.studyinfo).unwrap());
        assert_eq!(doc["datasource"], serde_json::to_value(&header.datasource).unwrap());
        assert_eq!(doc["data"][3], json!([1450000000003i64, [3, -3]]));

        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 4);
    }

    #[tokio::test]
    async fn test_json_header_is_indented() {
        let mut out = Vec::new();
        write_json(&sample_header(1), &mut source(1, 10), &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("{\n  \"userinfo\": {\n    \"uuid\": \"3f5c7a1e\","));
        assert!(text.contains("\n  \"data\": [\n    [1450000000000,[0,0]]\n  ]\n}"));
    }

    #[tokio::test]
    async fn test_empty_stream_json_has_empty_data() {
        let mut out = Vec::new();
        let stats = write_json(&sample_header(1), &mut source(0, 10), &mut out).await.unwrap();

        let doc: JsonValue = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["data"], json!([]));
        assert_eq!(stats.batches, 0);
    }

    #[tokio::test]
    async fn test_gzip_json_matches_plain_json() {
        let header = sample_header(1);

        let mut plain = Vec::new();
        write_json(&header, &mut source(50, 7), &mut plain).await.unwrap();

        let mut compressed = Vec::new();
        let stats = write_gzip_json(&header, &mut source(50, 7), &mut compressed)
            .await
            .unwrap();

        assert_eq!(gunzip(&compressed).as_bytes(), plain.as_slice());
        assert_eq!(stats.bytes_written, compressed.len() as u64);
        assert_eq!(stats.records_written, 50);
    }

    #[tokio::test]
    async fn test_segments_are_self_contained_documents() {
        let header = sample_header(1);
        let mut src = source(25, 10);

        let mut outcomes = Vec::new();
        loop {
            let mut out = Vec::new();
            let outcome = write_json_segment(&header, &mut src, &mut out).await.unwrap();
            let doc: JsonValue = serde_json::from_slice(&out).unwrap();
            assert_eq!(doc["data"].as_array().unwrap().len(), outcome.records);
            assert_eq!(doc["datasource"]["id"], json!(1));
            outcomes.push(outcome);
            if !outcome.more_remaining {
                break;
            }
        }

        assert_eq!(
            outcomes.iter().map(|o| o.records).collect::<Vec<_>>(),
            vec![10, 10, 5]
        );

        let mut out = Vec::new();
        assert!(matches!(
            write_json_segment(&header, &mut src, &mut out).await,
            Err(ExportError::SourceExhausted)
        ));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_producer_sequence() {
        let header = sample_header(1);
        let mut producer = ChunkProducer::new(&header, source(25, 10), ExportFormat::GzipJson);

        let mut chunks = Vec::new();
        while let Some(chunk) = producer.next_chunk().await.unwrap() {
            chunks.push(chunk);
        }

        assert!(producer.is_exhausted());
        assert_eq!(chunks.iter().map(|c| c.sequence).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(chunks.iter().map(|c| c.records).collect::<Vec<_>>(), vec![10, 10, 5]);
        assert_eq!(
            chunks.iter().map(|c| c.more_remaining).collect::<Vec<_>>(),
            vec![true, true, false]
        );

        let first: JsonValue = serde_json::from_str(&gunzip(&chunks[0].bytes)).unwrap();
        let last: JsonValue = serde_json::from_str(&gunzip(&chunks[2].bytes)).unwrap();
        assert_eq!(first["data"][0][0], json!(1450000000000i64));
        assert_eq!(last["data"][0][0], json!(1450000000020i64));

        assert!(producer.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_csv_chunks_have_no_envelope() {
        let header = sample_header(1);
        let mut producer = ChunkProducer::new(&header, source(3, 2), ExportFormat::Csv);

        let first = producer.next_chunk().await.unwrap().unwrap();
        assert_eq!(
            String::from_utf8(first.bytes).unwrap(),
            "1450000000000, 0, 0\n1450000000001, 1, -1\n"
        );
        let second = producer.next_chunk().await.unwrap().unwrap();
        assert_eq!(second.records, 1);
        assert!(!second.more_remaining);
        assert!(producer.is_exhausted());
    }

    #[tokio::test]
    async fn test_empty_stream_produces_no_chunks() {
        let header = sample_header(1);
        let mut producer = ChunkProducer::new(&header, source(0, 2), ExportFormat::Json);
        assert!(producer.next_chunk().await.unwrap().is_none());
        assert!(producer.is_exhausted());
    }

    #[tokio::test]
    async fn test_producer_stops_after_source_error() {
        let header = sample_header(1);
        let cursor = MemoryCursor::failing_after(int_array_blobs(10), 3);
        let src = PagedRowSource::new(1, cursor, 2).unwrap();
        let mut producer = ChunkProducer::new(&header, src, ExportFormat::Json);

        assert_eq!(producer.next_chunk().await.unwrap().unwrap().records, 2);

        // The record pulled before the failure still goes out
        let partial = producer.next_chunk().await.unwrap().unwrap();
        assert_eq!(partial.records, 1);
        assert!(partial.more_remaining);
        assert!(!producer.is_exhausted());

        assert!(matches!(
            producer.next_chunk().await,
            Err(ExportError::RowSource(_))
        ));
        assert!(producer.is_exhausted());
        assert!(producer.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_csv_keeps_records_read_before_cursor_failure() {
        let cursor = MemoryCursor::failing_after(int_array_blobs(10), 7);
        let mut src = PagedRowSource::new(1, cursor, 5).unwrap();

        let mut out = Vec::new();
        let result = write_csv(&mut src, &mut out).await;

        assert!(matches!(result, Err(ExportError::RowSource(_))));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 7);
        assert!(text.ends_with("1450000000006, 6, -6\n"));
    }
}
