use crate::domains::datasource::repository::RowCursor;
use crate::domains::export::types::Batch;
use crate::domains::record::{RecordCodec, TaggedBinaryCodec};
use crate::errors::{ExportError, ExportResult};

/// Upper bound on the up-front allocation for a batch; large capacities grow on demand
const INITIAL_BATCH_ALLOCATION: usize = 4096;

/// Bounded, batch-at-a-time view over one stream's cursor.
///
/// Owns its cursor exclusively and drops it as soon as the cursor reports its
/// end, fails, or the source itself is dropped. At most one raw blob is held
/// ahead of the current batch to answer [`PagedRowSource::has_more`].
///
/// A cursor failure after records were pulled for a batch does not discard
/// them: the batch is returned with `more_remaining` set and the failure is
/// reported by the next `has_more` or `next_batch` call.
pub struct PagedRowSource<C: RowCursor> {
    stream_id: i64,
    capacity: usize,
    cursor: Option<C>,
    peeked: Option<Vec<u8>>,
    deferred: Option<ExportError>,
    codec: Box<dyn RecordCodec>,
    position: u64,
    skipped: u64,
}

impl<C: RowCursor> PagedRowSource<C> {
    pub fn new(stream_id: i64, cursor: C, capacity: usize) -> ExportResult<Self> {
        Self::with_codec(stream_id, cursor, capacity, Box::new(TaggedBinaryCodec))
    }

    pub fn with_codec(
        stream_id: i64,
        cursor: C,
        capacity: usize,
        codec: Box<dyn RecordCodec>,
    ) -> ExportResult<Self> {
        if capacity == 0 {
            return Err(ExportError::InvalidConfig(
                "batch capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            stream_id,
            capacity,
            cursor: Some(cursor),
            peeked: None,
            deferred: None,
            codec,
            position: 0,
            skipped: 0,
        })
    }

    pub fn stream_id(&self) -> i64 {
        self.stream_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records dropped because they failed to decode
    pub fn records_skipped(&self) -> u64 {
        self.skipped
    }

    /// Whether the underlying cursor is still held
    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    /// True while the cursor has not reached its end
    pub async fn has_more(&mut self) -> ExportResult<bool> {
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }
        if self.peeked.is_some() {
            return Ok(true);
        }

        match self.pull().await? {
            Some(blob) => {
                self.peeked = Some(blob);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Pull up to `capacity` blobs and decode them in cursor order.
    ///
    /// Blobs that fail to decode are logged and skipped. A cursor failure ends
    /// the stream, after the records already pulled have been returned.
    pub async fn next_batch(&mut self) -> ExportResult<Batch> {
        if !self.has_more().await? {
            return Err(ExportError::SourceExhausted);
        }

        let mut values = Vec::with_capacity(self.capacity.min(INITIAL_BATCH_ALLOCATION));
        let mut pulled = 0;

        while pulled < self.capacity {
            let blob = match self.pull().await {
                Ok(Some(blob)) => blob,
                Ok(None) => break,
                Err(e) if pulled > 0 => {
                    self.deferred = Some(e);
                    break;
                }
                Err(e) => return Err(e),
            };
            pulled += 1;
            self.position += 1;

            match self.codec.decode(&blob) {
                Ok(value) => values.push(value),
                Err(e) => {
                    self.skipped += 1;
                    log::warn!(
                        "Skipping record {} of stream {}: {}",
                        self.position,
                        self.stream_id,
                        e
                    );
                }
            }
        }

        let more_remaining = if self.deferred.is_some() {
            true
        } else {
            match self.has_more().await {
                Ok(more) => more,
                Err(e) => {
                    self.deferred = Some(e);
                    true
                }
            }
        };
        log::debug!(
            "Stream {}: batch of {} records (pulled {}, more remaining: {})",
            self.stream_id,
            values.len(),
            pulled,
            more_remaining
        );

        Ok(Batch {
            values,
            more_remaining,
        })
    }

    /// Release the cursor without draining it
    pub fn close(mut self) {
        self.release();
    }

    async fn pull(&mut self) -> ExportResult<Option<Vec<u8>>> {
        if let Some(blob) = self.peeked.take() {
            return Ok(Some(blob));
        }

        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let next = cursor.next_blob().await;
        match next {
            Ok(Some(blob)) => Ok(Some(blob)),
            Ok(None) => {
                self.release();
                Ok(None)
            }
            Err(e) => {
                log::error!(
                    "Row source for stream {} failed after {} records: {}",
                    self.stream_id,
                    self.position,
                    e
                );
                self.release();
                Err(e.into())
            }
        }
    }

    fn release(&mut self) {
        if self.cursor.take().is_some() {
            log::debug!(
                "Released cursor for stream {} after {} records",
                self.stream_id,
                self.position
            );
        }
    }
}
