//! Tagged binary record codec.
//!
//! Record layout (big-endian):
//! ```text
//! tag: u8 | timestamp: i64 | payload
//! ```
//!
//! Scalar payloads:
//! - bool: u8 (0 = false, anything else = true)
//! - byte: i8
//! - int32 / int64 / float32 / float64: fixed width
//! - string / json: u32 byte length followed by UTF-8 text
//!
//! Array payloads are a u32 element count followed by the elements.

use crate::domains::record::types::{Sample, Value, ValueKind};
use crate::errors::{DecodeError, DecodeResult};
use bytes::{Buf, BufMut};
use serde_json::Value as JsonValue;

/// Size of the tag + timestamp prefix
pub const PREFIX_SIZE: usize = 9;

/// Decode/encode contract between stored blobs and [`Value`]s
pub trait RecordCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value>;

    fn encode(&self, value: &Value) -> DecodeResult<Vec<u8>>;
}

/// Default codec for the per-study record store
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedBinaryCodec;

impl RecordCodec for TaggedBinaryCodec {
    fn decode(&self, bytes: &[u8]) -> DecodeResult<Value> {
        let mut reader = Reader { buf: bytes };

        let tag = reader.u8()?;
        let kind = ValueKind::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;
        let timestamp = reader.i64()?;

        let sample = match kind {
            ValueKind::Bool => Sample::Bool(reader.bool()?),
            ValueKind::Byte => Sample::Byte(reader.i8()?),
            ValueKind::Int32 => Sample::Int32(reader.i32()?),
            ValueKind::Int64 => Sample::Int64(reader.i64()?),
            ValueKind::Float32 => Sample::Float32(reader.f32()?),
            ValueKind::Float64 => Sample::Float64(reader.f64()?),
            ValueKind::String => Sample::String(reader.string()?),
            ValueKind::Json => Sample::Json(reader.json()?),
            ValueKind::BoolArray => Sample::BoolArray(reader.array(Reader::bool)?),
            ValueKind::ByteArray => Sample::ByteArray(reader.array(Reader::i8)?),
            ValueKind::Int32Array => Sample::Int32Array(reader.array(Reader::i32)?),
            ValueKind::Int64Array => Sample::Int64Array(reader.array(Reader::i64)?),
            ValueKind::Float32Array => Sample::Float32Array(reader.array(Reader::f32)?),
            ValueKind::Float64Array => Sample::Float64Array(reader.array(Reader::f64)?),
            ValueKind::StringArray => Sample::StringArray(reader.array(Reader::string)?),
            ValueKind::JsonArray => Sample::JsonArray(reader.array(Reader::json)?),
        };

        if reader.buf.has_remaining() {
            return Err(DecodeError::TrailingBytes(reader.buf.remaining()));
        }

        Ok(Value { timestamp, sample })
    }

    fn encode(&self, value: &Value) -> DecodeResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(PREFIX_SIZE + 8);
        buf.put_u8(value.kind().tag());
        buf.put_i64(value.timestamp);

        match &value.sample {
            Sample::Bool(v) => buf.put_u8(u8::from(*v)),
            Sample::Byte(v) => buf.put_i8(*v),
            Sample::Int32(v) => buf.put_i32(*v),
            Sample::Int64(v) => buf.put_i64(*v),
            Sample::Float32(v) => buf.put_f32(*v),
            Sample::Float64(v) => buf.put_f64(*v),
            Sample::String(v) => put_text(&mut buf, v)?,
            Sample::Json(v) => put_text(&mut buf, &v.to_string())?,
            Sample::BoolArray(items) => {
                put_len(&mut buf, items.len())?;
                items.iter().for_each(|v| buf.put_u8(u8::from(*v)));
            }
            Sample::ByteArray(items) => {
                put_len(&mut buf, items.len())?;
                items.iter().for_each(|v| buf.put_i8(*v));
            }
            Sample::Int32Array(items) => {
                put_len(&mut buf, items.len())?;
                items.iter().for_each(|v| buf.put_i32(*v));
            }
            Sample::Int64Array(items) => {
                put_len(&mut buf, items.len())?;
                items.iter().for_each(|v| buf.put_i64(*v));
            }
            Sample::Float32Array(items) => {
                put_len(&mut buf, items.len())?;
                items.iter().for_each(|v| buf.put_f32(*v));
            }
            Sample::Float64Array(items) => {
                put_len(&mut buf, items.len())?;
                items.iter().for_each(|v| buf.put_f64(*v));
            }
            Sample::StringArray(items) => {
                put_len(&mut buf, items.len())?;
                for item in items {
                    put_text(&mut buf, item)?;
                }
            }
            Sample::JsonArray(items) => {
                put_len(&mut buf, items.len())?;
                for item in items {
                    put_text(&mut buf, &item.to_string())?;
                }
            }
        }

        Ok(buf)
    }
}

fn put_len(buf: &mut Vec<u8>, len: usize) -> DecodeResult<()> {
    let len = u32::try_from(len).map_err(|_| DecodeError::TooLong(len))?;
    buf.put_u32(len);
    Ok(())
}

fn put_text(buf: &mut Vec<u8>, text: &str) -> DecodeResult<()> {
    put_len(buf, text.len())?;
    buf.put_slice(text.as_bytes());
    Ok(())
}

/// Bounds-checked cursor over a record blob
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn ensure(&self, needed: usize) -> DecodeResult<()> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u8(&mut self) -> DecodeResult<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn bool(&mut self) -> DecodeResult<bool> {
        Ok(self.u8()? != 0)
    }

    fn i8(&mut self) -> DecodeResult<i8> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    fn i32(&mut self) -> DecodeResult<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    fn i64(&mut self) -> DecodeResult<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    fn f32(&mut self) -> DecodeResult<f32> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }

    fn f64(&mut self) -> DecodeResult<f64> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    fn len(&mut self) -> DecodeResult<usize> {
        self.ensure(4)?;
        Ok(self.buf.get_u32() as usize)
    }

    fn bytes(&mut self) -> DecodeResult<&'a [u8]> {
        let len = self.len()?;
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn string(&mut self) -> DecodeResult<String> {
        let raw = self.bytes()?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }

    fn json(&mut self) -> DecodeResult<JsonValue> {
        let raw = self.bytes()?;
        serde_json::from_slice(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))
    }

    fn array<T>(&mut self, mut read: impl FnMut(&mut Self) -> DecodeResult<T>) -> DecodeResult<Vec<T>> {
        let count = self.len()?;
        // Never trust the count for preallocation beyond what the blob can hold
        let mut items = Vec::with_capacity(count.min(self.buf.remaining()));
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }
}
