pub mod codec;
pub mod render;
pub mod types;

pub use codec::{RecordCodec, TaggedBinaryCodec};
pub use types::{Sample, Value, ValueKind};
