use serde_json::Value as JsonValue;

/// Discriminant of a decoded record.
///
/// Scalars occupy tags 1-8 and their array counterparts tags 9-16, in the
/// same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Byte,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Json,
    BoolArray,
    ByteArray,
    Int32Array,
    Int64Array,
    Float32Array,
    Float64Array,
    StringArray,
    JsonArray,
}

impl ValueKind {
    pub const ALL: [ValueKind; 16] = [
        ValueKind::Bool,
        ValueKind::Byte,
        ValueKind::Int32,
        ValueKind::Int64,
        ValueKind::Float32,
        ValueKind::Float64,
        ValueKind::String,
        ValueKind::Json,
        ValueKind::BoolArray,
        ValueKind::ByteArray,
        ValueKind::Int32Array,
        ValueKind::Int64Array,
        ValueKind::Float32Array,
        ValueKind::Float64Array,
        ValueKind::StringArray,
        ValueKind::JsonArray,
    ];

    /// Wire tag for this kind
    pub fn tag(self) -> u8 {
        match self {
            ValueKind::Bool => 1,
            ValueKind::Byte => 2,
            ValueKind::Int32 => 3,
            ValueKind::Int64 => 4,
            ValueKind::Float32 => 5,
            ValueKind::Float64 => 6,
            ValueKind::String => 7,
            ValueKind::Json => 8,
            ValueKind::BoolArray => 9,
            ValueKind::ByteArray => 10,
            ValueKind::Int32Array => 11,
            ValueKind::Int64Array => 12,
            ValueKind::Float32Array => 13,
            ValueKind::Float64Array => 14,
            ValueKind::StringArray => 15,
            ValueKind::JsonArray => 16,
        }
    }

    /// Resolve a wire tag; unknown tags yield `None`, never a fallback kind
    pub fn from_tag(tag: u8) -> Option<Self> {
        ValueKind::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }

    pub fn is_array(self) -> bool {
        self.tag() > 8
    }
}

/// Payload of a decoded record
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Bool(bool),
    Byte(i8),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Json(JsonValue),
    BoolArray(Vec<bool>),
    ByteArray(Vec<i8>),
    Int32Array(Vec<i32>),
    Int64Array(Vec<i64>),
    Float32Array(Vec<f32>),
    Float64Array(Vec<f64>),
    StringArray(Vec<String>),
    JsonArray(Vec<JsonValue>),
}

impl Sample {
    pub fn kind(&self) -> ValueKind {
        match self {
            Sample::Bool(_) => ValueKind::Bool,
            Sample::Byte(_) => ValueKind::Byte,
            Sample::Int32(_) => ValueKind::Int32,
            Sample::Int64(_) => ValueKind::Int64,
            Sample::Float32(_) => ValueKind::Float32,
            Sample::Float64(_) => ValueKind::Float64,
            Sample::String(_) => ValueKind::String,
            Sample::Json(_) => ValueKind::Json,
            Sample::BoolArray(_) => ValueKind::BoolArray,
            Sample::ByteArray(_) => ValueKind::ByteArray,
            Sample::Int32Array(_) => ValueKind::Int32Array,
            Sample::Int64Array(_) => ValueKind::Int64Array,
            Sample::Float32Array(_) => ValueKind::Float32Array,
            Sample::Float64Array(_) => ValueKind::Float64Array,
            Sample::StringArray(_) => ValueKind::StringArray,
            Sample::JsonArray(_) => ValueKind::JsonArray,
        }
    }
}

/// A single time-stamped sensor record
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub sample: Sample,
}

impl Value {
    pub fn new(timestamp: i64, sample: Sample) -> Self {
        Self { timestamp, sample }
    }

    pub fn kind(&self) -> ValueKind {
        self.sample.kind()
    }
}
