use crate::domains::record::types::{Sample, Value};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Write};

impl Value {
    /// Canonical CSV row body: `<timestamp>, v1, v2, ...` without the newline.
    ///
    /// JSON payloads are emitted as their compact JSON text; a JSON array
    /// record keeps its brackets.
    pub fn to_text(&self) -> String {
        let mut out = self.timestamp.to_string();
        match &self.sample {
            Sample::Bool(v) => push_field(&mut out, v),
            Sample::Byte(v) => push_field(&mut out, v),
            Sample::Int32(v) => push_field(&mut out, v),
            Sample::Int64(v) => push_field(&mut out, v),
            Sample::Float32(v) => push_field(&mut out, FloatText(*v)),
            Sample::Float64(v) => push_field(&mut out, FloatText(*v)),
            Sample::String(v) => push_field(&mut out, v),
            Sample::Json(v) => push_field(&mut out, v),
            Sample::BoolArray(items) => items.iter().for_each(|v| push_field(&mut out, v)),
            Sample::ByteArray(items) => items.iter().for_each(|v| push_field(&mut out, v)),
            Sample::Int32Array(items) => items.iter().for_each(|v| push_field(&mut out, v)),
            Sample::Int64Array(items) => items.iter().for_each(|v| push_field(&mut out, v)),
            Sample::Float32Array(items) => {
                items.iter().for_each(|v| push_field(&mut out, FloatText(*v)))
            }
            Sample::Float64Array(items) => {
                items.iter().for_each(|v| push_field(&mut out, FloatText(*v)))
            }
            Sample::StringArray(items) => items.iter().for_each(|v| push_field(&mut out, v)),
            Sample::JsonArray(items) => {
                push_field(&mut out, JsonValue::Array(items.clone()))
            }
        }
        out
    }

    /// JSON rendering of the payload.
    ///
    /// Scalars become a one-element array, numeric/bool/string arrays are
    /// flattened in order, JSON payloads are embedded unchanged.
    pub fn to_json_array(&self) -> Vec<JsonValue> {
        match &self.sample {
            Sample::Bool(v) => vec![JsonValue::from(*v)],
            Sample::Byte(v) => vec![JsonValue::from(*v)],
            Sample::Int32(v) => vec![JsonValue::from(*v)],
            Sample::Int64(v) => vec![JsonValue::from(*v)],
            Sample::Float32(v) => vec![f32_to_json(*v)],
            Sample::Float64(v) => vec![JsonValue::from(*v)],
            Sample::String(v) => vec![JsonValue::from(v.as_str())],
            Sample::Json(v) => vec![v.clone()],
            Sample::BoolArray(items) => items.iter().map(|v| JsonValue::from(*v)).collect(),
            Sample::ByteArray(items) => items.iter().map(|v| JsonValue::from(*v)).collect(),
            Sample::Int32Array(items) => items.iter().map(|v| JsonValue::from(*v)).collect(),
            Sample::Int64Array(items) => items.iter().map(|v| JsonValue::from(*v)).collect(),
            Sample::Float32Array(items) => items.iter().map(|v| f32_to_json(*v)).collect(),
            Sample::Float64Array(items) => items.iter().map(|v| JsonValue::from(*v)).collect(),
            Sample::StringArray(items) => {
                items.iter().map(|v| JsonValue::from(v.as_str())).collect()
            }
            Sample::JsonArray(items) => vec![JsonValue::Array(items.clone())],
        }
    }
}

fn push_field(out: &mut String, field: impl Display) {
    // Writing into a String cannot fail
    let _ = write!(out, ", {}", field);
}

/// Shortest text that round-trips the float, always with a decimal point or exponent
struct FloatText<F>(F);

impl<F: std::fmt::Debug> Display for FloatText<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

// Widening an f32 to f64 exposes binary noise (0.1 -> 0.10000000149011612);
// go through the f32's own shortest text instead.
fn f32_to_json(v: f32) -> JsonValue {
    v.to_string()
        .parse::<f64>()
        .map(JsonValue::from)
        .unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_text() {
        assert_eq!(Value::new(1000, Sample::Bool(true)).to_text(), "1000, true");
        assert_eq!(Value::new(1000, Sample::Byte(-3)).to_text(), "1000, -3");
        assert_eq!(Value::new(-5, Sample::Int64(42)).to_text(), "-5, 42");
        assert_eq!(Value::new(1, Sample::String("a b".into())).to_text(), "1, a b");
        assert_eq!(
            Value::new(1, Sample::Json(json!({"a": 1}))).to_text(),
            r#"1, {"a":1}"#
        );
    }

    #[test]
    fn test_array_text() {
        let v = Value::new(7, Sample::Int32Array(vec![1, 2, 3]));
        assert_eq!(v.to_text(), "7, 1, 2, 3");

        let v = Value::new(7, Sample::StringArray(vec!["x".into(), "y".into()]));
        assert_eq!(v.to_text(), "7, x, y");

        let v = Value::new(7, Sample::JsonArray(vec![json!(1), json!("two")]));
        assert_eq!(v.to_text(), r#"7, [1,"two"]"#);
    }

    #[test]
    fn test_empty_array_renders_timestamp_only() {
        assert_eq!(Value::new(99, Sample::Float64Array(vec![])).to_text(), "99");
        assert_eq!(Value::new(99, Sample::BoolArray(vec![])).to_json_array(), Vec::<JsonValue>::new());
    }

    #[test]
    fn test_float_precision_is_preserved() {
        assert_eq!(Value::new(0, Sample::Float64(0.1)).to_text(), "0, 0.1");
        assert_eq!(Value::new(0, Sample::Float64(1.0)).to_text(), "0, 1.0");
        assert_eq!(
            Value::new(0, Sample::Float64(std::f64::consts::PI)).to_text(),
            "0, 3.141592653589793"
        );
        assert_eq!(Value::new(0, Sample::Float32(0.1)).to_text(), "0, 0.1");
        assert_eq!(Value::new(0, Sample::Float32(0.1)).to_json_array(), vec![json!(0.1)]);
        assert_eq!(
            Value::new(0, Sample::Float32Array(vec![1.25, 0.3])).to_text(),
            "0, 1.25, 0.3"
        );
    }

    #[test]
    fn test_json_array_rendering() {
        assert_eq!(Value::new(0, Sample::Int32(5)).to_json_array(), vec![json!(5)]);
        assert_eq!(
            Value::new(0, Sample::ByteArray(vec![1, -1])).to_json_array(),
            vec![json!(1), json!(-1)]
        );
        assert_eq!(
            Value::new(0, Sample::BoolArray(vec![true, false])).to_json_array(),
            vec![json!(true), json!(false)]
        );
        assert_eq!(
            Value::new(0, Sample::Json(json!({"k": [1]}))).to_json_array(),
            vec![json!({"k": [1]})]
        );
        assert_eq!(
            Value::new(0, Sample::JsonArray(vec![json!({"a": 1})])).to_json_array(),
            vec![json!([{"a": 1}])]
        );
    }
}
