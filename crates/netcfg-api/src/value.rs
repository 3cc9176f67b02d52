//! gNMI-style typed values as they appear on the wire.
//!
//! Field and variant names use snake_case to match the gNMI JSON mapping
//! (`string_val`, `leaflist_val`, ...).

use serde::{Deserialize, Serialize};

// ── WireValue ────────────────────────────────────────────────────────

/// A single value on the wire.
///
/// `value: None` is the explicit empty value (`{}` in the gNMI text form).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl WireValue {
    pub fn empty() -> Self {
        Self { value: None }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Wire kind name, `"empty"` when no kind is set.
    pub fn kind(&self) -> &'static str {
        self.value.as_ref().map_or("empty", Value::kind)
    }

    pub fn string_val(s: impl Into<String>) -> Self {
        Value::StringVal(s.into()).into()
    }

    pub fn ascii_val(s: impl Into<String>) -> Self {
        Value::AsciiVal(s.into()).into()
    }

    pub fn int_val(v: i64) -> Self {
        Value::IntVal(v).into()
    }

    pub fn uint_val(v: u64) -> Self {
        Value::UintVal(v).into()
    }

    pub fn bool_val(v: bool) -> Self {
        Value::BoolVal(v).into()
    }

    pub fn bytes_val(v: impl Into<Vec<u8>>) -> Self {
        Value::BytesVal(v.into()).into()
    }

    pub fn float_val(v: f32) -> Self {
        Value::FloatVal(v).into()
    }

    pub fn decimal_val(digits: i64, precision: u32) -> Self {
        Value::DecimalVal(Decimal64 { digits, precision }).into()
    }

    pub fn leaflist_val(elements: impl IntoIterator<Item = WireValue>) -> Self {
        Value::LeaflistVal(ScalarArray {
            element: elements.into_iter().collect(),
        })
        .into()
    }
}

impl From<Value> for WireValue {
    fn from(value: Value) -> Self {
        Self { value: Some(value) }
    }
}

// ── Value ────────────────────────────────────────────────────────────

/// The `oneof value` of a gNMI `TypedValue`.
///
/// `JsonVal`, `JsonIetfVal` and `ProtoBytes` exist on the wire but carry
/// schema-less payloads; consumers are free to reject them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    StringVal(String),
    IntVal(i64),
    UintVal(u64),
    BoolVal(bool),
    BytesVal(Vec<u8>),
    FloatVal(f32),
    DecimalVal(Decimal64),
    LeaflistVal(ScalarArray),
    AsciiVal(String),
    JsonVal(Vec<u8>),
    JsonIetfVal(Vec<u8>),
    ProtoBytes(Vec<u8>),
}

impl Value {
    /// The wire kind name, as used in the gNMI JSON mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StringVal(_) => "string_val",
            Self::IntVal(_) => "int_val",
            Self::UintVal(_) => "uint_val",
            Self::BoolVal(_) => "bool_val",
            Self::BytesVal(_) => "bytes_val",
            Self::FloatVal(_) => "float_val",
            Self::DecimalVal(_) => "decimal_val",
            Self::LeaflistVal(_) => "leaflist_val",
            Self::AsciiVal(_) => "ascii_val",
            Self::JsonVal(_) => "json_val",
            Self::JsonIetfVal(_) => "json_ietf_val",
            Self::ProtoBytes(_) => "proto_bytes",
        }
    }
}

// ── Supporting messages ──────────────────────────────────────────────

/// Fixed-point decimal: `digits * 10^-precision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Decimal64 {
    pub digits: i64,
    pub precision: u32,
}

/// Leaf-list payload. Elements are expected to be scalars of one kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScalarArray {
    #[serde(default)]
    pub element: Vec<WireValue>,
}

/// A path/value pair as carried in a gNMI `SetRequest` or `Notification`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Update {
    pub path: String,
    pub val: WireValue,
}

impl Update {
    pub fn new(path: impl Into<String>, val: WireValue) -> Self {
        Self {
            path: path.into(),
            val,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn empty_value_serializes_as_empty_object() {
        let json = serde_json::to_value(WireValue::empty()).unwrap();
        assert_eq!(json, json!({}));
    }

    #[test]
    fn empty_object_deserializes_as_empty_value() {
        let value: WireValue = serde_json::from_value(json!({})).unwrap();
        assert!(value.is_empty());
        assert_eq!(value.kind(), "empty");
    }

    #[test]
    fn scalar_uses_gnmi_field_names() {
        let json = serde_json::to_value(WireValue::decimal_val(1234, 2)).unwrap();
        assert_eq!(
            json,
            json!({ "value": { "decimal_val": { "digits": 1234, "precision": 2 } } })
        );
    }

    #[test]
    fn leaflist_parses_from_json() {
        let raw = json!({
            "value": {
                "leaflist_val": {
                    "element": [
                        { "value": { "ascii_val": "abc" } },
                        { "value": { "ascii_val": "def" } }
                    ]
                }
            }
        });

        let value: WireValue = serde_json::from_value(raw).unwrap();
        assert_eq!(
            value,
            WireValue::leaflist_val([WireValue::ascii_val("abc"), WireValue::ascii_val("def")])
        );
        assert_eq!(value.kind(), "leaflist_val");
    }

    #[test]
    fn unknown_wire_kinds_report_their_name() {
        assert_eq!(Value::JsonIetfVal(b"{}".to_vec()).kind(), "json_ietf_val");
        assert_eq!(Value::ProtoBytes(vec![1]).kind(), "proto_bytes");
    }
}
