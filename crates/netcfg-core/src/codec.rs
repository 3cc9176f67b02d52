// ── Wire <-> domain value codec ──
//
// Bridges `netcfg_api` wire values and `netcfg_core::model` typed values.
// Decoding takes the numeric payload from the wire and only borrows width
// metadata from a matching type hint.

use netcfg_api::{ScalarArray, Update, Value, WireValue};

use crate::error::{DecodeError, EncodeError};
use crate::model::{Decimal, LeafList, PathValue, RawValue, TypedValue, ValueType, Width};
use crate::registry::{ModelRegistry, TypeHint};

// ── Helpers ────────────────────────────────────────────────────────

fn malformed(kind: &str, reason: impl Into<String>) -> DecodeError {
    DecodeError::Malformed {
        kind: kind.to_owned(),
        reason: reason.into(),
    }
}

fn zero_length(value_type: ValueType) -> EncodeError {
    EncodeError::InvalidLength {
        value_type: value_type.to_string(),
        length: 0,
    }
}

/// Width for a signed integer, taken from the hint only when it describes
/// a signed integer.
fn int_width(hint: Option<&TypeHint>) -> Width {
    hint.filter(|h| matches!(h.value_type, ValueType::Int | ValueType::LeaflistInt))
        .and_then(TypeHint::width)
        .unwrap_or_default()
}

fn uint_width(hint: Option<&TypeHint>) -> Width {
    hint.filter(|h| matches!(h.value_type, ValueType::Uint | ValueType::LeaflistUint))
        .and_then(TypeHint::width)
        .unwrap_or_default()
}

// ── Encode ─────────────────────────────────────────────────────────

/// Encode a typed value into its wire form.
pub fn encode(value: &TypedValue) -> Result<WireValue, EncodeError> {
    let wire = match value {
        TypedValue::Empty => WireValue::empty(),
        TypedValue::String(s) => WireValue::string_val(s.clone()),
        TypedValue::Ascii(s) => WireValue::ascii_val(s.clone()),
        TypedValue::Int { value, .. } => WireValue::int_val(*value),
        TypedValue::Uint { value, .. } => WireValue::uint_val(*value),
        TypedValue::Bool(b) => WireValue::bool_val(*b),
        TypedValue::Bytes(b) => {
            if b.is_empty() {
                return Err(zero_length(ValueType::Bytes));
            }
            WireValue::bytes_val(b.clone())
        }
        TypedValue::Float(n) => WireValue::float_val(*n),
        TypedValue::Decimal(d) => WireValue::decimal_val(d.digits, d.precision),
        TypedValue::Leaflist(list) => encode_leaflist(list)?,
    };
    Ok(wire)
}

fn encode_leaflist(list: &LeafList) -> Result<WireValue, EncodeError> {
    if list.is_empty() {
        return Err(zero_length(list.value_type()));
    }

    let elements: Vec<WireValue> = match list {
        LeafList::String(v) => v.iter().cloned().map(WireValue::string_val).collect(),
        LeafList::Ascii(v) => v.iter().cloned().map(WireValue::ascii_val).collect(),
        LeafList::Int { values, .. } => values.iter().copied().map(WireValue::int_val).collect(),
        LeafList::Uint { values, .. } => values.iter().copied().map(WireValue::uint_val).collect(),
        LeafList::Bool(v) => v.iter().copied().map(WireValue::bool_val).collect(),
        LeafList::Bytes(v) => {
            if v.iter().any(Vec::is_empty) {
                return Err(zero_length(ValueType::Bytes));
            }
            v.iter().cloned().map(WireValue::bytes_val).collect()
        }
        LeafList::Float(v) => v.iter().copied().map(WireValue::float_val).collect(),
        LeafList::Decimal(v) => v
            .iter()
            .map(|d| WireValue::decimal_val(d.digits, d.precision))
            .collect(),
    };
    Ok(WireValue::leaflist_val(elements))
}

/// Encode a stored raw value directly into its wire form.
pub fn encode_raw(raw: &RawValue) -> Result<WireValue, EncodeError> {
    let value = TypedValue::try_from(raw)?;
    encode(&value)
}

/// Encode a path value as a wire update. Removals carry an empty value.
pub fn encode_path_value(pv: &PathValue) -> Result<Update, EncodeError> {
    let val = if pv.removed {
        WireValue::empty()
    } else {
        encode(&pv.value)?
    };
    Ok(Update::new(pv.path.clone(), val))
}

// ── Decode ─────────────────────────────────────────────────────────

/// Decode a wire value, using `hint` only for width metadata.
pub fn decode(wire: &WireValue, hint: Option<&TypeHint>) -> Result<TypedValue, DecodeError> {
    let Some(value) = &wire.value else {
        return Ok(TypedValue::Empty);
    };

    let typed = match value {
        Value::LeaflistVal(array) => TypedValue::Leaflist(decode_leaflist(array, hint)?),
        scalar => decode_scalar(scalar, hint)?,
    };
    Ok(typed)
}

fn decode_scalar(value: &Value, hint: Option<&TypeHint>) -> Result<TypedValue, DecodeError> {
    let typed = match value {
        Value::StringVal(s) => TypedValue::String(s.clone()),
        Value::AsciiVal(s) => TypedValue::Ascii(s.clone()),
        Value::IntVal(v) => TypedValue::Int {
            value: *v,
            width: int_width(hint),
        },
        Value::UintVal(v) => TypedValue::Uint {
            value: *v,
            width: uint_width(hint),
        },
        Value::BoolVal(b) => TypedValue::Bool(*b),
        Value::BytesVal(b) => {
            if b.is_empty() {
                return Err(malformed(value.kind(), "zero-length payload"));
            }
            TypedValue::Bytes(b.clone())
        }
        Value::FloatVal(n) => TypedValue::Float(*n),
        Value::DecimalVal(d) => TypedValue::Decimal(Decimal::new(d.digits, d.precision)),
        Value::LeaflistVal(_) => return Err(malformed(value.kind(), "nested leaf-list")),
        Value::JsonVal(_) | Value::JsonIetfVal(_) | Value::ProtoBytes(_) => {
            return Err(DecodeError::UnsupportedWireType {
                kind: value.kind().to_owned(),
            });
        }
    };
    Ok(typed)
}

/// Empty list of the same kind as `first`, or `None` when `first` cannot
/// be a leaf-list element.
fn list_like(first: &TypedValue) -> Option<LeafList> {
    let list = match first {
        TypedValue::String(_) => LeafList::String(Vec::new()),
        TypedValue::Ascii(_) => LeafList::Ascii(Vec::new()),
        TypedValue::Int { width, .. } => LeafList::Int {
            values: Vec::new(),
            width: *width,
        },
        TypedValue::Uint { width, .. } => LeafList::Uint {
            values: Vec::new(),
            width: *width,
        },
        TypedValue::Bool(_) => LeafList::Bool(Vec::new()),
        TypedValue::Bytes(_) => LeafList::Bytes(Vec::new()),
        TypedValue::Float(_) => LeafList::Float(Vec::new()),
        TypedValue::Decimal(_) => LeafList::Decimal(Vec::new()),
        TypedValue::Empty | TypedValue::Leaflist(_) => return None,
    };
    Some(list)
}

/// Append `element` to `list`, handing it back when the kinds differ.
fn push_element(list: &mut LeafList, element: TypedValue) -> Result<(), TypedValue> {
    match (list, element) {
        (LeafList::String(v), TypedValue::String(s)) | (LeafList::Ascii(v), TypedValue::Ascii(s)) => {
            v.push(s);
        }
        (LeafList::Int { values, .. }, TypedValue::Int { value, .. }) => values.push(value),
        (LeafList::Uint { values, .. }, TypedValue::Uint { value, .. }) => values.push(value),
        (LeafList::Bool(v), TypedValue::Bool(b)) => v.push(b),
        (LeafList::Bytes(v), TypedValue::Bytes(b)) => v.push(b),
        (LeafList::Float(v), TypedValue::Float(n)) => v.push(n),
        (LeafList::Decimal(v), TypedValue::Decimal(d)) => v.push(d),
        (_, other) => return Err(other),
    }
    Ok(())
}

const LEAFLIST_KIND: &str = "leaflist_val";

fn element_value(element: &WireValue) -> Result<&Value, DecodeError> {
    element
        .value
        .as_ref()
        .ok_or_else(|| malformed(LEAFLIST_KIND, "element without a value"))
}

fn decode_leaflist(array: &ScalarArray, hint: Option<&TypeHint>) -> Result<LeafList, DecodeError> {
    let first = array
        .element
        .first()
        .ok_or_else(|| malformed(LEAFLIST_KIND, "no elements"))?;
    let first = element_value(first)?;
    let mut list = list_like(&decode_scalar(first, hint)?)
        .ok_or_else(|| malformed(LEAFLIST_KIND, "invalid element"))?;

    for element in &array.element {
        let value = element_value(element)?;
        let typed = decode_scalar(value, hint)?;
        push_element(&mut list, typed).map_err(|_| DecodeError::MixedLeafList {
            expected: first.kind().to_owned(),
            found: value.kind().to_owned(),
        })?;
    }
    Ok(list)
}

/// Decode a wire update, looking up the path's type hint in `registry`.
pub fn decode_update(update: &Update, registry: &dyn ModelRegistry) -> Result<PathValue, DecodeError> {
    let hint = registry.type_hint(&update.path);
    let value = decode(&update.val, hint.as_ref())?;
    Ok(PathValue::new(update.path.clone(), value))
}
