// ── Typed configuration values ──
//
// The closed set of scalar and leaf-list values a configuration path can
// hold, plus the raw `(tag, bytes, opts)` form used for storage.
// Leaf-lists carry one vector per scalar kind, so a list can never mix
// element types.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, FromRepr};

use crate::error::EncodeError;

// ── ValueType ────────────────────────────────────────────────────────

/// Stable numeric tag for every value variant.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    FromRepr,
)]
#[repr(u8)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Empty = 0,
    String = 1,
    Int = 2,
    Uint = 3,
    Bool = 4,
    Decimal = 5,
    Float = 6,
    Bytes = 7,
    LeaflistString = 8,
    LeaflistInt = 9,
    LeaflistUint = 10,
    LeaflistBool = 11,
    LeaflistDecimal = 12,
    LeaflistFloat = 13,
    LeaflistBytes = 14,
    Ascii = 15,
    LeaflistAscii = 16,
}

impl ValueType {
    // Fieldless `repr(u8)` enum: the discriminant is the tag.
    #[allow(clippy::as_conversions)]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn is_leaflist(self) -> bool {
        matches!(
            self,
            Self::LeaflistString
                | Self::LeaflistInt
                | Self::LeaflistUint
                | Self::LeaflistBool
                | Self::LeaflistDecimal
                | Self::LeaflistFloat
                | Self::LeaflistBytes
                | Self::LeaflistAscii
        )
    }
}

// ── Width ────────────────────────────────────────────────────────────

/// Bit width of an integer value. Metadata only; values are always stored
/// as 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Width {
    W8,
    W16,
    W32,
    #[default]
    W64,
}

impl Width {
    pub fn bits(self) -> u8 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
            Self::W64 => 64,
        }
    }

    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(Self::W8),
            16 => Some(Self::W16),
            32 => Some(Self::W32),
            64 => Some(Self::W64),
            _ => None,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

// ── Decimal ──────────────────────────────────────────────────────────

/// Fixed-point decimal, `digits * 10^-precision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Decimal {
    pub digits: i64,
    pub precision: u32,
}

impl Decimal {
    pub fn new(digits: i64, precision: u32) -> Self {
        Self { digits, precision }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(precision) = usize::try_from(self.precision) else {
            return write!(f, "{}e-{}", self.digits, self.precision);
        };
        if precision == 0 {
            return write!(f, "{}", self.digits);
        }

        let sign = if self.digits < 0 { "-" } else { "" };
        let magnitude = self.digits.unsigned_abs().to_string();
        let padded = format!("{magnitude:0>width$}", width = precision + 1);
        let (whole, fraction) = padded.split_at(padded.len() - precision);
        write!(f, "{sign}{whole}.{fraction}")
    }
}

// ── LeafList ─────────────────────────────────────────────────────────

/// Ordered, uniformly-typed list of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LeafList {
    String(Vec<String>),
    Ascii(Vec<String>),
    Int { values: Vec<i64>, width: Width },
    Uint { values: Vec<u64>, width: Width },
    Bool(Vec<bool>),
    Bytes(Vec<Vec<u8>>),
    Float(Vec<f32>),
    Decimal(Vec<Decimal>),
}

impl LeafList {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::LeaflistString,
            Self::Ascii(_) => ValueType::LeaflistAscii,
            Self::Int { .. } => ValueType::LeaflistInt,
            Self::Uint { .. } => ValueType::LeaflistUint,
            Self::Bool(_) => ValueType::LeaflistBool,
            Self::Bytes(_) => ValueType::LeaflistBytes,
            Self::Float(_) => ValueType::LeaflistFloat,
            Self::Decimal(_) => ValueType::LeaflistDecimal,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::String(v) | Self::Ascii(v) => v.len(),
            Self::Int { values, .. } => values.len(),
            Self::Uint { values, .. } => values.len(),
            Self::Bool(v) => v.len(),
            Self::Bytes(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Decimal(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn join_display<T, F>(f: &mut fmt::Formatter<'_>, items: &[T], mut each: F) -> fmt::Result
where
    F: FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
{
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        each(f, item)?;
    }
    Ok(())
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    bytes.iter().try_for_each(|b| write!(f, "{b:02x}"))
}

impl fmt::Display for LeafList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(v) | Self::Ascii(v) => join_display(f, v, |f, s| f.write_str(s)),
            Self::Int { values, .. } => join_display(f, values, |f, n| write!(f, "{n}")),
            Self::Uint { values, .. } => join_display(f, values, |f, n| write!(f, "{n}")),
            Self::Bool(v) => join_display(f, v, |f, b| write!(f, "{b}")),
            Self::Bytes(v) => join_display(f, v, |f, b| write_hex(f, b)),
            Self::Float(v) => join_display(f, v, |f, n| write!(f, "{n}")),
            Self::Decimal(v) => join_display(f, v, |f, d| write!(f, "{d}")),
        }
    }
}

// ── TypedValue ───────────────────────────────────────────────────────

/// A configuration value with its type metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum TypedValue {
    #[default]
    Empty,
    String(String),
    Ascii(String),
    Int {
        value: i64,
        width: Width,
    },
    Uint {
        value: u64,
        width: Width,
    },
    Bool(bool),
    Bytes(Vec<u8>),
    Float(f32),
    Decimal(Decimal),
    Leaflist(LeafList),
}

impl TypedValue {
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn ascii(s: impl Into<String>) -> Self {
        Self::Ascii(s.into())
    }

    /// 64-bit signed integer.
    pub fn int(value: i64) -> Self {
        Self::Int {
            value,
            width: Width::W64,
        }
    }

    pub fn int_with_width(value: i64, width: Width) -> Self {
        Self::Int { value, width }
    }

    /// 64-bit unsigned integer.
    pub fn uint(value: u64) -> Self {
        Self::Uint {
            value,
            width: Width::W64,
        }
    }

    pub fn uint_with_width(value: u64, width: Width) -> Self {
        Self::Uint { value, width }
    }

    pub fn decimal(digits: i64, precision: u32) -> Self {
        Self::Decimal(Decimal::new(digits, precision))
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(b.into())
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Empty => ValueType::Empty,
            Self::String(_) => ValueType::String,
            Self::Ascii(_) => ValueType::Ascii,
            Self::Int { .. } => ValueType::Int,
            Self::Uint { .. } => ValueType::Uint,
            Self::Bool(_) => ValueType::Bool,
            Self::Bytes(_) => ValueType::Bytes,
            Self::Float(_) => ValueType::Float,
            Self::Decimal(_) => ValueType::Decimal,
            Self::Leaflist(list) => list.value_type(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<LeafList> for TypedValue {
    fn from(list: LeafList) -> Self {
        Self::Leaflist(list)
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::String(s) | Self::Ascii(s) => f.write_str(s),
            Self::Int { value, .. } => write!(f, "{value}"),
            Self::Uint { value, .. } => write!(f, "{value}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Bytes(b) => write_hex(f, b),
            Self::Float(n) => write!(f, "{n}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Leaflist(list) => write!(f, "{list}"),
        }
    }
}

// ── RawValue ─────────────────────────────────────────────────────────

/// Storage form of a value: numeric type tag, payload and type options.
///
/// Layout by tag:
/// - integers: 8 bytes little endian, `type_opts = [width]`
/// - bool: 1 byte; float: 4 bytes (`f32` bits, LE)
/// - decimal: 8 bytes digits, precision as 4 LE bytes in `type_opts`
/// - string, ascii, bytes: raw payload
/// - string/ascii/bytes leaf-lists: concatenated payloads, one u32 LE
///   length per element in `type_opts`
/// - numeric leaf-lists: fixed-width elements packed back to back;
///   decimal lists carry one 4-byte precision per element in `type_opts`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawValue {
    pub value_type: u8,
    pub bytes: Vec<u8>,
    pub type_opts: Vec<u8>,
}

impl RawValue {
    fn new(value_type: ValueType, bytes: Vec<u8>, type_opts: Vec<u8>) -> Self {
        Self {
            value_type: value_type.tag(),
            bytes,
            type_opts,
        }
    }
}

fn invalid_length(value_type: ValueType, length: usize) -> EncodeError {
    EncodeError::InvalidLength {
        value_type: value_type.to_string(),
        length,
    }
}

fn invalid_payload(value_type: ValueType, reason: impl Into<String>) -> EncodeError {
    EncodeError::InvalidPayload {
        value_type: value_type.to_string(),
        reason: reason.into(),
    }
}

fn length_prefix(value_type: ValueType, len: usize) -> Result<[u8; 4], EncodeError> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| invalid_length(value_type, len))
}

/// Concatenate variable-length elements, recording each length in `opts`.
fn pack_variable<'a, I>(value_type: ValueType, items: I) -> Result<RawValue, EncodeError>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut bytes = Vec::new();
    let mut opts = Vec::new();
    for item in items {
        opts.extend_from_slice(&length_prefix(value_type, item.len())?);
        bytes.extend_from_slice(item);
    }
    Ok(RawValue::new(value_type, bytes, opts))
}

impl TryFrom<&TypedValue> for RawValue {
    type Error = EncodeError;

    fn try_from(value: &TypedValue) -> Result<Self, Self::Error> {
        let vt = value.value_type();
        let raw = match value {
            TypedValue::Empty => Self::new(vt, Vec::new(), Vec::new()),
            TypedValue::String(s) | TypedValue::Ascii(s) => {
                Self::new(vt, s.as_bytes().to_vec(), Vec::new())
            }
            TypedValue::Int { value, width } => {
                Self::new(vt, value.to_le_bytes().to_vec(), vec![width.bits()])
            }
            TypedValue::Uint { value, width } => {
                Self::new(vt, value.to_le_bytes().to_vec(), vec![width.bits()])
            }
            TypedValue::Bool(b) => Self::new(vt, vec![u8::from(*b)], Vec::new()),
            TypedValue::Bytes(b) => {
                if b.is_empty() {
                    return Err(invalid_length(vt, 0));
                }
                Self::new(vt, b.clone(), Vec::new())
            }
            TypedValue::Float(n) => Self::new(vt, n.to_le_bytes().to_vec(), Vec::new()),
            TypedValue::Decimal(d) => Self::new(
                vt,
                d.digits.to_le_bytes().to_vec(),
                d.precision.to_le_bytes().to_vec(),
            ),
            TypedValue::Leaflist(list) => leaflist_to_raw(list)?,
        };
        Ok(raw)
    }
}

fn leaflist_to_raw(list: &LeafList) -> Result<RawValue, EncodeError> {
    let vt = list.value_type();
    if list.is_empty() {
        return Err(invalid_length(vt, 0));
    }

    let raw = match list {
        LeafList::String(v) | LeafList::Ascii(v) => {
            pack_variable(vt, v.iter().map(String::as_bytes))?
        }
        LeafList::Bytes(v) => {
            if v.iter().any(Vec::is_empty) {
                return Err(invalid_length(ValueType::Bytes, 0));
            }
            pack_variable(vt, v.iter().map(Vec::as_slice))?
        }
        LeafList::Int { values, width } => RawValue::new(
            vt,
            values.iter().flat_map(|n| n.to_le_bytes()).collect(),
            vec![width.bits()],
        ),
        LeafList::Uint { values, width } => RawValue::new(
            vt,
            values.iter().flat_map(|n| n.to_le_bytes()).collect(),
            vec![width.bits()],
        ),
        LeafList::Bool(v) => RawValue::new(vt, v.iter().map(|b| u8::from(*b)).collect(), Vec::new()),
        LeafList::Float(v) => RawValue::new(
            vt,
            v.iter().flat_map(|n| n.to_le_bytes()).collect(),
            Vec::new(),
        ),
        LeafList::Decimal(v) => RawValue::new(
            vt,
            v.iter().flat_map(|d| d.digits.to_le_bytes()).collect(),
            v.iter().flat_map(|d| d.precision.to_le_bytes()).collect(),
        ),
    };
    Ok(raw)
}

// ── RawValue -> TypedValue ───────────────────────────────────────────

/// Split `bytes` into exact `N`-byte chunks, failing on a ragged tail or
/// an empty payload.
fn fixed_chunks<const N: usize>(vt: ValueType, bytes: &[u8]) -> Result<Vec<[u8; N]>, EncodeError> {
    if bytes.is_empty() || bytes.len() % N != 0 {
        return Err(invalid_length(vt, bytes.len()));
    }
    bytes
        .chunks_exact(N)
        .map(|chunk| <[u8; N]>::try_from(chunk).map_err(|_| invalid_length(vt, bytes.len())))
        .collect()
}

fn single<const N: usize>(vt: ValueType, bytes: &[u8]) -> Result<[u8; N], EncodeError> {
    <[u8; N]>::try_from(bytes).map_err(|_| invalid_length(vt, bytes.len()))
}

fn width_opt(vt: ValueType, opts: &[u8]) -> Result<Width, EncodeError> {
    match opts.first() {
        None => Ok(Width::W64),
        Some(&bits) => {
            Width::from_bits(bits).ok_or_else(|| invalid_payload(vt, format!("width {bits}")))
        }
    }
}

fn utf8(vt: ValueType, bytes: Vec<u8>) -> Result<String, EncodeError> {
    String::from_utf8(bytes).map_err(|e| invalid_payload(vt, e.to_string()))
}

/// Reverse of [`pack_variable`].
fn unpack_variable(vt: ValueType, bytes: &[u8], opts: &[u8]) -> Result<Vec<Vec<u8>>, EncodeError> {
    let lengths = fixed_chunks::<4>(vt, opts).map_err(|_| invalid_length(vt, bytes.len()))?;
    let mut out = Vec::with_capacity(lengths.len());
    let mut rest = bytes;
    for len in lengths {
        let len = usize::try_from(u32::from_le_bytes(len))
            .map_err(|_| invalid_length(vt, bytes.len()))?;
        if len > rest.len() {
            return Err(invalid_length(vt, bytes.len()));
        }
        let (head, tail) = rest.split_at(len);
        out.push(head.to_vec());
        rest = tail;
    }
    if !rest.is_empty() {
        return Err(invalid_length(vt, bytes.len()));
    }
    Ok(out)
}

impl TryFrom<&RawValue> for TypedValue {
    type Error = EncodeError;

    fn try_from(raw: &RawValue) -> Result<Self, Self::Error> {
        let vt = ValueType::from_repr(raw.value_type).ok_or(EncodeError::UnsupportedType {
            tag: raw.value_type,
        })?;
        let bytes = raw.bytes.as_slice();
        let opts = raw.type_opts.as_slice();

        let value = match vt {
            ValueType::Empty => {
                if !bytes.is_empty() {
                    return Err(invalid_length(vt, bytes.len()));
                }
                Self::Empty
            }
            ValueType::String => Self::String(utf8(vt, bytes.to_vec())?),
            ValueType::Ascii => Self::Ascii(utf8(vt, bytes.to_vec())?),
            ValueType::Int => Self::Int {
                value: i64::from_le_bytes(single::<8>(vt, bytes)?),
                width: width_opt(vt, opts)?,
            },
            ValueType::Uint => Self::Uint {
                value: u64::from_le_bytes(single::<8>(vt, bytes)?),
                width: width_opt(vt, opts)?,
            },
            ValueType::Bool => Self::Bool(single::<1>(vt, bytes)?[0] != 0),
            ValueType::Bytes => {
                if bytes.is_empty() {
                    return Err(invalid_length(vt, 0));
                }
                Self::Bytes(bytes.to_vec())
            }
            ValueType::Float => Self::Float(f32::from_le_bytes(single::<4>(vt, bytes)?)),
            ValueType::Decimal => Self::Decimal(Decimal {
                digits: i64::from_le_bytes(single::<8>(vt, bytes)?),
                precision: u32::from_le_bytes(
                    single::<4>(vt, opts).map_err(|_| invalid_payload(vt, "missing precision"))?,
                ),
            }),
            ValueType::LeaflistString => Self::Leaflist(LeafList::String(
                unpack_variable(vt, bytes, opts)?
                    .into_iter()
                    .map(|b| utf8(vt, b))
                    .collect::<Result<_, _>>()?,
            )),
            ValueType::LeaflistAscii => Self::Leaflist(LeafList::Ascii(
                unpack_variable(vt, bytes, opts)?
                    .into_iter()
                    .map(|b| utf8(vt, b))
                    .collect::<Result<_, _>>()?,
            )),
            ValueType::LeaflistBytes => {
                let items = unpack_variable(vt, bytes, opts)?;
                if items.iter().any(Vec::is_empty) {
                    return Err(invalid_length(ValueType::Bytes, 0));
                }
                Self::Leaflist(LeafList::Bytes(items))
            }
            ValueType::LeaflistInt => Self::Leaflist(LeafList::Int {
                values: fixed_chunks::<8>(vt, bytes)?
                    .into_iter()
                    .map(i64::from_le_bytes)
                    .collect(),
                width: width_opt(vt, opts)?,
            }),
            ValueType::LeaflistUint => Self::Leaflist(LeafList::Uint {
                values: fixed_chunks::<8>(vt, bytes)?
                    .into_iter()
                    .map(u64::from_le_bytes)
                    .collect(),
                width: width_opt(vt, opts)?,
            }),
            ValueType::LeaflistBool => Self::Leaflist(LeafList::Bool(
                fixed_chunks::<1>(vt, bytes)?
                    .into_iter()
                    .map(|[b]| b != 0)
                    .collect(),
            )),
            ValueType::LeaflistFloat => Self::Leaflist(LeafList::Float(
                fixed_chunks::<4>(vt, bytes)?
                    .into_iter()
                    .map(f32::from_le_bytes)
                    .collect(),
            )),
            ValueType::LeaflistDecimal => {
                let digits = fixed_chunks::<8>(vt, bytes)?;
                let precisions = fixed_chunks::<4>(vt, opts)
                    .map_err(|_| invalid_payload(vt, "missing precisions"))?;
                if digits.len() != precisions.len() {
                    return Err(invalid_payload(
                        vt,
                        format!("{} values but {} precisions", digits.len(), precisions.len()),
                    ));
                }
                Self::Leaflist(LeafList::Decimal(
                    digits
                        .into_iter()
                        .zip(precisions)
                        .map(|(d, p)| Decimal::new(i64::from_le_bytes(d), u32::from_le_bytes(p)))
                        .collect(),
                ))
            }
        };
        Ok(value)
    }
}
