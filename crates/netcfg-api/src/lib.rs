//! Wire-level types for the netcfg configuration-state core.
//!
//! These mirror the gNMI `TypedValue` message: a value carries at most one
//! wire kind, lists are `ScalarArray`s of scalar values, and decimals travel
//! as a digits/precision pair. Nothing here interprets values; translation
//! into the canonical typed model lives in `netcfg-core`.

pub mod value;

pub use value::{Decimal64, ScalarArray, Update, Value, WireValue};
