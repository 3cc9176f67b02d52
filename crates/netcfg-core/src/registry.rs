// ── Model registry seam ──
//
// The schema registry lives outside this crate. The codec only needs one
// thing from it: an optional type hint for a path.

use std::collections::HashMap;

use crate::model::{ValueType, Width};

/// Schema-derived type information for a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHint {
    pub value_type: ValueType,
    /// `type_opts[0]` is the bit width for integer kinds.
    pub type_opts: Vec<u8>,
}

impl TypeHint {
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            type_opts: Vec::new(),
        }
    }

    pub fn with_width(value_type: ValueType, width: Width) -> Self {
        Self {
            value_type,
            type_opts: vec![width.bits()],
        }
    }

    /// Width carried in the options, if any and valid.
    pub fn width(&self) -> Option<Width> {
        self.type_opts.first().copied().and_then(Width::from_bits)
    }
}

/// Lookup of type hints by path. Absence of a hint is legal.
pub trait ModelRegistry: Send + Sync {
    fn type_hint(&self, path: &str) -> Option<TypeHint>;
}

/// Registry that never has a hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHints;

impl ModelRegistry for NoHints {
    fn type_hint(&self, _path: &str) -> Option<TypeHint> {
        None
    }
}

/// Fixed path -> hint table.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    hints: HashMap<String, TypeHint>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_hint(mut self, path: impl Into<String>, hint: TypeHint) -> Self {
        self.hints.insert(path.into(), hint);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, hint: TypeHint) {
        self.hints.insert(path.into(), hint);
    }

    pub fn len(&self) -> usize {
        self.hints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}

impl ModelRegistry for StaticRegistry {
    fn type_hint(&self, path: &str) -> Option<TypeHint> {
        self.hints.get(path).cloned()
    }
}
