// ── Core error types ──
//
// Every fallible operation in the crate returns one of these. Codec errors
// are split into decode (wire -> domain) and encode (domain/raw -> wire)
// so callers can tell a bad request from corrupted storage.

use thiserror::Error;

use crate::model::Phase;

// ── Codec errors ─────────────────────────────────────────────────────

/// Failure translating a wire value into a [`TypedValue`](crate::model::TypedValue).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Unsupported wire type {kind}")]
    UnsupportedWireType { kind: String },

    #[error("Malformed {kind} value: {reason}")]
    Malformed { kind: String, reason: String },

    #[error("Mixed leaf-list element types: expected {expected}, found {found}")]
    MixedLeafList { expected: String, found: String },
}

/// Failure producing a wire value from a typed or raw value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("invalid TypedValue Length {length} for {value_type}")]
    InvalidLength { value_type: String, length: usize },

    #[error("Unsupported type {tag}")]
    UnsupportedType { tag: u8 },

    #[error("Invalid {value_type} payload: {reason}")]
    InvalidPayload { value_type: String, reason: String },
}

// ── Rollback ─────────────────────────────────────────────────────────

/// Why a rollback request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollbackRejection {
    #[error("network change name is not specified")]
    EmptyName,

    #[error("Network change {name} not found")]
    NotFound { name: String },

    #[error("Network change {name} is {phase}, only APPLIED changes can be rolled back")]
    NotApplied { name: String, phase: Phase },

    #[error("Network change {name} is not the most recent, {latest} must be rolled back first")]
    NotMostRecent { name: String, latest: String },

    #[error("Network change {name} is already rolling back")]
    InProgress { name: String },
}

// ── CoreError ────────────────────────────────────────────────────────

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Codec ────────────────────────────────────────────────────────
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    // ── Store ────────────────────────────────────────────────────────
    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Entity already exists: {entity_type} with id {identifier}")]
    AlreadyExists {
        entity_type: String,
        identifier: String,
    },

    #[error("no Operational State cache available for {device_id}")]
    NoCacheAvailable { device_id: String },

    #[error("Rollback aborted. {0}")]
    InvalidRollback(RollbackRejection),

    #[error("Invalid phase transition for {id}: {from} -> {to}")]
    InvalidPhaseTransition { id: String, from: Phase, to: Phase },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Streaming ────────────────────────────────────────────────────
    #[error("Failed to send to stream: {message}")]
    StreamSend { message: String },

    #[error("Store is shutting down")]
    ShuttingDown,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<RollbackRejection> for CoreError {
    fn from(reason: RollbackRejection) -> Self {
        Self::InvalidRollback(reason)
    }
}

impl CoreError {
    pub(crate) fn not_found(entity_type: &str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_owned(),
            identifier: identifier.into(),
        }
    }

    pub(crate) fn already_exists(entity_type: &str, identifier: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity_type: entity_type.to_owned(),
            identifier: identifier.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}
