//! Unified error type for hidreplay.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

use core::fmt;

/// Top-level error type used across the engine and the control layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Input
    /// A request payload could not be parsed (bad JSON, unknown step
    /// type, text too long, unknown command).
    MalformedInput,

    /// An index argument does not address an existing step.
    InvalidIndex,

    // Store
    /// The step store is full.
    CapacityExceeded,

    /// The runner is executing; the step sequence cannot change.
    Busy,

    // Collaborators
    /// The peer position service did not answer or answered garbage.
    UnreachablePeer,

    /// Flash read/write/erase failed.
    Storage,

    // Generic
    /// Buffer too small for the requested operation.
    BufferOverflow,

    /// Operation timed out.
    Timeout,
}

impl Error {
    /// Short, stable code used in `{"error": ...}` responses.
    pub const fn code(&self) -> &'static str {
        match self {
            Error::MalformedInput => "json",
            Error::InvalidIndex => "index",
            Error::CapacityExceeded => "max steps",
            Error::Busy => "busy",
            Error::UnreachablePeer => "pc not reachable",
            Error::Storage => "storage",
            Error::BufferOverflow => "overflow",
            Error::Timeout => "timeout",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::MalformedInput => "malformed input",
            Error::InvalidIndex => "step index out of range",
            Error::CapacityExceeded => "step store is full",
            Error::Busy => "runner is busy",
            Error::UnreachablePeer => "peer position service unreachable",
            Error::Storage => "persistent storage failed",
            Error::BufferOverflow => "buffer too small",
            Error::Timeout => "operation timed out",
        };
        f.write_str(msg)
    }
}

impl From<serde_json_core::de::Error> for Error {
    fn from(_: serde_json_core::de::Error) -> Self {
        Error::MalformedInput
    }
}

impl From<serde_json_core::ser::Error> for Error {
    fn from(_: serde_json_core::ser::Error) -> Self {
        Error::BufferOverflow
    }
}
