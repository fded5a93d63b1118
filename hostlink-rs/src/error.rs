//! Error type shared by every layer of the bridge.
//!
//! Script-side faults and bridge-detected failures all end up as a
//! [`BridgeError`]; [`crate::status::RunResult`] carries one back to the host
//! after a failed run.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::value::ValueKind;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Everything that can go wrong at the embedding boundary.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The engine could not be started.  Unrecoverable for the handle.
    #[error("initialization failed: {0}")]
    Init(String),

    /// A script file could not be read.  Never touches runtime state.
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source text was rejected by the engine's parser.
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Any other unhandled script-side fault.
    #[error("runtime error: {0}")]
    RuntimeFault(String),

    /// A `foreign` symbol was used without a host-side binding.
    #[error("unbound foreign symbol '{0}'")]
    UnboundForeign(String),

    /// A value could not cross the boundary as the required kind.
    #[error("type mismatch{}: expected {expected}, found {found}", position_suffix(.position))]
    TypeMismatch {
        expected: ValueKind,
        found: String,
        /// Zero-based argument index when raised by a trampoline.
        position: Option<usize>,
    },

    /// A foreign function was called with the wrong number of arguments.
    #[error("'{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// A foreign symbol name is not a valid identifier.
    #[error("invalid foreign symbol name '{0}'")]
    InvalidName(String),
}

fn position_suffix(position: &Option<usize>) -> String {
    match position {
        Some(i) => format!(" in argument {}", i + 1),
        None => String::new(),
    }
}

impl BridgeError {
    pub fn fault(msg: impl Into<String>) -> Self {
        BridgeError::RuntimeFault(msg.into())
    }

    pub fn init(msg: impl Into<String>) -> Self {
        BridgeError::Init(msg.into())
    }

    pub fn parse(line: usize, msg: impl Into<String>) -> Self {
        BridgeError::Parse { line, message: msg.into() }
    }

    pub fn type_mismatch(expected: ValueKind, found: impl Into<String>) -> Self {
        BridgeError::TypeMismatch { expected, found: found.into(), position: None }
    }

    /// Attach an argument position to a [`BridgeError::TypeMismatch`];
    /// other variants pass through unchanged.
    pub fn at_argument(self, index: usize) -> Self {
        match self {
            BridgeError::TypeMismatch { expected, found, .. } => {
                BridgeError::TypeMismatch { expected, found, position: Some(index) }
            }
            other => other,
        }
    }

    /// The failure category, as stored in a [`crate::status::RunResult`].
    pub fn kind(&self) -> FailureKind {
        match self {
            BridgeError::Init(_) => FailureKind::Init,
            BridgeError::Io { .. } => FailureKind::Io,
            BridgeError::Parse { .. } => FailureKind::Parse,
            BridgeError::RuntimeFault(_) => FailureKind::RuntimeFault,
            BridgeError::UnboundForeign(_) => FailureKind::UnboundForeign,
            BridgeError::TypeMismatch { .. } => FailureKind::TypeMismatch,
            BridgeError::ArityMismatch { .. } => FailureKind::ArityMismatch,
            BridgeError::InvalidName(_) => FailureKind::InvalidName,
        }
    }
}

// `std::io::Error` is not `Clone`; the copy keeps its kind and message.
impl Clone for BridgeError {
    fn clone(&self) -> Self {
        match self {
            BridgeError::Init(m) => BridgeError::Init(m.clone()),
            BridgeError::Io { path, source } => BridgeError::Io {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            BridgeError::Parse { line, message } => {
                BridgeError::Parse { line: *line, message: message.clone() }
            }
            BridgeError::RuntimeFault(m) => BridgeError::RuntimeFault(m.clone()),
            BridgeError::UnboundForeign(n) => BridgeError::UnboundForeign(n.clone()),
            BridgeError::TypeMismatch { expected, found, position } => BridgeError::TypeMismatch {
                expected: *expected,
                found: found.clone(),
                position: *position,
            },
            BridgeError::ArityMismatch { name, expected, found } => BridgeError::ArityMismatch {
                name: name.clone(),
                expected: *expected,
                found: *found,
            },
            BridgeError::InvalidName(n) => BridgeError::InvalidName(n.clone()),
        }
    }
}

/// Tag-only view of [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Init,
    Io,
    Parse,
    RuntimeFault,
    UnboundForeign,
    TypeMismatch,
    ArityMismatch,
    InvalidName,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Init => "init",
            FailureKind::Io => "io",
            FailureKind::Parse => "parse",
            FailureKind::RuntimeFault => "runtime",
            FailureKind::UnboundForeign => "unbound-foreign",
            FailureKind::TypeMismatch => "type-mismatch",
            FailureKind::ArityMismatch => "arity-mismatch",
            FailureKind::InvalidName => "invalid-name",
        };
        f.write_str(s)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_message_names_symbol() {
        let e = BridgeError::UnboundForeign("x".into());
        assert_eq!(e.to_string(), "unbound foreign symbol 'x'");
        assert_eq!(e.kind(), FailureKind::UnboundForeign);
    }

    #[test]
    fn type_mismatch_with_position() {
        let e = BridgeError::type_mismatch(ValueKind::Integer, "text").at_argument(1);
        assert_eq!(
            e.to_string(),
            "type mismatch in argument 2: expected integer, found text"
        );
    }

    #[test]
    fn type_mismatch_without_position() {
        let e = BridgeError::type_mismatch(ValueKind::Text, "list");
        assert_eq!(e.to_string(), "type mismatch: expected text, found list");
    }

    #[test]
    fn at_argument_leaves_other_variants() {
        let e = BridgeError::fault("boom").at_argument(3);
        assert!(matches!(e, BridgeError::RuntimeFault(ref m) if m == "boom"));
    }

    #[test]
    fn io_message_includes_path() {
        let e = BridgeError::Io {
            path: PathBuf::from("missing.script"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let msg = e.to_string();
        assert!(msg.contains("missing.script"), "{msg}");
        assert_eq!(e.kind(), FailureKind::Io);
    }

    #[test]
    fn clone_keeps_io_kind_and_message() {
        let e = BridgeError::Io {
            path: PathBuf::from("a.hl"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let c = e.clone();
        assert_eq!(c.to_string(), e.to_string());
        match c {
            BridgeError::Io { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn arity_message() {
        let e = BridgeError::ArityMismatch { name: "add".into(), expected: 2, found: 3 };
        assert_eq!(e.to_string(), "'add' expects 2 argument(s), got 3");
    }
}
