//! Error taxonomy for the engine.
//!
//! Every failure the core can produce is a variant of [`Error`]. Low-level
//! failures are wrapped with context as they cross component boundaries
//! (a reference wraps what went wrong with the symbolic path it was resolving,
//! the scheduler wraps a tick failure with the failing module's name).

use thiserror::Error;

use crate::types::{PortKind, ValueType};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Binding
    #[error("name `{name}` is already bound")]
    AlreadyBound { name: String },

    #[error("name `{name}` is not bound")]
    Unbound { name: String },

    // Templates and arguments
    #[error("duplicate field `{name}` in template")]
    DuplicateField { name: String },

    #[error("no field named `{name}`")]
    NoSuchField { name: String },

    #[error("{factory}: missing argument `{field}`")]
    MissingArgument { factory: String, field: String },

    #[error("{factory}: argument `{field}` expected {expected}, found {found}")]
    ArgumentType {
        factory: String,
        field: String,
        expected: ValueType,
        found: String,
    },

    #[error("{factory}: expected {expected} arguments, found {found}")]
    ArgumentCount {
        factory: String,
        expected: usize,
        found: usize,
    },

    #[error("{factory}: unexpected argument `{field}`")]
    UnexpectedArgument { factory: String, field: String },

    #[error("{factory}: unsupported arguments: {message}")]
    UnsupportedArguments { factory: String, message: String },

    // References
    #[error("failed to resolve `{path}`")]
    Resolve {
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("`{path}` expected {expected}, found {found}")]
    ReferenceType {
        path: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("`{path}` does not name a module")]
    NotAModule { path: String },

    #[error("`{path}` outlived the environment it refers to")]
    DetachedReference { path: String },

    #[error("reference chain through `{path}` is too deep")]
    ReferenceDepth { path: String },

    // Ports and modules
    #[error("port type mismatch: expected {expected}, found {found}")]
    PortType { expected: PortKind, found: String },

    #[error("{module}: no {direction} port at index {index}")]
    NoSuchPort {
        module: String,
        direction: &'static str,
        index: usize,
    },

    #[error("`{path}` is {role}, not an output port")]
    NotAnOutput { path: String, role: &'static str },

    #[error("{module}: {message}")]
    Link { module: String, message: String },

    // Graph construction and lifecycle
    #[error("dependency cycle between modules: {}", modules.join(", "))]
    Cycle { modules: Vec<String> },

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("{module} failed during tick")]
    Tick {
        module: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{module} is broken by an earlier tick failure")]
    Broken { module: String },

    // Patch files
    #[error("invalid patch: {message}")]
    Patch { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap `self` with the symbolic path that was being resolved, unless the
    /// error already names a path.
    pub(crate) fn in_path(self, path: &str) -> Error {
        match self {
            Error::Resolve { .. }
            | Error::ReferenceType { .. }
            | Error::NotAModule { .. }
            | Error::DetachedReference { .. }
            | Error::ReferenceDepth { .. } => self,
            other => Error::Resolve {
                path: path.to_string(),
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_path_wraps_plain_errors() {
        let err = Error::Unbound { name: "osc".into() }.in_path("osc.out");
        match err {
            Error::Resolve { path, source } => {
                assert_eq!(path, "osc.out");
                assert!(matches!(*source, Error::Unbound { .. }));
            }
            other => panic!("expected Resolve, got {other:?}"),
        }
    }

    #[test]
    fn in_path_keeps_existing_path() {
        let err = Error::NotAModule { path: "a".into() }.in_path("a.out");
        assert!(matches!(err, Error::NotAModule { path } if path == "a"));
    }

    #[test]
    fn cycle_message_lists_modules() {
        let err = Error::Cycle {
            modules: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle between modules: a, b");
    }
}
