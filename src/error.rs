//! Error types for schema construction and evaluation.

use thiserror::Error;

use crate::value::ValueKind;

/// Coarse classification of a [`SchemaError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A definition name was not a symbol.
    InvalidName,
    /// A definition is missing its required sub-forms.
    EmptyBody,
    /// Wrong number of arguments.
    Arity,
    /// Argument of the wrong value kind (or an atom where a list was required).
    Type,
    /// Field type name is neither a primitive nor a known structure.
    InvalidType,
    /// A sub-form evaluated to a kind not accepted by the enclosing definition.
    UnexpectedForm,
    /// Data does not fit a fixed-width buffer, or a size limit was exceeded.
    Overflow,
    /// A field modifier was used outside of `def-field`.
    Context,
    /// Generic evaluation failure (unbound symbol, bad call, arithmetic).
    Evaluation,
    /// Source text could not be read.
    Parse,
    /// Reading a schema file or writing dump output failed.
    Io,
}

/// Error raised while reading, evaluating or building a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{form} name must be a symbol, found {found}")]
    InvalidName { form: &'static str, found: String },

    #[error("{form} {name} must have at least one {expected}")]
    EmptyBody {
        form: &'static str,
        name: String,
        expected: &'static str,
    },

    #[error("{name} requires {expected} argument(s), {found} found")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("{context} requires {expected}, found {found}")]
    Type {
        context: String,
        expected: &'static str,
        found: String,
    },

    #[error("field type {type_name} must be a primitive (uint8, uint16, ...) or a previously defined structure")]
    InvalidType { type_name: String },

    #[error("{context}: expected {expected}, found {found}")]
    UnexpectedForm {
        context: String,
        expected: &'static str,
        found: ValueKind,
    },

    #[error("{len} bytes do not fit a {max}-byte buffer")]
    Overflow { len: usize, max: usize },

    #[error("{what} is {found}, the limit is {max}")]
    TooLarge {
        what: String,
        found: String,
        max: usize,
    },

    #[error("{modifier} used outside of a field definition")]
    NoCurrentField { modifier: &'static str },

    #[error("unbound symbol: {0}")]
    Unbound(String),

    #[error("{0} is not a primitive")]
    NotCallable(String),

    #[error("{0}")]
    Eval(String),

    #[error("captured environment of a deferred expression was dropped")]
    DetachedEnvironment,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchemaError::InvalidName { .. } => ErrorKind::InvalidName,
            SchemaError::EmptyBody { .. } => ErrorKind::EmptyBody,
            SchemaError::Arity { .. } => ErrorKind::Arity,
            SchemaError::Type { .. } => ErrorKind::Type,
            SchemaError::InvalidType { .. } => ErrorKind::InvalidType,
            SchemaError::UnexpectedForm { .. } => ErrorKind::UnexpectedForm,
            SchemaError::Overflow { .. } | SchemaError::TooLarge { .. } => ErrorKind::Overflow,
            SchemaError::NoCurrentField { .. } => ErrorKind::Context,
            SchemaError::Unbound(_)
            | SchemaError::NotCallable(_)
            | SchemaError::Eval(_)
            | SchemaError::DetachedEnvironment => ErrorKind::Evaluation,
            SchemaError::Parse(_) => ErrorKind::Parse,
            SchemaError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn type_error(
        context: impl Into<String>,
        expected: &'static str,
        found: impl ToString,
    ) -> Self {
        SchemaError::Type {
            context: context.into(),
            expected,
            found: found.to_string(),
        }
    }
}
