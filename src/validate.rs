//! Checking candidate register values against a field's constraints.
//!
//! When a field has both a value set and a range, the value set decides and
//! the range is ignored. A deferred validation, if present, must also accept
//! the candidate.

use thiserror::Error;

use crate::error::SchemaError;
use crate::eval::Interpreter;
use crate::schema::{Field, Range};
use crate::value::Value;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: value {value} outside range {range}")]
    OutOfRange {
        field: String,
        value: i64,
        range: Range,
    },

    #[error("{field}: value {value} not in allowed values {allowed:?}")]
    NotAllowed {
        field: String,
        value: i64,
        allowed: Vec<u32>,
    },

    #[error("{field}: value {value} rejected by deferred validation")]
    Rejected { field: String, value: i64 },

    #[error("{field}: deferred validation failed: {source}")]
    Schema {
        field: String,
        #[source]
        source: SchemaError,
    },
}

/// Check the static constraints (value set or range) only.
pub fn check_static(field: &Field, candidate: i64) -> Result<(), ValidationError> {
    if let Some(values) = &field.valid_values {
        if !values.contains(candidate) {
            return Err(ValidationError::NotAllowed {
                field: field.name.clone(),
                value: candidate,
                allowed: values.values().to_vec(),
            });
        }
    } else if let Some(range) = field.valid_range {
        if !range.contains(candidate) {
            return Err(ValidationError::OutOfRange {
                field: field.name.clone(),
                value: candidate,
                range,
            });
        }
    }
    Ok(())
}

/// Check every constraint of `field`, evaluating its deferred validation with
/// `value` bound to the candidate.
pub fn validate_candidate(
    interp: &mut Interpreter,
    field: &Field,
    candidate: i64,
) -> Result<(), ValidationError> {
    check_static(field, candidate)?;
    if let Some(rule) = &field.deferred_validation {
        let verdict = rule
            .apply(interp, Value::Int(candidate))
            .map_err(|source| ValidationError::Schema {
                field: field.name.clone(),
                source,
            })?;
        if !verdict.is_truthy() {
            return Err(ValidationError::Rejected {
                field: field.name.clone(),
                value: candidate,
            });
        }
    }
    Ok(())
}
