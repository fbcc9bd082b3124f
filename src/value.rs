//! Runtime values produced by evaluation.

use std::fmt;
use std::rc::Rc;

use crate::ast::Form;
use crate::error::SchemaError;
use crate::schema::{ApiDescriptor, Device, Field, Structure};

/// Result of evaluating a form. Schema objects travel through the evaluator as
/// their own variants, so aggregation points match on them directly.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(String),
    List(Vec<Value>),
    /// Ordered string-keyed entries; the evaluator's view of a JSON object.
    Assoc(Vec<(String, Value)>),
    Device(Rc<Device>),
    Structure(Rc<Structure>),
    Field(Box<Field>),
    Api(Rc<ApiDescriptor>),
}

/// Kind of a [`Value`], for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Nil,
    Bool,
    Int,
    Float,
    Str,
    Symbol,
    List,
    Assoc,
    Device,
    Structure,
    Field,
    Api,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Nil => "nil",
            ValueKind::Bool => "boolean",
            ValueKind::Int => "integer",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::Symbol => "symbol",
            ValueKind::List => "list",
            ValueKind::Assoc => "association",
            ValueKind::Device => "device",
            ValueKind::Structure => "structure",
            ValueKind::Field => "field",
            ValueKind::Api => "api",
        };
        f.write_str(s)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Symbol(_) => ValueKind::Symbol,
            Value::List(_) => ValueKind::List,
            Value::Assoc(_) => ValueKind::Assoc,
            Value::Device(_) => ValueKind::Device,
            Value::Structure(_) => ValueKind::Structure,
            Value::Field(_) => ValueKind::Field,
            Value::Api(_) => ValueKind::Api,
        }
    }

    /// Only `nil` and `#f` are false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(x) => Some(*x as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Numeric value truncated to 32 bits, the width of range and value-set entries.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Int(n) => Some(*n as u32),
            Value::Float(x) => Some(*x as u32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            Value::Nil => Some(&[]),
            _ => None,
        }
    }

    pub fn as_assoc(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Assoc(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&Rc<Structure>> {
        match self {
            Value::Structure(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_device(&self) -> Option<&Rc<Device>> {
        match self {
            Value::Device(d) => Some(d),
            _ => None,
        }
    }

    /// Quoted data: symbols stay symbols, lists become lists.
    pub fn from_form(form: &Form) -> Value {
        match form {
            Form::Int(n) => Value::Int(*n),
            Form::Float(x) => Value::Float(*x),
            Form::Str(s) => Value::Str(s.clone()),
            Form::Bool(b) => Value::Bool(*b),
            Form::Symbol(s) if s == "nil" => Value::Nil,
            Form::Symbol(s) => Value::Symbol(s.clone()),
            Form::List(items) if items.is_empty() => Value::Nil,
            Form::List(items) => Value::List(items.iter().map(Value::from_form).collect()),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, SchemaError> {
        Ok(match self {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(x) => serde_json::Value::from(*x),
            Value::Str(s) | Value::Symbol(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<_, _>>()?,
            ),
            Value::Assoc(entries) => {
                let mut map = serde_json::Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json()?);
                }
                serde_json::Value::Object(map)
            }
            other => {
                return Err(SchemaError::type_error(
                    "JSON conversion",
                    "plain data",
                    other.kind(),
                ))
            }
        })
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::Assoc(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Look up `key` in association entries.
pub fn assoc_get<'a>(entries: &'a [(String, Value)], key: &str) -> Option<&'a Value> {
    entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// Replace the entry for `key`, or append it.
pub fn assoc_set(entries: &mut Vec<(String, Value)>, key: &str, value: Value) {
    match entries.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value,
        None => entries.push((key.to_string(), value)),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(true) => write!(f, "#t"),
            Value::Bool(false) => write!(f, "#f"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Assoc(entries) => {
                write!(f, "(")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "({:?} . {})", k, v)?;
                }
                write!(f, ")")
            }
            Value::Device(d) => write!(f, "<device {}>", d.name),
            Value::Structure(s) => write!(f, "<structure {}>", s.name),
            Value::Field(field) => write!(f, "<field {}>", field.name),
            Value::Api(api) => write!(f, "<api {}>", api.structure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::Str(String::new()).is_truthy());
    }

    #[test]
    fn u32_truncation() {
        assert_eq!(Value::Int(0x1_0000_0005).as_u32(), Some(5));
        assert_eq!(Value::Float(3.9).as_u32(), Some(3));
        assert_eq!(Value::Str("3".into()).as_u32(), None);
    }

    #[test]
    fn assoc_set_replaces_existing_entry() {
        let mut entries = vec![("name".to_string(), Value::Int(1))];
        assoc_set(&mut entries, "name", Value::Int(2));
        assoc_set(&mut entries, "id", Value::Int(3));
        assert_eq!(entries.len(), 2);
        assert_eq!(assoc_get(&entries, "name").and_then(Value::as_i64), Some(2));
        assert_eq!(assoc_get(&entries, "id").and_then(Value::as_i64), Some(3));
    }

    #[test]
    fn json_conversion_keeps_structure() {
        let json = serde_json::json!({"name": "fan", "speeds": [1, 2], "on": true, "gain": 0.5});
        let v = Value::from_json(&json);
        assert_eq!(v.to_json().expect("to json"), json);
    }
}
