//! Schema model: devices, structures, fields and their constraints.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::ast::Form;
use crate::builder::BuilderContext;
use crate::env::{Env, Frame};
use crate::error::SchemaError;
use crate::eval::Interpreter;
use crate::value::Value;

/// Largest `repeat` count a field accepts.
pub const MAX_REPEAT: usize = 1 << 16;

/// Largest size in bytes of one field or structure.
pub const MAX_SIZE_BYTES: usize = 1 << 20;

/// Fixed-width integer types a field can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
}

impl PrimitiveType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "uint8" => PrimitiveType::Uint8,
            "uint16" => PrimitiveType::Uint16,
            "uint32" => PrimitiveType::Uint32,
            "uint64" => PrimitiveType::Uint64,
            "int8" => PrimitiveType::Int8,
            "int16" => PrimitiveType::Int16,
            "int32" => PrimitiveType::Int32,
            "int64" => PrimitiveType::Int64,
            _ => return None,
        })
    }

    pub fn size(self) -> usize {
        match self {
            PrimitiveType::Uint8 | PrimitiveType::Int8 => 1,
            PrimitiveType::Uint16 | PrimitiveType::Int16 => 2,
            PrimitiveType::Uint32 | PrimitiveType::Int32 => 4,
            PrimitiveType::Uint64 | PrimitiveType::Int64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveType::Int8 | PrimitiveType::Int16 | PrimitiveType::Int32 | PrimitiveType::Int64
        )
    }

    /// Inclusive bounds representable in an i64. `uint64` is capped at `i64::MAX`.
    pub fn bounds(self) -> (i64, i64) {
        match self {
            PrimitiveType::Uint8 => (0, u8::MAX as i64),
            PrimitiveType::Uint16 => (0, u16::MAX as i64),
            PrimitiveType::Uint32 => (0, u32::MAX as i64),
            PrimitiveType::Uint64 => (0, i64::MAX),
            PrimitiveType::Int8 => (i8::MIN as i64, i8::MAX as i64),
            PrimitiveType::Int16 => (i16::MIN as i64, i16::MAX as i64),
            PrimitiveType::Int32 => (i32::MIN as i64, i32::MAX as i64),
            PrimitiveType::Int64 => (i64::MIN, i64::MAX),
        }
    }
}

/// Resolves field type names to sizes. Primitive names are built in; anything
/// else must name a structure known to the registry.
pub trait TypeRegistry {
    fn lookup_structure(&self, name: &str) -> Option<Rc<Structure>>;

    fn size_of(&self, type_name: &str) -> Option<usize> {
        if let Some(p) = PrimitiveType::from_name(type_name) {
            return Some(p.size());
        }
        self.lookup_structure(type_name).map(|s| s.size_bytes())
    }

    fn is_valid_type(&self, type_name: &str) -> bool {
        self.size_of(type_name).is_some()
    }
}

/// Inclusive range of accepted values. `lo <= hi` is the caller's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub lo: u32,
    pub hi: u32,
}

impl Range {
    pub fn contains(&self, candidate: i64) -> bool {
        candidate >= self.lo as i64 && candidate <= self.hi as i64
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lo, self.hi)
    }
}

/// Accepted values in insertion order; duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueSet {
    vals: Vec<u32>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(&mut self, v: u32) {
        self.vals.push(v);
    }

    pub fn values(&self) -> &[u32] {
        &self.vals
    }

    pub fn contains(&self, candidate: i64) -> bool {
        self.vals.iter().any(|&v| v as i64 == candidate)
    }
}

/// An expression stored for later evaluation, together with the environment
/// it was written in.
#[derive(Debug, Clone)]
pub struct Deferred {
    expr: Form,
    env: Weak<Frame>,
}

impl Deferred {
    pub fn capture(expr: Form, env: &Env) -> Self {
        Deferred {
            expr,
            env: Rc::downgrade(env),
        }
    }

    pub fn expr(&self) -> &Form {
        &self.expr
    }

    /// Evaluate with `value` bound to `input`.
    pub fn apply(&self, interp: &mut Interpreter, input: Value) -> Result<Value, SchemaError> {
        self.apply_with(interp, vec![("value", input)])
    }

    /// Evaluate in a fresh child of the captured environment holding `bindings`.
    pub fn apply_with(
        &self,
        interp: &mut Interpreter,
        bindings: Vec<(&str, Value)>,
    ) -> Result<Value, SchemaError> {
        let captured = self.env.upgrade().ok_or(SchemaError::DetachedEnvironment)?;
        let frame = Frame::child(&captured);
        for (name, v) in bindings {
            frame.define(name, v);
        }
        interp.eval(&self.expr, &frame, &mut BuilderContext::default())
    }
}

/// One named, typed slot of a structure.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub type_name: String,
    /// Size of one element; the field occupies `size_bytes * repeat_count`.
    pub size_bytes: usize,
    pub repeat_count: usize,
    pub valid_range: Option<Range>,
    pub valid_values: Option<ValueSet>,
    pub deferred_validation: Option<Deferred>,
    pub to_json: Option<Deferred>,
    pub from_json: Option<Deferred>,
}

impl Field {
    pub fn new(name: &str, type_name: &str, size_bytes: usize) -> Self {
        Field {
            name: name.to_string(),
            type_name: type_name.to_string(),
            size_bytes,
            repeat_count: 1,
            valid_range: None,
            valid_values: None,
            deferred_validation: None,
            to_json: None,
            from_json: None,
        }
    }

    /// `None` when the type names a structure.
    pub fn primitive(&self) -> Option<PrimitiveType> {
        PrimitiveType::from_name(&self.type_name)
    }

    /// Saturates; the builders keep it within [`MAX_SIZE_BYTES`].
    pub fn total_size(&self) -> usize {
        self.size_bytes.saturating_mul(self.repeat_count)
    }
}

#[derive(Debug, Clone)]
pub struct Structure {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Structure {
    pub fn new(name: &str) -> Self {
        Structure {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn size_bytes(&self) -> usize {
        self.fields
            .iter()
            .fold(0usize, |acc, f| acc.saturating_add(f.total_size()))
    }
}

/// Read/write operations declared for a structure. The clause bodies are kept
/// as written.
#[derive(Debug, Clone)]
pub struct ApiDescriptor {
    pub structure: String,
    pub read: Option<Vec<Form>>,
    pub write: Option<Vec<Form>>,
}

impl ApiDescriptor {
    pub fn new(structure: &str) -> Self {
        ApiDescriptor {
            structure: structure.to_string(),
            read: None,
            write: None,
        }
    }
}

/// Top-level schema unit.
#[derive(Debug, Clone)]
pub struct Device {
    pub name: String,
    pub structures: Vec<Rc<Structure>>,
    pub apis: Vec<Rc<ApiDescriptor>>,
}

impl Device {
    pub fn new(name: &str) -> Self {
        Device {
            name: name.to_string(),
            structures: Vec::new(),
            apis: Vec::new(),
        }
    }

    pub fn add_structure(&mut self, structure: Rc<Structure>) {
        self.structures.push(structure);
    }

    pub fn add_api(&mut self, api: Rc<ApiDescriptor>) {
        self.apis.push(api);
    }

    pub fn structure(&self, name: &str) -> Option<&Rc<Structure>> {
        self.structures.iter().find(|s| s.name == name)
    }
}

impl TypeRegistry for Device {
    fn lookup_structure(&self, name: &str) -> Option<Rc<Structure>> {
        self.structure(name).cloned()
    }
}
