//! Encode/decode register bytes through a structure definition.
//!
//! Fields are laid out back to back in declaration order, with no padding.
//! Primitive elements use the codec's endianness, structure-typed fields
//! recurse, and a field with `repeat n` (n != 1) holds a list of n elements.
//! Every primitive element is validated in both directions.
//!
//! JSON transcoding runs the field transforms with two bindings:
//!
//! | Direction | `value` | `result` |
//! |-----------|---------|----------|
//! | `to-json` | raw decoded value | object built so far |
//! | `from-json` | JSON entry for the field | whole input object |
//!
//! A `to-json` result that is an association replaces the object built so far;
//! any other result is stored under the field name. A `from-json` association
//! result is searched for the field name; any other result is the raw value.

use std::io::Cursor;
use std::rc::Rc;

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::error::SchemaError;
use crate::eval::Interpreter;
use crate::schema::{Field, PrimitiveType, Structure, MAX_SIZE_BYTES};
use crate::validate::{validate_candidate, ValidationError};
use crate::value::{assoc_get, assoc_set, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    Big,
    #[default]
    Little,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("Schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("Unknown struct: {0}")]
    UnknownStruct(String),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Length/count mismatch: {0}")]
    LengthMismatch(String),
    #[error("{field}: {found} does not fit {ty:?}")]
    OutOfBounds {
        field: String,
        found: String,
        ty: PrimitiveType,
    },
    #[error("{field}: expected {expected}, found {found}")]
    Type {
        field: String,
        expected: &'static str,
        found: String,
    },
}

/// Nesting limit for structure-typed fields.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    pub endianness: Endianness,
}

impl Codec {
    pub fn new(endianness: Endianness) -> Self {
        Codec { endianness }
    }

    /// Decode the structure named `name` from the start of `bytes` into a JSON object.
    pub fn decode_structure(
        &self,
        interp: &mut Interpreter,
        name: &str,
        bytes: &[u8],
    ) -> Result<serde_json::Value, CodecError> {
        let (_, value) = self.decode_structure_with_extent(interp, name, bytes)?;
        Ok(value)
    }

    /// Decode and also return the number of bytes consumed.
    pub fn decode_structure_with_extent(
        &self,
        interp: &mut Interpreter,
        name: &str,
        bytes: &[u8],
    ) -> Result<(usize, serde_json::Value), CodecError> {
        let structure = self.resolve(interp, name)?;
        let mut cursor = Cursor::new(bytes);
        let entries = self.decode_fields(interp, &structure, &mut cursor, 0)?;
        let consumed = cursor.position() as usize;
        debug!(structure = %structure.name, consumed, "Decoded structure");
        Ok((consumed, Value::Assoc(entries).to_json()?))
    }

    /// Encode a JSON object as the structure named `name`.
    pub fn encode_structure(
        &self,
        interp: &mut Interpreter,
        name: &str,
        json: &serde_json::Value,
    ) -> Result<Vec<u8>, CodecError> {
        let structure = self.resolve(interp, name)?;
        let entries = match Value::from_json(json) {
            Value::Assoc(entries) => entries,
            other => {
                return Err(CodecError::Type {
                    field: structure.name.clone(),
                    expected: "a JSON object",
                    found: other.kind().to_string(),
                })
            }
        };
        let mut out = Vec::with_capacity(structure.size_bytes().min(MAX_SIZE_BYTES));
        self.encode_fields(interp, &structure, &entries, &mut out, 0)?;
        debug!(structure = %structure.name, len = out.len(), "Encoded structure");
        Ok(out)
    }

    fn resolve(&self, interp: &Interpreter, name: &str) -> Result<Rc<Structure>, CodecError> {
        interp
            .lookup_structure(name)
            .ok_or_else(|| CodecError::UnknownStruct(name.to_string()))
    }

    fn decode_fields(
        &self,
        interp: &mut Interpreter,
        structure: &Structure,
        r: &mut Cursor<&[u8]>,
        depth: usize,
    ) -> Result<Vec<(String, Value)>, CodecError> {
        let mut out: Vec<(String, Value)> = Vec::new();
        for field in &structure.fields {
            let raw = self.decode_field(interp, field, r, depth)?;
            match &field.to_json {
                Some(transform) => {
                    let produced = transform.apply_with(
                        interp,
                        vec![("value", raw), ("result", Value::Assoc(out.clone()))],
                    )?;
                    match produced {
                        Value::Assoc(entries) => out = entries,
                        other => assoc_set(&mut out, &field.name, other),
                    }
                }
                None => assoc_set(&mut out, &field.name, raw),
            }
        }
        Ok(out)
    }

    fn decode_field(
        &self,
        interp: &mut Interpreter,
        field: &Field,
        r: &mut Cursor<&[u8]>,
        depth: usize,
    ) -> Result<Value, CodecError> {
        if field.repeat_count == 1 {
            return self.decode_element(interp, field, r, depth);
        }
        // Never reserve more elements than the remaining input can hold.
        let remaining = r.get_ref().len().saturating_sub(r.position() as usize);
        let fits = remaining / field.size_bytes.max(1);
        let mut items = Vec::with_capacity(field.repeat_count.min(fits));
        for _ in 0..field.repeat_count {
            items.push(self.decode_element(interp, field, r, depth)?);
        }
        Ok(Value::List(items))
    }

    fn decode_element(
        &self,
        interp: &mut Interpreter,
        field: &Field,
        r: &mut Cursor<&[u8]>,
        depth: usize,
    ) -> Result<Value, CodecError> {
        match field.primitive() {
            Some(p) => {
                let n = match self.endianness {
                    Endianness::Big => read_primitive::<BigEndian>(r, p)?,
                    Endianness::Little => read_primitive::<LittleEndian>(r, p)?,
                };
                validate_candidate(interp, field, n)?;
                Ok(Value::Int(n))
            }
            None => {
                let inner = self.nested(interp, field, depth)?;
                Ok(Value::Assoc(self.decode_fields(interp, &inner, r, depth + 1)?))
            }
        }
    }

    fn encode_fields(
        &self,
        interp: &mut Interpreter,
        structure: &Structure,
        entries: &[(String, Value)],
        w: &mut Vec<u8>,
        depth: usize,
    ) -> Result<(), CodecError> {
        for field in &structure.fields {
            let given = assoc_get(entries, &field.name).cloned().unwrap_or(Value::Nil);
            let raw = match &field.from_json {
                Some(transform) => {
                    let produced = transform.apply_with(
                        interp,
                        vec![("value", given), ("result", Value::Assoc(entries.to_vec()))],
                    )?;
                    match produced {
                        Value::Assoc(out) => assoc_get(&out, &field.name).cloned().unwrap_or(Value::Nil),
                        other => other,
                    }
                }
                None => given,
            };
            if matches!(raw, Value::Nil) {
                return Err(CodecError::MissingField(format!("{}.{}", structure.name, field.name)));
            }
            self.encode_field(interp, field, &raw, w, depth)?;
        }
        Ok(())
    }

    fn encode_field(
        &self,
        interp: &mut Interpreter,
        field: &Field,
        raw: &Value,
        w: &mut Vec<u8>,
        depth: usize,
    ) -> Result<(), CodecError> {
        if field.repeat_count == 1 {
            return self.encode_element(interp, field, raw, w, depth);
        }
        let items = raw.as_list().ok_or_else(|| CodecError::Type {
            field: field.name.clone(),
            expected: "a list",
            found: raw.kind().to_string(),
        })?;
        if items.len() != field.repeat_count {
            return Err(CodecError::LengthMismatch(format!(
                "{} expects {} elements, got {}",
                field.name,
                field.repeat_count,
                items.len()
            )));
        }
        for item in items {
            self.encode_element(interp, field, item, w, depth)?;
        }
        Ok(())
    }

    fn encode_element(
        &self,
        interp: &mut Interpreter,
        field: &Field,
        raw: &Value,
        w: &mut Vec<u8>,
        depth: usize,
    ) -> Result<(), CodecError> {
        match field.primitive() {
            Some(p) => {
                let n = match raw {
                    Value::Int(n) => *n,
                    other => {
                        return Err(CodecError::Type {
                            field: field.name.clone(),
                            expected: "an integer",
                            found: other.to_string(),
                        })
                    }
                };
                let (min, max) = p.bounds();
                if n < min || n > max {
                    return Err(CodecError::OutOfBounds {
                        field: field.name.clone(),
                        found: n.to_string(),
                        ty: p,
                    });
                }
                validate_candidate(interp, field, n)?;
                match self.endianness {
                    Endianness::Big => write_primitive::<BigEndian>(w, p, n)?,
                    Endianness::Little => write_primitive::<LittleEndian>(w, p, n)?,
                }
                Ok(())
            }
            None => {
                let inner = self.nested(interp, field, depth)?;
                let entries = raw.as_assoc().ok_or_else(|| CodecError::Type {
                    field: field.name.clone(),
                    expected: "an object",
                    found: raw.kind().to_string(),
                })?;
                self.encode_fields(interp, &inner, entries, w, depth + 1)
            }
        }
    }

    fn nested(
        &self,
        interp: &Interpreter,
        field: &Field,
        depth: usize,
    ) -> Result<Rc<Structure>, CodecError> {
        if depth >= MAX_DEPTH {
            return Err(CodecError::LengthMismatch(format!(
                "{} nests deeper than {} structures",
                field.name, MAX_DEPTH
            )));
        }
        self.resolve(interp, &field.type_name)
    }
}

fn read_primitive<B: ByteOrder>(r: &mut Cursor<&[u8]>, p: PrimitiveType) -> std::io::Result<i64> {
    Ok(match p {
        PrimitiveType::Uint8 => r.read_u8()? as i64,
        PrimitiveType::Uint16 => r.read_u16::<B>()? as i64,
        PrimitiveType::Uint32 => r.read_u32::<B>()? as i64,
        // Values above i64::MAX wrap; validation sees the wrapped value.
        PrimitiveType::Uint64 => r.read_u64::<B>()? as i64,
        PrimitiveType::Int8 => r.read_i8()? as i64,
        PrimitiveType::Int16 => r.read_i16::<B>()? as i64,
        PrimitiveType::Int32 => r.read_i32::<B>()? as i64,
        PrimitiveType::Int64 => r.read_i64::<B>()?,
    })
}

fn write_primitive<B: ByteOrder>(w: &mut Vec<u8>, p: PrimitiveType, n: i64) -> std::io::Result<()> {
    match p {
        PrimitiveType::Uint8 => w.write_u8(n as u8),
        PrimitiveType::Uint16 => w.write_u16::<B>(n as u16),
        PrimitiveType::Uint32 => w.write_u32::<B>(n as u32),
        PrimitiveType::Uint64 => w.write_u64::<B>(n as u64),
        PrimitiveType::Int8 => w.write_i8(n as i8),
        PrimitiveType::Int16 => w.write_i16::<B>(n as i16),
        PrimitiveType::Int32 => w.write_i32::<B>(n as i32),
        PrimitiveType::Int64 => w.write_i64::<B>(n),
    }
}

/// Parse a hex dump such as `"01 ff 0a"` or `"01ff0a"`.
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, CodecError> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);
    if digits.len() % 2 != 0 {
        return Err(CodecError::LengthMismatch("hex input must have even length".to_string()));
    }
    let mut out = Vec::with_capacity(digits.len() / 2);
    for chunk in digits.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(chunk).unwrap_or("");
        let b = u8::from_str_radix(pair, 16).map_err(|_| CodecError::Type {
            field: "hex input".to_string(),
            expected: "hex digits",
            found: pair.to_string(),
        })?;
        out.push(b);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_parsing() {
        assert_eq!(parse_hex_bytes("01 ff 0A").expect("hex"), vec![0x01, 0xff, 0x0a]);
        assert_eq!(parse_hex_bytes("0x0102").expect("hex"), vec![1, 2]);
        assert!(parse_hex_bytes("123").is_err());
        assert!(parse_hex_bytes("zz").is_err());
    }

    #[test]
    fn primitive_widths_follow_endianness() {
        let mut out = Vec::new();
        write_primitive::<BigEndian>(&mut out, PrimitiveType::Uint16, 0x0102).expect("write");
        write_primitive::<LittleEndian>(&mut out, PrimitiveType::Uint16, 0x0102).expect("write");
        assert_eq!(out, vec![0x01, 0x02, 0x02, 0x01]);
        let mut r = Cursor::new(&out[..]);
        assert_eq!(read_primitive::<BigEndian>(&mut r, PrimitiveType::Uint16).expect("read"), 0x0102);
        assert_eq!(read_primitive::<LittleEndian>(&mut r, PrimitiveType::Uint16).expect("read"), 0x0102);
    }

    #[test]
    fn signed_values_sign_extend() {
        let bytes = [0xFFu8];
        let mut r = Cursor::new(&bytes[..]);
        assert_eq!(read_primitive::<BigEndian>(&mut r, PrimitiveType::Int8).expect("read"), -1);
    }
}
