//! Fixed-width text buffers: 16 bytes, zero terminated when shorter.
//!
//! Bytes map one-to-one onto chars U+0000..=U+00FF, so any buffer decodes and
//! re-encodes unchanged up to its first zero byte. Everything after the
//! terminator is dropped on decode and zero-filled on encode.

use crate::ast::Form;
use crate::builder::BuilderContext;
use crate::env::Env;
use crate::error::SchemaError;
use crate::eval::{Arity, Interpreter};
use crate::value::{assoc_set, Value};

pub const FIXED_LEN: usize = 16;

/// Association key the splicing primitives write to.
pub const NAME_KEY: &str = "name";

/// Text before the first zero byte.
pub fn decode_fixed(buf: &[u8; FIXED_LEN]) -> String {
    buf.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}

/// Each char becomes one byte; the rest of the buffer is zero.
pub fn encode_fixed(s: &str) -> Result<[u8; FIXED_LEN], SchemaError> {
    let len = s.chars().count();
    if len > FIXED_LEN {
        return Err(SchemaError::Overflow {
            len,
            max: FIXED_LEN,
        });
    }
    let mut buf = [0u8; FIXED_LEN];
    for (slot, c) in buf.iter_mut().zip(s.chars()) {
        *slot = u8::try_from(u32::from(c))
            .map_err(|_| SchemaError::type_error("fixed-width encode", "chars up to U+00FF", format!("{:?}", c)))?;
    }
    Ok(buf)
}

/// Fill a buffer from a list of numbers (at most 16, each truncated to a byte).
pub fn buffer_from_value(v: &Value) -> Result<[u8; FIXED_LEN], SchemaError> {
    let items = v
        .as_list()
        .ok_or_else(|| SchemaError::type_error("fixed-width decode", "a list of bytes", v.kind()))?;
    if items.len() > FIXED_LEN {
        return Err(SchemaError::Overflow {
            len: items.len(),
            max: FIXED_LEN,
        });
    }
    let mut buf = [0u8; FIXED_LEN];
    for (slot, item) in buf.iter_mut().zip(items) {
        let n = item
            .as_i64()
            .ok_or_else(|| SchemaError::type_error("fixed-width decode", "numeric bytes", item.kind()))?;
        *slot = n as u8;
    }
    Ok(buf)
}

pub fn buffer_to_value(buf: &[u8; FIXED_LEN]) -> Value {
    Value::List(buf.iter().map(|&b| Value::Int(b as i64)).collect())
}

pub(crate) fn register(interp: &mut Interpreter) {
    interp.register("fixed->string", Arity::Exact(1), prim_fixed_to_string);
    interp.register("string->fixed", Arity::Exact(1), prim_string_to_fixed);
    interp.register("bytes-to-string", Arity::Exact(2), prim_bytes_to_string);
    interp.register("string-to-bytes", Arity::Exact(2), prim_string_to_bytes);
}

fn decode_arg(v: &Value) -> Result<Value, SchemaError> {
    Ok(Value::Str(decode_fixed(&buffer_from_value(v)?)))
}

fn encode_arg(v: &Value) -> Result<Value, SchemaError> {
    let s = v
        .as_str()
        .ok_or_else(|| SchemaError::type_error("fixed-width encode", "a string", v.kind()))?;
    Ok(buffer_to_value(&encode_fixed(s)?))
}

fn splice_name(target: Value, converted: Value) -> Result<Value, SchemaError> {
    let mut entries = match target {
        Value::Assoc(entries) => entries,
        Value::Nil => Vec::new(),
        other => return Err(SchemaError::type_error("name splice", "an association", other.kind())),
    };
    assoc_set(&mut entries, NAME_KEY, converted);
    Ok(Value::Assoc(entries))
}

fn prim_fixed_to_string(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    decode_arg(&interp.eval(&args[0], env, ctx)?)
}

fn prim_string_to_fixed(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    encode_arg(&interp.eval(&args[0], env, ctx)?)
}

/// `(bytes-to-string BYTES ASSOC)`: ASSOC with `"name"` set to the decoded text.
fn prim_bytes_to_string(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let text = decode_arg(&interp.eval(&args[0], env, ctx)?)?;
    let target = interp.eval(&args[1], env, ctx)?;
    splice_name(target, text)
}

/// `(string-to-bytes STR ASSOC)`: ASSOC with `"name"` set to the 16 encoded bytes.
fn prim_string_to_bytes(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let bytes = encode_arg(&interp.eval(&args[0], env, ctx)?)?;
    let target = interp.eval(&args[1], env, ctx)?;
    splice_name(target, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::assoc_get;
    use crate::ErrorKind;

    #[test]
    fn decode_stops_at_first_zero() {
        let mut buf = [0u8; FIXED_LEN];
        buf[..3].copy_from_slice(b"fan");
        buf[5] = b'x';
        assert_eq!(decode_fixed(&buf), "fan");
    }

    #[test]
    fn decode_full_buffer_without_terminator() {
        let buf = *b"0123456789abcdef";
        assert_eq!(decode_fixed(&buf), "0123456789abcdef");
    }

    #[test]
    fn encode_zero_fills() {
        let buf = encode_fixed("ab").expect("encode");
        assert_eq!(&buf[..2], b"ab");
        assert!(buf[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn encode_rejects_long_strings() {
        let err = encode_fixed("seventeen chars!!").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Overflow);
        assert!(encode_fixed("exactly 16 chars").is_ok());
    }

    #[test]
    fn encode_rejects_wide_chars() {
        assert_eq!(encode_fixed("fan€").unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn encode_after_decode_zero_fills_past_terminator() {
        let mut buf = [0xAAu8; FIXED_LEN];
        buf[4] = 0;
        let restored = encode_fixed(&decode_fixed(&buf)).expect("encode");
        assert_eq!(&restored[..4], &buf[..4]);
        assert!(restored[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn high_bytes_survive_round_trip() {
        let mut buf = [0u8; FIXED_LEN];
        buf[..3].copy_from_slice(&[0xC3, 0xFF, 0x80]);
        assert_eq!(encode_fixed(&decode_fixed(&buf)).expect("encode"), buf);
    }

    #[test]
    fn decode_after_encode_is_identity() {
        for s in ["", "a", "Fan Controller", "exactly 16 chars", "caf\u{e9}"] {
            assert_eq!(decode_fixed(&encode_fixed(s).expect("encode")), s);
        }
    }

    fn eval(src: &str) -> Result<Value, SchemaError> {
        Interpreter::new().load_str(src)
    }

    #[test]
    fn fixed_string_primitives() {
        let v = eval("(fixed->string '(104 105))").expect("decode");
        assert_eq!(v.as_str(), Some("hi"));

        let v = eval("(string->fixed \"hi\")").expect("encode");
        let bytes = v.as_list().expect("list");
        assert_eq!(bytes.len(), FIXED_LEN);
        assert_eq!(bytes[0].as_i64(), Some(104));
        assert_eq!(bytes[1].as_i64(), Some(105));
        assert!(bytes[2..].iter().all(|b| b.as_i64() == Some(0)));
    }

    #[test]
    fn fixed_string_primitive_errors() {
        let long = "(fixed->string '(1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17))";
        assert_eq!(eval(long).unwrap_err().kind(), ErrorKind::Overflow);
        assert_eq!(eval("(fixed->string \"hi\")").unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(eval("(fixed->string '(1 x))").unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(
            eval("(string->fixed \"seventeen chars!!\")").unwrap_err().kind(),
            ErrorKind::Overflow
        );
        assert_eq!(eval("(string->fixed 7)").unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn name_splice_into_nil_starts_fresh() {
        let v = eval("(bytes-to-string '(102 97 110) nil)").expect("splice");
        let entries = v.as_assoc().expect("assoc");
        assert_eq!(entries.len(), 1);
        assert_eq!(assoc_get(entries, NAME_KEY).and_then(Value::as_str), Some("fan"));

        let v = eval("(string-to-bytes \"fan\" nil)").expect("splice");
        let entries = v.as_assoc().expect("assoc");
        let bytes = assoc_get(entries, NAME_KEY).and_then(Value::as_list).expect("bytes");
        assert_eq!(bytes.len(), FIXED_LEN);
        assert_eq!(bytes[2].as_i64(), Some(110));
    }

    #[test]
    fn name_splice_keeps_other_entries() {
        let target = Value::Assoc(vec![
            ("scale".to_string(), Value::Int(5)),
            (NAME_KEY.to_string(), Value::Str("old".to_string())),
        ]);
        let spliced = splice_name(target, Value::Str("new".to_string())).expect("splice");
        let entries = spliced.as_assoc().expect("assoc");
        assert_eq!(entries.len(), 2);
        assert_eq!(assoc_get(entries, "scale").and_then(Value::as_i64), Some(5));
        assert_eq!(assoc_get(entries, NAME_KEY).and_then(Value::as_str), Some("new"));
    }

    #[test]
    fn name_splice_requires_association_target() {
        assert_eq!(
            eval("(bytes-to-string '(102) 5)").unwrap_err().kind(),
            ErrorKind::Type
        );
        assert_eq!(
            eval("(string-to-bytes \"fan\" '(1 2))").unwrap_err().kind(),
            ErrorKind::Type
        );
        assert_eq!(
            eval("(string-to-bytes \"a name that is far too long\" nil)").unwrap_err().kind(),
            ErrorKind::Overflow
        );
    }

    #[test]
    fn short_byte_lists_are_padded() {
        let v = Value::List(vec![Value::Int(104), Value::Int(105)]);
        assert_eq!(decode_fixed(&buffer_from_value(&v).expect("buffer")), "hi");
    }
}
