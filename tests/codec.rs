//! Binary encode/decode of registers through loaded schemas.

use regdsl::{Codec, CodecError, Endianness, Interpreter, ValidationError};
use serde_json::json;

const SCHEMA: &str = r#"
(def-struct Version
  (def-field major uint8)
  (def-field minor uint8))

(def-device fan
  (def-struct Status
    (def-field mode uint8 (range 0 3))
    (def-field rpm uint16 (deferred-validation (< value 9000)))
    (def-field temp int8)
    (def-field speeds uint8 (repeat 3) (values 0 25 50 100))
    (def-field version Version))

  (def-struct Identity
    (def-field name uint8 (repeat 16)
      (to-json (bytes-to-string value result))
      (from-json (string-to-bytes value result)))
    (def-field scale uint16
      (to-json (* value 10))
      (from-json (/ value 10))))

  (def-struct Level
    (def-field level uint8 (range 0 10) (values 20 30))))
"#;

/// mode=2 rpm=1200 temp=-5 speeds=[0,50,100] version=1.4, little endian
const STATUS_LE: [u8; 9] = [0x02, 0xB0, 0x04, 0xFB, 0x00, 0x32, 0x64, 0x01, 0x04];

fn interp() -> Interpreter {
    let mut interp = Interpreter::new();
    interp.load_str(SCHEMA).expect("schema loads");
    interp
}

fn status_json() -> serde_json::Value {
    json!({
        "mode": 2,
        "rpm": 1200,
        "temp": -5,
        "speeds": [0, 50, 100],
        "version": { "major": 1, "minor": 4 }
    })
}

// ==================== Decode ====================

#[test]
fn decode_status_little_endian() {
    let mut interp = interp();
    let codec = Codec::new(Endianness::Little);
    let (consumed, json) = codec
        .decode_structure_with_extent(&mut interp, "Status", &STATUS_LE)
        .expect("decode");
    assert_eq!(consumed, 9);
    assert_eq!(json, status_json());
}

#[test]
fn decode_status_big_endian() {
    let mut bytes = STATUS_LE;
    bytes.swap(1, 2);
    let mut interp = interp();
    let json = Codec::new(Endianness::Big)
        .decode_structure(&mut interp, "Status", &bytes)
        .expect("decode");
    assert_eq!(json, status_json());
}

#[test]
fn decode_ignores_trailing_bytes() {
    let mut bytes = STATUS_LE.to_vec();
    bytes.extend_from_slice(&[0xEE, 0xEE]);
    let mut interp = interp();
    let (consumed, _) = Codec::default()
        .decode_structure_with_extent(&mut interp, "Status", &bytes)
        .expect("decode");
    assert_eq!(consumed, 9);
}

#[test]
fn decode_short_buffer_is_io_error() {
    let mut interp = interp();
    let err = Codec::default()
        .decode_structure(&mut interp, "Status", &STATUS_LE[..3])
        .unwrap_err();
    assert!(matches!(err, CodecError::Io(_)));
}

#[test]
fn decode_large_repeat_from_short_buffer() {
    let mut interp = Interpreter::new();
    interp
        .load_str("(def-struct Bulk (def-field a uint8 (repeat 65536)))")
        .expect("schema");
    let err = Codec::default()
        .decode_structure(&mut interp, "Bulk", &[1])
        .unwrap_err();
    assert!(matches!(err, CodecError::Io(_)));
}

#[test]
fn decode_validates_range() {
    let mut bytes = STATUS_LE;
    bytes[0] = 4;
    let mut interp = interp();
    let err = Codec::default()
        .decode_structure(&mut interp, "Status", &bytes)
        .unwrap_err();
    assert!(matches!(
        err,
        CodecError::Validation(ValidationError::OutOfRange { value: 4, .. })
    ));
}

#[test]
fn decode_runs_deferred_validation() {
    let mut bytes = STATUS_LE;
    // rpm = 9500
    bytes[1] = 0x1C;
    bytes[2] = 0x25;
    let mut interp = interp();
    let err = Codec::default()
        .decode_structure(&mut interp, "Status", &bytes)
        .unwrap_err();
    assert!(matches!(
        err,
        CodecError::Validation(ValidationError::Rejected { value: 9500, .. })
    ));
}

#[test]
fn decode_validates_each_repeated_element() {
    let mut bytes = STATUS_LE;
    bytes[5] = 30;
    let mut interp = interp();
    let err = Codec::default()
        .decode_structure(&mut interp, "Status", &bytes)
        .unwrap_err();
    assert!(matches!(
        err,
        CodecError::Validation(ValidationError::NotAllowed { value: 30, .. })
    ));
}

#[test]
fn decode_unknown_structure() {
    let mut interp = interp();
    let err = Codec::default()
        .decode_structure(&mut interp, "Nope", &STATUS_LE)
        .unwrap_err();
    assert!(matches!(err, CodecError::UnknownStruct(ref name) if name == "Nope"));
}

#[test]
fn value_set_overrides_range_on_decode() {
    let mut interp = interp();
    let json = Codec::default()
        .decode_structure(&mut interp, "Level", &[20])
        .expect("20 is an allowed value");
    assert_eq!(json, json!({ "level": 20 }));
    assert!(Codec::default()
        .decode_structure(&mut interp, "Level", &[5])
        .is_err());
}

// ==================== Encode ====================

#[test]
fn encode_status_both_endiannesses() {
    let mut interp = interp();
    let le = Codec::new(Endianness::Little)
        .encode_structure(&mut interp, "Status", &status_json())
        .expect("encode");
    assert_eq!(le, STATUS_LE.to_vec());

    let be = Codec::new(Endianness::Big)
        .encode_structure(&mut interp, "Status", &status_json())
        .expect("encode");
    assert_eq!(&be[1..3], &[0x04, 0xB0]);
}

#[test]
fn encode_missing_field() {
    let mut json = status_json();
    json.as_object_mut().expect("object").remove("temp");
    let mut interp = interp();
    let err = Codec::default()
        .encode_structure(&mut interp, "Status", &json)
        .unwrap_err();
    assert!(matches!(err, CodecError::MissingField(ref f) if f == "Status.temp"));
}

#[test]
fn encode_missing_nested_field() {
    let mut json = status_json();
    json["version"] = json!({ "major": 1 });
    let mut interp = interp();
    let err = Codec::default()
        .encode_structure(&mut interp, "Status", &json)
        .unwrap_err();
    assert!(matches!(err, CodecError::MissingField(ref f) if f == "Version.minor"));
}

#[test]
fn encode_repeat_count_mismatch() {
    let mut json = status_json();
    json["speeds"] = json!([0, 50]);
    let mut interp = interp();
    let err = Codec::default()
        .encode_structure(&mut interp, "Status", &json)
        .unwrap_err();
    assert!(matches!(err, CodecError::LengthMismatch(_)));
}

#[test]
fn encode_value_outside_primitive_bounds() {
    let mut json = status_json();
    json["temp"] = json!(200);
    let mut interp = interp();
    let err = Codec::default()
        .encode_structure(&mut interp, "Status", &json)
        .unwrap_err();
    assert!(matches!(err, CodecError::OutOfBounds { ref field, .. } if field == "temp"));
}

#[test]
fn encode_validates_before_writing() {
    let mut json = status_json();
    json["rpm"] = json!(9000);
    let mut interp = interp();
    let err = Codec::default()
        .encode_structure(&mut interp, "Status", &json)
        .unwrap_err();
    assert!(matches!(err, CodecError::Validation(ValidationError::Rejected { .. })));
}

#[test]
fn encode_rejects_wrong_kinds() {
    let mut interp = interp();
    let codec = Codec::default();
    assert!(matches!(
        codec.encode_structure(&mut interp, "Status", &json!([1, 2])),
        Err(CodecError::Type { .. })
    ));
    let mut json = status_json();
    json["mode"] = json!("two");
    assert!(matches!(
        codec.encode_structure(&mut interp, "Status", &json),
        Err(CodecError::Type { ref field, .. }) if field == "mode"
    ));
}

// ==================== Transforms ====================

fn identity_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; 18];
    bytes[..7].copy_from_slice(b"fan-ctl");
    bytes[16] = 5;
    bytes
}

#[test]
fn to_json_transforms_shape_the_object() {
    let mut interp = interp();
    let json = Codec::default()
        .decode_structure(&mut interp, "Identity", &identity_bytes())
        .expect("decode");
    assert_eq!(json, json!({ "name": "fan-ctl", "scale": 50 }));
}

#[test]
fn from_json_transforms_restore_raw_values() {
    let mut interp = interp();
    let bytes = Codec::default()
        .encode_structure(&mut interp, "Identity", &json!({ "name": "fan-ctl", "scale": 50 }))
        .expect("encode");
    assert_eq!(bytes, identity_bytes());
}

#[test]
fn name_longer_than_buffer_overflows() {
    let mut interp = interp();
    let err = Codec::default()
        .encode_structure(
            &mut interp,
            "Identity",
            &json!({ "name": "a name that is far too long", "scale": 1 }),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CodecError::Schema(ref e) if e.kind() == regdsl::ErrorKind::Overflow
    ));
}

#[test]
fn transform_sees_definitions_made_after_the_schema() {
    let mut interp = Interpreter::new();
    interp
        .load_str("(def-struct Temp (def-field t int16 (to-json (+ value offset))))")
        .expect("schema");
    interp.load_str("(define offset 100)").expect("define");
    let json = Codec::new(Endianness::Big)
        .decode_structure(&mut interp, "Temp", &[0xFF, 0xF6])
        .expect("decode");
    assert_eq!(json, json!({ "t": 90 }));
}
