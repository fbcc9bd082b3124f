//! Benchmark: parse and load a register schema, then decode and encode one
//! register block through it.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use regdsl::{parse, Codec, Endianness, Interpreter};

const SCHEMA: &str = r#"
(def-struct Version
  (def-field major uint8)
  (def-field minor uint8))

(def-device fan
  (def-struct Status
    (def-field mode uint8 (range 0 3))
    (def-field rpm uint16 (deferred-validation (< value 9000)))
    (def-field speeds uint8 (repeat 8) (values 0 25 50 75 100))
    (def-field version Version))
  (def-struct Identity
    (def-field name uint8 (repeat 16)
      (to-json (bytes-to-string value result))
      (from-json (string-to-bytes value result)))))
"#;

const STATUS: [u8; 13] = [
    0x02, 0xB0, 0x04, 0x00, 0x19, 0x32, 0x4B, 0x64, 0x64, 0x4B, 0x32, 0x01, 0x04,
];

fn bench_load_schema(c: &mut Criterion) {
    c.bench_function("parse_schema", |b| {
        b.iter(|| parse(black_box(SCHEMA)).expect("parse"))
    });

    c.bench_function("load_schema", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new();
            interp.load_str(black_box(SCHEMA)).expect("load");
            interp
        })
    });

    let mut interp = Interpreter::new();
    interp.load_str(SCHEMA).expect("load");
    let codec = Codec::new(Endianness::Little);

    c.bench_function("decode_status", |b| {
        b.iter(|| {
            codec
                .decode_structure(&mut interp, "Status", black_box(&STATUS))
                .expect("decode")
        })
    });

    let json = codec
        .decode_structure(&mut interp, "Status", &STATUS)
        .expect("decode");
    c.bench_function("decode_encode_status", |b| {
        b.iter(|| {
            codec
                .encode_structure(&mut interp, "Status", black_box(&json))
                .expect("encode")
        })
    });
}

criterion_group!(benches, bench_load_schema);
criterion_main!(benches);
