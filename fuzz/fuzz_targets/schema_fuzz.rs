//! Schema fuzz target: parse arbitrary text and evaluate it as schema source.
//! Neither step may panic; failures come back as SchemaError.
//! Build with: cargo fuzz run schema_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if regdsl::parse(s).is_err() {
        return;
    }
    let mut interp = regdsl::Interpreter::with_output(Box::new(std::io::sink()));
    let _ = interp.load_str(s);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run schema_fuzz");
}
