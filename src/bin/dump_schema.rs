//! Load register schema files and print their structures.
//!
//! Files are loaded in order into one interpreter, so later files may refer to
//! structures defined by earlier ones.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use regdsl::codec::parse_hex_bytes;
use regdsl::{Codec, Endianness, Interpreter, Value};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "dump_schema")]
#[command(about = "Load device register schemas, dump their structures and transcode registers")]
#[command(version)]
struct Args {
    /// Schema files, loaded in order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Expand structure-typed fields into their leaf fields
    #[arg(short, long)]
    expanded: bool,

    /// Decode HEX bytes as STRUCT and print the JSON
    #[arg(short, long, num_args = 2, value_names = ["STRUCT", "HEX"])]
    decode: Option<Vec<String>>,

    /// Encode a JSON object as STRUCT and print the hex bytes
    #[arg(short = 'E', long, num_args = 2, value_names = ["STRUCT", "JSON"])]
    encode: Option<Vec<String>>,

    /// Multi-byte fields are big endian (default little)
    #[arg(short, long)]
    big_endian: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut interp = Interpreter::new();
    for path in &args.files {
        interp
            .load_file(path)
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        info!(path = %path.display(), "Loaded schema");
    }

    let global = interp.global().clone();
    for name in global.local_names() {
        match global.lookup(&name) {
            Some(Value::Device(device)) => {
                println!(
                    "device {} ({} structure(s), {} api(s))",
                    device.name,
                    device.structures.len(),
                    device.apis.len()
                );
                for api in &device.apis {
                    println!(
                        "  api {} read={} write={}",
                        api.structure,
                        api.read.is_some(),
                        api.write.is_some()
                    );
                }
            }
            Some(Value::Structure(structure)) => {
                let lines = if args.expanded {
                    structure.dump_expanded_lines(&*global)
                } else {
                    structure.dump_lines()
                };
                for line in lines {
                    println!("{}", line);
                }
            }
            _ => {}
        }
    }

    let codec = Codec::new(if args.big_endian {
        Endianness::Big
    } else {
        Endianness::Little
    });
    if let Some([structure, hex]) = args.decode.as_deref() {
        let bytes = parse_hex_bytes(hex)?;
        let json = codec.decode_structure(&mut interp, structure, &bytes)?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    if let Some([structure, json]) = args.encode.as_deref() {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let bytes = codec.encode_structure(&mut interp, structure, &value)?;
        let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{}", hex.join(" "));
    }
    Ok(())
}
