//! Inspect, convert, encode and decode message specs.
//!
//! Usage:
//!   udpapi convert <IN> <OUT>                      Re-write a spec in the notation of OUT's extension
//!   udpapi show <FILE>                             List messages with their wire sizes
//!   udpapi encode <FILE> <MESSAGE> [KEY=VALUE ...] Print the request bytes as hex
//!   udpapi decode <FILE> <MESSAGE> <HEX>           Print the decoded request fields
//!
//! Keys are `header.<field>`, `payload.<field>` or `payload.<field>.<bit>`.
//! Set `RUST_LOG=udpapi=debug` to see skipped IDL lines and fail-soft fields.

use anyhow::{bail, Context};
use std::collections::HashMap;
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use udpapi::dump::{hex_dump, message_to_dump};
use udpapi::{encode_fields, parse_file, save_to_file, Codec, Spec};

const USAGE: &str = "usage: udpapi <convert IN OUT | show FILE | encode FILE MESSAGE [KEY=VALUE ...] | decode FILE MESSAGE HEX>";

fn load(path: &str) -> anyhow::Result<Spec> {
    parse_file(path).with_context(|| format!("loading {}", path))
}

fn show(spec: &Spec) {
    println!("{} ({})", spec.info.title, spec.info.version);
    if !spec.info.description.is_empty() {
        println!("  {}", spec.info.description);
    }
    for server in &spec.servers {
        println!("server {} {}:{}", server.name, server.ip, server.port);
    }
    for (name, message) in &spec.messages {
        let request = message.request.as_ref().map(|r| r.total_size()).unwrap_or(0);
        match &message.response {
            Some(response) => println!(
                "{:32} request {:4} bytes  response {:4} bytes",
                name,
                request,
                response.total_size()
            ),
            None => println!("{:32} request {:4} bytes", name, request),
        }
    }
}

fn parse_assignments(args: &[String]) -> anyhow::Result<HashMap<String, String>> {
    args.iter()
        .map(|a| {
            a.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .with_context(|| format!("expected KEY=VALUE, got {:?}", a))
        })
        .collect()
}

fn parse_hex(text: &str) -> anyhow::Result<Vec<u8>> {
    let digits: String = text
        .split_whitespace()
        .map(|t| t.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    if !digits.is_ascii() {
        bail!("hex input must be ASCII");
    }
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte {:?}", &digits[i..i + 2]))
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("udpapi=warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };
    match (command.as_str(), &args[1..]) {
        ("convert", [input, output]) => {
            let spec = load(input)?;
            save_to_file(&spec, Path::new(output)).with_context(|| format!("writing {}", output))?;
            eprintln!("{} -> {} ({} messages)", input, output, spec.messages.len());
        }
        ("show", [file]) => show(&load(file)?),
        ("encode", [file, message, rest @ ..]) => {
            let spec = load(file)?;
            let values = parse_assignments(rest)?;
            let schema = Codec::new(&spec).request_schema(message)?;
            let mut bytes = Vec::with_capacity(schema.total_size());
            for field in encode_fields(schema, &values) {
                if let Some(cause) = field.encoding.failure() {
                    eprintln!("warning: {} zero-filled: {}", field.key, cause);
                }
                bytes.extend_from_slice(field.encoding.bytes());
            }
            println!("{}", hex_dump(&bytes));
        }
        ("decode", [file, message, hex @ ..]) if !hex.is_empty() => {
            let spec = load(file)?;
            let bytes = parse_hex(&hex.join(" "))?;
            let decoded = Codec::new(&spec).decode_request(message, &bytes)?;
            println!("{}", message_to_dump(&decoded));
        }
        _ => bail!(USAGE),
    }
    Ok(())
}
