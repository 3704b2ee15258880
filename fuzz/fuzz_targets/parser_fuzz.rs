//! Fuzz the text front ends and the decoder.
//!
//! Input text goes through the IDL parser (then `lower` and `raise`) and the JSON
//! reader. The raw bytes are decoded against every request of the resulting
//! specs and of the default spec. None of these may panic.
//! Build with: cargo fuzz run parser_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn decode_all(spec: &udpapi::Spec, data: &[u8]) {
    for message in spec.messages.values() {
        for schema in message.request.iter().chain(message.response.iter()) {
            let decoded = udpapi::decode(data, schema);
            let _ = udpapi::dump::message_to_dump(&decoded);
        }
    }
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    decode_all(&udpapi::create_default_spec(), data);

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(doc) = udpapi::parse(text) {
        let spec = udpapi::lower(&doc, "fuzz");
        let _ = udpapi::raise(&spec);
        decode_all(&spec, data);
    }
    if let Ok(spec) = udpapi::json::parse(text) {
        let _ = udpapi::json::serialize(&spec);
        let _ = udpapi::raise(&spec);
        decode_all(&spec, data);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run parser_fuzz");
}
