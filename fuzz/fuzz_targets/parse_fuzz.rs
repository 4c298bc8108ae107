//! Parser fuzz target: feed arbitrary text to the input-file parser, schema-less
//! and with the built-in registry. Parsing must not panic; whatever parses must
//! serialize and reparse to the same keys and values, and a layout-preserving
//! rewrite must reparse to the same record.
//! Build with: cargo fuzz run parse_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    use remora_params::{parse, Codec, SerializeOptions};

    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(parsed) = parse(s) {
        let codec = Codec::schemaless();

        // Prefix grouping may reorder keys, so compare by key.
        let text = codec.serialize(&parsed.record, &SerializeOptions::complete());
        let again = parse(&text).expect("serialized text must reparse");
        assert_eq!(again.record.len(), parsed.record.len(), "{text:?}");
        for (key, value) in parsed.record.iter() {
            assert_eq!(again.record.get(key), Some(value), "{key} in {text:?}");
        }

        let text = codec.rewrite(&parsed.document, &parsed.record, &SerializeOptions::default());
        let again = parse(&text).expect("rewritten text must reparse");
        assert_eq!(again.record, parsed.record, "{text:?}");
    }
    if let Ok(registry) = remora_params::Registry::builtin() {
        if let Ok(parsed) = Codec::new(&registry).parse(s) {
            let _ = remora_params::evaluate(&parsed.record, &registry);
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run parse_fuzz");
}
