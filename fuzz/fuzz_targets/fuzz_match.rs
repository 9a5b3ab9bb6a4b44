#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use jpick::OutputConfig;

const SELECTORS: &[&str] = &[
    "",
    ".a",
    ".*",
    "[*]",
    "[0]",
    ".a.b",
    ".*[*]",
    "{.a,.b}",
    "{.a,.a.b}",
    "[*]{.a,[1]}",
    "{}",
];

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    selector: u8,
    raw: bool,
    stream: bool,
    json: &'a [u8],
}

// Run the matcher over arbitrary bytes. Malformed input must come back as
// an error, never a panic, an arena imbalance or a hang.
fuzz_target!(|input: Input<'_>| {
    let expr = SELECTORS[input.selector as usize % SELECTORS.len()];
    let Ok(query) = jpick::compile(expr.as_bytes()) else {
        return;
    };
    let config = OutputConfig {
        raw: input.raw,
        ..Default::default()
    };
    let mut out = Vec::new();
    let _ = if input.stream {
        jpick::match_stream(input.json, &query, &config, &mut out)
    } else {
        jpick::match_once(input.json, &query, &config, &mut out)
    };
});
