#![no_main]
use libfuzzer_sys::fuzz_target;

// Feed arbitrary bytes to the path-expression compiler.
// Catches panics on bad escapes, index overflow and deep nesting. Any
// expression that compiles must print back to one that compiles to the
// same tree.
fuzz_target!(|data: &[u8]| {
    if let Ok(query) = jpick::compile(data) {
        let shown = query.to_string();
        let again = jpick::compile(shown.as_bytes()).expect("canonical form must compile");
        assert_eq!(again, query, "canonical form changed the tree: {shown}");
    }
});
