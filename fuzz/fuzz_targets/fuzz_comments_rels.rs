#![no_main]

use libfuzzer_sys::fuzz_target;

use formula_parts::rels::{find_comments_target, parse_relationships};

const MAX_INPUT_BYTES: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_BYTES)];

    // Both must return (never panic) on arbitrary input.
    let _ = find_comments_target(data);
    let _ = parse_relationships(data);
});
