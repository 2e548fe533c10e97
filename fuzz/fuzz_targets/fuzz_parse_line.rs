#![no_main]

use libfuzzer_sys::fuzz_target;
use statsd_ingest::parser::parse_line;

// Fuzz target focusing on single-line parsing, the surface the wire
// parser exposes to arbitrary UDP senders.
fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    // Must never panic regardless of how malformed the line is.
    let _ = parse_line(line);
});
