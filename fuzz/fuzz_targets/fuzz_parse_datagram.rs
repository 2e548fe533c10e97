#![no_main]

use libfuzzer_sys::fuzz_target;
use statsd_ingest::parser::parse_datagram;

// Fuzz target focusing on whole-datagram parsing: multiple lines, mixed
// malformed/well-formed content, embedded NULs and non-UTF8 byte runs
// lossily coerced the same way the receive loop coerces a raw buffer.
fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let results = parse_datagram(&text);

    // Every malformed line must carry a bounded-length echo, matching the
    // receive loop's truncated debug snapshot.
    for result in results {
        if let Err(err) = result {
            assert!(err.echo.len() <= statsd_ingest::parser::MALFORMED_LINE_ECHO_LEN);
        }
    }
});
