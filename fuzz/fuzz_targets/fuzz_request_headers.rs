//! Fuzz the parsers that see raw client header values.
//!
//! Bearer tokens and `If-None-Match` values arrive straight from the
//! network. Neither path may panic, and no fuzzed token may verify.
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_request_headers -- -max_total_time=60
//! ```

#![no_main]

use std::sync::LazyLock;
use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use site_backend::fingerprint::{Fingerprint, IfNoneMatch};
use site_backend::token::TokenCodec;

static CODEC: LazyLock<TokenCodec> =
    LazyLock::new(|| TokenCodec::new(b"fuzzing-secret-fuzzing-secret-00", Duration::from_secs(3600)));

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    assert!(CODEC.verify(s).is_err(), "fuzzed token verified: {s:?}");

    if let Some(condition) = IfNoneMatch::parse(s) {
        let _ = condition.matches(&Fingerprint::of_bytes(data));
    }
});
