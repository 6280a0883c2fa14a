//! Fuzz target for principal parsing.
//!
//! Malformed `<kind>:<email>` input must be rejected without panicking,
//! and anything accepted must survive a display/parse round trip.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_principal_parse -- -max_total_time=600

#![no_main]

use libfuzzer_sys::fuzz_target;
use provisio_core::principal::Principal;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(principal) = s.parse::<Principal>() {
        let member = principal.member();
        let reparsed: Principal = member.parse().unwrap();
        assert_eq!(principal, reparsed);
        assert!(!principal.email().is_empty());
    }

    // CLI form: target type and email given separately
    if let Some((kind, email)) = s.split_once('|') {
        let _ = Principal::new(kind, email);
    }
});
