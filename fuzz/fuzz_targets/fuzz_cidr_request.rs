//! Fuzz target for CIDR literal parsing and allocation request checks.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_cidr_request -- -max_total_time=600

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use provisio_core::address::parse_cidr;
use provisio_core::allocator::CidrAllocator;

#[derive(Arbitrary, Debug)]
struct RequestInput {
    supernet: String,
    prefix_length: u8,
}

fuzz_target!(|input: RequestInput| {
    if input.supernet.len() > 256 {
        return;
    }

    let Ok(parent) = parse_cidr(&input.supernet) else {
        return;
    };
    assert_eq!(parse_cidr(&parent.to_string()).unwrap(), parent);

    if CidrAllocator::validate_request(parent, input.prefix_length).is_ok() {
        assert!(input.prefix_length > parent.prefix());
        assert!(input.prefix_length <= if parent.is_ipv4() { 32 } else { 128 });
    }
});
