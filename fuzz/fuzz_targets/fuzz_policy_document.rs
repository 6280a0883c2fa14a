//! Fuzz target for policy document decoding and the binding diff engine.
//!
//! Any valid decoded document must accept a grant twice with the second
//! pass producing no change, and a revoke must not leave behind a binding
//! it emptied.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_policy_document -- -max_total_time=600

#![no_main]

use libfuzzer_sys::fuzz_target;
use provisio_core::diff::BindingDiffEngine;
use provisio_core::policy::PolicyDocument;
use provisio_core::principal::Principal;
use provisio_core::roles::Role;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(document) = PolicyDocument::from_json(raw) else {
        return;
    };
    if document.validate().is_err() {
        return;
    }

    let principal = Principal::service_account("fuzz@proj.iam.gserviceaccount.com").unwrap();
    let roles = vec![Role::new("roles/viewer"), Role::new("roles/editor")];

    let (once, _) = BindingDiffEngine::apply_desired_roles(&document, &principal, &roles);
    let (twice, delta) = BindingDiffEngine::apply_desired_roles(&once, &principal, &roles);
    assert!(delta.is_noop());
    assert_eq!(once, twice);
    assert_eq!(once.etag, document.etag);

    let (revoked, _) = BindingDiffEngine::revoke_role(&once, &principal, &roles[0]);
    let empty_of = |doc: &PolicyDocument| {
        doc.bindings
            .iter()
            .filter(|b| b.role == roles[0] && b.members.is_empty())
            .count()
    };
    assert_eq!(empty_of(&revoked), empty_of(&once));
    assert!(!revoked.members_of(&roles[0]).contains(&principal.member().as_str()));

    // Unknown fields survive a re-encode
    let reparsed = PolicyDocument::from_json(&once.to_json_pretty()).unwrap();
    assert_eq!(
        reparsed.extra.keys().collect::<Vec<_>>(),
        once.extra.keys().collect::<Vec<_>>()
    );
});
