// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn normalize_trims_and_lowercases() {
    assert_eq!(normalize("  Runbook  "), "runbook");
}

#[test]
fn normalize_is_idempotent() {
    let once = normalize("Runbook");
    let twice = normalize(&once);
    assert_eq!(once, twice);
}

proptest::proptest! {
    #[test]
    fn normalize_is_idempotent_for_any_input(s in ".*") {
        let once = normalize(&s);
        let twice = normalize(&once);
        proptest::prop_assert_eq!(once, twice);
    }

    #[test]
    fn normalized_valid_aliases_stay_valid_when_renormalized(s in "[A-Za-z0-9._-]{1,64}") {
        let normalized = normalize(&s);
        proptest::prop_assert!(is_valid(&normalized));
        proptest::prop_assert_eq!(normalize(&normalized).clone(), normalized);
    }
}

#[yare::parameterized(
    simple = { "runbook", true },
    with_dash = { "run-book", true },
    with_dot = { "run.book", true },
    with_underscore = { "run_book", true },
    empty = { "", false },
    too_long = { "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", false },
    has_space = { "run book", false },
    has_slash = { "run/book", false },
)]
fn validity(alias: &str, expected: bool) {
    assert_eq!(is_valid(alias), expected);
}
