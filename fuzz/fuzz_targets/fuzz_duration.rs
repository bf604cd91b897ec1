#![no_main]

//! Fuzz target for duration literals.
//!
//! Parsing must never panic, must agree with the grammar check used during
//! validation, and the lookback threshold derived from any accepted literal
//! must never lie in the future.

use arbitrary::Arbitrary;
use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;

use commentql::duration::{self, CalendarUnit};

#[derive(Arbitrary, Debug)]
struct DurationInput {
    literal: String,
    /// Seconds since the epoch for "now"
    now_secs: u32,
}

fuzz_target!(|input: DurationInput| {
    let parsed = duration::parse(&input.literal);
    assert_eq!(parsed.is_ok(), duration::matches(&input.literal));

    let Ok(spec) = parsed else {
        return;
    };
    assert!(spec.amount >= 0);

    let Some(now) = DateTime::<Utc>::from_timestamp(i64::from(input.now_secs), 0) else {
        return;
    };
    assert!(spec.lookback_from(now, CalendarUnit::Day) <= now);
});
