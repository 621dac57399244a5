//! Thin wrappers around `time::OffsetDateTime` so storage and scheduling
//! code agree on one clock source and one serialization shape.

use time::OffsetDateTime;

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Whole seconds until `deadline`, clamped to zero if already past.
pub fn seconds_until(deadline: OffsetDateTime) -> i64 {
    let now = now_utc();
    if deadline <= now {
        0
    } else {
        (deadline - now).whole_seconds()
    }
}
