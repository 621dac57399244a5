//! Surrogate-key helpers shared by every crate that needs to name a row
//! before it has been inserted (events, logs, single-flight keys).

use uuid::Uuid;

/// Database primary keys are plain `i64` (see `portcullis-storage`); this
/// alias exists so call sites read as "a credential id" rather than a bare
/// integer.
pub type CredentialId = i64;

/// A process-local, non-persisted correlation id for one proxied request,
/// threaded through `tracing` spans and the `Event` stream.
pub fn new_trace_id() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(new_trace_id(), new_trace_id());
    }
}
