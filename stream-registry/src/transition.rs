use analytics_types::StreamState;

/// Whether moving from `from` to `to` is a legal lifecycle transition.
/// Checked in exactly one place so every caller goes through the same
/// table, mirroring the explicit state-machine discipline the teacher
/// applies at compile time via typestate — done here as a runtime table
/// since stream lifecycle is driven by external commands, not known
/// ahead of time.
pub fn is_allowed(from: StreamState, to: StreamState) -> bool {
    use StreamState::*;
    match (from, to) {
        (Inactive, Activating) => true,
        (Activating, Active) => true,
        (Active, Deactivating) => true,
        (Deactivating, Inactive) => true,
        (_, Error) => true,
        (Error, Inactive) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_happy_path_is_allowed() {
        assert!(is_allowed(StreamState::Inactive, StreamState::Activating));
        assert!(is_allowed(StreamState::Activating, StreamState::Active));
        assert!(is_allowed(StreamState::Active, StreamState::Deactivating));
        assert!(is_allowed(StreamState::Deactivating, StreamState::Inactive));
    }

    #[test]
    fn any_state_can_go_fatal() {
        assert!(is_allowed(StreamState::Active, StreamState::Error));
        assert!(is_allowed(StreamState::Activating, StreamState::Error));
        assert!(is_allowed(StreamState::Inactive, StreamState::Error));
    }

    #[test]
    fn skipping_a_step_is_rejected() {
        assert!(!is_allowed(StreamState::Inactive, StreamState::Active));
        assert!(!is_allowed(StreamState::Active, StreamState::Inactive));
    }

    #[test]
    fn error_only_leaves_via_explicit_stop_to_inactive() {
        assert!(is_allowed(StreamState::Error, StreamState::Inactive));
        assert!(!is_allowed(StreamState::Error, StreamState::Active));
    }
}
