#[cfg(test)]
mod tests {
    use crate::state::{Admission, GuardState, Transition};

    #[test]
    fn test_transition_grants_once() {
        let mut machine = Transition::new();
        assert_eq!(machine.state(), GuardState::Idle);

        assert_eq!(machine.begin(), Admission::Granted);
        assert_eq!(machine.state(), GuardState::Running);

        // Concurrent or re-entrant claim while running
        assert_eq!(machine.begin(), Admission::Skipped(GuardState::Running));
    }

    #[test]
    fn test_transition_never_reverts() {
        let mut machine = Transition::new();
        machine.begin();
        machine.complete();
        assert_eq!(machine.state(), GuardState::Completed);

        for _ in 0..3 {
            assert_eq!(machine.begin(), Admission::Skipped(GuardState::Completed));
        }
        machine.complete();
        assert_eq!(machine.state(), GuardState::Completed);
    }

    #[test]
    fn test_state_encoding() {
        for state in [GuardState::Idle, GuardState::Running, GuardState::Completed] {
            assert_eq!(GuardState::from_u8(state.as_u8()), state);
        }
        // Unknown encodings must never look idle
        assert_eq!(GuardState::from_u8(200), GuardState::Completed);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(GuardState::Idle.to_string(), "idle");
        assert_eq!(GuardState::Running.to_string(), "running");
        assert_eq!(GuardState::Completed.to_string(), "completed");
    }
}
