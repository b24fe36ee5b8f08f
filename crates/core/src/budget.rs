use crate::case::VivaRules;
use crate::session::SessionState;

/// Whether the session budget is exhausted. Pure; evaluated before any
/// backend call so ending never costs a network round trip.
pub fn should_end(state: &SessionState, rules: &VivaRules) -> bool {
    state.time_elapsed_sec >= rules.max_duration_minutes * 60
        || state.questions_asked >= rules.max_questions
}
