use crate::case::{Exhibit, VivaCase};
use crate::session::SessionState;

/// Neutral phrasing substituted when the backend asks to reopen an exhibit.
pub const REPEAT_EXHIBIT_FOLLOW_UP: &str =
    "Taking all findings into account, what would be your next step in management?";

/// The guard's verdict on an advisory exhibit request.
#[derive(Debug, PartialEq)]
pub enum GuardOutcome<'a> {
    /// No request, or the id is not in the catalogue.
    None,
    /// First reveal; the id has been recorded on the session.
    Reveal(&'a Exhibit),
    /// Already revealed this session; the question text must be replaced
    /// with [`REPEAT_EXHIBIT_FOLLOW_UP`] so the exhibit is not re-asked.
    AlreadyRevealed,
}

/// Enforces "each exhibit at most once per session". The backend's request is
/// advisory only; this guard owns the decision and the `revealed_exhibits`
/// set.
pub fn apply_guard<'a>(
    state: &mut SessionState,
    case: &'a VivaCase,
    request: Option<&str>,
) -> GuardOutcome<'a> {
    let Some(id) = request else {
        return GuardOutcome::None;
    };

    let Some(exhibit) = case.exhibit(id) else {
        tracing::warn!(exhibit_id = %id, "Backend requested unknown exhibit, dropping");
        return GuardOutcome::None;
    };

    if state.revealed_exhibits.contains(id) {
        tracing::info!(exhibit_id = %id, "Backend re-requested a revealed exhibit, substituting follow-up");
        return GuardOutcome::AlreadyRevealed;
    }

    state.revealed_exhibits.insert(id.to_string());
    GuardOutcome::Reveal(exhibit)
}
