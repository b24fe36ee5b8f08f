use serde::{Deserialize, Serialize};

use crate::case::Exhibit;
use crate::session::FinalScores;

/// One inbound examination turn. `answer_text` may be empty while the speech
/// front-end is still transcribing; `elapsed_seconds` is caller-reported and
/// trusted as the timing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub session_id: String,
    #[serde(default)]
    pub answer_text: String,
    #[serde(default)]
    pub elapsed_seconds: u64,
}

/// Exhibit payload included with a question when the guard admits a reveal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExhibitView {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub asset_ref: String,
    pub description: String,
}

impl From<&Exhibit> for ExhibitView {
    fn from(e: &Exhibit) -> Self {
        Self {
            id: e.id.clone(),
            kind: e.kind.clone(),
            label: e.label.clone(),
            asset_ref: e.asset_ref.clone(),
            description: e.description.clone(),
        }
    }
}

/// The terminal payload of a session: snapped scores plus a short summary.
/// Cached on the session so repeated reads return the identical report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndReport {
    pub scores: FinalScores,
    pub summary: String,
}

/// The single outward action of a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TurnResponse {
    /// No finalized answer is available yet; the caller should retry.
    Wait,
    Question {
        text: String,
        exhibit: Option<ExhibitView>,
    },
    End {
        scores: FinalScores,
        summary: String,
    },
}

impl TurnResponse {
    pub fn from_report(report: &EndReport) -> Self {
        TurnResponse::End {
            scores: report.scores,
            summary: report.summary.clone(),
        }
    }
}
