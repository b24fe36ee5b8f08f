use serde_json::Value;
use std::collections::HashMap;

/// Question text used when the backend produced nothing displayable.
pub const DEFAULT_QUESTION: &str = "Please continue. What would you do next?";

/// What the examiner backend asked for, after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Question,
    End,
}

/// The strict internal shape every backend reply is normalized into. The
/// backend is prose generation, not a typed API; this is the contract
/// boundary that lets the rest of the engine pretend otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ExaminerReply {
    pub kind: ReplyKind,
    pub text: String,
    /// Advisory exhibit request; the exhibit guard owns the final decision.
    pub exhibit_request: Option<String>,
    /// Advisory score movements keyed by dimension name; unknown keys are
    /// dropped later by the score accumulator.
    pub score_delta: Option<HashMap<String, f64>>,
}

impl ExaminerReply {
    fn fallback() -> Self {
        Self {
            kind: ReplyKind::Question,
            text: DEFAULT_QUESTION.to_string(),
            exhibit_request: None,
            score_delta: None,
        }
    }

    fn verbatim(text: &str) -> Self {
        Self {
            kind: ReplyKind::Question,
            text: text.to_string(),
            exhibit_request: None,
            score_delta: None,
        }
    }
}

/// Normalizes raw backend output into an [`ExaminerReply`].
///
/// Priority order, first match wins:
/// 1. empty input → fallback question;
/// 2. code fences stripped, then strict JSON parse;
/// 3. a parsed object whose `text` field is itself JSON-encoded is unwrapped
///    one level, falling back to the outer object's fields;
/// 4. anything unparseable is kept verbatim as the question text, so a parse
///    failure never drops candidate-visible content.
///
/// Never fails; every path yields a displayable turn.
pub fn normalize(raw: &str) -> ExaminerReply {
    let stripped = strip_code_fences(raw.trim());
    if stripped.is_empty() {
        return ExaminerReply::fallback();
    }

    match serde_json::from_str::<Value>(stripped) {
        Ok(value) => reply_from_value(&value),
        Err(_) => ExaminerReply::verbatim(stripped),
    }
}

/// Removes a single surrounding Markdown code fence, with or without a
/// language tag, as LLMs habitually wrap JSON in one.
fn strip_code_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the language tag line, e.g. "json".
    match rest.split_once('\n') {
        Some((first_line, body)) if !first_line.trim().is_empty() => body.trim(),
        _ => rest.trim(),
    }
}

fn reply_from_value(value: &Value) -> ExaminerReply {
    match value {
        // A bare JSON string is just question prose.
        Value::String(s) if !s.trim().is_empty() => ExaminerReply::verbatim(s.trim()),
        Value::Object(obj) => {
            // Some backends nest the real payload as JSON inside `text`.
            // Unwrap one level only; anything deeper is treated as prose.
            if let Some(Value::String(inner)) = obj.get("text") {
                if let Ok(Value::Object(inner_obj)) = serde_json::from_str::<Value>(inner) {
                    return reply_from_object(&inner_obj);
                }
            }
            reply_from_object(obj)
        }
        _ => ExaminerReply::fallback(),
    }
}

fn reply_from_object(obj: &serde_json::Map<String, Value>) -> ExaminerReply {
    let kind = match obj.get("type").or_else(|| obj.get("kind")).and_then(Value::as_str) {
        Some("end") => ReplyKind::End,
        _ => ReplyKind::Question,
    };

    let text = obj
        .get("text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_QUESTION)
        .to_string();

    let exhibit_request = obj
        .get("action")
        .or_else(|| obj.get("exhibit"))
        .and_then(Value::as_str)
        .map(exhibit_id_from_action)
        .filter(|id| !id.is_empty());

    let score_delta = obj.get("scoreDelta").and_then(Value::as_object).map(|delta| {
        delta
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
            .collect::<HashMap<String, f64>>()
    });

    ExaminerReply {
        kind,
        text,
        exhibit_request,
        score_delta: score_delta.filter(|d| !d.is_empty()),
    }
}

/// The prompt instructs the backend to phrase exhibit requests as
/// `open-img-<id>`; accept that, a plain `open-` prefix, or a bare id.
fn exhibit_id_from_action(action: &str) -> String {
    let action = action.trim();
    action
        .strip_prefix("open-img-")
        .or_else(|| action.strip_prefix("open-"))
        .unwrap_or(action)
        .to_string()
}
