use crate::case::VivaCase;
use crate::session::{Role, SessionState};

/// How many trailing transcript entries are fed back to the backend.
const TRANSCRIPT_WINDOW: usize = 8;

/// Standing instructions for the examiner backend. The strict JSON output
/// contract here is what the response normalizer expects on the way back.
pub const EXAMINER_SYSTEM_PROMPT: &str = "\
You are a senior medical examiner conducting a structured clinical viva. \
Your role is to assess, not teach. Your tone is calm, neutral and professional.

QUESTIONING RULES:
- Ask ONE examiner-style question only, testing a single clinical judgement.
- Shape each question directly from the candidate's previous answer.
- Never repeat a question. If an answer is unclear, move forward.
- Assume answers may be poorly transcribed speech; infer clinical intent.

EXHIBIT RULES:
- Request an exhibit only when it advances assessment, using its exact id.
- Each exhibit may be requested AT MOST ONCE in the entire viva.
- After an exhibit, move to a different clinical domain.

SCORING (INTERNAL ONLY):
- Assess four dimensions: basic_knowledge, higher_order, clinical_skills, professionalism.
- Apply SMALL score changes per question, within realistic viva variance.
- Never disclose scores to the candidate.

OUTPUT FORMAT (STRICT, JSON ONLY, no extra text):
{
  \"type\": \"question\" | \"end\",
  \"text\": \"string\",
  \"action\": \"open-img-<exact_id>\" | null,
  \"scoreDelta\": { \"basic_knowledge\": number, \"higher_order\": number, \"clinical_skills\": number, \"professionalism\": number }
}";

/// Assembles the full prompt context for one question-generation call: case
/// stem, internal objectives, exhibit registry, accumulated session memory,
/// a trailing transcript window, and the last candidate answer.
pub fn build_prompt(case: &VivaCase, state: &SessionState, last_answer: &str) -> String {
    let exhibit_registry = case
        .exhibits
        .iter()
        .map(|e| format!("- {} -> {}: {}", e.id, e.label, e.description))
        .collect::<Vec<_>>()
        .join("\n");

    let covered = if state.covered_objectives.is_empty() {
        "None".to_string()
    } else {
        state.covered_objectives.join("\n")
    };

    let notes = if state.memory_notes.is_empty() {
        "None".to_string()
    } else {
        state.memory_notes.join("\n")
    };

    let transcript = state
        .transcript
        .iter()
        .rev()
        .take(TRANSCRIPT_WINDOW)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|entry| format!("{}: {}", entry.role.label(), entry.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{system}\n\n\
         CASE CONTEXT:\n{stem}\n\n\
         OBJECTIVES (INTERNAL):\n{objectives}\n\n\
         AVAILABLE EXHIBITS (USE EXACT IDS ONLY):\n{exhibits}\n\n\
         ALREADY COVERED OBJECTIVES:\n{covered}\n\n\
         EXAMINER NOTES SO FAR:\n{notes}\n\n\
         RECENT CONVERSATION:\n{transcript}\n\n\
         LAST CANDIDATE ANSWER:\n\"{answer}\"",
        system = EXAMINER_SYSTEM_PROMPT,
        stem = case.stem,
        objectives = case.objectives.join("\n"),
        exhibits = exhibit_registry,
        covered = covered,
        notes = notes,
        transcript = transcript,
        answer = last_answer,
    )
}
