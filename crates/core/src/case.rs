use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A static supporting artifact (image or report) revealable at most once per
/// session. The `description` is the ground truth fed to the examiner backend
/// whenever the exhibit is referenced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exhibit {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub asset_ref: String,
    pub description: String,
}

/// Budget and scoring limits for one examination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VivaRules {
    pub max_duration_minutes: u64,
    pub max_questions: u32,
    /// Largest score movement a single turn may apply to one dimension.
    #[serde(default = "default_score_delta_cap")]
    pub score_delta_cap: f64,
}

fn default_score_delta_cap() -> f64 {
    1.0
}

/// Maps answer keywords onto an abstract objective tag. Advisory memory only;
/// tags never gate a transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveRule {
    pub tag: String,
    pub keywords: Vec<String>,
}

/// The full static content of one examination case: stem, learning
/// objectives, exhibit catalogue, keyword rules, and viva rules. Immutable
/// for the life of the process and safely shared across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VivaCase {
    pub id: String,
    pub title: String,
    pub stem: String,
    pub objectives: Vec<String>,
    pub opening_question: String,
    pub exhibits: Vec<Exhibit>,
    #[serde(default)]
    pub objective_rules: Vec<ObjectiveRule>,
    pub rules: VivaRules,
}

impl VivaCase {
    /// Loads a case definition from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read case file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse case file: {}", path.display()))
    }

    /// Looks up an exhibit by its catalogue id.
    pub fn exhibit(&self, id: &str) -> Option<&Exhibit> {
        self.exhibits.iter().find(|e| e.id == id)
    }

    /// The built-in demonstration case: painless visible hematuria.
    pub fn builtin() -> Self {
        Self {
            id: "case-hematuria-001".to_string(),
            title: "Painless Hematuria Evaluation".to_string(),
            stem: "A 47-year-old male presents with a 3-week history of painless visible \
                   hematuria, without associated dysuria, fever, flank pain, or recent \
                   trauma. There is no history of anticoagulant use. He is haemodynamically \
                   stable at presentation."
                .to_string(),
            objectives: vec![
                "Formulate a differential diagnosis for painless hematuria".to_string(),
                "Select and prioritise appropriate investigations".to_string(),
                "Interpret imaging and report findings".to_string(),
                "Demonstrate safe clinical judgement and escalation".to_string(),
            ],
            opening_question: "Good morning. I will ask you a series of focused questions \
                               about this case. Please answer concisely. Let us begin. What \
                               are the possible causes of painless hematuria?"
                .to_string(),
            exhibits: vec![
                Exhibit {
                    id: "img-ct-001".to_string(),
                    kind: "image".to_string(),
                    label: "CT Urography".to_string(),
                    asset_ref: "img-ct-001.png".to_string(),
                    description: "CT urography demonstrates a filling defect arising from \
                                  the bladder wall."
                        .to_string(),
                },
                Exhibit {
                    id: "rep-urine-001".to_string(),
                    kind: "image".to_string(),
                    label: "Urine Cytology".to_string(),
                    asset_ref: "rep-urine-001.jpeg".to_string(),
                    description: "Urine cytology reveals atypical urothelial cells.".to_string(),
                },
            ],
            objective_rules: vec![
                ObjectiveRule {
                    tag: "investigations".to_string(),
                    keywords: vec![
                        "ct".to_string(),
                        "urine".to_string(),
                        "cystoscopy".to_string(),
                        "cytology".to_string(),
                    ],
                },
                ObjectiveRule {
                    tag: "differential".to_string(),
                    keywords: vec![
                        "carcinoma".to_string(),
                        "tumor".to_string(),
                        "tumour".to_string(),
                        "malignancy".to_string(),
                    ],
                },
                ObjectiveRule {
                    tag: "escalation".to_string(),
                    keywords: vec![
                        "refer".to_string(),
                        "urology".to_string(),
                        "mdt".to_string(),
                        "senior".to_string(),
                    ],
                },
            ],
            rules: VivaRules {
                max_duration_minutes: 40,
                max_questions: 10,
                score_delta_cap: 1.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_case_is_consistent() {
        let case = VivaCase::builtin();
        assert_eq!(case.exhibits.len(), 2);
        assert!(case.exhibit("img-ct-001").is_some());
        assert!(case.exhibit("img-mri-999").is_none());
        assert_eq!(case.rules.max_questions, 10);
    }

    #[test]
    fn test_load_case_from_json_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("case.json");

        let case = VivaCase::builtin();
        let mut file = std::fs::File::create(&path)?;
        write!(file, "{}", serde_json::to_string_pretty(&case)?)?;

        let loaded = VivaCase::from_json_file(&path)?;
        assert_eq!(loaded.id, case.id);
        assert_eq!(loaded.exhibits, case.exhibits);
        assert_eq!(loaded.rules.score_delta_cap, 1.0);
        Ok(())
    }

    #[test]
    fn test_missing_case_file_is_an_error() {
        let err = VivaCase::from_json_file(Path::new("/nonexistent/case.json"));
        assert!(err.is_err());
    }

    #[test]
    fn test_score_delta_cap_defaults_when_absent() {
        let json = r#"{
            "id": "c", "title": "t", "stem": "s",
            "objectives": [], "opening_question": "q",
            "exhibits": [],
            "rules": { "max_duration_minutes": 10, "max_questions": 3 }
        }"#;
        let case: VivaCase = serde_json::from_str(json).unwrap();
        assert_eq!(case.rules.score_delta_cap, 1.0);
    }
}
