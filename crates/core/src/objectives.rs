use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::case::ObjectiveRule;

/// Fuzzy-match score above which a keyword counts as mentioned when no exact
/// substring hit is found. Tolerates speech-to-text noise.
const FUZZY_THRESHOLD: i64 = 70;

/// One objective tag detected in a candidate answer, with the keyword that
/// triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedObjective {
    pub tag: String,
    pub keyword: String,
}

impl DetectedObjective {
    /// Short advisory note for the session memory log.
    pub fn memory_note(&self) -> String {
        format!("Candidate addressed {} (mentioned \"{}\")", self.tag, self.keyword)
    }
}

/// Detects objective tags in candidate answers by keyword. Exact substring
/// hits first, fuzzy matching as a fallback for garbled transcripts. Purely
/// advisory memory; never gates a transition.
pub struct ObjectiveTagger {
    rules: Vec<ObjectiveRule>,
    matcher: SkimMatcherV2,
}

impl ObjectiveTagger {
    pub fn new(rules: &[ObjectiveRule]) -> Self {
        Self {
            rules: rules.to_vec(),
            matcher: SkimMatcherV2::default(),
        }
    }

    /// Returns at most one detection per tag, in rule order.
    pub fn detect(&self, answer: &str) -> Vec<DetectedObjective> {
        let answer_lower = answer.to_lowercase();
        self.rules
            .iter()
            .filter_map(|rule| {
                rule.keywords
                    .iter()
                    .find(|kw| self.mentions(&answer_lower, kw))
                    .map(|kw| DetectedObjective {
                        tag: rule.tag.clone(),
                        keyword: kw.clone(),
                    })
            })
            .collect()
    }

    fn mentions(&self, answer_lower: &str, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        if answer_lower.contains(&keyword) {
            return true;
        }
        self.matcher
            .fuzzy_match(answer_lower, &keyword)
            .unwrap_or(0)
            > FUZZY_THRESHOLD
    }
}
