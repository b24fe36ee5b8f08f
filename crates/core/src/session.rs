use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::protocol::EndReport;

/// The four fixed scoring dimensions of the viva.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    BasicKnowledge,
    HigherOrder,
    ClinicalSkills,
    Professionalism,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::BasicKnowledge,
        Dimension::HigherOrder,
        Dimension::ClinicalSkills,
        Dimension::Professionalism,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Dimension::BasicKnowledge => "basic_knowledge",
            Dimension::HigherOrder => "higher_order",
            Dimension::ClinicalSkills => "clinical_skills",
            Dimension::Professionalism => "professionalism",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "basic_knowledge" => Some(Dimension::BasicKnowledge),
            "higher_order" => Some(Dimension::HigherOrder),
            "clinical_skills" => Some(Dimension::ClinicalSkills),
            "professionalism" => Some(Dimension::Professionalism),
            _ => None,
        }
    }
}

/// Running real-valued scores, one per dimension, each starting at the
/// midpoint of the final 4..=8 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionScores {
    pub basic_knowledge: f64,
    pub higher_order: f64,
    pub clinical_skills: f64,
    pub professionalism: f64,
}

pub const SCORE_MIDPOINT: f64 = 4.0;

impl Default for DimensionScores {
    fn default() -> Self {
        Self {
            basic_knowledge: SCORE_MIDPOINT,
            higher_order: SCORE_MIDPOINT,
            clinical_skills: SCORE_MIDPOINT,
            professionalism: SCORE_MIDPOINT,
        }
    }
}

impl DimensionScores {
    pub fn get(&self, dim: Dimension) -> f64 {
        match dim {
            Dimension::BasicKnowledge => self.basic_knowledge,
            Dimension::HigherOrder => self.higher_order,
            Dimension::ClinicalSkills => self.clinical_skills,
            Dimension::Professionalism => self.professionalism,
        }
    }

    pub fn add(&mut self, dim: Dimension, delta: f64) {
        match dim {
            Dimension::BasicKnowledge => self.basic_knowledge += delta,
            Dimension::HigherOrder => self.higher_order += delta,
            Dimension::ClinicalSkills => self.clinical_skills += delta,
            Dimension::Professionalism => self.professionalism += delta,
        }
    }
}

/// Final scores snapped to the discrete 4..=8 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScores {
    pub basic_knowledge: u8,
    pub higher_order: u8,
    pub clinical_skills: u8,
    pub professionalism: u8,
}

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Examiner,
    Candidate,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Examiner => "EXAMINER",
            Role::Candidate => "CANDIDATE",
        }
    }
}

/// One entry of the session transcript.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
}

/// The lifecycle phase of a session. `Ended` is terminal and carries the
/// finalized payload, which is re-emitted verbatim for every later turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    NotStarted,
    InProgress,
    Ended(EndReport),
}

/// The complete mutable state of one examination session. Created lazily on
/// the first turn request for a session id and mutated only by the turn
/// controller.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    pub questions_asked: u32,
    /// Caller-reported elapsed time; the core trusts it as the timing source.
    pub time_elapsed_sec: u64,
    pub scores: DimensionScores,
    /// Append-only; owned by the exhibit guard.
    pub revealed_exhibits: HashSet<String>,
    /// Append-only advisory topic tags inferred from candidate answers.
    pub covered_objectives: Vec<String>,
    /// Append-only advisory notes fed back into the next prompt.
    pub memory_notes: Vec<String>,
    pub transcript: Vec<TranscriptEntry>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: Phase::NotStarted,
            questions_asked: 0,
            time_elapsed_sec: 0,
            scores: DimensionScores::default(),
            revealed_exhibits: HashSet::new(),
            covered_objectives: Vec::new(),
            memory_notes: Vec::new(),
            transcript: Vec::new(),
        }
    }

    pub fn push_transcript(&mut self, role: Role, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            role,
            text: text.into(),
        });
    }

    pub fn cover_objective(&mut self, tag: &str) {
        if !self.covered_objectives.iter().any(|t| t == tag) {
            self.covered_objectives.push(tag.to_string());
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
