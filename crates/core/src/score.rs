use std::collections::HashMap;

use crate::session::{Dimension, DimensionScores, FinalScores};

/// Applies the backend's advisory score movements to the running scores.
///
/// The backend's numeric judgement is not trusted: each per-dimension delta
/// is clamped to `cap` before it is applied, and keys that are not one of the
/// four fixed dimensions are ignored.
pub fn apply_delta(scores: &mut DimensionScores, delta: &HashMap<String, f64>, cap: f64) {
    for (key, &raw) in delta {
        let Some(dim) = Dimension::from_key(key) else {
            tracing::debug!(key = %key, "Ignoring score delta for unknown dimension");
            continue;
        };
        if !raw.is_finite() {
            continue;
        }
        let applied = raw.clamp(-cap, cap);
        if applied != raw {
            tracing::info!(
                dimension = dim.key(),
                requested = raw,
                applied,
                "Clamping out-of-cap score delta"
            );
        }
        scores.add(dim, applied);
    }
}

/// Snaps one running score onto the discrete final scale.
pub fn snap(score: f64) -> u8 {
    if score < 4.5 {
        4
    } else if score < 5.5 {
        5
    } else if score < 6.5 {
        6
    } else if score < 7.5 {
        7
    } else {
        8
    }
}

/// Snaps all four dimensions; every final score lands in 4..=8.
pub fn snap_all(scores: &DimensionScores) -> FinalScores {
    FinalScores {
        basic_knowledge: snap(scores.basic_knowledge),
        higher_order: snap(scores.higher_order),
        clinical_skills: snap(scores.clinical_skills),
        professionalism: snap(scores.professionalism),
    }
}
