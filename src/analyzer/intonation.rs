//! Intonation scoring against the expected scale degrees.
//!
//! Position i of the performance is graded against degree i of the scale, by
//! pitch class only. There is no re-alignment: a missed or extra onset shifts
//! every later note and shows up as wrong notes.

use super::segment::SegmentedPerformance;
use super::{AnalysisError, Stage};
use crate::scales::{self, ScaleDefinition, SCALE_DEGREES};
use serde::{Deserialize, Serialize};

/// A graded position that did not match the scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// Detected label including octave, or "none".
    pub played: String,
    /// Scale spelling of the expected degree.
    pub correct: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntonationResult {
    /// Correct degrees out of 7.
    pub score: u8,
    pub mismatches: Vec<Mismatch>,
}

pub fn score(
    scale: &ScaleDefinition,
    performance: &SegmentedPerformance,
) -> Result<IntonationResult, AnalysisError> {
    if performance.len() < SCALE_DEGREES {
        return Err(AnalysisError::InsufficientOnsets {
            stage: Stage::Intonation,
            found: performance.len(),
            required: SCALE_DEGREES,
        });
    }

    let mut score = 0u8;
    let mut mismatches = Vec::new();

    for (expected, event) in scale.degrees().iter().zip(&performance.events) {
        let played_class = event.label.as_deref().and_then(scales::pitch_class);
        if played_class.is_some() && played_class == scales::pitch_class(expected) {
            score += 1;
        } else {
            mismatches.push(Mismatch {
                played: event.label_or_none().to_string(),
                correct: expected.to_string(),
            });
        }
    }

    Ok(IntonationResult { score, mismatches })
}
