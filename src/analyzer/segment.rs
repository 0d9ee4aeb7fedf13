//! Note segmentation: one pitch label per onset.
//!
//! For each onset the voiced frames of a short forward window are reduced to
//! their median frequency, which rides out vibrato and single-frame octave
//! jumps better than the mean. Consecutive onsets that land on the same label
//! are merged, since a single attack is often reported twice upstream.

use super::notes::NoteMapper;
use super::{AnalysisError, OnsetSequence, PitchTrack, Stage};
use crate::config::AnalysisConfig;
use crate::stats;
use serde::Serialize;
use std::fmt;

/// One attacked note in the performance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteEvent {
    pub onset_frame: usize,
    /// Median voiced frequency of the window; `None` when nothing was voiced.
    pub frequency_hz: Option<f64>,
    /// Note name with octave (e.g. "E4"); `None` when no reliable pitch was found.
    pub label: Option<String>,
}

impl NoteEvent {
    pub fn label_or_none(&self) -> &str {
        self.label.as_deref().unwrap_or("none")
    }
}

impl fmt::Display for NoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_or_none())
    }
}

/// Note events in onset order, after repeat collapsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SegmentedPerformance {
    pub events: Vec<NoteEvent>,
}

impl SegmentedPerformance {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.events.iter().map(NoteEvent::label_or_none).collect()
    }
}

/// Label every onset, collapse immediate repeats, and require enough notes to grade.
pub fn segment(
    track: &PitchTrack,
    onsets: &OnsetSequence,
    mapper: &dyn NoteMapper,
    config: &AnalysisConfig,
) -> Result<SegmentedPerformance, AnalysisError> {
    let mut events: Vec<NoteEvent> = Vec::with_capacity(onsets.len());

    for &onset in onsets.frames() {
        let event = label_onset(track, onset, config.note_window, mapper);
        if events.last().is_some_and(|prev| prev.label == event.label) {
            log::trace!("Dropping repeated {} at frame {}", event, onset);
            continue;
        }
        events.push(event);
    }

    if events.len() < config.min_notes {
        return Err(AnalysisError::InsufficientOnsets {
            stage: Stage::Segmentation,
            found: events.len(),
            required: config.min_notes,
        });
    }

    Ok(SegmentedPerformance { events })
}

/// Median voiced frequency of `[onset, onset + window)`, mapped to a note name.
fn label_onset(
    track: &PitchTrack,
    onset: usize,
    window: usize,
    mapper: &dyn NoteMapper,
) -> NoteEvent {
    let end = onset.saturating_add(window).min(track.len());
    let mut voiced: Vec<f64> = (onset..end).filter_map(|f| track.voiced(f)).collect();

    let frequency_hz = if voiced.is_empty() {
        None
    } else {
        Some(stats::median(&mut voiced))
    };
    let label = frequency_hz.and_then(|hz| mapper.to_note(hz));

    NoteEvent { onset_frame: onset, frequency_hz, label }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::notes::EqualTemperament;

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    fn onsets(v: &[usize]) -> OnsetSequence {
        OnsetSequence::new(v.to_vec()).unwrap()
    }

    /// Build a track of `(frequency, frames)` runs; frequency 0 means unvoiced.
    fn track(runs: &[(f64, usize)]) -> PitchTrack {
        let mut frames = Vec::new();
        for &(hz, n) in runs {
            let v = if hz > 0.0 { Some(hz) } else { None };
            frames.extend(std::iter::repeat_n(v, n));
        }
        PitchTrack::new(frames)
    }

    #[test]
    fn test_labels_each_onset() {
        let t = track(&[
            (261.63, 10), (293.66, 10), (329.63, 10), (349.23, 10),
            (392.0, 10), (440.0, 10), (493.88, 10),
        ]);
        let seg = segment(&t, &onsets(&[0, 10, 20, 30, 40, 50, 60]), &EqualTemperament::default(), &config())
            .unwrap();
        assert_eq!(seg.labels(), vec!["C4", "D4", "E4", "F4", "G4", "A4", "B4"]);
        assert_eq!(seg.events[3].onset_frame, 30);
    }

    #[test]
    fn test_median_ignores_octave_blip() {
        // Two frames jump an octave; the median stays on A4
        let t = PitchTrack::new(vec![
            Some(440.0), Some(880.0), Some(441.0), Some(880.0), Some(439.0),
        ]);
        let ev = label_onset(&t, 0, 10, &EqualTemperament::default());
        assert_eq!(ev.label.as_deref(), Some("A4"));
        assert_eq!(ev.frequency_hz, Some(441.0));
    }

    #[test]
    fn test_unvoiced_window_is_none() {
        let t = track(&[(0.0, 10), (440.0, 10)]);
        let ev = label_onset(&t, 0, 10, &EqualTemperament::default());
        assert_eq!(ev.label, None);
        assert_eq!(ev.to_string(), "none");

        // Onset past the end of the track
        let ev = label_onset(&t, 50, 10, &EqualTemperament::default());
        assert_eq!(ev.label, None);
    }

    #[test]
    fn test_unvoiced_frames_skipped_within_window() {
        let t = track(&[(0.0, 8), (329.63, 2)]);
        let ev = label_onset(&t, 0, 10, &EqualTemperament::default());
        assert_eq!(ev.label.as_deref(), Some("E4"));
    }

    #[test]
    fn test_collapses_double_triggered_onsets() {
        let t = track(&[
            (261.63, 20), (293.66, 10), (329.63, 10), (349.23, 10),
            (392.0, 10), (440.0, 10), (493.88, 10),
        ]);
        // Onsets at 0 and 10 both read C4
        let seg = segment(
            &t,
            &onsets(&[0, 10, 20, 30, 40, 50, 60, 70]),
            &EqualTemperament::default(),
            &config(),
        )
        .unwrap();
        assert_eq!(seg.labels(), vec!["C4", "D4", "E4", "F4", "G4", "A4", "B4"]);
        assert_eq!(seg.events[1].onset_frame, 20);
    }

    #[test]
    fn test_repeat_only_collapses_when_adjacent() {
        // C D C is three notes, not two
        let t = track(&[(261.63, 10), (293.66, 10), (261.63, 10)]);
        let mut cfg = config();
        cfg.min_notes = 3;
        let seg = segment(&t, &onsets(&[0, 10, 20]), &EqualTemperament::default(), &cfg).unwrap();
        assert_eq!(seg.labels(), vec!["C4", "D4", "C4"]);
    }

    #[test]
    fn test_too_few_notes_after_collapse() {
        let t = track(&[(261.63, 40), (293.66, 40)]);
        let err = segment(
            &t,
            &onsets(&[0, 10, 20, 30, 40, 50, 60, 70]),
            &EqualTemperament::default(),
            &config(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InsufficientOnsets { stage: Stage::Segmentation, found: 2, required: 7 }
        );
    }

    #[test]
    fn test_empty_onsets() {
        let t = track(&[(440.0, 10)]);
        let err = segment(&t, &onsets(&[]), &EqualTemperament::default(), &config()).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientOnsets { found: 0, .. }));
    }
}
