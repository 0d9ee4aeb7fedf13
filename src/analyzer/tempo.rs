//! Tempo drift across a run.
//!
//! Intervals are grouped into consecutive blocks (4 by default) and each block
//! becomes one tempo point, `60 / mean(block)`. A trailing partial block counts
//! as one more point only when it holds at least one interval. A line fitted
//! through the points gives the drift in BPM per block: positive means the
//! player sped up.

use super::{AnalysisError, OnsetSequence, Stage, Timebase};
use crate::config::AnalysisConfig;
use crate::stats;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempoTrendResult {
    /// BPM change per block.
    pub slope: f64,
    /// Pearson r of the block-tempo fit.
    pub correlation: f64,
    /// Mean of the per-interval tempos, in BPM.
    pub mean_tempo: f64,
    /// One tempo per block, in order.
    pub block_bpm: Vec<f64>,
}

pub fn fit_tempo_trend(
    onsets: &OnsetSequence,
    timebase: Timebase,
    config: &AnalysisConfig,
) -> Result<TempoTrendResult, AnalysisError> {
    let intervals = onsets.intervals(timebase);
    let block_size = config.tempo_block.max(1);

    // chunks() yields the trailing partial block only if it is non-empty
    let block_bpm: Vec<f64> = intervals
        .chunks(block_size)
        .map(|block| 60.0 / stats::mean(block))
        .collect();

    if block_bpm.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            stage: Stage::Tempo,
            what: "tempo blocks",
            found: block_bpm.len(),
            required: 2,
        });
    }

    let instantaneous: Vec<f64> = intervals.iter().map(|iv| 60.0 / iv).collect();
    let mean_tempo = stats::mean(&instantaneous);

    let fit = stats::fit_indexed(&block_bpm);

    Ok(TempoTrendResult {
        slope: fit.slope,
        correlation: fit.r,
        mean_tempo,
        block_bpm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tb() -> Timebase {
        // 10 ms frames
        Timebase::new(1000, 10).unwrap()
    }

    fn onsets_from_gaps(gaps: &[usize]) -> OnsetSequence {
        let mut frames = vec![0];
        for g in gaps {
            frames.push(frames.last().unwrap() + g);
        }
        OnsetSequence::new(frames).unwrap()
    }

    #[test]
    fn test_steady_tempo() {
        // 50 frames = 0.5 s = 120 BPM
        let r = fit_tempo_trend(&onsets_from_gaps(&[50; 8]), tb(), &AnalysisConfig::default())
            .unwrap();
        assert_eq!(r.block_bpm.len(), 2);
        assert!((r.mean_tempo - 120.0).abs() < 1e-9);
        assert!(r.slope.abs() < 1e-9);
        assert_eq!(r.correlation, 0.0);
    }

    #[test]
    fn test_accelerating_run() {
        let r = fit_tempo_trend(
            &onsets_from_gaps(&[60, 58, 56, 54, 52, 50, 48, 46, 44]),
            tb(),
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert_eq!(r.block_bpm.len(), 3);
        assert!(r.slope > 0.0);
        assert!(r.correlation > 0.9);
    }

    #[test]
    fn test_decelerating_run() {
        let r = fit_tempo_trend(
            &onsets_from_gaps(&[40, 42, 44, 46, 48, 50, 52]),
            tb(),
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert!(r.slope < 0.0);
        assert!((r.correlation + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_block_appended() {
        // 4 + 1 intervals: the lone trailing interval is its own block
        let r = fit_tempo_trend(
            &onsets_from_gaps(&[50, 50, 50, 50, 100]),
            tb(),
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert_eq!(r.block_bpm.len(), 2);
        assert!((r.block_bpm[0] - 120.0).abs() < 1e-9);
        assert!((r.block_bpm[1] - 60.0).abs() < 1e-9);
        assert!((r.slope + 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_multiple_adds_no_extra_block() {
        let r = fit_tempo_trend(&onsets_from_gaps(&[50; 12]), tb(), &AnalysisConfig::default())
            .unwrap();
        assert_eq!(r.block_bpm.len(), 3);
    }

    #[test]
    fn test_mean_tempo_averages_instantaneous_bpm() {
        // Tempos 120, 60, 120, 60, 120 average to 96, not 60 / mean(interval) ≈ 85.7
        let r = fit_tempo_trend(
            &onsets_from_gaps(&[50, 100, 50, 100, 50]),
            tb(),
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert!((r.mean_tempo - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_block_is_insufficient() {
        let err = fit_tempo_trend(&onsets_from_gaps(&[50; 4]), tb(), &AnalysisConfig::default())
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InsufficientData {
                stage: Stage::Tempo,
                what: "tempo blocks",
                found: 1,
                required: 2,
            }
        );
    }

    #[test]
    fn test_no_intervals_is_insufficient() {
        let onsets = OnsetSequence::new(vec![]).unwrap();
        let err = fit_tempo_trend(&onsets, tb(), &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { found: 0, .. }));
    }
}
