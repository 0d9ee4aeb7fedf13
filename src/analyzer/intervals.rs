//! Rhythmic evenness of the inter-onset intervals.
//!
//! Dispersion is reported as a coefficient of variation (percent, sample std)
//! and individual intervals are flagged when their z-score exceeds the
//! configured threshold. Interval i sits between scale degree i and i + 1.

use super::{AnalysisError, OnsetSequence, Stage, Timebase};
use crate::config::AnalysisConfig;
use crate::stats;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvennessCategory {
    VeryEven,
    Even,
    NeedsPractice,
}

impl EvennessCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryEven => "very_even",
            Self::Even => "even",
            Self::NeedsPractice => "needs_practice",
        }
    }

    pub fn from_cv(cv: f64, config: &AnalysisConfig) -> Self {
        if cv < config.very_even_cv {
            Self::VeryEven
        } else if cv < config.even_cv {
            Self::Even
        } else {
            Self::NeedsPractice
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "very_even" => Some(Self::VeryEven),
            "even" => Some(Self::Even),
            "needs_practice" => Some(Self::NeedsPractice),
            _ => None,
        }
    }
}

impl fmt::Display for EvennessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvennessResult {
    /// Inter-onset intervals in seconds.
    pub intervals: Vec<f64>,
    pub mean_interval: f64,
    pub std_interval: f64,
    /// 100 · std / mean.
    pub coefficient_of_variation: f64,
    pub category: EvennessCategory,
    /// Per-interval z-scores (all zero when the spread is zero).
    pub z_scores: Vec<f64>,
    /// Indices of intervals whose |z| exceeds the outlier threshold.
    pub outlier_intervals: Vec<usize>,
}

pub fn analyze_intervals(
    onsets: &OnsetSequence,
    timebase: Timebase,
    config: &AnalysisConfig,
) -> Result<EvennessResult, AnalysisError> {
    let intervals = onsets.intervals(timebase);
    if intervals.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            stage: Stage::Intervals,
            what: "intervals",
            found: intervals.len(),
            required: 2,
        });
    }

    let mean = stats::mean(&intervals);
    if mean <= 0.0 {
        return Err(AnalysisError::DegenerateStatistic {
            stage: Stage::Intervals,
            reason: "mean interval is zero, coefficient of variation undefined",
        });
    }

    let mut std = stats::sample_std(&intervals);
    if std <= stats::ZERO_SPREAD * mean {
        std = 0.0;
    }
    let cv = 100.0 * std / mean;

    let z_scores: Vec<f64> = if std > 0.0 {
        intervals.iter().map(|x| (x - mean) / std).collect()
    } else {
        vec![0.0; intervals.len()]
    };
    let outlier_intervals = z_scores
        .iter()
        .enumerate()
        .filter(|(_, z)| z.abs() > config.outlier_z)
        .map(|(i, _)| i)
        .collect();

    Ok(EvennessResult {
        intervals,
        mean_interval: mean,
        std_interval: std,
        coefficient_of_variation: cv,
        category: EvennessCategory::from_cv(cv, config),
        z_scores,
        outlier_intervals,
    })
}
