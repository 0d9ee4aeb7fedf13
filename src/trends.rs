//! Long-run progress across stored attempts.
//!
//! Each metric is regressed against attempt index (0, 1, 2, … in insertion
//! order), giving its per-attempt drift, Pearson r and two-sided p-value.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::analyzer::AnalysisResult;
use crate::stats;

/// Fewest attempts a line can be fitted through.
pub const MIN_RECORDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    IntonationScore,
    CvEvenness,
    TempoSlope,
    TempoR,
    MeanTempo,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::IntonationScore,
        Metric::CvEvenness,
        Metric::TempoSlope,
        Metric::TempoR,
        Metric::MeanTempo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntonationScore => "intonation_score",
            Self::CvEvenness => "cv_evenness",
            Self::TempoSlope => "tempo_slope",
            Self::TempoR => "tempo_r",
            Self::MeanTempo => "mean_tempo",
        }
    }

    pub fn value(&self, r: &AnalysisResult) -> f64 {
        match self {
            Self::IntonationScore => f64::from(r.intonation_score),
            Self::CvEvenness => r.cv_evenness,
            Self::TempoSlope => r.tempo_slope,
            Self::TempoR => r.tempo_r,
            Self::MeanTempo => r.mean_tempo,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricTrend {
    /// Change per attempt.
    pub slope: f64,
    pub r: f64,
    pub p_value: f64,
}

/// Outcome of a trend fit. Too few attempts is an ordinary result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendReport {
    InsufficientRecords { count: usize, required: usize },
    Fitted { records: usize, metrics: BTreeMap<Metric, MetricTrend> },
}

impl TrendReport {
    pub fn is_fitted(&self) -> bool {
        matches!(self, Self::Fitted { .. })
    }

    pub fn metric(&self, metric: Metric) -> Option<&MetricTrend> {
        match self {
            Self::Fitted { metrics, .. } => metrics.get(&metric),
            Self::InsufficientRecords { .. } => None,
        }
    }
}

/// Fit every metric against attempt index. `records` must be in insertion order.
pub fn fit_trends(records: &[AnalysisResult]) -> TrendReport {
    if records.len() < MIN_RECORDS {
        return TrendReport::InsufficientRecords { count: records.len(), required: MIN_RECORDS };
    }

    let metrics = Metric::ALL
        .iter()
        .map(|&metric| {
            let y: Vec<f64> = records.iter().map(|r| metric.value(r)).collect();
            let fit = stats::fit_indexed(&y);
            (metric, MetricTrend { slope: fit.slope, r: fit.r, p_value: fit.p_value })
        })
        .collect();

    TrendReport::Fitted { records: records.len(), metrics }
}
