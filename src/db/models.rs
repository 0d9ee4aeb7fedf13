use crate::analyzer::AnalysisResult;
use crate::analyzer::intervals::EvennessCategory;
use crate::analyzer::intonation::Mismatch;
use serde::Serialize;

/// A result row read back from the database.
#[derive(Debug, Clone, Serialize)]
pub struct StoredResult {
    pub id: i64,
    #[serde(flatten)]
    pub result: AnalysisResult,
    /// Rows written before the detail columns existed carry no detail.
    pub evenness_category: Option<EvennessCategory>,
    pub mismatches: Vec<Mismatch>,
    pub outlier_intervals: Vec<usize>,
    pub source: Option<String>,
}

/// Per-scale summary row for `stats`.
#[derive(Debug, Clone, Serialize)]
pub struct ScaleSummary {
    pub scale: String,
    pub attempts: i64,
    pub best_intonation: i64,
    pub last_attempt: String,
}

/// Result store statistics.
#[derive(Debug)]
pub struct StoreStats {
    pub total_results: i64,
    pub scales: Vec<ScaleSummary>,
}
