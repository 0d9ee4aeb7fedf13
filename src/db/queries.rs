use super::models::{ScaleSummary, StoreStats, StoredResult};
use super::{Database, DbError, Result};
use crate::analyzer::intervals::EvennessCategory;
use crate::analyzer::{AnalysisResult, SessionReport};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Row};

const RESULT_COLUMNS: &str = "id, scale, created_at, intonation, cv_evenness, tempo_slope,
     tempo_r, mean_tempo, evenness_category, mismatches, outlier_intervals, source";

/// Columns as SQLite hands them back, before JSON and timestamp decoding.
struct RawResult {
    id: i64,
    scale: String,
    created_at: String,
    intonation: i64,
    cv_evenness: f64,
    tempo_slope: f64,
    tempo_r: f64,
    mean_tempo: f64,
    evenness_category: Option<String>,
    mismatches: Option<String>,
    outlier_intervals: Option<String>,
    source: Option<String>,
}

impl RawResult {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            scale: row.get(1)?,
            created_at: row.get(2)?,
            intonation: row.get(3)?,
            cv_evenness: row.get(4)?,
            tempo_slope: row.get(5)?,
            tempo_r: row.get(6)?,
            mean_tempo: row.get(7)?,
            evenness_category: row.get(8)?,
            mismatches: row.get(9)?,
            outlier_intervals: row.get(10)?,
            source: row.get(11)?,
        })
    }

    fn decode(self) -> Result<StoredResult> {
        let id = self.id;
        let corrupt = |reason: String| DbError::Decode { id, reason };

        let timestamp = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| corrupt(format!("created_at {:?}: {e}", self.created_at)))?
            .with_timezone(&Utc);
        let intonation_score = u8::try_from(self.intonation)
            .map_err(|_| corrupt(format!("intonation {} out of range", self.intonation)))?;
        let evenness_category = match self.evenness_category.as_deref() {
            Some(s) => Some(
                EvennessCategory::parse(s)
                    .ok_or_else(|| corrupt(format!("unknown evenness category {s:?}")))?,
            ),
            None => None,
        };
        let mismatches = match self.mismatches.as_deref() {
            Some(json) => serde_json::from_str(json)
                .map_err(|e| corrupt(format!("mismatches: {e}")))?,
            None => Vec::new(),
        };
        let outlier_intervals = match self.outlier_intervals.as_deref() {
            Some(json) => serde_json::from_str(json)
                .map_err(|e| corrupt(format!("outlier_intervals: {e}")))?,
            None => Vec::new(),
        };

        Ok(StoredResult {
            id,
            result: AnalysisResult {
                scale_name: self.scale,
                timestamp,
                intonation_score,
                cv_evenness: self.cv_evenness,
                tempo_slope: self.tempo_slope,
                tempo_r: self.tempo_r,
                mean_tempo: self.mean_tempo,
            },
            evenness_category,
            mismatches,
            outlier_intervals,
            source: self.source,
        })
    }
}

impl Database {
    /// Append one completed session. Returns the new row id.
    ///
    /// Rows are never updated; ids increase with insertion order.
    pub fn append_result(&self, report: &SessionReport, source: Option<&str>) -> Result<i64> {
        let r = &report.result;
        let mismatches = serde_json::to_string(&report.intonation.mismatches)?;
        let outliers = serde_json::to_string(&report.evenness.outlier_intervals)?;

        self.conn.execute(
            "INSERT INTO scale_results (
                scale, created_at, intonation, cv_evenness, tempo_slope, tempo_r, mean_tempo,
                evenness_category, mismatches, outlier_intervals, source
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                r.scale_name,
                r.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                r.intonation_score,
                r.cv_evenness,
                r.tempo_slope,
                r.tempo_r,
                r.mean_tempo,
                report.evenness.category.as_str(),
                mismatches,
                outliers,
                source,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        log::info!("Stored {} result #{} (intonation {}/7)", r.scale_name, id, r.intonation_score);
        Ok(id)
    }

    /// Fetch one stored result by id.
    pub fn get_result(&self, id: i64) -> Result<Option<StoredResult>> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM scale_results WHERE id = ?1");
        let raw = self.conn.query_row(&sql, params![id], RawResult::from_row);

        match raw {
            Ok(raw) => raw.decode().map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stored results in insertion order, optionally restricted to one scale.
    pub fn list_results(&self, scale: Option<&str>) -> Result<Vec<StoredResult>> {
        let raws = match scale {
            Some(name) => {
                let sql = format!(
                    "SELECT {RESULT_COLUMNS} FROM scale_results WHERE scale = ?1 ORDER BY id"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                stmt.query_map(params![name], RawResult::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("SELECT {RESULT_COLUMNS} FROM scale_results ORDER BY id");
                let mut stmt = self.conn.prepare(&sql)?;
                stmt.query_map([], RawResult::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        raws.into_iter().map(RawResult::decode).collect()
    }

    /// Get result store statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        let total_results: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM scale_results",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT scale, COUNT(*), MAX(intonation), MAX(created_at)
             FROM scale_results
             GROUP BY scale
             ORDER BY COUNT(*) DESC, scale",
        )?;
        let scales = stmt
            .query_map([], |row| {
                Ok(ScaleSummary {
                    scale: row.get(0)?,
                    attempts: row.get(1)?,
                    best_intonation: row.get(2)?,
                    last_attempt: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(StoreStats { total_results, scales })
    }
}
