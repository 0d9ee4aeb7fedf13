pub mod capture;
pub mod intervals;
pub mod intonation;
pub mod notes;
pub mod segment;
pub mod tempo;

use crate::config::AnalysisConfig;
use crate::db::Database;
use crate::scales::{self, ScaleDefinition};
use capture::{Capture, CaptureError};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use intervals::EvennessResult;
use intonation::IntonationResult;
use notes::{EqualTemperament, NoteMapper};
use segment::SegmentedPerformance;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tempo::TempoTrendResult;
use thiserror::Error;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PitchEstimation,
    OnsetDetection,
    Segmentation,
    Intonation,
    Intervals,
    Tempo,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PitchEstimation => "pitch estimation",
            Self::OnsetDetection => "onset detection",
            Self::Segmentation => "note segmentation",
            Self::Intonation => "intonation scoring",
            Self::Intervals => "interval statistics",
            Self::Tempo => "tempo trend",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Unknown scale \"{0}\"")]
    UnknownScale(String),
    #[error("{stage}: {found} usable notes, need at least {required}")]
    InsufficientOnsets {
        stage: Stage,
        found: usize,
        required: usize,
    },
    #[error("{stage}: {found} {what}, need at least {required}")]
    InsufficientData {
        stage: Stage,
        what: &'static str,
        found: usize,
        required: usize,
    },
    #[error("{stage}: {reason}")]
    DegenerateStatistic { stage: Stage, reason: &'static str },
    #[error("{stage}: invalid input: {reason}")]
    InvalidInput { stage: Stage, reason: String },
    #[error("{stage} failed: {message}")]
    Estimator { stage: Stage, message: String },
}

/// Fieldless discriminant of [`AnalysisError`] for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownScale,
    InsufficientOnsets,
    InsufficientData,
    DegenerateStatistic,
    InvalidInput,
    Estimator,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownScale(_) => ErrorKind::UnknownScale,
            Self::InsufficientOnsets { .. } => ErrorKind::InsufficientOnsets,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::DegenerateStatistic { .. } => ErrorKind::DegenerateStatistic,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Estimator { .. } => ErrorKind::Estimator,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::UnknownScale(_) => None,
            Self::InsufficientOnsets { stage, .. }
            | Self::InsufficientData { stage, .. }
            | Self::DegenerateStatistic { stage, .. }
            | Self::InvalidInput { stage, .. }
            | Self::Estimator { stage, .. } => Some(*stage),
        }
    }
}

// ── Shared inputs ─────────────────────────────────────────────────────

/// A decoded audio take. Decoding itself happens outside this crate.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Per-frame fundamental frequency estimates; `None` marks an unvoiced frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PitchTrack {
    pub frames: Vec<Option<f64>>,
}

impl PitchTrack {
    pub fn new(frames: Vec<Option<f64>>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frequency of a frame if it is voiced with a usable value.
    pub fn voiced(&self, frame: usize) -> Option<f64> {
        self.frames
            .get(frame)
            .copied()
            .flatten()
            .filter(|hz| hz.is_finite() && *hz > 0.0)
    }
}

/// Strictly increasing onset frame indices on the pitch-track frame grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OnsetSequence {
    frames: Vec<usize>,
}

impl OnsetSequence {
    pub fn new(frames: Vec<usize>) -> Result<Self, AnalysisError> {
        if let Some(w) = frames.windows(2).find(|w| w[1] <= w[0]) {
            return Err(AnalysisError::InvalidInput {
                stage: Stage::OnsetDetection,
                reason: format!("onsets not strictly increasing ({} then {})", w[0], w[1]),
            });
        }
        Ok(Self { frames })
    }

    pub fn frames(&self) -> &[usize] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Gaps between successive onsets in seconds.
    ///
    /// Differences are taken on the integer frame grid before scaling, so equal
    /// frame gaps produce bit-identical intervals.
    pub fn intervals(&self, timebase: Timebase) -> Vec<f64> {
        let secs_per_frame = timebase.seconds_per_frame();
        self.frames
            .windows(2)
            .map(|w| (w[1] - w[0]) as f64 * secs_per_frame)
            .collect()
    }
}

/// Frame grid shared by the pitch track and onset sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timebase {
    pub sample_rate: u32,
    pub hop_length: usize,
}

impl Timebase {
    pub fn new(sample_rate: u32, hop_length: usize) -> Result<Self, AnalysisError> {
        if sample_rate == 0 || hop_length == 0 {
            return Err(AnalysisError::InvalidInput {
                stage: Stage::OnsetDetection,
                reason: format!("invalid frame grid: sample_rate={sample_rate}, hop_length={hop_length}"),
            });
        }
        Ok(Self { sample_rate, hop_length })
    }

    pub fn seconds_per_frame(&self) -> f64 {
        self.hop_length as f64 / self.sample_rate as f64
    }
}

// ── External collaborators ────────────────────────────────────────────

/// Produces a frame-aligned pitch track from a decoded sample.
pub trait PitchEstimator {
    fn estimate(&self, sample: &Sample) -> Result<PitchTrack, String>;
}

/// Produces onset frame indices on the same grid as the pitch estimator.
pub trait OnsetDetector {
    fn detect(&self, sample: &Sample) -> Result<Vec<usize>, String>;

    /// Hop size of the frame grid, in samples.
    fn hop_length(&self) -> usize;
}

// ── Results ───────────────────────────────────────────────────────────

/// One stored record per performance attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub scale_name: String,
    pub timestamp: DateTime<Utc>,
    pub intonation_score: u8,
    pub cv_evenness: f64,
    pub tempo_slope: f64,
    pub tempo_r: f64,
    pub mean_tempo: f64,
}

/// Everything one session produced: the stored record plus per-stage detail.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub result: AnalysisResult,
    pub notes: SegmentedPerformance,
    pub intonation: IntonationResult,
    pub evenness: EvennessResult,
    /// Scale note pairs (e.g. "E - F") for each outlier interval.
    pub uneven_pairs: Vec<String>,
    pub tempo: TempoTrendResult,
}

// ── Session runner ────────────────────────────────────────────────────

/// Runs the analysis pipeline for one take against injected collaborators.
pub struct SessionRunner<'a> {
    pitch: &'a dyn PitchEstimator,
    onsets: &'a dyn OnsetDetector,
    notes: &'a dyn NoteMapper,
    config: &'a AnalysisConfig,
}

impl<'a> SessionRunner<'a> {
    pub fn new(
        pitch: &'a dyn PitchEstimator,
        onsets: &'a dyn OnsetDetector,
        notes: &'a dyn NoteMapper,
        config: &'a AnalysisConfig,
    ) -> Self {
        Self { pitch, onsets, notes, config }
    }

    /// Analyze one take of `scale_name`. Any stage failure aborts the whole run.
    pub fn run(&self, scale_name: &str, sample: &Sample) -> Result<SessionReport, AnalysisError> {
        let scale = scales::lookup(scale_name)?;
        self.run_scale(scale, sample)
    }

    pub fn run_scale(
        &self,
        scale: &ScaleDefinition,
        sample: &Sample,
    ) -> Result<SessionReport, AnalysisError> {
        let timebase = Timebase::new(sample.sample_rate, self.onsets.hop_length())?;

        let track = self.pitch.estimate(sample).map_err(|message| AnalysisError::Estimator {
            stage: Stage::PitchEstimation,
            message,
        })?;
        let onsets = self.onsets.detect(sample).map_err(|message| AnalysisError::Estimator {
            stage: Stage::OnsetDetection,
            message,
        })?;
        let onsets = OnsetSequence::new(onsets)?;

        log::debug!(
            "{}: {} pitch frames, {} onsets",
            scale.name,
            track.len(),
            onsets.len()
        );

        let notes = segment::segment(&track, &onsets, self.notes, self.config)?;
        let intonation = intonation::score(scale, &notes)?;
        let evenness = intervals::analyze_intervals(&onsets, timebase, self.config)?;
        let tempo = tempo::fit_tempo_trend(&onsets, timebase, self.config)?;

        let uneven_pairs = evenness
            .outlier_intervals
            .iter()
            .map(|&i| scale.note_pair(i))
            .collect();

        let result = AnalysisResult {
            scale_name: scale.name.to_string(),
            timestamp: Utc::now(),
            intonation_score: intonation.score,
            cv_evenness: evenness.coefficient_of_variation,
            tempo_slope: tempo.slope,
            tempo_r: tempo.correlation,
            mean_tempo: tempo.mean_tempo,
        };

        Ok(SessionReport { result, notes, intonation, evenness, uneven_pairs, tempo })
    }
}

// ── Batch driver ──────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
    #[error("Worker pool error: {0}")]
    Pool(String),
}

#[derive(Debug)]
pub struct AnalyzeSummary {
    pub analyzed: u64,
    pub failed: u64,
    /// Stored row ids with their reports, in input order.
    pub stored: Vec<(i64, SessionReport)>,
}

/// Load and analyze a single capture file.
pub fn analyze_capture(
    scale: &ScaleDefinition,
    path: &std::path::Path,
    config: &AnalysisConfig,
) -> Result<SessionReport, AnalyzeError> {
    let capture = Capture::load(path, config.default_hop_length)?;
    let mapper = EqualTemperament::new(config.reference_a4_hz);
    let runner = SessionRunner::new(&capture, &capture, &mapper, config);
    Ok(runner.run_scale(scale, &capture.sample())?)
}

/// Analyze capture files in parallel, then store successful sessions in input order.
///
/// The scale is resolved before any work starts, so an unknown name fails the
/// whole batch. Sessions that fail are logged and counted but never stored.
pub fn analyze_captures(
    db: &Database,
    scale_name: &str,
    paths: &[PathBuf],
    jobs: usize,
    config: &AnalysisConfig,
) -> Result<AnalyzeSummary, AnalyzeError> {
    let scale = scales::lookup(scale_name)?;

    let mut summary = AnalyzeSummary { analyzed: 0, failed: 0, stored: Vec::new() };
    if paths.is_empty() {
        log::info!("No captures to analyze");
        return Ok(summary);
    }

    log::info!("Analyzing {} captures of {} with {} workers", paths.len(), scale.name, jobs);

    let pb = ProgressBar::new(paths.len() as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .map_err(|e| AnalyzeError::Pool(e.to_string()))?;

    let results: Vec<_> = pool.install(|| {
        use rayon::prelude::*;
        paths
            .par_iter()
            .map(|path| {
                let result = analyze_capture(scale, path, config);
                pb.inc(1);
                result
            })
            .collect()
    });

    // Single writer: one append per completed session, in input order
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(report) => {
                let source = path.to_string_lossy();
                match db.append_result(&report, Some(source.as_ref())) {
                    Ok(id) => {
                        log::debug!("Stored {} as #{}", path.display(), id);
                        summary.analyzed += 1;
                        summary.stored.push((id, report));
                    }
                    Err(e) => {
                        log::error!("DB error storing {}: {}", path.display(), e);
                        summary.failed += 1;
                    }
                }
            }
            Err(e) => {
                log::warn!("Analysis of {} failed: {}", path.display(), e);
                summary.failed += 1;
            }
        }
    }

    pb.finish_with_message(format!(
        "Done: {} analyzed, {} failed",
        summary.analyzed, summary.failed
    ));

    Ok(summary)
}
