use super::{OnsetDetector, PitchEstimator, PitchTrack, Sample};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed capture {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Estimator output recorded for one take: the frame-aligned pitch track and
/// onset frames an external pitch tracker and onset detector produced.
///
/// Replays those values through the estimator traits, so a capture runs
/// through the same session path as a live estimator would.
#[derive(Debug, Clone, Deserialize)]
pub struct Capture {
    pub sample_rate: u32,
    #[serde(default)]
    pub hop_length: Option<usize>,
    pub pitch_track: PitchTrack,
    pub onsets: Vec<usize>,
    #[serde(skip)]
    default_hop_length: usize,
}

impl Capture {
    /// Read a capture from a JSON file. `default_hop_length` applies when the
    /// file does not state its own frame hop.
    pub fn load(path: &Path, default_hop_length: usize) -> Result<Self, CaptureError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CaptureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents, default_hop_length).map_err(|source| CaptureError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(json: &str, default_hop_length: usize) -> Result<Self, serde_json::Error> {
        let mut capture: Capture = serde_json::from_str(json)?;
        capture.default_hop_length = default_hop_length;
        Ok(capture)
    }

    /// The decoded take this capture stands in for. The waveform itself is not kept.
    pub fn sample(&self) -> Sample {
        Sample { samples: Vec::new(), sample_rate: self.sample_rate }
    }
}

impl PitchEstimator for Capture {
    fn estimate(&self, _sample: &Sample) -> Result<PitchTrack, String> {
        Ok(self.pitch_track.clone())
    }
}

impl OnsetDetector for Capture {
    fn detect(&self, _sample: &Sample) -> Result<Vec<usize>, String> {
        Ok(self.onsets.clone())
    }

    fn hop_length(&self) -> usize {
        self.hop_length.unwrap_or(self.default_hop_length)
    }
}

/// Expand files and directories into a sorted list of capture files.
/// Directories are walked recursively for `.json` files.
pub fn collect_captures(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for path in paths {
        if path.is_file() {
            found.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if ext == crate::CAPTURE_EXTENSION {
                found.push(entry.into_path());
            }
        }
    }
    found.sort();
    found.dedup();
    found
}
