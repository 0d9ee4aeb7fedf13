use scaletrack::analyzer::{analyze_captures, AnalysisError, AnalyzeError};
use scaletrack::config::AnalysisConfig;
use scaletrack::db::Database;
use scaletrack::trends::{fit_trends, Metric, TrendReport};
use std::path::{Path, PathBuf};

const C_MAJOR_HZ: [f64; 8] = [261.63, 293.66, 329.63, 349.23, 392.0, 440.0, 493.88, 523.25];

/// Scratch directory under the system temp dir, removed on drop.
struct Scratch(PathBuf);

impl Scratch {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("scaletrack_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.0).ok();
    }
}

/// Write a capture with one note per frequency, `gap` frames apart.
fn write_capture(dir: &Path, name: &str, hz: &[f64], gap: usize) -> PathBuf {
    let mut track = Vec::new();
    let mut onsets = Vec::new();
    for &f in hz {
        onsets.push(track.len());
        for i in 0..gap {
            track.push(if i < gap * 3 / 4 { Some(f) } else { None });
        }
    }
    let json = serde_json::json!({
        "sample_rate": 22050,
        "hop_length": 512,
        "pitch_track": track,
        "onsets": onsets,
    });
    let path = dir.join(name);
    std::fs::write(&path, json.to_string()).unwrap();
    path
}

#[test]
fn analyzed_takes_are_stored_in_order_and_trended() {
    let scratch = Scratch::new("pipeline");
    let clean = write_capture(scratch.path(), "take1.json", &C_MAJOR_HZ, 20);
    let mut flat_third = C_MAJOR_HZ;
    flat_third[2] = 311.13;
    let sloppy = write_capture(scratch.path(), "take2.json", &flat_third, 20);

    let db = Database::open_in_memory().unwrap();
    let config = AnalysisConfig::default();

    let first = analyze_captures(&db, "C major", std::slice::from_ref(&clean), 1, &config).unwrap();
    assert_eq!(first.analyzed, 1);
    assert_eq!(first.failed, 0);

    // One attempt is a normal, reportable state
    let records: Vec<_> = db
        .list_results(Some("C major"))
        .unwrap()
        .into_iter()
        .map(|s| s.result)
        .collect();
    assert_eq!(fit_trends(&records), TrendReport::InsufficientRecords { count: 1, required: 2 });

    let second = analyze_captures(&db, "c major", &[sloppy], 2, &config).unwrap();
    assert_eq!(second.analyzed, 1);
    let (id, report) = &second.stored[0];
    assert_eq!(report.result.intonation_score, 6);
    assert_eq!(report.intonation.mismatches[0].played, "D#4");
    assert_eq!(report.intonation.mismatches[0].correct, "E");

    let stored = db.get_result(*id).unwrap().unwrap();
    assert_eq!(stored.result, report.result);
    assert!(stored.source.unwrap().ends_with("take2.json"));

    let records: Vec<_> = db
        .list_results(Some("C major"))
        .unwrap()
        .into_iter()
        .map(|s| s.result)
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].intonation_score, 7);
    assert_eq!(records[1].intonation_score, 6);

    let report = fit_trends(&records);
    let intonation = report.metric(Metric::IntonationScore).unwrap();
    assert!((intonation.slope + 1.0).abs() < 1e-12);
}

#[test]
fn failed_takes_are_counted_not_stored() {
    let scratch = Scratch::new("failures");
    let good = write_capture(scratch.path(), "a_good.json", &C_MAJOR_HZ, 20);
    let short = write_capture(scratch.path(), "b_short.json", &C_MAJOR_HZ[..4], 20);
    let garbled = scratch.path().join("c_garbled.json");
    std::fs::write(&garbled, "{ not json").unwrap();

    let db = Database::open_in_memory().unwrap();
    let summary = analyze_captures(
        &db,
        "C major",
        &[good, short, garbled],
        2,
        &AnalysisConfig::default(),
    )
    .unwrap();

    assert_eq!(summary.analyzed, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(db.list_results(None).unwrap().len(), 1);
}

#[test]
fn unknown_scale_aborts_before_any_work() {
    let scratch = Scratch::new("unknown");
    let take = write_capture(scratch.path(), "take.json", &C_MAJOR_HZ, 20);

    let db = Database::open_in_memory().unwrap();
    let err = analyze_captures(&db, "H major", &[take], 1, &AnalysisConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        AnalyzeError::Analysis(AnalysisError::UnknownScale(ref name)) if name == "H major"
    ));
    assert!(db.list_results(None).unwrap().is_empty());
}

#[test]
fn directories_are_searched_for_captures() {
    let scratch = Scratch::new("walk");
    std::fs::create_dir_all(scratch.path().join("monday")).unwrap();
    write_capture(&scratch.path().join("monday"), "take.json", &C_MAJOR_HZ, 24);
    write_capture(scratch.path(), "take.json", &C_MAJOR_HZ, 20);
    std::fs::write(scratch.path().join("README.txt"), "not a capture").unwrap();

    let found = scaletrack::analyzer::capture::collect_captures(&[scratch.path().to_path_buf()]);
    assert_eq!(found.len(), 2);

    let db = Database::open_in_memory().unwrap();
    let summary = analyze_captures(&db, "C major", &found, 2, &AnalysisConfig::default()).unwrap();
    assert_eq!(summary.analyzed, 2);
}
