use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scaletrack::analyzer::AnalysisResult;
use scaletrack::db::Database;
use scaletrack::db::models::StoredResult;
use scaletrack::scales;
use scaletrack::trends::{self, Metric, TrendReport};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scaletrack", version, about = "Scale practice performance tracker")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze recorded takes of a scale and store the results
    Analyze {
        /// Scale that was played (e.g. "C major", "Bb major")
        #[arg(short, long)]
        scale: String,

        /// Capture files, or directories to search for them
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Print full session reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the scales that can be graded
    Scales,

    /// List stored results in the order they were recorded
    History {
        /// Only show results for this scale
        #[arg(short, long)]
        scale: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show one stored result in detail
    Show {
        /// Result id (from `history`)
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Fit progress trends over stored results
    Trends {
        /// Only fit results for this scale (default: all results)
        #[arg(short, long)]
        scale: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show result store statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = scaletrack::config::AppConfig::load();

    // Resolve database path: CLI > config > XDG default.
    // Opened on demand so `scales` works without one.
    let open_db = || -> Result<Database> {
        let db_path = cli.db_path
            .clone()
            .or(config.db_path.clone())
            .unwrap_or_else(scaletrack::config::default_db_path);
        log::info!("Database: {}", db_path.display());
        Database::open(&db_path).context("Failed to open database")
    };

    match cli.command {
        Commands::Analyze { scale, paths, jobs, json } => {
            let db = open_db()?;
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let captures = scaletrack::analyzer::capture::collect_captures(&paths);
            if captures.is_empty() {
                anyhow::bail!("No capture files found in the given paths.");
            }

            let summary = scaletrack::analyzer::analyze_captures(
                &db,
                &scale,
                &captures,
                workers,
                &config.analysis,
            )
            .context("Analysis failed")?;

            if json {
                let out: Vec<_> = summary
                    .stored
                    .iter()
                    .map(|(id, report)| serde_json::json!({ "id": id, "report": report }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                for (id, report) in &summary.stored {
                    print_session(*id, report);
                }
                println!(
                    "Analysis complete: {} analyzed, {} failed",
                    summary.analyzed, summary.failed
                );
            }
        }

        Commands::Scales => print_scales(),

        Commands::History { scale, json } => {
            let db = open_db()?;
            let scale = resolve_scale(scale.as_deref())?;
            let results = db.list_results(scale).context("Query failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No stored results.");
            } else {
                print_history_table(&results);
            }
        }

        Commands::Show { id, json } => {
            let db = open_db()?;
            let stored = match db.get_result(id).context("Query failed")? {
                Some(s) => s,
                None => {
                    println!("No result with id {}.", id);
                    return Ok(());
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&stored)?);
            } else {
                print_stored(&stored);
            }
        }

        Commands::Trends { scale, json } => {
            let db = open_db()?;
            let scale = resolve_scale(scale.as_deref())?;
            let records: Vec<AnalysisResult> = db
                .list_results(scale)
                .context("Query failed")?
                .into_iter()
                .map(|s| s.result)
                .collect();
            let report = trends::fit_trends(&records);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_trends(scale.unwrap_or("all scales"), &report);
            }
        }

        Commands::Stats => {
            let db = open_db()?;
            let stats = db.stats().context("Failed to get stats")?;
            println!("Result Statistics");
            println!("=================");
            println!("Total results:    {}", stats.total_results);
            println!();

            if !stats.scales.is_empty() {
                println!("{:<12} {:>8} {:>6}  {}", "Scale", "Attempts", "Best", "Last attempt");
                for s in &stats.scales {
                    println!(
                        "{:<12} {:>8} {:>4}/7  {}",
                        s.scale, s.attempts, s.best_intonation, s.last_attempt
                    );
                }
            }
        }
    }

    Ok(())
}

/// Map a user-typed scale name to its canonical spelling.
fn resolve_scale(name: Option<&str>) -> Result<Option<&'static str>> {
    match name {
        Some(n) => Ok(Some(scales::lookup(n)?.name)),
        None => Ok(None),
    }
}

fn print_scales() {
    for s in &scales::MAJOR_SCALES {
        println!("{:<10} {}", s.name, s.notes.join(" "));
    }
}

fn print_session(id: i64, report: &scaletrack::analyzer::SessionReport) {
    let r = &report.result;
    println!("#{} {}", id, r.scale_name);
    println!("  Notes:      {}", report.notes.labels().join(" "));
    println!("  Intonation: {}/7", r.intonation_score);
    for m in &report.intonation.mismatches {
        println!("    played {}, expected {}", m.played, m.correct);
    }
    println!(
        "  Evenness:   CV {:.2}% ({})",
        r.cv_evenness, report.evenness.category
    );
    if !report.uneven_pairs.is_empty() {
        println!("    uneven: {}", report.uneven_pairs.join(", "));
    }
    println!(
        "  Tempo:      {:.1} BPM, drift {:+.2} BPM/block (r = {:.2})",
        r.mean_tempo, r.tempo_slope, r.tempo_r
    );
    println!();
}

/// Print a table of stored results.
fn print_history_table(results: &[StoredResult]) {
    println!(
        "{:>5}  {:<20} {:<10} {:>5} {:>7} {:>7} {:>7} {:>6}",
        "Id", "Recorded", "Scale", "Int", "CV%", "BPM", "Drift", "r"
    );
    println!("{}", "-".repeat(76));

    for s in results {
        let r = &s.result;
        println!(
            "{:>5}  {:<20} {:<10} {:>3}/7 {:>7.2} {:>7.1} {:>+7.2} {:>6.2}",
            s.id,
            r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            r.scale_name,
            r.intonation_score,
            r.cv_evenness,
            r.mean_tempo,
            r.tempo_slope,
            r.tempo_r,
        );
    }
}

fn print_stored(s: &StoredResult) {
    let r = &s.result;
    println!("Result #{}: {}", s.id, r.scale_name);
    println!("Recorded:    {}", r.timestamp.to_rfc3339());
    if let Some(source) = &s.source {
        println!("Source:      {}", source);
    }
    println!("Intonation:  {}/7", r.intonation_score);
    for m in &s.mismatches {
        println!("  played {}, expected {}", m.played, m.correct);
    }
    match s.evenness_category {
        Some(cat) => println!("Evenness:    CV {:.2}% ({})", r.cv_evenness, cat),
        None => println!("Evenness:    CV {:.2}%", r.cv_evenness),
    }
    if let Ok(scale) = scales::lookup(&r.scale_name) {
        let pairs: Vec<String> = s.outlier_intervals.iter().map(|&i| scale.note_pair(i)).collect();
        if !pairs.is_empty() {
            println!("  uneven: {}", pairs.join(", "));
        }
    }
    println!("Mean tempo:  {:.1} BPM", r.mean_tempo);
    println!("Tempo drift: {:+.2} BPM/block (r = {:.2})", r.tempo_slope, r.tempo_r);
}

fn print_trends(label: &str, report: &TrendReport) {
    match report {
        TrendReport::InsufficientRecords { count, required } => {
            println!(
                "Not enough results for {} to fit a trend ({} stored, need {}).",
                label, count, required
            );
        }
        TrendReport::Fitted { records, .. } => {
            println!("Trends for {} over {} attempts:", label, records);
            println!();
            println!("{:<18} {:>10} {:>7} {:>8}", "Metric", "Per try", "r", "p");
            println!("{}", "-".repeat(46));
            for metric in Metric::ALL {
                if let Some(t) = report.metric(metric) {
                    println!(
                        "{:<18} {:>+10.3} {:>7.2} {:>8.3}",
                        metric.as_str(), t.slope, t.r, t.p_value
                    );
                }
            }
        }
    }
}
