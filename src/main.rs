use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use poster_insight::batch::{ConsoleObserver, run_batch};
use poster_insight::config::{PacingConfig, SessionConfig, parse_duration};
use poster_insight::extract::FeatureExtractor;
use poster_insight::join::JoinKey;
use poster_insight::model::GeminiClient;
use poster_insight::model::gemini::DEFAULT_ENDPOINT;
use poster_insight::poster::PosterUpload;
use poster_insight::report::generate_report;
use poster_insight::{AnalysisSession, MetricsTable};
use poster_scale::presets::TokenPreset;
use tracing_subscriber::EnvFilter;

/// Poster analysis with a hosted vision model:
/// - extract visual features from every poster
/// - join them with a metrics CSV
/// - ask for a creative strategy report
#[derive(Parser, Debug)]
#[command(name = "poster")]
#[command(about = "🚀 Analyze referral posters with Gemini and plan the next batch")]
#[command(long_about = "Analyze referral posters with a Gemini vision model.
Each poster is reduced to a row of visual features (colour, subject, expression, copy layout, ...).
The fixed footer bar (QR code, avatar, nickname, logo) is ignored; only the main visual area is analyzed.
Rows are joined with an optional metrics table and can be turned into a strategy report.")]
struct Args {
    /// Poster images (PNG or JPEG), analyzed in the given order
    #[arg(required = true, help = "Poster image files (PNG/JPEG)")]
    images: Vec<PathBuf>,

    /// Business metrics table
    #[arg(short, long, help = "Metrics table (XLSX/ODS first sheet, or CSV/TSV) with a header row")]
    metrics: Option<PathBuf>,

    /// Model identifier
    #[arg(long, default_value = poster_insight::config::config::DEFAULT_MODEL)]
    model: String,

    /// Gemini API key; prompted for when omitted
    #[arg(long, help = "Gemini API key (prompted for if omitted)")]
    api_key: Option<String>,

    /// Pause after each poster
    #[arg(long, default_value = "2s",
          help = "Pause after each poster: 2s, 1500ms, 1m")]
    pace: String,

    /// Requests per minute (token bucket) instead of a fixed pause
    #[arg(long, conflicts_with = "pace", help = "Sustained requests per minute instead of a fixed pause")]
    rpm: Option<u32>,

    /// Burst size for --rpm
    #[arg(long, default_value_t = 1, requires = "rpm")]
    burst: u32,

    /// Downscale posters before upload
    #[arg(long, value_enum, help = "Downscale posters before upload to save tokens")]
    scale: Option<TokenPreset>,

    /// Join on this metrics column instead of detecting one
    #[arg(long, help = "Exact metrics column holding the poster file name")]
    join_column: Option<String>,

    /// Per-request timeout; no timeout when omitted
    #[arg(long, help = "Per-request timeout, e.g. 90s (default: wait indefinitely)")]
    timeout: Option<String>,

    /// Generate the strategy report without asking
    #[arg(long)]
    report: bool,

    /// API base URL
    #[arg(long, default_value = DEFAULT_ENDPOINT, hide = true)]
    endpoint: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let api_key = resolve_api_key(args.api_key.clone(), || {
        rpassword::prompt_password("🔑 Gemini API key: ")
    })
    .context("reading the API key")?;

    let pacing = match args.rpm {
        Some(per_minute) => PacingConfig::PerMinute {
            per_minute,
            burst: args.burst,
        },
        None => PacingConfig::Fixed(parse_duration(&args.pace)?),
    };
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?;

    let config = SessionConfig {
        api_key,
        model: args.model.clone(),
        endpoint: args.endpoint.clone(),
        pacing,
        scale_preset: args.scale,
        join_column: args.join_column.clone(),
        timeout,
    };
    if let Err(e) = config.validate() {
        eprintln!("❌ {}", e);
        std::process::exit(2);
    }

    let mut session = AnalysisSession::new();

    if let Some(path) = &args.metrics {
        match MetricsTable::load(path) {
            Ok(metrics) => {
                println!("✅ Metrics table loaded: {} records", metrics.len());
                session.set_metrics(Some(metrics));
            }
            Err(e) => eprintln!("❌ Failed to read metrics table: {}", e),
        }
    }

    let uploads: Vec<PosterUpload> = args
        .images
        .iter()
        .filter_map(|path| match PosterUpload::from_path(path) {
            Ok(upload) => Some(upload),
            Err(e) => {
                eprintln!("❌ {}", e);
                None
            }
        })
        .collect();
    if uploads.is_empty() {
        anyhow::bail!("no readable poster images were given");
    }

    println!("💡 The fixed footer bar is ignored; only the main visual area is analyzed.");
    let client = GeminiClient::new(&config.endpoint, &config.api_key, config.timeout)
        .context("setting up the Gemini client")?;
    let extractor = FeatureExtractor::new(client, &config.model).with_scale(config.scale_target());
    let mut pacer = config.build_pacer();
    let mut observer = ConsoleObserver::new();

    let records = run_batch(&uploads, &extractor, pacer.as_mut(), &mut observer);
    session.replace_records(records);

    if !session.has_results() {
        println!("No poster was analyzed successfully; nothing to show.");
        return Ok(());
    }

    println!();
    println!("📊 Visual feature matrix");
    let outcome = session.merged(config.key_detector().as_ref());
    match &outcome.key {
        JoinKey::NoMetrics => {}
        JoinKey::Detected(column) => {
            println!("ℹ️  Joined with the metrics table on column: {}", column)
        }
        JoinKey::NotFound => println!(
            "⚠️  No file name / name column found in the metrics table; showing visual features only."
        ),
    }
    println!("{}", outcome.table.render());

    let wants_report = args.report || confirm("💡 Generate the full strategy report with design briefs? [y/N] ")?;
    if !wants_report {
        return Ok(());
    }

    println!("⏳ Planning the next poster batch ...");
    match generate_report(extractor.model(), &config.model, &outcome.table) {
        Ok(report) => {
            println!();
            println!("{}", report);
        }
        Err(e) => eprintln!("❌ Report generation failed: {}", e),
    }
    Ok(())
}

/// The `--api-key` value, or a key typed at the terminal without echo.
fn resolve_api_key(
    given: Option<String>,
    read_hidden: impl FnOnce() -> io::Result<String>,
) -> io::Result<String> {
    match given {
        Some(key) => Ok(key),
        None => read_hidden().map(|key| key.trim().to_string()),
    }
}

/// Read one line from the terminal after printing `label`.
fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading from the terminal")?;
    Ok(line.trim().to_string())
}

fn confirm(label: &str) -> Result<bool> {
    let answer = prompt(label)?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_key_skips_the_hidden_prompt() {
        let key = resolve_api_key(Some("AIza-flag".into()), || {
            panic!("terminal must not be read when --api-key is given")
        })
        .unwrap();
        assert_eq!(key, "AIza-flag");
    }

    #[test]
    fn test_missing_key_is_read_hidden_and_trimmed() {
        let mut asked = false;
        let key = resolve_api_key(None, || {
            asked = true;
            Ok("AIza-typed\n".to_string())
        })
        .unwrap();
        assert!(asked);
        assert_eq!(key, "AIza-typed");
    }

    #[test]
    fn test_hidden_read_failure_is_propagated() {
        let err = resolve_api_key(None, || {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no tty"))
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
