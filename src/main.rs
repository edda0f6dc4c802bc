//! storm-watch - solar-wind shock finder
//!
//! # Usage
//!
//! ```bash
//! # Storm window around the earliest shock near 2024-05-10 (ACE + DSCOVR)
//! storm-watch window --date 2024-05-10 --output may10.csv
//!
//! # DSCOVR only, custom window and thresholds, with the peak Kp
//! storm-watch window --date 2024-05-10 --satellite dscovr --before 6 --after 48 \
//!     --thresholds 4,40 --kp --format json
//!
//! # Every confirmed shock in a date span
//! storm-watch shocks --start 2024-05-09 --end 2024-05-12
//!
//! # Shocks in a previously exported window
//! storm-watch shocks --input may10.csv
//!
//! # Effective configuration
//! storm-watch config --dump
//! ```
//!
//! # Environment Variables
//!
//! - `STORM_WATCH_CONFIG`: Path to a TOML config file
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use storm_watch::acquisition::{build_http_client, fetch_kp_indices, max_kp_between, KpIndex};
use storm_watch::config::{self, StormConfig};
use storm_watch::export::{self, OutputFormat};
use storm_watch::storm::{detect_regularized, ShockThresholds};
use storm_watch::{
    extract_storm_window, scan_shocks, CachedProvider, DetectorParams, RemoteProvider,
    SourceSelector, StormRequest,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "storm-watch")]
#[command(about = "Solar-wind retrieval and interplanetary shock detection")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides STORM_WATCH_CONFIG and ./storm_watch.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Extract the storm window around the earliest shock near a date
    Window {
        /// Target day (UTC), e.g. 2024-05-10
        #[arg(long)]
        date: NaiveDate,

        /// Source selector: ace, dscovr, goes, both, or a+b
        #[arg(long)]
        satellite: Option<SourceSelector>,

        /// Hours kept before the shock (1 to 720)
        #[arg(long)]
        before: Option<i64>,

        /// Hours kept after the shock (1 to 720)
        #[arg(long)]
        after: Option<i64>,

        /// Shock thresholds as "diff,pct_change", e.g. 5,50
        #[arg(long)]
        thresholds: Option<ShockThresholds>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// Look up the peak Kp index inside the window
        #[arg(long)]
        kp: bool,
    },

    /// List every confirmed shock in a date span or a saved series
    Shocks {
        /// First day of the span (UTC)
        #[arg(long, required_unless_present = "input")]
        start: Option<NaiveDate>,

        /// Last day of the span (UTC), defaults to --start
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Scan a CSV written by `window` instead of fetching
        #[arg(long, conflicts_with_all = ["start", "end", "satellite"])]
        input: Option<PathBuf>,

        /// Source selector: ace, dscovr, goes, both, or a+b
        #[arg(long)]
        satellite: Option<SourceSelector>,

        /// Shock thresholds as "diff,pct_change", e.g. 5,50
        #[arg(long)]
        thresholds: Option<ShockThresholds>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },

    /// Show configuration
    Config {
        /// Print the effective configuration as TOML
        #[arg(long)]
        dump: bool,
    },
}

// ============================================================================
// Output
// ============================================================================

/// JSON document written by `window --format json`.
#[derive(Serialize)]
struct WindowReport<'a> {
    shock_time: Option<chrono::DateTime<chrono::Utc>>,
    max_kp: Option<KpIndex>,
    series: &'a storm_watch::CanonicalSeries,
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => {
            let file = File::create(p).with_context(|| format!("Failed to create {}", p.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn build_provider(cfg: &StormConfig) -> Result<CachedProvider<RemoteProvider>> {
    let remote = RemoteProvider::from_config(cfg).context("Failed to build data provider")?;
    Ok(CachedProvider::new(remote, cfg.cache.capacity))
}

#[allow(clippy::too_many_arguments)]
async fn run_window(
    cfg: &StormConfig,
    date: NaiveDate,
    satellite: Option<SourceSelector>,
    before: Option<i64>,
    after: Option<i64>,
    thresholds: Option<ShockThresholds>,
    output: Option<PathBuf>,
    format: OutputFormat,
    kp: bool,
) -> Result<()> {
    let mut request = StormRequest::new(date);
    if let Some(selector) = satellite {
        request = request.with_selector(selector);
    }
    let before = before.unwrap_or(request.before_shock_hours);
    let after = after.unwrap_or(request.after_shock_hours);
    request = request.with_window(before, after);
    if let Some(t) = thresholds {
        request = request.with_thresholds(t);
    }

    let provider = build_provider(cfg)?;
    let window = extract_storm_window(&provider, &request)
        .await
        .context("Storm window extraction failed")?;

    match window.shock_time {
        Some(shock) => info!(shock = %shock, rows = window.series.len(), "Shock found"),
        None => warn!(rows = window.series.len(), "No shock in scan range, writing full range"),
    }

    let max_kp = if kp {
        lookup_max_kp(cfg, &window.series).await
    } else {
        None
    };

    let writer = open_output(output.as_deref())?;
    match format {
        OutputFormat::Csv => export::write_csv(&window.series, writer)?,
        OutputFormat::Json => export::write_json(
            &WindowReport {
                shock_time: window.shock_time,
                max_kp,
                series: &window.series,
            },
            writer,
        )?,
    }
    if let Some(p) = output {
        info!(path = %p.display(), format = format.extension(), "Window written");
    }
    Ok(())
}

/// Kp is informational, so failures are logged rather than fatal.
async fn lookup_max_kp(cfg: &StormConfig, series: &storm_watch::CanonicalSeries) -> Option<KpIndex> {
    let (Some(start), Some(end)) = (series.first_timestamp(), series.last_timestamp()) else {
        return None;
    };
    let client = match build_http_client(&cfg.http) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to build HTTP client for Kp lookup");
            return None;
        }
    };
    match fetch_kp_indices(&client, &cfg.sources.kp_url).await {
        Ok(indices) => {
            let best = max_kp_between(&indices, start, end);
            match &best {
                Some(k) => info!(kp = k.kp, ap = k.ap, bin = %k.timestamp, definitive = k.definitive, "Peak Kp in window"),
                None => warn!("No Kp values cover the window"),
            }
            best
        }
        Err(e) => {
            warn!(error = %e, "Kp lookup failed");
            None
        }
    }
}

async fn run_shocks(
    cfg: &StormConfig,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    input: Option<PathBuf>,
    satellite: Option<SourceSelector>,
    thresholds: Option<ShockThresholds>,
    format: OutputFormat,
) -> Result<()> {
    let mut params = DetectorParams::from_config(&cfg.detection);
    if let Some(t) = thresholds {
        params = params.with_thresholds(t.diff, t.pct_change);
    }

    let shocks = if let Some(path) = input {
        let file = File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let series = export::read_csv(file).context("Failed to read input series")?;
        info!(path = %path.display(), rows = series.len(), "Scanning saved series");
        detect_regularized(&series, &params)?
    } else {
        let start = start.context("--start is required without --input")?;
        let end = end.unwrap_or(start);
        let selector = match satellite {
            Some(s) => s,
            None => cfg.selector()?,
        };
        let provider = build_provider(cfg)?;
        scan_shocks(&provider, start, end, selector, &params).await?
    };

    info!(count = shocks.len(), "Confirmed shocks");
    let writer = open_output(None)?;
    match format {
        OutputFormat::Csv => export::write_shocks_csv(&shocks, writer)?,
        OutputFormat::Json => export::write_json(&shocks, writer)?,
    }
    Ok(())
}

fn run_config(cfg: &StormConfig, dump: bool) -> Result<()> {
    if dump {
        print!("{}", cfg.to_toml()?);
    } else {
        let selector = cfg.selector()?;
        println!(
            "satellite={selector} window=-{}h/+{}h thresholds=({}, {}%) confirm={}min",
            cfg.window.before_shock_hours,
            cfg.window.after_shock_hours,
            cfg.detection.diff_threshold,
            cfg.detection.pct_change_threshold,
            cfg.detection.confirm_window_minutes,
        );
    }
    Ok(())
}

async fn run(command: SubCommand) -> Result<()> {
    let cfg = config::get();
    match command {
        SubCommand::Window {
            date,
            satellite,
            before,
            after,
            thresholds,
            output,
            format,
            kp,
        } => run_window(cfg, date, satellite, before, after, thresholds, output, format, kp).await,
        SubCommand::Shocks {
            start,
            end,
            input,
            satellite,
            thresholds,
            format,
        } => run_shocks(cfg, start, end, input, satellite, thresholds, format).await,
        SubCommand::Config { dump } => run_config(cfg, dump),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize logging (stderr, so stdout stays clean for data)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    // Load configuration
    let storm_config = match &args.config {
        Some(path) => StormConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => StormConfig::load(),
    };
    config::init(storm_config);

    // Ctrl-C abandons in-flight fetches; nothing partial is written
    tokio::select! {
        result = run(args.command) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received Ctrl+C, abandoning in-flight fetches");
            anyhow::bail!("Interrupted")
        }
    }
}
