use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Duration, TimeZone, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use market_regime::{
    Bar, BarRecord, IndicatorFrame, LatentStateCapability, RegimeAggregator, RegimeConfig,
    RegimeHistory, StrategyFitEvaluator, StrategyStyle,
};

#[derive(Parser)]
#[command(name = "market-regime")]
#[command(version = "0.1.0")]
#[command(about = "Classify the market regime of an OHLCV history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (TOML); defaults are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Skip the hidden-state model even if it is compiled in
    #[arg(long)]
    no_hmm: bool,

    /// Compute ADX / EMA / ATR columns before classifying
    #[arg(long)]
    enrich: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current regime snapshot as JSON
    Analyze {
        /// JSON array of bars
        input: PathBuf,
    },
    /// Report whether the current regime suits a strategy style
    Fit {
        /// JSON array of bars
        input: PathBuf,
        /// Strategy style (trend_following, mean_reversion, ...)
        #[arg(short, long)]
        style: String,
    },
    /// Write per-bar labels as CSV
    History {
        /// JSON array of bars
        input: PathBuf,
        /// Output CSV path
        #[arg(short, long, default_value = "regime_history.csv")]
        output: PathBuf,
    },
    /// Generate a trending-then-ranging sample series
    Synth {
        /// Number of bars
        #[arg(short, long, default_value = "500")]
        bars: usize,
        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Output JSON path
        #[arg(short, long, default_value = "sample_bars.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    if cli.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let config = match &cli.config {
        Some(path) => RegimeConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RegimeConfig::default(),
    };

    let mut aggregator = RegimeAggregator::new(config);
    if cli.no_hmm {
        aggregator = aggregator.with_capability(LatentStateCapability::Unavailable);
    }

    match cli.command {
        Commands::Analyze { input } => {
            let frame = load_frame(&input, cli.enrich)?;
            let snapshot = aggregator.aggregate(&frame)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Fit { input, style } => {
            let frame = load_frame(&input, cli.enrich)?;
            let snapshot = aggregator.aggregate(&frame)?;
            let style = StrategyStyle::from(style.as_str());
            if let StrategyStyle::Other(name) = &style {
                warn!("Unknown strategy style '{}', treating as favorable", name);
            }

            let favorable = StrategyFitEvaluator::default().is_favorable(&snapshot, &style);
            println!(
                "{}",
                serde_json::json!({
                    "style": style.as_str(),
                    "favorable": favorable,
                    "regime": snapshot,
                })
            );
        }
        Commands::History { input, output } => {
            let frame = load_frame(&input, cli.enrich)?;
            let history = aggregator.label_history(&frame)?;
            export_history(&frame, &history, &output)?;
        }
        Commands::Synth { bars, seed, output } => {
            if bars == 0 {
                bail!("--bars must be at least 1");
            }
            let records: Vec<BarRecord> = synthetic_bars(bars, seed).iter().map(BarRecord::from).collect();
            std::fs::write(&output, serde_json::to_string_pretty(&records)?)?;
            info!("Wrote {} synthetic bars to {}", bars, output.display());
        }
    }

    Ok(())
}

fn load_frame(path: &Path, enrich: bool) -> Result<IndicatorFrame> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let records: Vec<BarRecord> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing bars from {}", path.display()))?;
    info!("Loaded {} bars from {}", records.len(), path.display());

    let frame = IndicatorFrame::from_records(records)?;
    if enrich {
        Ok(frame.with_standard_indicators()?)
    } else {
        Ok(frame)
    }
}

fn export_history(frame: &IndicatorFrame, history: &RegimeHistory, output: &Path) -> Result<()> {
    let mut file = std::fs::File::create(output)?;
    writeln!(
        file,
        "timestamp,close,volatility,trend,volume,efficiency,cluster,hmm_state"
    )?;

    for (index, bar) in frame.series().bars().iter().enumerate() {
        let Some(snapshot) = history.at(index) else {
            break;
        };
        writeln!(
            file,
            "{},{:.8},{},{},{},{:.6},{},{}",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.close,
            snapshot.volatility_label(),
            snapshot.trend_label(),
            snapshot.volume_label(),
            snapshot.efficiency,
            snapshot.cluster,
            snapshot.hmm_state.map(|s| s.to_string()).unwrap_or_default(),
        )?;
    }

    info!("Exported {} regime rows to {}", history.len(), output.display());
    for (name, counts) in [
        ("Volatility", format!("{:?}", history.volatility.labels().value_counts())),
        ("Trend", format!("{:?}", history.trend.labels().value_counts())),
        ("Volume", format!("{:?}", history.volume.labels().value_counts())),
        ("Cluster", format!("{:?}", history.cluster.labels().value_counts())),
    ] {
        info!("  {}: {}", name, counts);
    }

    Ok(())
}

/// Hourly bars: a noisy climb from 100 to 120 over the first half, then a
/// range around 120.
fn synthetic_bars(n: usize, seed: u64) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now);
    let half = (n / 2).max(1);

    (0..n)
        .map(|i| {
            let close = if i < half {
                let step = if half > 1 { 20.0 * i as f64 / (half - 1) as f64 } else { 0.0 };
                100.0 + step + rng.gen_range(-1.5..1.5)
            } else {
                120.0 + rng.gen_range(-3.0..3.0)
            };
            Bar {
                timestamp: start + Duration::hours(i as i64),
                open: close - rng.gen_range(0.0..0.5),
                high: close + rng.gen_range(0.0..1.0),
                low: close - rng.gen_range(0.0..1.0),
                close,
                volume: rng.gen_range(1_000..10_000) as f64,
            }
        })
        .collect()
}
