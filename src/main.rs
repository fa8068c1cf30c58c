use anyhow::{bail, Context};
use omen::services::{Reference, SignalAnalyzer, VolatilityTuner};
use omen::{Config, OhlcPoint, OhlcvSeries, Timeframe};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: omen <series.json> [reference.json]";

fn load_series(path: &Path) -> anyhow::Result<OhlcvSeries> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let points: Vec<OhlcPoint> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing OHLC points from {}", path.display()))?;
    Ok(OhlcvSeries::from_points(&points))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "omen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;

    let mut args = std::env::args().skip(1);
    let Some(series_path) = args.next() else {
        bail!(USAGE);
    };
    let reference_path = args.next();

    let symbol = std::env::var("OMEN_SYMBOL").unwrap_or_else(|_| "asset".to_string());
    let reference_symbol =
        std::env::var("OMEN_REFERENCE_SYMBOL").unwrap_or_else(|_| "reference".to_string());
    let timeframe = match std::env::var("OMEN_TIMEFRAME") {
        Ok(raw) => Timeframe::from_str(&raw)
            .with_context(|| format!("unknown timeframe {:?}", raw))?,
        Err(_) => Timeframe::default(),
    };

    let series = load_series(Path::new(&series_path))?;
    let reference_series = reference_path
        .as_deref()
        .map(|path| load_series(Path::new(path)))
        .transpose()?;

    info!(
        "Analyzing {} at {} ({} bars{})",
        symbol,
        timeframe,
        series.len(),
        if reference_series.is_some() { ", with reference" } else { "" }
    );

    let analyzer = SignalAnalyzer::from_config(&config, Arc::new(VolatilityTuner::default()));
    let reference = reference_series.as_ref().map(|series| Reference {
        symbol: &reference_symbol,
        series,
    });

    let Some(report) = analyzer.analyze(&symbol, timeframe, &series, reference) else {
        warn!("Series for {} is empty, nothing to analyze", symbol);
        bail!("empty series in {}", series_path);
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
