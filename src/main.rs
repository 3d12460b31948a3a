//! Credit Default Client - Main Entry Point
//!
//! Scores one manual record (form defaults plus `--set` overrides) or an
//! uploaded CSV/Excel file, then prints the probabilities and the decision
//! at each requested threshold. Extra thresholds relabel the same scores
//! without another request.

use anyhow::{Context, Result};
use clap::Parser;
use credit_default_client::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    loader::BatchLoader,
    metrics::ClientMetrics,
    models::{
        classifier::{is_offered_threshold, THRESHOLD_MAX, THRESHOLD_MIN, THRESHOLD_STEP},
        PredictionClient, RequestCache,
    },
    normalizer::RecordSource,
    pipeline::{InferencePipeline, Scored},
    schema::FormState,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "credit-default-client",
    version,
    about = "Predict the default probability of credit card applicants"
)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// CSV or Excel file to score in batch mode
    #[arg(long)]
    file: Option<PathBuf>,

    /// Manual mode field override, e.g. --set income=0.4
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, String)>,

    /// Decision threshold; repeat to compare thresholds on the same scores
    #[arg(long = "threshold")]
    thresholds: Vec<f64>,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(field, value)| (field.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", raw))
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("credit_default_client={}", config.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load_from_path(&args.config)?;
    init_logging(&config.logging)?;

    info!("Starting Credit Default Client");
    info!(endpoint = %config.server.url(), "Configuration loaded");

    let client = PredictionClient::new(&config.server)?;
    let metrics = Arc::new(ClientMetrics::new());
    let mut pipeline = InferencePipeline::new(
        RequestCache::new(client),
        config.classification.threshold,
    )
    .with_metrics(metrics.clone());

    let source: Box<dyn RecordSource> = match &args.file {
        Some(path) => {
            if !args.set.is_empty() {
                warn!("--set overrides are ignored in file mode");
            }
            let loader = BatchLoader::with_delimiter(config.upload.delimiter_byte());
            let batch = loader
                .load_path(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;

            println!("### Uploaded data");
            println!("{} rows x {} columns: {}", batch.len(), batch.columns.len(), batch.columns.join(", "));
            Box::new(batch)
        }
        None => {
            let mut form = FormState::with_defaults();
            for (field, value) in &args.set {
                form.set_raw(field, value)
                    .with_context(|| format!("Invalid value for {}", field))?;
            }

            println!("### Summary of inputs");
            for (label, value) in form.summary() {
                println!("{:<36} {}", label, value);
            }
            Box::new(form)
        }
    };

    let thresholds = if args.thresholds.is_empty() {
        vec![config.classification.threshold]
    } else {
        args.thresholds.clone()
    };
    for &threshold in &thresholds {
        if !is_offered_threshold(threshold) {
            warn!(
                threshold,
                min = THRESHOLD_MIN,
                max = THRESHOLD_MAX,
                step = THRESHOLD_STEP,
                "Threshold is not one of the offered values; using it as given"
            );
        }
    }

    pipeline.set_threshold(thresholds[0]);
    let scored = pipeline
        .score(source.as_ref())
        .await
        .context("Prediction request failed")?;
    print_results(&scored);

    for &threshold in &thresholds[1..] {
        print_results(&scored.reclassify(threshold));
    }

    metrics.print_summary(Some(pipeline.scorer().stats()));

    Ok(())
}

fn print_results(scored: &Scored) {
    println!();
    println!("### Predicted probability (threshold {:.2})", scored.threshold);
    println!("{:>6}  {:>12}  {}", "row", "probability", "result");
    for (i, (probability, label)) in scored.rows().enumerate() {
        println!("{:>6}  {:>12.6}  {}", i, probability, label);
    }

    let counts = scored.counts();
    println!(
        "{} potential fraud, {} normal",
        counts.potential_fraud, counts.normal
    );
}
