//! CineSense CLI
//!
//! Classifies text from arguments or stdin with the adaptive sentiment
//! runtime and reports the detected hardware capabilities.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use cinesense_classifiers::{RuntimeConfig, SentimentOrchestrator};
use cinesense_core::SentimentResult;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;
use tracing::info;

mod config;

#[derive(Parser, Debug)]
#[command(name = "cinesense")]
#[command(about = "Adaptive sentiment analysis for movie reviews", long_about = None)]
pub struct Cli {
    /// Runtime configuration file (YAML)
    #[arg(short, long, env = "CINESENSE_CONFIG")]
    config: Option<PathBuf>,

    /// Local directory holding integration config, vocabulary and weights
    #[arg(short, long)]
    assets: Option<PathBuf>,

    /// Hugging Face model repository to fetch assets from
    #[arg(long, conflicts_with = "assets")]
    hf_repo: Option<String>,

    /// Revision of --hf-repo
    #[arg(long, default_value = "main")]
    hf_revision: String,

    /// Keyword lexicon JSON
    #[arg(short, long)]
    lexicon: Option<PathBuf>,

    /// Skip the neural backends
    #[arg(short, long)]
    keyword_only: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify text
    Analyze(AnalyzeArgs),
    /// Print detected hardware capabilities and the recommended tier
    Detect,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Texts to classify
    texts: Vec<String>,

    /// Also read one text per line from stdin
    #[arg(long)]
    stdin: bool,

    /// Print runtime status and monitor counters after the results
    #[arg(long)]
    stats: bool,

    /// Print Prometheus metrics after the results
    #[arg(long)]
    metrics: bool,
}

#[derive(Serialize)]
struct AnalysisLine<'a> {
    text: &'a str,
    #[serde(flatten)]
    result: &'a SentimentResult,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let runtime_config = config::load(&cli)?;

    match &cli.command {
        Command::Detect => detect(runtime_config),
        Command::Analyze(args) => analyze(runtime_config, args).await,
    }
}

fn detect(runtime_config: RuntimeConfig) -> Result<()> {
    let orchestrator = SentimentOrchestrator::new(runtime_config);
    let capabilities = orchestrator.capabilities();
    println!("{}", serde_json::to_string_pretty(&capabilities)?);
    Ok(())
}

async fn analyze(
    runtime_config: RuntimeConfig,
    args: &AnalyzeArgs,
) -> Result<()> {
    let metrics_handle = if args.metrics {
        Some(init_metrics()?)
    } else {
        None
    };

    let texts = collect_texts(args).await?;
    if texts.is_empty() {
        anyhow::bail!("no input text; pass TEXT arguments or --stdin");
    }

    let orchestrator = SentimentOrchestrator::new(runtime_config);
    if !orchestrator.initialize().await {
        anyhow::bail!("sentiment runtime failed to initialize");
    }

    let status = orchestrator.status().await;
    info!(
        achieved = ?status.achieved_tier,
        backends = ?status.ready_backends,
        "Analyzing {} text(s)",
        texts.len()
    );

    let results = orchestrator.analyze_batch(&texts).await;
    let report = if args.stats {
        Some(serde_json::json!({
            "status": orchestrator.status().await,
            "monitor": orchestrator.monitor().snapshot(),
        }))
    } else {
        None
    };

    {
        let mut out = std::io::stdout().lock();
        for (text, result) in texts.iter().zip(&results) {
            serde_json::to_writer(&mut out, &AnalysisLine { text, result })?;
            writeln!(out)?;
        }

        if let Some(report) = &report {
            writeln!(out, "{}", serde_json::to_string_pretty(report)?)?;
        }

        if let Some(handle) = &metrics_handle {
            write!(out, "{}", handle.render())?;
        }
    }

    orchestrator.cleanup().await;
    Ok(())
}

async fn collect_texts(args: &AnalyzeArgs) -> Result<Vec<String>> {
    let mut texts = args.texts.clone();
    if args.stdin {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            texts.push(line);
        }
    }
    Ok(texts)
}

/// Initialize tracing/logging on stderr
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("cinesense=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cinesense=info"))
    };

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "cinesense_analyses_total",
        "Analyses completed, by input length bucket and outcome"
    );
    metrics::describe_histogram!(
        "cinesense_analysis_latency_us",
        metrics::Unit::Microseconds,
        "Analysis latency in microseconds by input length bucket"
    );
    metrics::describe_counter!(
        "cinesense_backend_accepted_total",
        "Accepted results by backend"
    );
    metrics::describe_counter!("cinesense_cache_hits_total", "Results served from the cache");

    info!("Metrics exporter initialized");
    Ok(handle)
}
