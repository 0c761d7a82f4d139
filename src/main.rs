//! Command-line entry point for the clinical cascade.
//!
//! # Run sequence
//!
//! 1. Initialise logging (`RUST_LOG` overrides the `info` default).
//! 2. Load [`AppConfig`] from `--config` or the platform config dir.
//! 3. Read the transcript from the given file, or stdin.
//! 4. Validate it into a [`CascadeRequest`]; reject with exit code 2.
//! 5. Build the gateway, knowledge source and telemetry sink.
//! 6. Run the cascade on a tokio runtime; Ctrl-C cancels the run.
//! 7. Print the result JSON (exit 0) or the fallback body (exit 1).

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clinical_cascade::{
    config::AppConfig,
    knowledge::{FileKnowledgeSource, Specialty},
    llm::{ApiGateway, LogTelemetry, MemoryTelemetry, TelemetrySink},
    pipeline::{CascadeOrchestrator, CascadeRequest},
};

#[derive(Parser)]
#[command(name = "clinical-cascade")]
#[command(about = "Structured clinical note from a consultation transcript")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Specialty: physiotherapy, psychology or general_medicine (Spanish names accepted)
    #[arg(long)]
    specialty: Option<Specialty>,

    /// Print a per-call cost/latency summary to stderr
    #[arg(long)]
    telemetry: bool,

    /// Transcript file; reads stdin when omitted
    transcript: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // 1. Configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    // 2. Transcript + validation
    let transcript = read_transcript(cli.transcript.as_deref())?;
    let request = match CascadeRequest::from_config(&transcript, cli.specialty, &config.request) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("request rejected: {e}");
            let body = serde_json::json!({ "error": e.to_string(), "kind": "validation" });
            println!("{}", serde_json::to_string_pretty(&body)?);
            return Ok(ExitCode::from(2));
        }
    };

    // 3. Collaborators
    let knowledge = FileKnowledgeSource::new(config.knowledge.resolved_path());
    let memory = Arc::new(MemoryTelemetry::new());
    let telemetry: Arc<dyn TelemetrySink> = if cli.telemetry {
        memory.clone()
    } else {
        Arc::new(LogTelemetry)
    };
    let orchestrator = CascadeOrchestrator::new(
        Arc::new(ApiGateway::from_config(&config.inference)),
        &config,
        &knowledge,
        telemetry,
    );

    // 4. Run
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let outcome = rt.block_on(orchestrator.run_until_cancelled(&request, async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    }));

    if cli.telemetry {
        print_telemetry(&memory);
    }

    // 5. Output
    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            log::error!("cascade failed: {e}");
            println!("{}", serde_json::to_string_pretty(&e.fallback_body())?);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn read_transcript(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read transcript {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read transcript from stdin")?;
            Ok(text)
        }
    }
}

fn print_telemetry(memory: &MemoryTelemetry) {
    for call in memory.calls() {
        eprintln!(
            "{:<15} {:<20} {:>7}ms  in={:<6} out={:<6} ${:.6}  {:?}",
            call.stage.map(|s| s.label()).unwrap_or("-"),
            call.model,
            call.latency.as_millis(),
            call.input_tokens,
            call.output_tokens,
            call.estimated_cost_usd,
            call.outcome
        );
    }
    for stage in memory.stages() {
        eprintln!(
            "stage {:<15} {:>7}ms{}",
            stage.stage.label(),
            stage.elapsed.as_millis(),
            stage
                .degraded
                .as_deref()
                .map(|r| format!("  degraded: {r}"))
                .unwrap_or_default()
        );
    }
    eprintln!("total estimated cost: ${:.6}", memory.total_cost_usd());
}
