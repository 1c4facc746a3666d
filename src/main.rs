use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use callsentry::capture::{
    format_elapsed, CaptureSession, MicDevice, RecorderDevice, ReplayDevice,
};
use callsentry::{AnalysisResult, ApiClient, AppContext, Config};

#[derive(Parser)]
#[command(
    name = "callsentry",
    version,
    about = "Submit call audio to the fraud analysis service"
)]
struct Cli {
    /// Config file path (extension resolved by the loader)
    #[arg(long, default_value = "config/callsentry")]
    config: String,

    /// Override the analysis service root URL
    #[arg(long)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze an existing audio file
    Upload { file: PathBuf },

    /// Record live audio and analyze the result
    Record {
        /// Recording length in seconds
        #[arg(long, default_value_t = 10)]
        duration: u64,

        /// Replay this file instead of capturing from the microphone
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Show the analysis history, newest first
    History,

    /// Show service-side counters
    Stats,

    /// Delete all server-side analysis history
    ClearHistory {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Trigger a model training run
    TrainModel,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut cfg = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            debug!("No config loaded from {} ({}), using defaults", cli.config, e);
            Config::default()
        }
    };
    if let Some(url) = cli.backend_url {
        cfg.backend.base_url = url;
    }

    info!("Analysis service: {}", cfg.backend.base_url);

    let client = ApiClient::new(&cfg.backend.base_url)?;
    let ctx = AppContext::new(client);

    match cli.command {
        Command::Upload { file } => {
            ctx.begin_analysis().await;
            let result = ctx.submit_upload(&file).await?;
            print_result(&result);
        }

        Command::Record { duration, input } => {
            let device: Box<dyn RecorderDevice> = match input {
                Some(path) => Box::new(ReplayDevice::new(path)),
                None => Box::new(MicDevice::new(
                    cfg.capture.sample_rate,
                    cfg.capture.chunk_duration_ms,
                )),
            };
            let mut session = CaptureSession::new(device);

            ctx.begin_analysis().await;
            session.start().await?;

            for _ in 0..duration {
                tokio::time::sleep(Duration::from_secs(1)).await;
                print!("\rRecording {}", format_elapsed(session.elapsed_seconds()));
                io::stdout().flush().ok();
            }
            println!();

            let recording = session.stop().await?;
            println!(
                "Captured {} bytes ({}), analyzing...",
                recording.bytes.len(),
                recording.extension
            );

            let result = ctx.submit_recording(recording).await?;
            print_result(&result);
        }

        Command::History => {
            ctx.refresh().await;
            let state = ctx.snapshot().await;

            if state.history.is_empty() {
                println!("No history available");
            }
            for entry in state.history.iter().rev() {
                let verdict = match &entry.fraud_detection {
                    Some(fd) if fd.is_fraud => {
                        format!("FRAUD DETECTED [{}] {:.1}%", fd.risk_level, fd.confidence * 100.0)
                    }
                    Some(fd) => format!("LEGITIMATE {:.1}%", fd.confidence * 100.0),
                    None => "TRANSCRIPTION FAILED".to_string(),
                };

                println!(
                    "{}  {}  {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.filename,
                    verdict
                );
                println!("    {}", transcript_preview(entry.transcript.as_str(), entry.transcription_error.as_deref()));
            }
        }

        Command::Stats => {
            ctx.refresh().await;
            let state = ctx.snapshot().await;

            match state.stats {
                Some(stats) => {
                    println!("Audio files:     {}", stats.audio_files);
                    println!("Transcripts:     {}", stats.transcripts);
                    println!("History records: {}", stats.history_records);
                    println!(
                        "Model status:    {}",
                        if stats.model_trained { "trained" } else { "not trained" }
                    );
                }
                None => println!("Stats unavailable"),
            }
        }

        Command::ClearHistory { yes } => {
            if !yes && !confirm("Clear all analysis history?")? {
                println!("Aborted.");
                return Ok(());
            }
            ctx.clear_history().await?;
            println!("History cleared.");
        }

        Command::TrainModel => {
            let outcome = ctx.train_model().await?;
            println!(
                "Model trained. Accuracy: {:.2}%",
                outcome.metrics.accuracy * 100.0
            );
        }
    }

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read confirmation")?;

    Ok(matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn transcript_preview(transcript: &str, error: Option<&str>) -> String {
    if transcript.is_empty() {
        return error.unwrap_or("No transcript available").to_string();
    }

    let preview: String = transcript.chars().take(100).collect();
    if preview.len() < transcript.len() {
        format!("{}...", preview)
    } else {
        preview
    }
}

fn print_result(result: &AnalysisResult) {
    match &result.fraud_detection {
        Some(fd) => {
            println!(
                "{}",
                if fd.is_fraud { "FRAUD DETECTED" } else { "CALL IS LEGITIMATE" }
            );
            println!("Confidence: {:.2}%", fd.confidence * 100.0);
            println!("Risk level: {}", fd.risk_level);
            if !fd.fraud_indicators.is_empty() {
                println!("Indicators: {}", fd.fraud_indicators.join(", "));
            }
        }
        None => {
            println!("Transcription failed; no fraud verdict");
            if let Some(e) = &result.transcription_error {
                println!("Reason: {}", e);
            }
        }
    }

    if !result.transcript.is_empty() {
        println!("\nTranscript:\n{}", result.transcript);
    }
}
