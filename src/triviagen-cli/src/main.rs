//! Triviagen CLI - trivia content generator
//!
//! Asks a generative model for trivia prompts on the given topics, then
//! downloads an image and/or synthesizes narration for each prompt.

use clap::Parser;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use triviagen_core::{
    Config, Credentials, ImageSource, Pipeline, PipelineEvent, RunMode, default_config,
};

#[derive(Parser)]
#[command(
    name = "triviagen",
    version,
    about = "Trivia content generator - prompts, narration and images",
    long_about = "Generates trivia prompts for a list of topics with Gemini, then fetches an image \
                  for each prompt and/or narrates it with ElevenLabs."
)]
struct Cli {
    /// Comma-separated topics, e.g. "drinks, dishes, places" (prompted for when omitted)
    #[arg(value_name = "TOPICS")]
    topics: Option<String>,

    /// Synthesize narration audio for every generated item
    #[arg(long)]
    audio: bool,

    /// Download an image for every generated item (default when no mode is given)
    #[arg(long)]
    images: bool,

    /// Image search service: google, unsplash or shutterstock
    #[arg(long, value_name = "SOURCE")]
    image_source: Option<String>,

    /// Directory receiving the audios/ and photos/ subdirectories
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn mode(&self) -> RunMode {
        match (self.audio, self.images) {
            (false, false) => RunMode::default(),
            (audio, images) => RunMode { audio, images },
        }
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => default_config(),
    };
    if let Some(ref source) = cli.image_source {
        config.search.source = source.parse::<ImageSource>()?;
    }
    if let Some(ref dir) = cli.data_dir {
        config.output.data_dir = dir.clone();
    }

    // Credentials are checked once, while building the pipeline.
    let mode = cli.mode();
    let credentials = Credentials::from_env();
    tracing::debug!(?credentials, ?mode, "starting run");
    let pipeline = Pipeline::from_config(&config, &credentials, mode)?
        .with_callback(create_console_callback());

    let topic_line = match cli.topics {
        Some(topics) => topics,
        None => prompt_for_topics()?,
    };

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Triviagen".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!("{} {}", "Topics:".bold(), topic_line.bright_white());
    println!(
        "{} {}",
        "Output:".bold(),
        pipeline.layout().root().display().to_string().dimmed()
    );
    println!("{}", "─".repeat(70).dimmed());

    let report = pipeline.run(&topic_line).await?;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!(
            "  Done: {} items, {} audio files, {} images ({} without results).",
            report.items.len(),
            report.audio_files.len(),
            report.image_files.len(),
            report.skipped_images.len()
        )
        .bright_green()
        .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());

    Ok(())
}

/// Read one comma-separated topic line from stdin.
fn prompt_for_topics() -> io::Result<String> {
    print!("Enter a topic (e.g., drinks, dishes, places): ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Create a callback that prints pipeline events to the console.
fn create_console_callback() -> Box<dyn Fn(PipelineEvent) + Send + Sync> {
    Box::new(move |event| match event {
        PipelineEvent::ItemsGenerated { items } => {
            if items.is_empty() {
                println!("{}", "No items were generated; nothing to do.".yellow());
            } else {
                println!("{} {}", "Generated items:".bold(), items.len());
            }
        }
        PipelineEvent::ItemStarted { index, item } => {
            println!();
            println!(
                "{} {}",
                format!("{}.", index + 1).bright_cyan(),
                item.bright_cyan().bold()
            );
        }
        PipelineEvent::AudioSaved { path, .. } => {
            println!("  {} {}", "♪ audio".green(), path.display());
        }
        PipelineEvent::ImageSaved { path, .. } => {
            println!("  {} {}", "▣ image".green(), path.display());
        }
        PipelineEvent::ImageSkipped { .. } => {
            println!("  {}", "no image results".yellow());
        }
        PipelineEvent::RunFinished => {
            // Summary printed in main
        }
    })
}
