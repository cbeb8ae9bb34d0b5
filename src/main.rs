use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use stem_analyzer::{
    audio::AnalysisResult,
    config::Config,
    error::AnalyzerError,
    processing::ProcessingEngine,
};

#[derive(Parser)]
#[command(
    name = "stem-analyzer",
    version,
    about = "Separate vocals and detect key and tempo of music recordings",
    long_about = "Stem Analyzer splits a recording into vocal and accompaniment stems and reports its key, tempo and spectral descriptors. Results are cached by file fingerprint."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a local audio file (WAV, MP3, FLAC, OGG, M4A, AAC)
    Analyze {
        file: PathBuf,

        /// Skip stem separation
        #[arg(long)]
        no_separation: bool,
    },

    /// Download audio from a video page and analyze it
    Fetch {
        url: String,

        /// Skip stem separation
        #[arg(long)]
        no_separation: bool,
    },

    /// Print remote video metadata as JSON
    Info { url: String },

    /// Maintain the results cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Write the default configuration to a file
    InitConfig { path: PathBuf },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete entries older than the TTL
    Sweep,
    /// Delete every entry
    Clear,
    /// Show entry counts
    Stats,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<AnalyzerError>() {
            Some(err) => eprintln!("Error: {}", err.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };
    config.validate()?;

    let engine = ProcessingEngine::new(config);

    match cli.command {
        Command::Analyze {
            file,
            no_separation,
        } => {
            if no_separation {
                let outcome = engine.analyze(&file).await?;
                print_result(&outcome.result, outcome.cached);
            } else {
                let track = engine.process(&file).await?;
                print_result(&track.result, track.cached);
                print_stems(&track.vocals_path, &track.accompaniment_path);
            }
        }
        Command::Fetch { url, no_separation } => {
            if no_separation {
                let path = engine.download(&url).await?;
                println!("Downloaded: {}", path.display());
                let outcome = engine.analyze(&path).await?;
                print_result(&outcome.result, outcome.cached);
            } else {
                let track = engine.process_remote(&url).await?;
                print_result(&track.result, track.cached);
                print_stems(&track.vocals_path, &track.accompaniment_path);
            }
        }
        Command::Info { url } => {
            let metadata = engine.video_info(&url).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Command::Cache { action } => match action {
            CacheAction::Sweep => {
                let removed = engine.cache().sweep_expired()?;
                println!("Removed {} expired entries", removed);
            }
            CacheAction::Clear => {
                let removed = engine.cache().clear_all()?;
                println!("Removed {} entries", removed);
            }
            CacheAction::Stats => {
                let stats = engine.cache().stats();
                println!("Cache directory: {}", engine.cache().directory().display());
                println!("Entries: {} ({} expired)", stats.entries, stats.expired);
            }
        },
        Command::InitConfig { path } => {
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

fn print_result(result: &AnalysisResult, cached: bool) {
    println!("Key: {}", result.key);
    println!("BPM: {:.1}", result.bpm);
    if cached {
        println!("(from cache)");
    }

    println!("\nDetails:");
    for (name, value) in &result.additional_info {
        println!("  {}: {:.3}", title_case(name), value);
    }
}

fn print_stems(vocals: &std::path::Path, accompaniment: &std::path::Path) {
    println!("\nStems:");
    println!("  Vocals: {}", vocals.display());
    println!("  Accompaniment: {}", accompaniment.display());
}

/// `zero_crossing_rate` -> `Zero Crossing Rate`
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
