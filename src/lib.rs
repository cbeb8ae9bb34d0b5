//! # Stem Analyzer
//!
//! Separate recordings into vocal and accompaniment stems and extract their
//! key, tempo and auxiliary descriptors, with a persistent results cache.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stem_analyzer::{config::Config, processing::ProcessingEngine};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let engine = ProcessingEngine::new(Config::default());
//! let track = engine.process("song.wav").await?;
//!
//! println!("{} at {:.1} BPM", track.result.key, track.result.bpm);
//! println!("Vocals: {}", track.vocals_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`audio`] - Decoding and the key, tempo and descriptor detectors
//! - [`cache`] - Content-addressed results cache with TTL expiry
//! - [`separation`] - Stem separation collaborator
//! - [`download`] - Remote audio download collaborator
//! - [`processing`] - Engine running separation and analysis concurrently
//! - [`config`] - Configuration management
//!
//! ## Custom Collaborators
//!
//! Any separator can be plugged into the engine by implementing
//! [`StemSeparator`](separation::StemSeparator):
//!
//! ```rust,no_run
//! use std::path::Path;
//! use async_trait::async_trait;
//! use stem_analyzer::{separation::StemSeparator, Result};
//!
//! struct CopySeparator;
//!
//! #[async_trait]
//! impl StemSeparator for CopySeparator {
//!     fn name(&self) -> &str {
//!         "copy"
//!     }
//!
//!     async fn separate(&self, input: &Path, output_dir: &Path) -> Result<()> {
//!         tokio::fs::copy(input, output_dir.join("vocals.wav")).await?;
//!         tokio::fs::copy(input, output_dir.join("accompaniment.wav")).await?;
//!         Ok(())
//!     }
//! }
//! ```

pub mod audio;
pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod processing;
pub mod separation;

// Re-export commonly used types for convenience
pub use crate::{
    audio::{AnalysisResult, AudioAnalyzer, AudioLoader},
    cache::ResultsCache,
    config::Config,
    error::{AnalyzerError, Result},
    processing::ProcessingEngine,
};
