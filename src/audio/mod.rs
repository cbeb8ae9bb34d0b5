//! # Audio Analysis Module
//!
//! Decodes recordings and extracts their musical metadata.
//!
//! ## Core Features
//!
//! - **Key Detection**: chroma profile correlation against Krumhansl-Kessler
//!   major and minor profiles, with a harmonic-only cross-check
//! - **Tempo Estimation**: autocorrelation tempogram with harmonic
//!   cross-validation and median-of-three reconciliation
//! - **Auxiliary Descriptors**: duration, tempo confidence, key strength,
//!   spectral bandwidth and zero-crossing rate
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stem_analyzer::audio::{AudioAnalyzer, AudioLoader};
//!
//! # fn main() -> anyhow::Result<()> {
//! let audio_data = AudioLoader::load("song.wav")?;
//!
//! let analyzer = AudioAnalyzer::new();
//! let result = analyzer.analyze(&audio_data)?;
//!
//! println!("Key: {}", result.key);
//! println!("BPM: {:.1}", result.bpm);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod features;
pub mod info;
pub mod key;
pub mod loader;
pub mod synth;
pub mod tempo;
pub mod types;

pub use analyzer::AudioAnalyzer;
pub use info::InfoExtractor;
pub use key::KeyDetector;
pub use loader::AudioLoader;
pub use tempo::TempoDetector;
pub use types::{
    AnalysisConfig, AnalysisResult, AudioData, AudioFormat, AuxiliaryInfo, KeyResult, Mode,
    PitchClass, TempoEstimate,
};
