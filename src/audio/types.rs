use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sample rate every analysis runs at
pub const TARGET_SAMPLE_RATE: u32 = 22050;

/// Mono PCM signal at a fixed sample rate
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Mono samples in the range -1.0..=1.0
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Duration in seconds
    pub duration: f64,

    /// File the signal was decoded from, if any
    pub file_path: Option<PathBuf>,

    /// Source format information
    pub format: Option<AudioFormat>,
}

impl AudioData {
    /// Wrap already-decoded mono samples
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f64 / sample_rate as f64
        };

        Self {
            samples,
            sample_rate,
            duration,
            file_path: None,
            format: None,
        }
    }

    /// Get time in seconds for a sample index
    pub fn time_for_sample(&self, sample_index: usize) -> f64 {
        sample_index as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Audio file format information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormat {
    /// File extension (wav, mp3, flac, etc.)
    pub extension: String,

    /// Sample rate of the source before resampling
    pub source_sample_rate: u32,

    /// Channel count of the source before downmixing
    pub source_channels: u16,

    /// Bit depth (16, 24, 32, etc.)
    pub bit_depth: Option<u16>,

    /// Codec description (if known)
    pub codec: Option<String>,
}

/// Pitch classes in chroma order
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Index into [`PITCH_CLASSES`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PitchClass(usize);

impl PitchClass {
    pub fn new(index: usize) -> Self {
        Self(index % 12)
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn name(self) -> &'static str {
        PITCH_CLASSES[self.0]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tonal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Major => f.write_str("major"),
            Mode::Minor => f.write_str("minor"),
        }
    }
}

/// Detected key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyResult {
    pub pitch_class: PitchClass,

    pub mode: Mode,

    /// Pearson correlation of the winning rotation, -1.0..=1.0
    pub confidence: f32,

    /// The harmonic-only view disagreed with a low-confidence pick
    pub uncertain: bool,
}

impl fmt::Display for KeyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pitch_class, self.mode)?;
        if self.uncertain {
            f.write_str(" (uncertain)")?;
        }
        Ok(())
    }
}

/// Reconciled tempo together with the estimators that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    /// Reported BPM
    pub bpm: f32,

    /// Aggregate estimate over the full onset envelope
    pub primary: f32,

    /// Median of frame-wise estimates over the harmonic component
    pub harmonic_median: f32,

    /// Median of frame-wise estimates over the full signal, only computed
    /// when the first two disagree
    pub third_median: Option<f32>,
}

/// Descriptors computed next to key and tempo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuxiliaryInfo {
    /// Seconds
    pub duration: f64,

    /// Mean of the predominant local pulse curve, 0.0..=1.0
    pub tempo_confidence: f64,

    /// Largest time-averaged chroma bin, 0.0..=1.0
    pub key_strength: f64,

    /// Mean spectral bandwidth in Hz
    pub spectral_bandwidth: f64,

    /// Mean zero-crossing rate per sample
    pub zero_crossing_rate: f64,
}

impl AuxiliaryInfo {
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("duration".to_string(), self.duration),
            ("tempo_confidence".to_string(), self.tempo_confidence),
            ("key_strength".to_string(), self.key_strength),
            ("spectral_bandwidth".to_string(), self.spectral_bandwidth),
            ("zero_crossing_rate".to_string(), self.zero_crossing_rate),
        ])
    }
}

/// The unit of work that is cached and handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Key string such as "A minor" or "C major (uncertain)"
    pub key: String,

    /// Beats per minute
    pub bpm: f64,

    /// Auxiliary descriptors by name
    pub additional_info: BTreeMap<String, f64>,
}

impl AnalysisResult {
    pub fn new(key: &KeyResult, tempo: &TempoEstimate, info: &AuxiliaryInfo) -> Self {
        Self {
            key: key.to_string(),
            bpm: tempo.bpm as f64,
            additional_info: info.to_map(),
        }
    }

    pub fn info(&self, name: &str) -> Option<f64> {
        self.additional_info.get(name).copied()
    }
}

/// Tunables for the analysis pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Window size for the spectral and onset STFT
    pub n_fft: usize,

    /// Hop size shared by every frame-based feature
    pub hop_size: usize,

    /// Window size for the chroma STFT
    pub chroma_n_fft: usize,

    /// Median filter length used to isolate the harmonic component
    pub hpss_kernel: usize,

    /// Minimum BPM to detect
    pub min_bpm: f32,

    /// Maximum BPM to detect
    pub max_bpm: f32,

    /// Center of the tempo prior
    pub start_bpm: f32,

    /// Onset window length for local tempo estimates, in seconds
    pub tempo_window_seconds: f32,

    /// Disagreement beyond which the three-estimator median is used
    pub reconcile_threshold_bpm: f32,

    /// Key confidence below which the harmonic check runs
    pub uncertainty_threshold: f32,

    /// Harmonic correlation above which a low-confidence key is flagged
    pub harmonic_agreement_threshold: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_size: 512,
            chroma_n_fft: 8192,
            hpss_kernel: 31,
            min_bpm: 30.0,
            max_bpm: 300.0,
            start_bpm: 120.0,
            tempo_window_seconds: 8.0,
            reconcile_threshold_bpm: 10.0,
            uncertainty_threshold: 0.5,
            harmonic_agreement_threshold: 0.5,
        }
    }
}

impl AnalysisConfig {
    /// Create a fast analysis config (coarser chroma, shorter tempo windows)
    pub fn fast() -> Self {
        Self {
            chroma_n_fft: 4096,
            hpss_kernel: 17,
            tempo_window_seconds: 4.0,
            ..Default::default()
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        for (name, size) in [("n_fft", self.n_fft), ("chroma_n_fft", self.chroma_n_fft)] {
            if size == 0 || !size.is_power_of_two() {
                return Err(format!("{} must be a power of two", name));
            }
        }

        if self.hop_size == 0 || self.hop_size > self.n_fft {
            return Err("Hop size must be non-zero and no larger than n_fft".to_string());
        }

        if self.hpss_kernel == 0 || self.hpss_kernel % 2 == 0 {
            return Err("HPSS kernel must be an odd number".to_string());
        }

        if self.min_bpm <= 0.0 || self.min_bpm >= self.max_bpm {
            return Err("Minimum BPM must be positive and less than maximum BPM".to_string());
        }

        if !(self.min_bpm..=self.max_bpm).contains(&self.start_bpm) {
            return Err("Start BPM must lie within the BPM range".to_string());
        }

        if self.tempo_window_seconds <= 0.0 {
            return Err("Tempo window must be positive".to_string());
        }

        if self.reconcile_threshold_bpm < 0.0 {
            return Err("Reconcile threshold cannot be negative".to_string());
        }

        Ok(())
    }

    /// Onset envelope frames per second
    pub fn frame_rate(&self, sample_rate: u32) -> f32 {
        sample_rate as f32 / self.hop_size as f32
    }
}
