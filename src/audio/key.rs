//! Key detection by correlating averaged chroma against tonal profiles.
//!
//! The averaged chroma vector is rotated through all twelve pitch-class
//! offsets; each rotation is scored by its Pearson correlation with the
//! Krumhansl-Kessler major and minor profiles. A low-confidence pick is
//! cross-checked against chroma taken from the harmonic component only.

use tracing::debug;

use crate::audio::features::{self, Spectrogram};
use crate::audio::types::{AnalysisConfig, AudioData, KeyResult, Mode, PitchClass};
use crate::error::Result;

/// Krumhansl-Kessler major profile, tonic first
pub const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler minor profile, tonic first
pub const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Highest frequency the chroma filterbank reads (just above B7)
const CHROMA_MAX_HZ: f32 = 4100.0;

/// Score of one chroma rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationScore {
    pub shift: usize,
    pub major: f32,
    pub minor: f32,
}

impl RotationScore {
    pub fn best(&self) -> f32 {
        self.major.max(self.minor)
    }
}

/// Key picked from a single chroma vector, before the harmonic check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEstimate {
    pub pitch_class: PitchClass,
    pub mode: Mode,
    pub confidence: f32,
    pub shift: usize,
}

pub struct KeyDetector {
    config: AnalysisConfig,
}

impl KeyDetector {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Detect the key of a signal
    pub fn detect(&self, audio: &AudioData) -> Result<KeyResult> {
        let spec = Spectrogram::compute(
            &audio.samples,
            audio.sample_rate,
            self.config.chroma_n_fft,
            self.config.hop_size,
        )?
        .band_limited(CHROMA_MAX_HZ);

        let chroma = features::normalize_sum(&features::mean_chroma(&features::chromagram(&spec)));

        Ok(self.resolve(&chroma, || {
            let harmonic = spec.harmonic(self.config.hpss_kernel);
            features::normalize_sum(&features::mean_chroma(&features::chromagram(&harmonic)))
        }))
    }

    /// Pick the key from the averaged chroma and flag it as uncertain when a
    /// low-confidence pick also matches the harmonic-only chroma.
    ///
    /// `harmonic_chroma` is only evaluated for low-confidence picks.
    pub fn resolve<F>(&self, chroma: &[f32; 12], harmonic_chroma: F) -> KeyResult
    where
        F: FnOnce() -> [f32; 12],
    {
        let estimate = self.detect_from_chroma(chroma);

        debug!(
            "Key estimate {} {} (confidence {:.3}, shift {})",
            estimate.pitch_class, estimate.mode, estimate.confidence, estimate.shift
        );

        let uncertain = if estimate.confidence < self.config.uncertainty_threshold {
            let harmonic_corr = sanitize(pearson(
                &rotate(&harmonic_chroma(), estimate.shift),
                profile(estimate.mode),
            ));

            debug!(
                "Low key confidence, harmonic correlation {:.3} against {} profile",
                harmonic_corr, estimate.mode
            );
            harmonic_corr > self.config.harmonic_agreement_threshold
        } else {
            false
        };

        KeyResult {
            pitch_class: estimate.pitch_class,
            mode: estimate.mode,
            confidence: estimate.confidence,
            uncertain,
        }
    }

    /// Pick the best key for an averaged, sum-normalized chroma vector
    pub fn detect_from_chroma(&self, chroma: &[f32; 12]) -> KeyEstimate {
        let scores = rotation_scores(chroma);

        // NaN correlations were already mapped to -1.0; strict comparison
        // keeps the earliest rotation on ties.
        let mut winner = scores[0];
        for score in scores.iter().skip(1) {
            if score.best() > winner.best() {
                winner = *score;
            }
        }

        let mode = if winner.major > winner.minor {
            Mode::Major
        } else {
            Mode::Minor
        };

        KeyEstimate {
            pitch_class: PitchClass::new((12 - winner.shift) % 12),
            mode,
            confidence: winner.best(),
            shift: winner.shift,
        }
    }
}

impl Default for KeyDetector {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

/// Correlations of every rotation against both profiles
pub fn rotation_scores(chroma: &[f32; 12]) -> [RotationScore; 12] {
    std::array::from_fn(|shift| {
        let rotated = rotate(chroma, shift);
        RotationScore {
            shift,
            major: sanitize(pearson(&rotated, &MAJOR_PROFILE)),
            minor: sanitize(pearson(&rotated, &MINOR_PROFILE)),
        }
    })
}

fn profile(mode: Mode) -> &'static [f32; 12] {
    match mode {
        Mode::Major => &MAJOR_PROFILE,
        Mode::Minor => &MINOR_PROFILE,
    }
}

/// Circular shift towards higher indices: `out[i] = chroma[i - shift]`
pub fn rotate(chroma: &[f32; 12], shift: usize) -> [f32; 12] {
    let mut rotated = *chroma;
    rotated.rotate_right(shift % 12);
    rotated
}

/// Pearson correlation; NaN when either side is flat.
///
/// A variance that is only rounding noise relative to the vector's energy
/// counts as flat.
pub fn pearson(x: &[f32; 12], y: &[f32; 12]) -> f32 {
    let n = 12.0_f32;
    let mean_x = x.iter().sum::<f32>() / n;
    let mean_y = y.iter().sum::<f32>() / n;

    let mut cov = 0.0_f32;
    let mut var_x = 0.0_f32;
    let mut var_y = 0.0_f32;
    let mut energy_x = 0.0_f32;
    let mut energy_y = 0.0_f32;

    for i in 0..12 {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
        energy_x += x[i] * x[i];
        energy_y += y[i] * y[i];
    }

    if var_x <= f32::EPSILON * energy_x || var_y <= f32::EPSILON * energy_y {
        return f32::NAN;
    }

    (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0)
}

/// Degenerate correlations rank below every real one
fn sanitize(correlation: f32) -> f32 {
    if correlation.is_finite() {
        correlation
    } else {
        -1.0
    }
}
