//! Tempo estimation with harmonic cross-validation.
//!
//! A single aggregate estimate over the onset envelope is prone to octave
//! errors and syncopation artifacts. It is compared against the median of
//! frame-wise estimates taken from the harmonic component; when the two
//! disagree by more than the reconcile threshold a third, frame-wise estimate
//! over the full signal is added and the median of the three is reported.

use tracing::debug;

use crate::audio::features::{self, Spectrogram};
use crate::audio::types::{AnalysisConfig, AudioData, TempoEstimate};
use crate::error::Result;

/// Standard deviation of the log-normal tempo prior, in octaves
const PRIOR_STD_OCTAVES: f32 = 1.0;

pub struct TempoDetector {
    config: AnalysisConfig,
}

impl TempoDetector {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Estimate the tempo of a signal
    pub fn detect(&self, audio: &AudioData) -> Result<TempoEstimate> {
        let spec = Spectrogram::compute(
            &audio.samples,
            audio.sample_rate,
            self.config.n_fft,
            self.config.hop_size,
        )?;

        let envelope = features::onset_strength(&spec);
        let harmonic_envelope = features::onset_strength(&spec.harmonic(self.config.hpss_kernel));

        Ok(self.estimate_from_envelopes(&envelope, &harmonic_envelope, audio.sample_rate))
    }

    /// Reconcile estimates from a full-signal and a harmonic onset envelope
    pub fn estimate_from_envelopes(
        &self,
        envelope: &[f32],
        harmonic_envelope: &[f32],
        sample_rate: u32,
    ) -> TempoEstimate {
        let tempogram = self.tempogram(envelope, sample_rate);
        let primary = self.aggregate_tempo(&tempogram, sample_rate);

        let harmonic_tempogram = self.tempogram(harmonic_envelope, sample_rate);
        let harmonic_median = self.median_local_tempo(&harmonic_tempogram, sample_rate);

        debug!(
            "Tempo estimates: primary {:.2} BPM, harmonic median {:.2} BPM",
            primary, harmonic_median
        );

        let mut third_median = None;
        let bpm = reconcile(
            primary,
            harmonic_median,
            self.config.reconcile_threshold_bpm,
            || {
                let third = self.median_local_tempo(&tempogram, sample_rate);
                third_median = Some(third);
                debug!("Estimators disagree, frame-wise median {:.2} BPM", third);
                third
            },
        );

        TempoEstimate {
            bpm,
            primary,
            harmonic_median,
            third_median,
        }
    }

    /// Normalized autocorrelation of a Hann-windowed envelope segment
    /// centred on every frame. Silent windows are left empty.
    pub fn tempogram(&self, envelope: &[f32], sample_rate: u32) -> Vec<Vec<f32>> {
        let fps = self.config.frame_rate(sample_rate);
        let win_length = ((self.config.tempo_window_seconds * fps).round() as usize).max(4);
        let max_lag = self.max_lag(fps).min(win_length - 1);
        let window = features::hann_window(win_length);
        let half = (win_length / 2) as isize;

        let mut segment = vec![0.0f32; win_length];
        (0..envelope.len())
            .map(|frame| {
                let start = frame as isize - half;
                for (i, slot) in segment.iter_mut().enumerate() {
                    let idx = start + i as isize;
                    let value = if idx >= 0 && (idx as usize) < envelope.len() {
                        envelope[idx as usize]
                    } else {
                        0.0
                    };
                    *slot = value * window[i];
                }

                let energy: f32 = segment.iter().map(|&x| x * x).sum();
                if energy <= 0.0 {
                    return Vec::new();
                }

                (0..=max_lag)
                    .map(|lag| {
                        segment[..win_length - lag]
                            .iter()
                            .zip(segment[lag..].iter())
                            .map(|(&a, &b)| a * b)
                            .sum::<f32>()
                            / energy
                    })
                    .collect()
            })
            .collect()
    }

    /// Tempo of the frame-averaged tempogram
    fn aggregate_tempo(&self, tempogram: &[Vec<f32>], sample_rate: u32) -> f32 {
        let active: Vec<&Vec<f32>> = tempogram.iter().filter(|frame| !frame.is_empty()).collect();
        if active.is_empty() {
            debug!("Onset envelope is silent, using the prior tempo");
            return self.config.start_bpm;
        }

        let lags = active[0].len();
        let mut mean = vec![0.0f32; lags];
        for frame in &active {
            for (acc, value) in mean.iter_mut().zip(frame.iter()) {
                *acc += value;
            }
        }
        let n = active.len() as f32;
        mean.iter_mut().for_each(|m| *m /= n);

        self.pick_tempo(&mean, sample_rate)
            .unwrap_or(self.config.start_bpm)
    }

    /// Median of the per-frame tempo picks
    fn median_local_tempo(&self, tempogram: &[Vec<f32>], sample_rate: u32) -> f32 {
        let mut local: Vec<f32> = tempogram
            .iter()
            .filter(|frame| !frame.is_empty())
            .filter_map(|frame| self.pick_tempo(frame, sample_rate))
            .collect();

        if local.is_empty() {
            return self.config.start_bpm;
        }
        features::median(&mut local)
    }

    /// Prior-weighted peak of an autocorrelation, refined by parabolic
    /// interpolation
    pub fn pick_tempo(&self, autocorrelation: &[f32], sample_rate: u32) -> Option<f32> {
        let fps = self.config.frame_rate(sample_rate);
        let min_lag = self.min_lag(fps);
        let max_lag = self.max_lag(fps).min(autocorrelation.len().checked_sub(1)?);
        if min_lag > max_lag {
            return None;
        }

        let weighted = |lag: usize| -> f32 {
            autocorrelation[lag] * self.prior(60.0 * fps / lag as f32)
        };

        let mut best_lag = min_lag;
        let mut best_value = f32::NEG_INFINITY;
        for lag in min_lag..=max_lag {
            let value = weighted(lag);
            if value > best_value {
                best_value = value;
                best_lag = lag;
            }
        }

        if !best_value.is_finite() || best_value <= 0.0 {
            return None;
        }

        let tempo_lag = if best_lag > min_lag && best_lag < max_lag {
            let prev = weighted(best_lag - 1);
            let next = weighted(best_lag + 1);
            let denom = prev - 2.0 * best_value + next;
            if denom.abs() > 1e-10 {
                let offset = (0.5 * (prev - next) / denom).clamp(-0.5, 0.5);
                best_lag as f32 + offset
            } else {
                best_lag as f32
            }
        } else {
            best_lag as f32
        };

        Some(60.0 * fps / tempo_lag)
    }

    /// Log-normal weight centred on `start_bpm`
    fn prior(&self, bpm: f32) -> f32 {
        let octaves = (bpm / self.config.start_bpm).log2() / PRIOR_STD_OCTAVES;
        (-0.5 * octaves * octaves).exp()
    }

    fn min_lag(&self, fps: f32) -> usize {
        ((60.0 * fps / self.config.max_bpm).floor() as usize).max(1)
    }

    fn max_lag(&self, fps: f32) -> usize {
        (60.0 * fps / self.config.min_bpm).ceil() as usize
    }
}

impl Default for TempoDetector {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

/// Return `primary` unless it disagrees with `harmonic` by more than
/// `threshold`, in which case the median of the two and a lazily computed
/// third estimate is returned.
pub fn reconcile<F>(primary: f32, harmonic: f32, threshold: f32, third: F) -> f32
where
    F: FnOnce() -> f32,
{
    if (primary - harmonic).abs() > threshold {
        let mut estimates = [primary, harmonic, third()];
        features::median(&mut estimates)
    } else {
        primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 22050;

    /// Train of narrow Gaussian bumps at `bpm` on a 512-hop onset envelope
    fn pulse_envelope(bpm: f32, frames: usize) -> Vec<f32> {
        let fps = SAMPLE_RATE as f32 / 512.0;
        let period = 60.0 * fps / bpm;
        let mut envelope = vec![0.01f32; frames];
        let mut position = 0.0f32;
        while position < frames as f32 {
            for (j, value) in envelope.iter_mut().enumerate() {
                let d = j as f32 - position;
                *value += (-0.5 * d * d).exp();
            }
            position += period;
        }
        envelope
    }

    #[test]
    fn test_reconcile_agreement_returns_primary() {
        let bpm = reconcile(120.0, 125.0, 10.0, || panic!("third estimator must not run"));
        assert_eq!(bpm, 120.0);
    }

    #[test]
    fn test_reconcile_disagreement_returns_median() {
        assert_eq!(reconcile(120.0, 60.0, 10.0, || 118.0), 118.0);
        assert_eq!(reconcile(180.0, 90.0, 10.0, || 200.0), 180.0);
    }

    #[test]
    fn test_pulse_train_tempo() {
        let detector = TempoDetector::default();
        let envelope = pulse_envelope(120.0, 860);

        let estimate = detector.estimate_from_envelopes(&envelope, &envelope, SAMPLE_RATE);
        assert!((estimate.primary - 120.0).abs() < 3.0, "primary {}", estimate.primary);
        assert_eq!(estimate.bpm, estimate.primary);
        assert!(estimate.third_median.is_none());
    }

    #[test]
    fn test_disagreeing_envelopes_use_median_of_three() {
        let detector = TempoDetector::default();
        let envelope = pulse_envelope(120.0, 860);
        let harmonic = pulse_envelope(75.0, 860);

        let estimate = detector.estimate_from_envelopes(&envelope, &harmonic, SAMPLE_RATE);
        assert!((estimate.primary - estimate.harmonic_median).abs() > 10.0);

        let third = estimate.third_median.expect("third estimator should run");
        let mut all = [estimate.primary, estimate.harmonic_median, third];
        assert_eq!(estimate.bpm, features::median(&mut all));
    }

    #[test]
    fn test_silent_envelope_falls_back_to_prior() {
        let detector = TempoDetector::default();
        let silent = vec![0.0f32; 200];

        let estimate = detector.estimate_from_envelopes(&silent, &silent, SAMPLE_RATE);
        assert_eq!(estimate.bpm, 120.0);
    }

    #[test]
    fn test_prior_prefers_start_bpm() {
        let detector = TempoDetector::default();
        assert!((detector.prior(120.0) - 1.0).abs() < 1e-6);
        assert!(detector.prior(60.0) < detector.prior(100.0));
        assert!(detector.prior(240.0) < detector.prior(150.0));
    }
}
