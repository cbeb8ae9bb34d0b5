//! Auxiliary descriptors reported next to key and tempo.

use std::f32::consts::PI;

use realfft::RealFftPlanner;
use rustfft::num_complex::Complex;

use crate::audio::features::{self, Spectrogram};
use crate::audio::types::{AnalysisConfig, AudioData, AuxiliaryInfo};
use crate::error::{AnalysisError, Result};

/// Highest frequency the chroma filterbank reads
const CHROMA_MAX_HZ: f32 = 4100.0;

pub struct InfoExtractor {
    config: AnalysisConfig,
}

impl InfoExtractor {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Compute every auxiliary descriptor for a signal
    pub fn extract(&self, audio: &AudioData) -> Result<AuxiliaryInfo> {
        if audio.is_empty() {
            return Err(AnalysisError::EmptySignal.into());
        }

        let (chroma, (spectral, zcr)) = rayon::join(
            || self.key_strength(audio),
            || {
                rayon::join(
                    || self.spectral_descriptors(audio),
                    || {
                        features::mean(&features::zero_crossing_rate(
                            &audio.samples,
                            self.config.n_fft,
                            self.config.hop_size,
                        ))
                    },
                )
            },
        );

        let key_strength = chroma?;
        let (spectral_bandwidth, tempo_confidence) = spectral?;

        Ok(AuxiliaryInfo {
            duration: audio.samples.len() as f64 / audio.sample_rate as f64,
            tempo_confidence: tempo_confidence as f64,
            key_strength: key_strength as f64,
            spectral_bandwidth: spectral_bandwidth as f64,
            zero_crossing_rate: zcr as f64,
        })
    }

    /// Largest bin of the time-averaged chroma
    fn key_strength(&self, audio: &AudioData) -> Result<f32> {
        let spec = Spectrogram::compute(
            &audio.samples,
            audio.sample_rate,
            self.config.chroma_n_fft,
            self.config.hop_size,
        )?
        .band_limited(CHROMA_MAX_HZ);

        let chroma = features::mean_chroma(&features::chromagram(&spec));
        Ok(chroma.iter().copied().fold(0.0f32, f32::max))
    }

    /// Mean spectral bandwidth and tempo confidence from one STFT
    fn spectral_descriptors(&self, audio: &AudioData) -> Result<(f32, f32)> {
        let spec = Spectrogram::compute(
            &audio.samples,
            audio.sample_rate,
            self.config.n_fft,
            self.config.hop_size,
        )?;

        let bandwidth = features::mean(&features::spectral_bandwidth(&spec));
        let envelope = features::onset_strength(&spec);
        let pulse = self.predominant_local_pulse(&envelope, audio.sample_rate)?;

        Ok((bandwidth, features::mean(&pulse)))
    }

    /// Predominant local pulse curve of an onset envelope.
    ///
    /// Each frame's windowed envelope segment contributes a unit-amplitude
    /// sinusoid at its strongest in-range tempo frequency and phase. The
    /// overlap-added curve is half-wave rectified and scaled to a peak of 1.
    pub fn predominant_local_pulse(&self, envelope: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        let n = envelope.len();
        let mut pulse = vec![0.0f32; n];
        if n == 0 {
            return Ok(pulse);
        }

        let fps = self.config.frame_rate(sample_rate);
        let win_length = ((self.config.tempo_window_seconds * fps).round() as usize).max(4);
        let window = features::hann_window(win_length);
        let half = (win_length / 2) as isize;

        // Bin k of a win_length FFT corresponds to k * fps * 60 / win_length BPM
        let bpm_per_bin = fps * 60.0 / win_length as f32;
        let min_bin = ((self.config.min_bpm / bpm_per_bin).ceil() as usize).max(1);
        let max_bin = ((self.config.max_bpm / bpm_per_bin).floor() as usize).min(win_length / 2);
        if min_bin > max_bin {
            return Ok(pulse);
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(win_length);
        let mut input = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();

        for frame in 0..n {
            let start = frame as isize - half;
            let mut energy = 0.0f32;
            for (i, slot) in input.iter_mut().enumerate() {
                let idx = start + i as isize;
                let value = if idx >= 0 && (idx as usize) < n {
                    envelope[idx as usize]
                } else {
                    0.0
                };
                *slot = value * window[i];
                energy += *slot * *slot;
            }
            if energy <= 0.0 {
                continue;
            }

            fft.process(&mut input, &mut spectrum)
                .map_err(|e| AnalysisError::Fft {
                    reason: e.to_string(),
                })?;

            let (bin, peak): (usize, Complex<f32>) = spectrum[min_bin..=max_bin]
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
                .map(|(offset, c)| (min_bin + offset, *c))
                .unwrap_or((min_bin, spectrum[min_bin]));

            if peak.norm() <= 0.0 {
                continue;
            }
            let phase = peak.arg();
            let omega = 2.0 * PI * bin as f32 / win_length as f32;

            for (i, &w) in window.iter().enumerate() {
                let idx = start + i as isize;
                if idx >= 0 && (idx as usize) < n {
                    pulse[idx as usize] += w * (omega * i as f32 + phase).cos();
                }
            }
        }

        pulse.iter_mut().for_each(|p| *p = p.max(0.0));
        let peak = pulse.iter().copied().fold(0.0f32, f32::max);
        if peak > 0.0 {
            pulse.iter_mut().for_each(|p| *p /= peak);
        }

        Ok(pulse)
    }
}

impl Default for InfoExtractor {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}
