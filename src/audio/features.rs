//! Frame-based features shared by the key, tempo and auxiliary detectors.

use std::f32::consts::PI;

use realfft::RealFftPlanner;

use crate::error::{AnalysisError, Result};

/// Lowest note folded into chroma (C2)
const CHROMA_MIN_MIDI: i32 = 36;
/// Highest note folded into chroma (B7)
const CHROMA_MAX_MIDI: i32 = 107;

/// Compression factor for the log-magnitude used by onset strength
const ONSET_LOG_GAMMA: f32 = 100.0;

/// Magnitude spectrogram of centered, Hann-windowed frames
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// One magnitude vector (`n_fft / 2 + 1` bins) per frame
    pub frames: Vec<Vec<f32>>,
    pub n_fft: usize,
    pub hop_size: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    pub fn compute(samples: &[f32], sample_rate: u32, n_fft: usize, hop_size: usize) -> Result<Self> {
        if samples.is_empty() {
            return Err(AnalysisError::EmptySignal.into());
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let mut input_buffer = fft.make_input_vec();
        let mut spectrum_buffer = fft.make_output_vec();
        let window = hann_window(n_fft);

        let frames_count = frame_count(samples.len(), n_fft, hop_size);
        let pad = (n_fft / 2) as isize;
        let mut frames = Vec::with_capacity(frames_count);

        for frame_idx in 0..frames_count {
            let start = (frame_idx * hop_size) as isize - pad;
            for (i, slot) in input_buffer.iter_mut().enumerate() {
                let idx = start + i as isize;
                let sample = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize]
                } else {
                    0.0
                };
                *slot = sample * window[i];
            }

            fft.process(&mut input_buffer, &mut spectrum_buffer)
                .map_err(|e| AnalysisError::Fft {
                    reason: e.to_string(),
                })?;

            frames.push(spectrum_buffer.iter().map(|c| c.norm()).collect());
        }

        Ok(Self {
            frames,
            n_fft,
            hop_size,
            sample_rate,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.n_fft as f32
    }

    /// Drop every bin above `max_hz`
    pub fn band_limited(&self, max_hz: f32) -> Self {
        let keep = ((max_hz * self.n_fft as f32 / self.sample_rate as f32).ceil() as usize + 1)
            .min(self.n_bins());

        Self {
            frames: self.frames.iter().map(|f| f[..keep.min(f.len())].to_vec()).collect(),
            n_fft: self.n_fft,
            hop_size: self.hop_size,
            sample_rate: self.sample_rate,
        }
    }

    /// Harmonic component via median-filtering HPSS with a soft mask.
    ///
    /// Horizontal (time) medians enhance sustained partials, vertical
    /// (frequency) medians enhance transients; each cell keeps
    /// `H² / (H² + P²)` of its magnitude.
    pub fn harmonic(&self, kernel: usize) -> Self {
        let n_frames = self.frames.len();
        if n_frames == 0 {
            return self.clone();
        }
        let n_bins = self.frames[0].len();
        let half = kernel / 2;
        let mut scratch = Vec::with_capacity(kernel);

        let mut harmonic_enhanced = vec![vec![0.0f32; n_bins]; n_frames];
        for bin in 0..n_bins {
            for t in 0..n_frames {
                let lo = t.saturating_sub(half);
                let hi = (t + half + 1).min(n_frames);
                scratch.clear();
                scratch.extend((lo..hi).map(|i| self.frames[i][bin]));
                harmonic_enhanced[t][bin] = median(&mut scratch);
            }
        }

        let mut frames = Vec::with_capacity(n_frames);
        for (frame, h_frame) in self.frames.iter().zip(harmonic_enhanced.iter()) {
            let mut masked = vec![0.0f32; n_bins];
            for bin in 0..n_bins {
                let lo = bin.saturating_sub(half);
                let hi = (bin + half + 1).min(n_bins);
                scratch.clear();
                scratch.extend_from_slice(&frame[lo..hi]);
                let p = median(&mut scratch);
                let h2 = h_frame[bin] * h_frame[bin];

                let denom = h2 + p * p;
                if denom > 0.0 {
                    masked[bin] = frame[bin] * h2 / denom;
                }
            }
            frames.push(masked);
        }

        Self {
            frames,
            n_fft: self.n_fft,
            hop_size: self.hop_size,
            sample_rate: self.sample_rate,
        }
    }
}

/// Number of centered frames for a signal of `len` samples
pub fn frame_count(len: usize, n_fft: usize, hop_size: usize) -> usize {
    let padded = len + 2 * (n_fft / 2);
    if padded < n_fft {
        1
    } else {
        1 + (padded - n_fft) / hop_size
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

/// Median of `values`; averages the middle pair for even lengths.
/// Reorders the slice. Returns 0.0 when empty.
pub fn median(values: &mut [f32]) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }

    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        let lower_max = lower.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        0.5 * (lower_max + upper)
    }
}

/// Per-frame 12-bin chroma, each frame scaled so its largest bin is 1.
///
/// Bins are assigned to their nearest equal-tempered semitone between C2 and
/// B7; a semitone's energy is the mean magnitude of its bins so that wide
/// high-frequency semitones do not outweigh narrow low ones.
pub fn chromagram(spec: &Spectrogram) -> Vec<[f32; 12]> {
    let n_notes = (CHROMA_MAX_MIDI - CHROMA_MIN_MIDI + 1) as usize;
    let n_bins = spec.frames.first().map(|f| f.len()).unwrap_or(0);

    let bin_note: Vec<Option<usize>> = (0..n_bins)
        .map(|bin| {
            let freq = spec.bin_frequency(bin);
            if freq <= 0.0 {
                return None;
            }
            let midi = (12.0 * (freq / 440.0).log2() + 69.0).round() as i32;
            (CHROMA_MIN_MIDI..=CHROMA_MAX_MIDI)
                .contains(&midi)
                .then(|| (midi - CHROMA_MIN_MIDI) as usize)
        })
        .collect();

    let mut bins_per_note = vec![0usize; n_notes];
    for note in bin_note.iter().flatten() {
        bins_per_note[*note] += 1;
    }

    spec.frames
        .iter()
        .map(|frame| {
            let mut notes = vec![0.0f32; n_notes];
            for (mag, note) in frame.iter().zip(bin_note.iter()) {
                if let Some(note) = note {
                    notes[*note] += mag;
                }
            }

            let mut chroma = [0.0f32; 12];
            for (note, energy) in notes.iter().enumerate() {
                if bins_per_note[note] > 0 {
                    let pitch_class = (note as i32 + CHROMA_MIN_MIDI) as usize % 12;
                    chroma[pitch_class] += energy / bins_per_note[note] as f32;
                }
            }

            let peak = chroma.iter().copied().fold(0.0f32, f32::max);
            if peak > 0.0 {
                chroma.iter_mut().for_each(|c| *c /= peak);
            }
            chroma
        })
        .collect()
}

/// Time average of per-frame chroma
pub fn mean_chroma(frames: &[[f32; 12]]) -> [f32; 12] {
    let mut mean = [0.0f32; 12];
    if frames.is_empty() {
        return mean;
    }
    for frame in frames {
        for (acc, value) in mean.iter_mut().zip(frame.iter()) {
            *acc += value;
        }
    }
    let n = frames.len() as f32;
    mean.iter_mut().for_each(|m| *m /= n);
    mean
}

/// Scale to unit sum; an all-zero vector stays zero
pub fn normalize_sum(chroma: &[f32; 12]) -> [f32; 12] {
    let total: f32 = chroma.iter().sum();
    let mut out = *chroma;
    if total > 0.0 {
        out.iter_mut().for_each(|c| *c /= total);
    }
    out
}

/// Onset strength envelope: positive log-magnitude flux averaged over bins
pub fn onset_strength(spec: &Spectrogram) -> Vec<f32> {
    let log_frames: Vec<Vec<f32>> = spec
        .frames
        .iter()
        .map(|frame| frame.iter().map(|&m| (1.0 + ONSET_LOG_GAMMA * m).ln()).collect())
        .collect();

    let mut envelope = Vec::with_capacity(log_frames.len());
    envelope.push(0.0);

    for pair in log_frames.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let flux: f32 = current
            .iter()
            .zip(previous.iter())
            .map(|(&curr, &prev)| (curr - prev).max(0.0))
            .sum();
        envelope.push(flux / current.len().max(1) as f32);
    }

    envelope.truncate(log_frames.len());
    envelope
}

/// Per-frame spectral bandwidth in Hz
pub fn spectral_bandwidth(spec: &Spectrogram) -> Vec<f32> {
    let freqs: Vec<f32> = (0..spec.n_bins()).map(|bin| spec.bin_frequency(bin)).collect();

    spec.frames
        .iter()
        .map(|frame| {
            let total: f32 = frame.iter().sum();
            if total <= 0.0 {
                return 0.0;
            }

            let centroid: f32 = frame
                .iter()
                .zip(freqs.iter())
                .map(|(&mag, &freq)| mag * freq)
                .sum::<f32>()
                / total;

            let variance: f32 = frame
                .iter()
                .zip(freqs.iter())
                .map(|(&mag, &freq)| (mag / total) * (freq - centroid).powi(2))
                .sum();

            variance.sqrt()
        })
        .collect()
}

/// Per-frame zero-crossing rate over centered frames
pub fn zero_crossing_rate(samples: &[f32], frame_length: usize, hop_size: usize) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let frames = frame_count(samples.len(), frame_length, hop_size);
    let pad = (frame_length / 2) as isize;

    (0..frames)
        .map(|frame_idx| {
            let start = ((frame_idx * hop_size) as isize - pad).max(0) as usize;
            let end = (((frame_idx * hop_size) as isize - pad) + frame_length as isize)
                .clamp(0, samples.len() as isize) as usize;
            if end <= start + 1 {
                return 0.0;
            }

            let crossings = samples[start..end]
                .windows(2)
                .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
                .count();
            crossings as f32 / frame_length as f32
        })
        .collect()
}

pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        (0..(sample_rate as f32 * seconds) as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&mut []), 0.0);
    }

    #[test]
    fn test_frame_count_is_centered() {
        assert_eq!(frame_count(22050, 2048, 512), 1 + 22050 / 512);
        assert_eq!(frame_count(10, 2048, 512), 1);
    }

    #[test]
    fn test_spectrogram_peak_bin() {
        let samples = sine(1000.0, 22050, 1.0);
        let spec = Spectrogram::compute(&samples, 22050, 2048, 512).unwrap();
        assert_eq!(spec.n_bins(), 1025);

        let middle = &spec.frames[spec.len() / 2];
        let peak_bin = middle
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!((spec.bin_frequency(peak_bin) - 1000.0).abs() < 15.0);
    }

    #[test]
    fn test_empty_signal_is_rejected() {
        assert!(Spectrogram::compute(&[], 22050, 2048, 512).is_err());
    }

    #[test]
    fn test_chroma_of_a440() {
        let samples = sine(440.0, 22050, 2.0);
        let spec = Spectrogram::compute(&samples, 22050, 8192, 512).unwrap();
        let chroma = mean_chroma(&chromagram(&spec));

        let strongest = chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(strongest, 9);
    }

    #[test]
    fn test_harmonic_suppresses_clicks() {
        let mut samples = sine(440.0, 22050, 2.0);
        for click in (0..samples.len()).step_by(11025) {
            samples[click] = 1.0;
        }
        let spec = Spectrogram::compute(&samples, 22050, 2048, 512).unwrap();
        let harmonic = spec.harmonic(31);

        let full_flux: f32 = onset_strength(&spec).iter().sum();
        let harmonic_flux: f32 = onset_strength(&harmonic).iter().sum();
        assert!(harmonic_flux < full_flux);
    }

    #[test]
    fn test_onset_strength_peaks_at_attack() {
        let mut samples = vec![0.0f32; 22050];
        samples.extend(sine(880.0, 22050, 1.0));
        let spec = Spectrogram::compute(&samples, 22050, 2048, 512).unwrap();
        let envelope = onset_strength(&spec);
        assert_eq!(envelope.len(), spec.len());

        let peak_frame = envelope
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let peak_time = peak_frame as f32 * 512.0 / 22050.0;
        assert!((peak_time - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_zero_crossing_rate_of_sine() {
        let samples = sine(100.0, 22050, 1.0);
        let zcr = zero_crossing_rate(&samples, 2048, 512);
        let middle = zcr[zcr.len() / 2];
        // 200 crossings per second
        assert!((middle - 200.0 / 22050.0).abs() < 0.002);
    }

    #[test]
    fn test_bandwidth_is_zero_for_silence() {
        let spec = Spectrogram::compute(&vec![0.0; 4096], 22050, 2048, 512).unwrap();
        assert!(spectral_bandwidth(&spec).iter().all(|&b| b == 0.0));
    }
}
