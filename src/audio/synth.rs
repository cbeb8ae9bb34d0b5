//! Synthetic test signals with known key and tempo.

use std::f32::consts::PI;

/// C major triad (C4, E4, G4)
pub const C_MAJOR_TRIAD: [f32; 3] = [261.63, 329.63, 392.0];

/// A minor triad (A3, C4, E4)
pub const A_MINOR_TRIAD: [f32; 3] = [220.0, 261.63, 329.63];

/// Pitch of the click bursts (C6)
const CLICK_HZ: f32 = 1046.5;

/// Decay time constant of a click, in seconds
const CLICK_DECAY: f32 = 0.02;

/// Short decaying sine bursts at `bpm`, starting at time zero
pub fn click_track(bpm: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * seconds) as usize;
    let interval = 60.0 / bpm;

    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let since_beat = t % interval;
            if since_beat < 5.0 * CLICK_DECAY {
                (2.0 * PI * CLICK_HZ * t).sin() * (-since_beat / CLICK_DECAY).exp() * 0.6
            } else {
                0.0
            }
        })
        .collect()
}

/// Sustained chord of equal-amplitude sines
pub fn chord(frequencies: &[f32], seconds: f32, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * seconds) as usize;

    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            frequencies
                .iter()
                .map(|f| (2.0 * PI * f * t).sin() * amplitude)
                .sum()
        })
        .collect()
}

/// Sample-wise sum, clamped to -1.0..=1.0; the result has the longer length
pub fn mix(a: &[f32], b: &[f32]) -> Vec<f32> {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0.0) + b.get(i).copied().unwrap_or(0.0);
            x.clamp(-1.0, 1.0)
        })
        .collect()
}
