use std::fs::File;
use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::types::{AudioData, AudioFormat, TARGET_SAMPLE_RATE};
use crate::config::AudioConfig;
use crate::error::{DecodeError, Result};

/// Decoded, still interleaved source before downmix and resampling
struct RawAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    format: AudioFormat,
}

/// Decodes audio files into mono PCM at a fixed sample rate
pub struct AudioLoader;

impl AudioLoader {
    /// Load an audio file as mono PCM at the standard analysis rate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AudioData> {
        Self::load_with_rate(path, TARGET_SAMPLE_RATE)
    }

    /// Load an audio file as mono PCM at `target_rate`
    pub fn load_with_rate<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<AudioData> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|_| DecodeError::Missing {
            path: path.display().to_string(),
        })?;
        if metadata.len() == 0 {
            return Err(DecodeError::Empty {
                path: path.display().to_string(),
            }
            .into());
        }

        let extension = Self::detect_format(path).unwrap_or_default();
        let raw = match extension.as_str() {
            "wav" => Self::load_wav(path)?,
            "mp3" | "flac" | "ogg" | "m4a" | "aac" => Self::load_with_symphonia(path)?,
            _ => {
                return Err(DecodeError::UnsupportedFormat { format: extension }.into());
            }
        };

        let mono = downmix(&raw.samples, raw.channels);
        if mono.is_empty() {
            return Err(DecodeError::Empty {
                path: path.display().to_string(),
            }
            .into());
        }

        let samples = if raw.sample_rate != target_rate {
            tracing::debug!("Resampling {} Hz -> {} Hz", raw.sample_rate, target_rate);
            resample(mono, raw.sample_rate, target_rate).map_err(|reason| DecodeError::Corrupt {
                path: path.display().to_string(),
                reason,
            })?
        } else {
            mono
        };

        tracing::info!(
            "Loaded {} ({} Hz, {} channel(s))",
            path.display(),
            raw.sample_rate,
            raw.channels
        );

        let mut audio = AudioData::from_samples(samples, target_rate);
        audio.file_path = Some(path.to_path_buf());
        audio.format = Some(raw.format);
        Ok(audio)
    }

    /// Reject inputs that are missing, empty, oversized or of a disallowed type
    pub fn validate<P: AsRef<Path>>(path: P, config: &AudioConfig) -> Result<()> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|_| DecodeError::Missing {
            path: path.display().to_string(),
        })?;

        if !metadata.is_file() {
            return Err(DecodeError::Missing {
                path: path.display().to_string(),
            }
            .into());
        }

        if metadata.len() == 0 {
            return Err(DecodeError::Empty {
                path: path.display().to_string(),
            }
            .into());
        }

        let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
        if size_mb > config.max_file_size_mb as f64 {
            return Err(DecodeError::TooLarge {
                path: path.display().to_string(),
                size_mb,
                limit_mb: config.max_file_size_mb,
            }
            .into());
        }

        let extension = Self::detect_format(path).unwrap_or_default();
        if !config
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
        {
            return Err(DecodeError::UnsupportedFormat { format: extension }.into());
        }

        Ok(())
    }

    /// Load WAV files using the hound crate (most reliable for WAV)
    fn load_wav(path: &Path) -> Result<RawAudio> {
        let corrupt = |reason: String| DecodeError::Corrupt {
            path: path.display().to_string(),
            reason,
        };

        let reader = hound::WavReader::open(path).map_err(|e| corrupt(e.to_string()))?;
        let spec = reader.spec();

        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| corrupt(e.to_string()))?,
            hound::SampleFormat::Int => {
                let bit_depth = spec.bits_per_sample;
                reader
                    .into_samples::<i32>()
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| corrupt(e.to_string()))?
                    .into_iter()
                    .map(|sample| Self::int_to_float(sample, bit_depth))
                    .collect()
            }
        };

        Ok(RawAudio {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            format: AudioFormat {
                extension: "wav".to_string(),
                source_sample_rate: spec.sample_rate,
                source_channels: spec.channels,
                bit_depth: Some(spec.bits_per_sample),
                codec: None,
            },
        })
    }

    /// Load compressed formats using Symphonia
    fn load_with_symphonia(path: &Path) -> Result<RawAudio> {
        let corrupt = |reason: String| DecodeError::Corrupt {
            path: path.display().to_string(),
            reason,
        };

        let file = File::open(path).map_err(|_| DecodeError::Missing {
            path: path.display().to_string(),
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| corrupt(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| corrupt("no decodable audio track".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| corrupt("no sample rate found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| corrupt(e.to_string()))?;

        let mut samples = Vec::new();
        let mut channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                // End of stream
                Err(SymphoniaError::IoError(_)) => break,
                Err(e) => return Err(corrupt(e.to_string()).into()),
            };

            while !format.metadata().is_latest() {
                format.metadata().pop();
            }

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    channels = spec.channels.count() as u16;
                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!("Skipping undecodable packet in {}: {}", path.display(), e);
                    continue;
                }
                Err(SymphoniaError::IoError(_)) => break,
                Err(e) => return Err(corrupt(e.to_string()).into()),
            }
        }

        Ok(RawAudio {
            samples,
            sample_rate,
            channels: channels.max(1),
            format: AudioFormat {
                extension: Self::detect_format(path).unwrap_or_else(|| "unknown".to_string()),
                source_sample_rate: sample_rate,
                source_channels: channels.max(1),
                bit_depth: codec_params.bits_per_sample.map(|b| b as u16),
                codec: Some(format!("{:?}", codec_params.codec)),
            },
        })
    }

    /// Convert integer sample to float (-1.0 to 1.0)
    fn int_to_float(sample: i32, bit_depth: u16) -> f32 {
        match bit_depth {
            8 => (sample as f32 - 128.0) / 128.0,
            16 => sample as f32 / 32768.0,
            24 => sample as f32 / 8388608.0,
            32 => sample as f32 / 2147483648.0,
            _ => sample as f32 / 32768.0,
        }
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        matches!(
            extension.to_lowercase().as_str(),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" | "aac"
        )
    }
}

/// Average interleaved channels into one
fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let channels = channels as usize;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> std::result::Result<Vec<f32>, String> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        target_rate as f64 / source_rate as f64,
        2.0,
        params,
        samples.len(),
        1,
    )
    .map_err(|e| e.to_string())?;

    let waves_in = vec![samples];
    let waves_out = resampler
        .process(&waves_in, None)
        .map_err(|e| e.to_string())?;

    Ok(waves_out.into_iter().next().unwrap_or_default())
}
