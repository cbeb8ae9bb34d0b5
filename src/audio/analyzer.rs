use crate::audio::info::InfoExtractor;
use crate::audio::key::KeyDetector;
use crate::audio::tempo::TempoDetector;
use crate::audio::types::{
    AnalysisConfig, AnalysisResult, AudioData, AuxiliaryInfo, KeyResult, TempoEstimate,
};
use crate::error::{AnalysisError, Result};

/// Runs key, tempo and auxiliary detection over a decoded signal
pub struct AudioAnalyzer {
    config: AnalysisConfig,
    key: KeyDetector,
    tempo: TempoDetector,
    info: InfoExtractor,
}

impl AudioAnalyzer {
    /// Create a new analyzer with default configuration
    pub fn new() -> Self {
        Self::with_config(AnalysisConfig::default())
    }

    /// Create a new analyzer with custom configuration
    pub fn with_config(config: AnalysisConfig) -> Self {
        Self {
            key: KeyDetector::new(config.clone()),
            tempo: TempoDetector::new(config.clone()),
            info: InfoExtractor::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Perform the full analysis
    pub fn analyze(&self, audio: &AudioData) -> Result<AnalysisResult> {
        self.config
            .validate()
            .map_err(|e| AnalysisError::InvalidParameters { details: e })?;
        check_signal(audio)?;

        tracing::info!(
            "Starting analysis of {:.1} seconds of audio at {} Hz",
            audio.duration,
            audio.sample_rate
        );

        let key = self.key.detect(audio)?;
        let tempo = self.tempo.detect(audio)?;
        let info = self.info.extract(audio)?;

        tracing::info!(
            "Analysis complete: key {}, BPM {:.1}, key confidence {:.2}",
            key,
            tempo.bpm,
            key.confidence
        );

        Ok(AnalysisResult::new(&key, &tempo, &info))
    }

    /// Key detection only
    pub fn detect_key(&self, audio: &AudioData) -> Result<KeyResult> {
        check_signal(audio)?;
        self.key.detect(audio)
    }

    /// Tempo detection only
    pub fn detect_bpm(&self, audio: &AudioData) -> Result<TempoEstimate> {
        check_signal(audio)?;
        self.tempo.detect(audio)
    }

    /// Auxiliary descriptors only
    pub fn additional_info(&self, audio: &AudioData) -> Result<AuxiliaryInfo> {
        check_signal(audio)?;
        self.info.extract(audio)
    }
}

impl Default for AudioAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn check_signal(audio: &AudioData) -> Result<()> {
    if audio.is_empty() || audio.sample_rate == 0 {
        return Err(AnalysisError::EmptySignal.into());
    }
    if audio.samples.iter().any(|s| !s.is_finite()) {
        return Err(AnalysisError::NonFiniteSignal.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyzerError;

    fn create_test_audio_data() -> AudioData {
        let sample_rate = 22050;
        let duration = 4.0;
        let frequency = 440.0;
        let samples: Vec<f32> = (0..(sample_rate as f64 * duration) as usize)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.5
            })
            .collect();

        AudioData::from_samples(samples, sample_rate)
    }

    #[test]
    fn test_audio_analysis() {
        let audio_data = create_test_audio_data();
        let analyzer = AudioAnalyzer::new();

        let result = analyzer.analyze(&audio_data).unwrap();
        assert!(result.bpm > 0.0);
        assert!(result.key.contains("major") || result.key.contains("minor"));
        assert_eq!(result.info("duration"), Some(4.0));
        assert_eq!(result.additional_info.len(), 5);
    }

    #[test]
    fn test_empty_signal_is_rejected() {
        let analyzer = AudioAnalyzer::new();
        let result = analyzer.analyze(&AudioData::from_samples(Vec::new(), 22050));
        assert!(matches!(
            result,
            Err(AnalyzerError::Analysis(AnalysisError::EmptySignal))
        ));
    }

    #[test]
    fn test_non_finite_signal_is_rejected() {
        let analyzer = AudioAnalyzer::new();
        let mut audio_data = create_test_audio_data();
        audio_data.samples[100] = f32::NAN;

        assert!(matches!(
            analyzer.detect_bpm(&audio_data),
            Err(AnalyzerError::Analysis(AnalysisError::NonFiniteSignal))
        ));
    }

    #[test]
    fn test_config_validation() {
        let config = AnalysisConfig {
            n_fft: 1000,
            ..Default::default()
        };
        let analyzer = AudioAnalyzer::with_config(config);

        let result = analyzer.analyze(&create_test_audio_data());
        assert!(matches!(
            result,
            Err(AnalyzerError::Analysis(AnalysisError::InvalidParameters { .. }))
        ));
    }
}
