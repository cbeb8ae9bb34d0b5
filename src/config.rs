use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    audio::types::{AnalysisConfig, TARGET_SAMPLE_RATE},
    cache::FingerprintMode,
    error::{ConfigError, Result},
};

/// Main configuration for the stem analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input decoding and validation
    pub audio: AudioConfig,

    /// DSP tunables for key, tempo and auxiliary analysis
    pub analysis: AnalysisConfig,

    /// Results cache settings
    pub cache: CacheConfig,

    /// Separation, download and branch timeouts
    pub processing: ProcessingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|_| ConfigError::ParseFailed {
            path: path.display().to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.analysis
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                key: "analysis".to_string(),
                value: e,
            })?;
        self.cache.validate()?;
        self.processing.validate()?;
        Ok(())
    }
}

/// Input decoding and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate every analysis runs at (Hz)
    pub sample_rate: u32,

    /// Largest accepted input file
    pub max_file_size_mb: u64,

    /// Accepted file extensions, lower case
    pub allowed_extensions: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: TARGET_SAMPLE_RATE,
            max_file_size_mb: 300,
            allowed_extensions: ["wav", "mp3", "flac", "ogg", "m4a", "aac"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidValue {
                key: "audio.sample_rate".to_string(),
                value: self.sample_rate.to_string(),
            }
            .into());
        }

        if self.max_file_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                key: "audio.max_file_size_mb".to_string(),
                value: self.max_file_size_mb.to_string(),
            }
            .into());
        }

        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "audio.allowed_extensions".to_string(),
                value: "[]".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Results cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the index and payload files
    pub directory: PathBuf,

    /// Entries older than this are treated as absent
    pub ttl_days: u64,

    /// What goes into a file's fingerprint
    pub fingerprint: FingerprintMode,

    /// How long an index update waits for the lock file
    pub lock_timeout_ms: u64,

    /// Lock files older than this are assumed abandoned
    pub stale_lock_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("cache"),
            ttl_days: 7,
            fingerprint: FingerprintMode::default(),
            lock_timeout_ms: 5000,
            stale_lock_secs: 30,
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<()> {
        if self.ttl_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache.ttl_days".to_string(),
                value: self.ttl_days.to_string(),
            }
            .into());
        }

        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache.lock_timeout_ms".to_string(),
                value: self.lock_timeout_ms.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Separation, download and branch timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Scratch space for separated stems and downloads
    pub work_dir: PathBuf,

    /// Upper bound on each concurrent branch
    pub branch_timeout_secs: u64,

    /// Stem separation executable
    pub separator_command: String,

    /// Separation model passed to the executable
    pub separator_model: String,

    /// Remote audio downloader executable
    pub downloader_command: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("temp"),
            branch_timeout_secs: 300,
            separator_command: "spleeter".to_string(),
            separator_model: "spleeter:2stems".to_string(),
            downloader_command: "yt-dlp".to_string(),
        }
    }
}

impl ProcessingConfig {
    fn validate(&self) -> Result<()> {
        if self.branch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "processing.branch_timeout_secs".to_string(),
                value: self.branch_timeout_secs.to_string(),
            }
            .into());
        }

        for (key, value) in [
            ("processing.separator_command", &self.separator_command),
            ("processing.downloader_command", &self.downloader_command),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.clone(),
                }
                .into());
            }
        }

        Ok(())
    }

    pub fn separated_dir(&self) -> PathBuf {
        self.work_dir.join("separated")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.work_dir.join("downloads")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.audio.sample_rate, 22050);
        assert_eq!(config.cache.ttl_days, 7);
        assert_eq!(config.processing.branch_timeout_secs, 300);
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.cache.ttl_days = 3;
        config.cache.fingerprint = FingerprintMode::ContentOnly;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.cache.ttl_days, 3);
        assert_eq!(loaded.cache.fingerprint, FingerprintMode::ContentOnly);
        assert_eq!(loaded.analysis.chroma_n_fft, 8192);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\ndirectory = \"/tmp/analysis-cache\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.cache.directory, PathBuf::from("/tmp/analysis-cache"));
        assert_eq!(config.cache.ttl_days, 7);
        assert_eq!(config.processing.separator_command, "spleeter");
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.processing.branch_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.analysis.min_bpm = 400.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("no/such/config.toml");
        assert!(matches!(
            result,
            Err(crate::error::AnalyzerError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
