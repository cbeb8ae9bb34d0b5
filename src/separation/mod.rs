//! Vocal/accompaniment separation via an external tool.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ProcessingConfig;
use crate::error::{ExternalServiceError, Result};

/// File name of the vocal stem inside an output directory
pub const VOCALS_STEM: &str = "vocals.wav";

/// File name of the accompaniment stem inside an output directory
pub const ACCOMPANIMENT_STEM: &str = "accompaniment.wav";

/// Splits a recording into stems written to an output directory.
///
/// Implementations must write [`VOCALS_STEM`] and [`ACCOMPANIMENT_STEM`]
/// into `output_dir`. Callers check the vocal stem exists afterwards; a
/// separator that returns `Ok` without writing it still counts as failed.
#[async_trait]
pub trait StemSeparator: Send + Sync {
    fn name(&self) -> &str;

    async fn separate(&self, input: &Path, output_dir: &Path) -> Result<()>;
}

/// Runs `spleeter separate` as a child process
pub struct SpleeterSeparator {
    command: String,
    model: String,
}

impl SpleeterSeparator {
    pub fn new<C: Into<String>, M: Into<String>>(command: C, model: M) -> Self {
        Self {
            command: command.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(&config.separator_command, &config.separator_model)
    }

    fn build_command(&self, input: &Path, output_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg("separate")
            .args(["-p", &self.model])
            .arg("-o")
            .arg(output_dir)
            .args(["-f", "{instrument}.{codec}"])
            .arg(input)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for SpleeterSeparator {
    fn default() -> Self {
        Self::from_config(&ProcessingConfig::default())
    }
}

#[async_trait]
impl StemSeparator for SpleeterSeparator {
    fn name(&self) -> &str {
        &self.command
    }

    async fn separate(&self, input: &Path, output_dir: &Path) -> Result<()> {
        info!("Separating stems of {} with {}", input.display(), self.model);

        let output = self
            .build_command(input, output_dir)
            .output()
            .await
            .map_err(|e| ExternalServiceError::Unavailable {
                service: self.command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExternalServiceError::Separation {
                message: format!("{} exited with {}: {}", self.command, output.status, stderr.trim()),
            }
            .into());
        }

        debug!("Separation finished into {}", output_dir.display());
        Ok(())
    }
}

/// Where a separator is expected to leave each stem
pub fn stem_paths(output_dir: &Path) -> (PathBuf, PathBuf) {
    (output_dir.join(VOCALS_STEM), output_dir.join(ACCOMPANIMENT_STEM))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let separator = SpleeterSeparator::default();
        let cmd = separator.build_command(Path::new("song.wav"), Path::new("out/abc"));
        let std_cmd = cmd.as_std();

        assert_eq!(std_cmd.get_program(), "spleeter");
        let args: Vec<_> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "separate",
                "-p",
                "spleeter:2stems",
                "-o",
                "out/abc",
                "-f",
                "{instrument}.{codec}",
                "song.wav"
            ]
        );
    }

    #[test]
    fn test_stem_paths() {
        let (vocals, accompaniment) = stem_paths(Path::new("out"));
        assert_eq!(vocals, Path::new("out/vocals.wav"));
        assert_eq!(accompaniment, Path::new("out/accompaniment.wav"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let separator = SpleeterSeparator::new("definitely-not-a-real-separator", "spleeter:2stems");
        let result = separator
            .separate(Path::new("song.wav"), Path::new("out"))
            .await;

        assert!(matches!(
            result,
            Err(crate::error::AnalyzerError::ExternalService(
                ExternalServiceError::Unavailable { .. }
            ))
        ));
    }
}
