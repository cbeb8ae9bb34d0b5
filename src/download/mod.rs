//! Remote audio acquisition via an external downloader.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::ProcessingConfig;
use crate::error::{ExternalServiceError, Result};

/// Fetches audio from a remote page into a local file
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    fn name(&self) -> &str;

    /// Download `url` as audio into `dest_dir`. `Ok(None)` means the
    /// downloader ran but produced no file.
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<Option<PathBuf>>;

    /// Remote metadata without downloading
    async fn video_info(&self, url: &str) -> Result<serde_json::Value>;
}

/// Runs `yt-dlp` as a child process, extracting best audio to WAV
pub struct YtDlpDownloader {
    command: String,
}

impl YtDlpDownloader {
    pub fn new<C: Into<String>>(command: C) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(&config.downloader_command)
    }

    fn fetch_command(&self, url: &str, dest_dir: &Path) -> Command {
        let template = dest_dir.join("%(title)s.%(ext)s");
        let mut cmd = Command::new(&self.command);
        cmd.args(["-f", "bestaudio/best", "-x", "--audio-format", "wav"])
            .args(["--audio-quality", "192K", "--no-warnings", "--no-playlist"])
            .arg("-o")
            .arg(template)
            .args(["--print", "after_move:filepath"])
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn info_command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(["-J", "--no-warnings", "--no-playlist"])
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<Vec<u8>> {
        let output = cmd
            .output()
            .await
            .map_err(|e| ExternalServiceError::Unavailable {
                service: self.command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExternalServiceError::Download {
                message: format!("{} exited with {}: {}", self.command, output.status, stderr.trim()),
            }
            .into());
        }

        Ok(output.stdout)
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::from_config(&ProcessingConfig::default())
    }
}

#[async_trait]
impl AudioDownloader for YtDlpDownloader {
    fn name(&self) -> &str {
        &self.command
    }

    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<Option<PathBuf>> {
        info!("Downloading audio from {}", url);
        tokio::fs::create_dir_all(dest_dir).await?;

        let stdout = self.run(self.fetch_command(url, dest_dir)).await?;
        let reported = parse_printed_path(&String::from_utf8_lossy(&stdout));

        match reported {
            Some(path) if path.exists() => {
                info!("Downloaded {}", path.display());
                Ok(Some(path))
            }
            Some(path) => {
                warn!("Downloader reported {} but it does not exist", path.display());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn video_info(&self, url: &str) -> Result<serde_json::Value> {
        let stdout = self.run(self.info_command(url)).await?;
        serde_json::from_slice(&stdout).map_err(|e| {
            ExternalServiceError::Download {
                message: format!("unreadable metadata for {}: {}", url, e),
            }
            .into()
        })
    }
}

/// Last non-empty line of the downloader's output, which names the final file
fn parse_printed_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_fetch_command_targets_wav_in_dest_dir() {
        let downloader = YtDlpDownloader::default();
        let cmd = downloader.fetch_command("https://example.com/watch?v=1", Path::new("temp/downloads"));
        let args = args_of(&cmd);

        assert_eq!(cmd.as_std().get_program(), "yt-dlp");
        assert!(args.windows(2).any(|w| w == ["--audio-format", "wav"]));
        assert!(args.contains(&"temp/downloads/%(title)s.%(ext)s".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/watch?v=1");
    }

    #[test]
    fn test_info_command_dumps_json() {
        let downloader = YtDlpDownloader::default();
        let args = args_of(&downloader.info_command("https://example.com/v"));
        assert_eq!(args[0], "-J");
    }

    #[test]
    fn test_parse_printed_path() {
        assert_eq!(
            parse_printed_path("[info] something\n/tmp/Song Title.wav\n\n"),
            Some(PathBuf::from("/tmp/Song Title.wav"))
        );
        assert_eq!(parse_printed_path("  \n"), None);
    }

    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let downloader = YtDlpDownloader::new("definitely-not-a-real-downloader");
        let result = downloader.video_info("https://example.com/v").await;
        assert!(matches!(
            result,
            Err(crate::error::AnalyzerError::ExternalService(
                ExternalServiceError::Unavailable { .. }
            ))
        ));
    }
}
