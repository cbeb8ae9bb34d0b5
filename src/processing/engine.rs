use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    audio::{AnalysisResult, AudioAnalyzer, AudioLoader},
    cache::ResultsCache,
    config::Config,
    download::{AudioDownloader, YtDlpDownloader},
    error::{AnalyzerError, ExternalServiceError, Result},
    separation::{stem_paths, SpleeterSeparator, StemSeparator},
};

/// Analysis result and whether it came from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    pub cached: bool,
}

/// Everything produced for one processed recording
#[derive(Debug, Clone)]
pub struct ProcessedTrack {
    pub process_id: Uuid,
    pub result: AnalysisResult,
    pub cached: bool,
    pub vocals_path: PathBuf,
    pub accompaniment_path: PathBuf,
}

/// Orchestrates decoding, analysis, caching and stem separation
///
/// Separation and analysis of a file are independent, so `process` runs them
/// concurrently, each bounded by `processing.branch_timeout_secs`. A branch
/// that fails or overruns fails the whole attempt and the attempt's output
/// directory is removed before the error is returned.
pub struct ProcessingEngine {
    config: Config,
    analyzer: Arc<AudioAnalyzer>,
    cache: Arc<ResultsCache>,
    separator: Arc<dyn StemSeparator>,
    downloader: Arc<dyn AudioDownloader>,
}

impl ProcessingEngine {
    /// Create an engine using the external separator and downloader named in
    /// the configuration
    pub fn new(config: Config) -> Self {
        Self {
            analyzer: Arc::new(AudioAnalyzer::with_config(config.analysis.clone())),
            cache: Arc::new(ResultsCache::new(&config.cache)),
            separator: Arc::new(SpleeterSeparator::from_config(&config.processing)),
            downloader: Arc::new(YtDlpDownloader::from_config(&config.processing)),
            config,
        }
    }

    pub fn with_separator(mut self, separator: Arc<dyn StemSeparator>) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn AudioDownloader>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &ResultsCache {
        &self.cache
    }

    /// Analyze a file without separating it, serving from the cache when
    /// possible
    pub async fn analyze<P: AsRef<Path>>(&self, path: P) -> Result<AnalysisOutcome> {
        let path = path.as_ref();
        AudioLoader::validate(path, &self.config.audio)?;
        self.run_analysis(path.to_path_buf()).await
    }

    /// Separate stems and analyze a local file
    pub async fn process<P: AsRef<Path>>(&self, path: P) -> Result<ProcessedTrack> {
        let input = path.as_ref();
        info!("Processing {}", input.display());
        AudioLoader::validate(input, &self.config.audio)?;

        let process_id = Uuid::new_v4();
        let output_dir = self
            .config
            .processing
            .separated_dir()
            .join(process_id.to_string());
        tokio::fs::create_dir_all(&output_dir).await?;

        match self.run_branches(input, &output_dir, process_id).await {
            Ok(track) => {
                info!(
                    "Processed {} as {}: key {}, BPM {:.1}",
                    input.display(),
                    process_id,
                    track.result.key,
                    track.result.bpm
                );
                Ok(track)
            }
            Err(e) => {
                warn!("Processing {} failed: {}", process_id, e);
                remove_output_dir(&output_dir).await;
                Err(e)
            }
        }
    }

    /// Download a remote recording, then separate and analyze it
    pub async fn process_remote(&self, url: &str) -> Result<ProcessedTrack> {
        let path = self.download(url).await?;
        self.process(&path).await
    }

    /// Download a remote recording into the work directory
    pub async fn download(&self, url: &str) -> Result<PathBuf> {
        let dest_dir = self.config.processing.downloads_dir();
        self.downloader
            .fetch(url, &dest_dir)
            .await?
            .ok_or_else(|| {
                ExternalServiceError::Download {
                    message: format!("{} produced no audio file for {}", self.downloader.name(), url),
                }
                .into()
            })
    }

    /// Remote metadata for `url`
    pub async fn video_info(&self, url: &str) -> Result<serde_json::Value> {
        self.downloader.video_info(url).await
    }

    async fn run_branches(
        &self,
        input: &Path,
        output_dir: &Path,
        process_id: Uuid,
    ) -> Result<ProcessedTrack> {
        let seconds = self.config.processing.branch_timeout_secs;
        let limit = Duration::from_secs(seconds);

        let separation = async {
            match timeout(limit, self.separator.separate(input, output_dir)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Stem separation exceeded {}s", seconds);
                    Err(AnalyzerError::timeout("stem separation", seconds))
                }
            }
        };
        let analysis = self.run_analysis(input.to_path_buf());

        let (separated, analyzed) = tokio::join!(separation, analysis);
        separated?;
        let outcome = analyzed?;

        let (vocals_path, accompaniment_path) = stem_paths(output_dir);
        if !vocals_path.exists() {
            return Err(ExternalServiceError::Separation {
                message: format!(
                    "{} did not produce {}",
                    self.separator.name(),
                    vocals_path.display()
                ),
            }
            .into());
        }

        Ok(ProcessedTrack {
            process_id,
            result: outcome.result,
            cached: outcome.cached,
            vocals_path,
            accompaniment_path,
        })
    }

    /// Cache lookup or decode + analyze on a blocking thread, bounded by the
    /// branch timeout. A timed-out analysis thread runs to completion in the
    /// background and its result is discarded.
    async fn run_analysis(&self, path: PathBuf) -> Result<AnalysisOutcome> {
        let seconds = self.config.processing.branch_timeout_secs;
        let analyzer = Arc::clone(&self.analyzer);
        let cache = Arc::clone(&self.cache);
        let sample_rate = self.config.audio.sample_rate;

        let task = tokio::task::spawn_blocking(move || {
            analyze_with_cache(&analyzer, &cache, &path, sample_rate)
        });

        match timeout(Duration::from_secs(seconds), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(AnalyzerError::generic(format!(
                "Analysis task failed: {}",
                join_error
            ))),
            Err(_) => {
                warn!("Analysis exceeded {}s", seconds);
                Err(AnalyzerError::timeout("analysis", seconds))
            }
        }
    }
}

fn analyze_with_cache(
    analyzer: &AudioAnalyzer,
    cache: &ResultsCache,
    path: &Path,
    sample_rate: u32,
) -> Result<AnalysisOutcome> {
    let key = cache.fingerprint(path)?;
    if let Some(result) = cache.get(&key) {
        info!("Using cached analysis for {}", path.display());
        return Ok(AnalysisOutcome {
            result,
            cached: true,
        });
    }

    let audio = AudioLoader::load_with_rate(path, sample_rate)?;
    let result = analyzer.analyze(&audio)?;

    if let Err(e) = cache.put_with_source(&key, &result, path) {
        warn!("Could not cache analysis of {}: {}", path.display(), e);
    }

    Ok(AnalysisOutcome {
        result,
        cached: false,
    })
}

async fn remove_output_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
    }
}
