use crate::domain::model::{RunSummary, VideoOutcome, VideoReport};
use crate::domain::ports::Pipeline;
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::SystemMonitor;
use std::path::{Path, PathBuf};

/// Lists files in `input_dir` whose names match `pattern`, sorted by path.
/// A missing directory yields an empty list.
pub fn discover_videos(input_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let escaped_dir = glob::Pattern::escape(&input_dir.to_string_lossy());
    let full_pattern = format!("{}/{}", escaped_dir.trim_end_matches('/'), pattern);

    // hidden files are not picked up by wildcards
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..glob::MatchOptions::new()
    };

    let entries = glob::glob_with(&full_pattern, options).map_err(|e| EtlError::InvalidConfigValueError {
        field: "paths.pattern".to_string(),
        value: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut videos: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();

    videos.sort();
    Ok(videos)
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    input_dir: PathBuf,
    pattern: String,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P, input_dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self::new_with_monitoring(pipeline, input_dir, pattern, false)
    }

    pub fn new_with_monitoring(
        pipeline: P,
        input_dir: impl Into<PathBuf>,
        pattern: impl Into<String>,
        monitor_enabled: bool,
    ) -> Self {
        Self {
            pipeline,
            input_dir: input_dir.into(),
            pattern: pattern.into(),
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Runs E then T+L for every matching video. Per-video failures are
    /// logged and recorded; only a failing `prepare` or an invalid pattern
    /// aborts the run.
    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!("--- Starting pose processing pipeline ---");

        self.pipeline.prepare().await?;

        let mut summary = RunSummary::default();
        let videos = discover_videos(&self.input_dir, &self.pattern)?;
        if videos.is_empty() {
            tracing::warn!(
                "No videos matching '{}' found in {}",
                self.pattern,
                self.input_dir.display()
            );
            return Ok(summary);
        }

        tracing::info!("Found {} videos to process.", videos.len());

        for video in videos {
            let outcome = match self.process_video(&video).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Failed to process video {}: {}", video.display(), e);
                    VideoOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };

            self.monitor.log_stats(&video.display().to_string());
            summary.videos.push(VideoReport {
                path: video,
                outcome,
            });
        }

        self.monitor.log_final_stats();
        tracing::info!(
            "--- Pipeline finished: {} loaded, {} failed, {} new keypoints ---",
            summary.loaded(),
            summary.failed(),
            summary.rows_inserted()
        );

        Ok(summary)
    }

    async fn process_video(&self, video: &Path) -> Result<VideoOutcome> {
        let Some(raw) = self.pipeline.extract(video).await? else {
            return Ok(VideoOutcome::NoPoseDetected);
        };

        let rows = self.pipeline.transform(&raw).await?;
        let row_count = rows.len();
        let inserted = self.pipeline.load(rows).await?;

        Ok(VideoOutcome::Loaded {
            rows: row_count,
            inserted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_videos_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["b.mp4", "a.mp4", "notes.txt", "c.MOV", ".hidden.mp4"] {
            std::fs::write(temp_dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(temp_dir.path().join("dir.mp4")).unwrap();

        let videos = discover_videos(temp_dir.path(), "*.mp4").unwrap();
        let names: Vec<String> = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.mp4", "b.mp4"]);
    }

    #[test]
    fn test_discover_videos_missing_directory_is_empty() {
        let videos = discover_videos(Path::new("/definitely/not/a/video/dir"), "*.mp4").unwrap();
        assert!(videos.is_empty());
    }

    #[test]
    fn test_discover_videos_escapes_directory_metacharacters() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("clips[2025]");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("a.mp4"), b"").unwrap();

        let videos = discover_videos(&input, "*.mp4").unwrap();
        assert_eq!(videos.len(), 1);
    }
}
