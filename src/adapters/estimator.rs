//! Pose estimation through an external worker process.
//!
//! The worker owns the pose model. The exchange over its stdin/stdout is
//! line-oriented JSON with raw pixel payloads:
//!
//! 1. one settings line, sent once after each start
//! 2. per frame: a `{"frame":N,"width":W,"height":H}` line followed by
//!    `W*H*3` bytes of packed RGB, where `N` is the frame's index within
//!    its video
//! 3. per frame the worker answers one line: `null` when no pose was found,
//!    otherwise an array of `{"x","y","z","visibility"}` in landmark order

use crate::config::toml_config::EstimatorConfig;
use crate::domain::landmark::LANDMARK_COUNT;
use crate::domain::model::LandmarkPoint;
use crate::domain::ports::PoseEstimator;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use image::RgbImage;
use serde::Serialize;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

#[derive(Debug, Clone, Serialize)]
pub struct EstimatorSettings {
    pub static_image_mode: bool,
    pub model_complexity: u8,
    pub min_detection_confidence: f64,
    pub min_tracking_confidence: f64,
}

impl From<&EstimatorConfig> for EstimatorSettings {
    fn from(config: &EstimatorConfig) -> Self {
        Self {
            static_image_mode: config.static_image_mode,
            model_complexity: config.model_complexity,
            min_detection_confidence: config.min_detection_confidence,
            min_tracking_confidence: config.min_tracking_confidence,
        }
    }
}

#[derive(Debug, Serialize)]
struct FrameHeader {
    frame: u64,
    width: u32,
    height: u32,
}

/// Parses one worker answer. An empty array counts as "no pose".
pub(crate) fn parse_response(line: &str) -> Result<Option<Vec<LandmarkPoint>>> {
    let points: Option<Vec<LandmarkPoint>> = serde_json::from_str(line.trim())
        .map_err(|e| EtlError::estimator(format!("invalid worker response: {}", e)))?;

    match points {
        Some(points) if points.len() > LANDMARK_COUNT => Err(EtlError::estimator(format!(
            "worker returned {} landmarks, expected at most {}",
            points.len(),
            LANDMARK_COUNT
        ))),
        Some(points) if points.is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Drives the external pose worker. The process is started lazily on the first
/// frame and restarted after it dies, so one crash costs a single video.
pub struct ProcessPoseEstimator {
    config: EstimatorConfig,
    worker: Option<Worker>,
}

struct Worker {
    command: String,
    // held so the worker is killed when dropped
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ProcessPoseEstimator {
    pub fn new(config: &EstimatorConfig) -> Self {
        Self {
            config: config.clone(),
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Worker {
    async fn spawn(config: &EstimatorConfig) -> Result<Self> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EtlError::estimator(format!("failed to start '{}': {}", config.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EtlError::estimator("worker stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EtlError::estimator("worker stdout not captured"))?;

        let mut worker = Self {
            command: config.command.clone(),
            _child: child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        let settings = serde_json::to_string(&EstimatorSettings::from(config))?;
        worker.send(settings.as_bytes()).await?;
        worker.send(b"\n").await?;
        worker.flush().await?;

        tracing::info!("Pose estimator '{}' started: {}", config.command, settings);
        Ok(worker)
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stdin.write_all(bytes).await.map_err(|e| {
            EtlError::estimator(format!("could not write to '{}': {}", self.command, e))
        })
    }

    async fn flush(&mut self) -> Result<()> {
        self.stdin.flush().await.map_err(|e| {
            EtlError::estimator(format!("could not write to '{}': {}", self.command, e))
        })
    }

    /// Sends one frame and returns the worker's raw answer line.
    async fn exchange(&mut self, frame_index: u64, frame: &RgbImage) -> Result<String> {
        let header = serde_json::to_string(&FrameHeader {
            frame: frame_index,
            width: frame.width(),
            height: frame.height(),
        })?;

        self.send(header.as_bytes()).await?;
        self.send(b"\n").await?;
        self.send(frame.as_raw()).await?;
        self.flush().await?;

        let mut line = String::new();
        let read = self.stdout.read_line(&mut line).await.map_err(|e| {
            EtlError::estimator(format!("could not read from '{}': {}", self.command, e))
        })?;
        if read == 0 {
            return Err(EtlError::estimator(format!(
                "'{}' closed its output",
                self.command
            )));
        }

        Ok(line)
    }
}

#[async_trait]
impl PoseEstimator for ProcessPoseEstimator {
    async fn estimate(
        &mut self,
        frame_index: u64,
        frame: &RgbImage,
    ) -> Result<Option<Vec<LandmarkPoint>>> {
        if self.worker.is_none() {
            self.worker = Some(Worker::spawn(&self.config).await?);
        }
        let worker = self
            .worker
            .as_mut()
            .ok_or_else(|| EtlError::estimator("worker not running"))?;

        match worker.exchange(frame_index, frame).await {
            Ok(line) => parse_response(&line),
            Err(e) => {
                tracing::error!(
                    "Pose estimator '{}' stopped responding, restarting it with the next video: {}",
                    self.config.command,
                    e
                );
                self.worker = None;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_null_response() {
        assert_eq!(parse_response("null\n").unwrap(), None);
        assert_eq!(parse_response("[]").unwrap(), None);
    }

    #[test]
    fn test_parse_landmark_response() {
        let line = r#"[{"x":0.5,"y":0.25,"z":-0.1,"visibility":0.98},{"x":0.4,"y":0.2,"z":-0.2,"visibility":0.9}]"#;
        let points = parse_response(line).unwrap().unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].x, 0.5);
        assert_eq!(points[1].visibility, 0.9);
    }

    #[test]
    fn test_parse_rejects_garbage_and_oversized_poses() {
        assert!(parse_response("not json").is_err());

        let point = r#"{"x":0.5,"y":0.5,"z":0.0,"visibility":1.0}"#;
        let oversized = format!("[{}]", vec![point; LANDMARK_COUNT + 1].join(","));
        assert!(matches!(
            parse_response(&oversized),
            Err(EtlError::EstimatorError { .. })
        ));
    }

    #[test]
    fn test_settings_follow_config() {
        let config = EstimatorConfig::default();
        let json = serde_json::to_string(&EstimatorSettings::from(&config)).unwrap();
        assert_eq!(
            json,
            r#"{"static_image_mode":false,"model_complexity":1,"min_detection_confidence":0.5,"min_tracking_confidence":0.5}"#
        );
    }

    #[tokio::test]
    async fn test_worker_starts_on_first_frame() {
        let config = EstimatorConfig {
            command: "/definitely/not/a/pose-worker".to_string(),
            ..EstimatorConfig::default()
        };

        let mut estimator = ProcessPoseEstimator::new(&config);
        assert!(!estimator.is_running());

        let result = estimator.estimate(0, &RgbImage::new(2, 2)).await;
        assert!(matches!(result, Err(EtlError::EstimatorError { .. })));
        assert!(!estimator.is_running());
    }

    #[cfg(unix)]
    fn shell_worker(script: &str) -> ProcessPoseEstimator {
        ProcessPoseEstimator::new(&EstimatorConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            ..EstimatorConfig::default()
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_header_carries_frame_index() {
        // 2x2 RGB frames are 12 bytes; only the first frame of a video has no pose
        let mut estimator = shell_worker(
            r#"
read -r settings
while read -r header; do
    head -c 12 > /dev/null
    case "$header" in
        *'"frame":0,'*) echo null ;;
        *) echo '[{"x":0.1,"y":0.2,"z":0.3,"visibility":0.4}]' ;;
    esac
done
"#,
        );
        let frame = RgbImage::new(2, 2);

        assert_eq!(estimator.estimate(0, &frame).await.unwrap(), None);

        let points = estimator.estimate(1, &frame).await.unwrap().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].z, 0.3);

        // next video starts over at frame 0
        assert_eq!(estimator.estimate(0, &frame).await.unwrap(), None);
        assert!(estimator.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dead_worker_is_restarted() {
        // answers a single frame, then exits
        let mut estimator = shell_worker(
            r#"
read -r settings
read -r header
head -c 12 > /dev/null
echo null
"#,
        );
        let frame = RgbImage::new(2, 2);

        assert_eq!(estimator.estimate(0, &frame).await.unwrap(), None);

        let err = estimator.estimate(1, &frame).await;
        assert!(matches!(err, Err(EtlError::EstimatorError { .. })));
        assert!(!estimator.is_running());

        assert_eq!(estimator.estimate(0, &frame).await.unwrap(), None);
        assert!(estimator.is_running());
    }
}
