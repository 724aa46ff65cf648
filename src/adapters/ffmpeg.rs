use crate::config::toml_config::DecoderConfig;
use crate::domain::ports::{FrameSource, VideoDecoder};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use image::RgbImage;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Decodes videos by piping raw `rgb24` frames out of an `ffmpeg` child process.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: String,
    ffprobe: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    #[serde(default)]
    tags: ProbeTags,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Rotation in degrees. Newer containers carry it as a display matrix,
    /// older ones as a `rotate` tag.
    fn rotation(&self) -> i64 {
        self.side_data_list
            .iter()
            .find_map(|side_data| side_data.rotation)
            .map(|degrees| degrees.round() as i64)
            .or_else(|| {
                self.tags
                    .rotate
                    .as_deref()
                    .and_then(|tag| tag.trim().parse().ok())
            })
            .unwrap_or(0)
    }
}

/// Extracts the first video stream's dimensions from `ffprobe -of json` output,
/// as ffmpeg emits them once the rotation metadata is applied.
pub(crate) fn parse_probe_output(output: &[u8]) -> std::result::Result<(u32, u32), String> {
    let probe: ProbeOutput =
        serde_json::from_slice(output).map_err(|e| format!("unreadable ffprobe output: {}", e))?;

    let stream = probe
        .streams
        .first()
        .ok_or_else(|| "no video stream".to_string())?;

    match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => {
            // quarter turns swap the axes of the autorotated output
            if stream.rotation().rem_euclid(180) == 90 {
                Ok((h, w))
            } else {
                Ok((w, h))
            }
        }
        _ => Err("video stream has no dimensions".to_string()),
    }
}

impl FfmpegDecoder {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            ffprobe: config.ffprobe.clone(),
        }
    }

    async fn probe(&self, path: &Path) -> Result<(u32, u32)> {
        let video = path.display().to_string();

        if !path.is_file() {
            return Err(EtlError::video_open(video, "file not found"));
        }

        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height:stream_side_data=rotation:stream_tags=rotate",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                EtlError::video_open(&video, format!("failed to run {}: {}", self.ffprobe, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EtlError::video_open(video, stderr.trim().to_string()));
        }

        parse_probe_output(&output.stdout).map_err(|reason| EtlError::video_open(video, reason))
    }
}

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    async fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        let (width, height) = self.probe(path).await?;
        let video = path.display().to_string();
        tracing::debug!("Opening {} ({}x{})", video, width, height);

        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EtlError::video_open(&video, format!("failed to run {}: {}", self.ffmpeg, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EtlError::video_open(&video, "ffmpeg stdout not captured"))?;

        // drained concurrently so a chatty decoder never blocks on a full pipe
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        Ok(Box::new(FfmpegFrames {
            path: video,
            child,
            stdout: BufReader::new(stdout),
            stderr_task,
            width,
            height,
            frame_size: width as usize * height as usize * 3,
            finished: false,
        }))
    }
}

struct FfmpegFrames {
    path: String,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    frame_size: usize,
    finished: bool,
}

impl FfmpegFrames {
    async fn finish(&mut self) {
        self.finished = true;

        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        match self.child.wait().await {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!(
                "ffmpeg exited with {} for {}: {}",
                status,
                self.path,
                stderr.trim()
            ),
            Err(e) => tracing::warn!("Could not reap ffmpeg for {}: {}", self.path, e),
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrames {
    async fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.frame_size];
        let mut filled = 0;
        while filled < self.frame_size {
            let n = self
                .stdout
                .read(&mut buffer[filled..])
                .await
                .map_err(|e| EtlError::decode(&self.path, e.to_string()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled < self.frame_size {
            if filled > 0 {
                tracing::debug!(
                    "Dropping truncated trailing frame of {} ({} of {} bytes)",
                    self.path,
                    filled,
                    self.frame_size
                );
            }
            self.finish().await;
            return Ok(None);
        }

        RgbImage::from_raw(self.width, self.height, buffer)
            .map(Some)
            .ok_or_else(|| EtlError::decode(&self.path, "frame buffer size mismatch"))
    }
}
