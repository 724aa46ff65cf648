use crate::domain::landmark::PoseLandmark;
use crate::domain::model::{KeypointRow, Landmark, LandmarkPoint, PoseFrame, RawKeypoints};
use crate::domain::ports::{KeypointSink, Pipeline, PoseEstimator, Storage, VideoDecoder};
use crate::utils::error::{EtlError, Result};
use chrono::Utc;
use std::path::Path;
use tokio::sync::Mutex;

/// Video → pose JSON → flattened rows → keypoint sink.
pub struct PosePipeline<S: Storage, D: VideoDecoder, E: PoseEstimator, K: KeypointSink> {
    storage: S,
    decoder: D,
    estimator: Mutex<E>,
    sink: K,
}

impl<S, D, E, K> PosePipeline<S, D, E, K>
where
    S: Storage,
    D: VideoDecoder,
    E: PoseEstimator,
    K: KeypointSink,
{
    pub fn new(storage: S, decoder: D, estimator: E, sink: K) -> Self {
        Self {
            storage,
            decoder,
            estimator: Mutex::new(estimator),
            sink,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}

/// UTC wall clock, ISO-8601 without offset, microsecond precision.
pub fn processing_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Attaches landmark ids and names to raw estimator points.
pub fn name_landmarks(points: Vec<LandmarkPoint>) -> Result<Vec<Landmark>> {
    points
        .into_iter()
        .enumerate()
        .map(|(idx, point)| {
            let landmark = PoseLandmark::from_index(idx)
                .ok_or_else(|| EtlError::estimator(format!("unknown landmark index {}", idx)))?;
            Ok(Landmark {
                id: idx as u32,
                name: landmark.name().to_string(),
                x: point.x,
                y: point.y,
                z: point.z,
                visibility: point.visibility,
            })
        })
        .collect()
}

/// One row per (frame, landmark), in document order.
pub fn flatten_frames(video_name: &str, frames: &[PoseFrame], processed_at: &str) -> Vec<KeypointRow> {
    frames
        .iter()
        .flat_map(|frame| {
            frame.landmarks.iter().map(move |landmark| KeypointRow {
                video_name: video_name.to_string(),
                frame: frame.frame,
                landmark_id: landmark.id,
                landmark_name: landmark.name.clone(),
                x: landmark.x,
                y: landmark.y,
                z: landmark.z,
                visibility: landmark.visibility,
                processed_at: processed_at.to_string(),
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl<S, D, E, K> Pipeline for PosePipeline<S, D, E, K>
where
    S: Storage,
    D: VideoDecoder,
    E: PoseEstimator,
    K: KeypointSink,
{
    async fn prepare(&self) -> Result<()> {
        self.sink.setup().await
    }

    async fn extract(&self, video: &Path) -> Result<Option<RawKeypoints>> {
        let video_name = video
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| EtlError::video_open(video.display().to_string(), "path has no file name"))?;

        tracing::info!("[E] Extracting keypoints from video: {}", video_name);

        let mut source = self.decoder.open(video).await?;
        let mut estimator = self.estimator.lock().await;

        let mut frame_count: u64 = 0;
        let mut frames = Vec::new();

        while let Some(image) = source.next_frame().await? {
            if let Some(points) = estimator.estimate(frame_count, &image).await? {
                frames.push(PoseFrame {
                    frame: frame_count,
                    landmarks: name_landmarks(points)?,
                });
            }
            frame_count += 1;
        }
        drop(estimator);

        if frames.is_empty() {
            tracing::warn!("No pose detected in: {}", video_name);
            return Ok(None);
        }

        let json_path = format!("{}.json", video_name);
        let json = serde_json::to_vec_pretty(&frames)?;
        self.storage.write_file(&json_path, &json).await?;

        tracing::info!(
            "[E] Extraction complete. {} frames processed, {} with a pose.",
            frame_count,
            frames.len()
        );

        Ok(Some(RawKeypoints {
            video_name,
            json_path,
            frames_processed: frame_count,
            frames_with_pose: frames.len() as u64,
        }))
    }

    async fn transform(&self, raw: &RawKeypoints) -> Result<Vec<KeypointRow>> {
        tracing::info!("[T+L] Processing {} for the database...", raw.video_name);

        let bytes = self.storage.read_file(&raw.json_path).await?;
        let frames: Vec<PoseFrame> = serde_json::from_slice(&bytes)?;

        let rows = flatten_frames(&raw.video_name, &frames, &processing_timestamp());
        tracing::debug!("Flattened {} frames into {} rows", frames.len(), rows.len());
        Ok(rows)
    }

    async fn load(&self, rows: Vec<KeypointRow>) -> Result<u64> {
        if rows.is_empty() {
            tracing::warn!("No rows to load after transform.");
            return Ok(0);
        }

        let inserted = self.sink.insert_rows(&rows).await?;
        tracing::info!(
            "[T+L] Success. {} new keypoints inserted into the database.",
            inserted
        );
        Ok(inserted)
    }
}
