use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One landmark of one detected pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: u32,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub visibility: f64,
}

/// Estimator output before it is tied to a landmark name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub visibility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub frame: u64,
    pub landmarks: Vec<Landmark>,
}

/// Result of the extract phase for a single video.
#[derive(Debug, Clone)]
pub struct RawKeypoints {
    pub video_name: String,
    /// Path of the JSON document, relative to the keypoints storage.
    pub json_path: String,
    pub frames_processed: u64,
    pub frames_with_pose: u64,
}

/// A flattened keypoint, one row of `normalized_keypoints`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointRow {
    pub video_name: String,
    pub frame: u64,
    pub landmark_id: u32,
    pub landmark_name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub visibility: f64,
    pub processed_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VideoOutcome {
    Loaded { rows: usize, inserted: u64 },
    NoPoseDetected,
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct VideoReport {
    pub path: PathBuf,
    pub outcome: VideoOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub videos: Vec<VideoReport>,
}

impl RunSummary {
    pub fn videos_found(&self) -> usize {
        self.videos.len()
    }

    pub fn loaded(&self) -> usize {
        self.videos
            .iter()
            .filter(|v| matches!(v.outcome, VideoOutcome::Loaded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.videos
            .iter()
            .filter(|v| matches!(v.outcome, VideoOutcome::Failed { .. }))
            .count()
    }

    pub fn rows_inserted(&self) -> u64 {
        self.videos
            .iter()
            .map(|v| match v.outcome {
                VideoOutcome::Loaded { inserted, .. } => inserted,
                _ => 0,
            })
            .sum()
    }
}
