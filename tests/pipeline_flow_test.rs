use async_trait::async_trait;
use image::RgbImage;
use pose_pipeline::core::{PoseFrame, VideoDecoder};
use pose_pipeline::domain::model::{LandmarkPoint, VideoOutcome};
use pose_pipeline::domain::ports::{FrameSource, PoseEstimator};
use pose_pipeline::config::toml_config::{DecoderConfig, EstimatorConfig};
use pose_pipeline::{
    EtlEngine, EtlError, FfmpegDecoder, KeypointDatabase, LocalStorage, PosePipeline,
    ProcessPoseEstimator,
};
use std::path::Path;
use tempfile::TempDir;

/// Frame count is read from the first byte of the "video" file; files whose
/// content starts with `x` cannot be opened.
struct ByteCountDecoder;

struct BlankFrames {
    remaining: u8,
    // marks the frames so the estimator can decide per frame
    next_marker: u8,
}

#[async_trait]
impl FrameSource for BlankFrames {
    async fn next_frame(&mut self) -> pose_pipeline::Result<Option<RgbImage>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let marker = self.next_marker;
        self.next_marker = self.next_marker.wrapping_add(1);
        Ok(Some(RgbImage::from_pixel(2, 2, image::Rgb([marker, 0, 0]))))
    }
}

#[async_trait]
impl VideoDecoder for ByteCountDecoder {
    async fn open(&self, path: &Path) -> pose_pipeline::Result<Box<dyn FrameSource>> {
        let bytes = tokio::fs::read(path).await?;
        match bytes.first() {
            Some(b'x') => Err(EtlError::video_open(path.display().to_string(), "corrupt")),
            Some(count) => Ok(Box::new(BlankFrames {
                remaining: *count,
                next_marker: 0,
            })),
            None => Ok(Box::new(BlankFrames {
                remaining: 0,
                next_marker: 0,
            })),
        }
    }
}

/// Detects a full 33-landmark pose on even frames only.
struct EvenFrameEstimator;

#[async_trait]
impl PoseEstimator for EvenFrameEstimator {
    async fn estimate(
        &mut self,
        _frame_index: u64,
        frame: &RgbImage,
    ) -> pose_pipeline::Result<Option<Vec<LandmarkPoint>>> {
        let marker = frame.get_pixel(0, 0)[0];
        if marker % 2 != 0 {
            return Ok(None);
        }
        Ok(Some(
            (0..33u8)
                .map(|i| LandmarkPoint {
                    x: f64::from(i) / 33.0,
                    y: f64::from(marker) / 10.0,
                    z: 0.0,
                    visibility: 1.0,
                })
                .collect(),
        ))
    }
}

struct Workspace {
    _root: TempDir,
    input: std::path::PathBuf,
    keypoints: std::path::PathBuf,
    database: std::path::PathBuf,
}

fn workspace() -> Workspace {
    let root = TempDir::new().unwrap();
    let input = root.path().join("videos_input");
    std::fs::create_dir_all(&input).unwrap();
    Workspace {
        input,
        keypoints: root.path().join("keypoints_output"),
        database: root.path().join("database/poses.db"),
        _root: root,
    }
}

async fn engine(
    ws: &Workspace,
) -> EtlEngine<PosePipeline<LocalStorage, ByteCountDecoder, EvenFrameEstimator, KeypointDatabase>> {
    let db = KeypointDatabase::connect(&ws.database).await.unwrap();
    let pipeline = PosePipeline::new(
        LocalStorage::new(&ws.keypoints),
        ByteCountDecoder,
        EvenFrameEstimator,
        db,
    );
    EtlEngine::new(pipeline, &ws.input, "*.mp4")
}

#[tokio::test]
async fn test_end_to_end_run_writes_json_and_rows() {
    let ws = workspace();
    std::fs::write(ws.input.join("squat.mp4"), [4u8]).unwrap();

    let engine = engine(&ws).await;
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.videos_found(), 1);
    assert_eq!(
        summary.videos[0].outcome,
        VideoOutcome::Loaded {
            rows: 66,
            inserted: 66
        }
    );

    let json_path = ws.keypoints.join("squat.mp4.json");
    let frames: Vec<PoseFrame> =
        serde_json::from_slice(&std::fs::read(&json_path).unwrap()).unwrap();
    assert_eq!(
        frames.iter().map(|f| f.frame).collect::<Vec<_>>(),
        vec![0, 2]
    );

    let db = engine.pipeline().sink();
    assert_eq!(db.count_rows(Some("squat.mp4")).await.unwrap(), 66);
    assert_eq!(db.frames_for_video("squat.mp4").await.unwrap(), vec![0, 2]);
}

#[tokio::test]
async fn test_rerun_inserts_no_duplicates() {
    let ws = workspace();
    std::fs::write(ws.input.join("walk.mp4"), [3u8]).unwrap();

    let first = engine(&ws).await.run().await.unwrap();
    assert_eq!(first.rows_inserted(), 66);

    let second_engine = engine(&ws).await;
    let second = second_engine.run().await.unwrap();
    assert_eq!(second.rows_inserted(), 0);
    assert_eq!(
        second.videos[0].outcome,
        VideoOutcome::Loaded {
            rows: 66,
            inserted: 0
        }
    );
    assert_eq!(
        second_engine.pipeline().sink().count_rows(None).await.unwrap(),
        66
    );
}

#[tokio::test]
async fn test_failures_do_not_stop_other_videos() {
    let ws = workspace();
    std::fs::write(ws.input.join("a_corrupt.mp4"), b"x").unwrap();
    std::fs::write(ws.input.join("b_single_frame.mp4"), [1u8]).unwrap();
    std::fs::write(ws.input.join("c_good.mp4"), [1u8 + 1]).unwrap();
    std::fs::write(ws.input.join("ignored.avi"), [4u8]).unwrap();

    let engine = engine(&ws).await;
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.videos_found(), 3);
    assert!(matches!(
        summary.videos[0].outcome,
        VideoOutcome::Failed { .. }
    ));
    // frame 0 always carries a pose, so a single-frame video still loads
    assert_eq!(
        summary.videos[1].outcome,
        VideoOutcome::Loaded {
            rows: 33,
            inserted: 33
        }
    );
    assert_eq!(
        summary.videos[2].outcome,
        VideoOutcome::Loaded {
            rows: 33,
            inserted: 33
        }
    );
    assert_eq!(summary.failed(), 1);
    assert!(!ws.keypoints.join("a_corrupt.mp4.json").exists());
    assert!(!ws.keypoints.join("ignored.avi.json").exists());
}

#[tokio::test]
async fn test_video_without_frames_reports_no_pose() {
    let ws = workspace();
    std::fs::write(ws.input.join("empty.mp4"), b"").unwrap();

    let summary = engine(&ws).await.run().await.unwrap();

    assert_eq!(summary.videos[0].outcome, VideoOutcome::NoPoseDetected);
    assert!(!ws.keypoints.join("empty.mp4.json").exists());
}

#[tokio::test]
async fn test_empty_input_directory_is_success() {
    let ws = workspace();

    let engine = engine(&ws).await;
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.videos_found(), 0);
    // the schema is created even when there is nothing to process
    assert_eq!(engine.pipeline().sink().count_rows(None).await.unwrap(), 0);
    assert!(ws.database.exists());
}

#[tokio::test]
async fn test_empty_run_never_starts_pose_worker() {
    let ws = workspace();
    let estimator = ProcessPoseEstimator::new(&EstimatorConfig {
        command: "/definitely/not/a/pose-worker".to_string(),
        ..EstimatorConfig::default()
    });

    let pipeline = PosePipeline::new(
        LocalStorage::new(&ws.keypoints),
        FfmpegDecoder::new(&DecoderConfig::default()),
        estimator,
        KeypointDatabase::connect(&ws.database).await.unwrap(),
    );
    let engine = EtlEngine::new(pipeline, &ws.input, "*.mp4");

    let summary = engine.run().await.unwrap();

    assert_eq!(summary.videos_found(), 0);
    assert!(ws.database.exists());
    assert_eq!(engine.pipeline().sink().count_rows(None).await.unwrap(), 0);
}
