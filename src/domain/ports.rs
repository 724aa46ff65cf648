use crate::domain::model::{KeypointRow, LandmarkPoint, RawKeypoints};
use crate::utils::error::Result;
use async_trait::async_trait;
use image::RgbImage;
use std::path::Path;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// A decoded video, yielding RGB frames in presentation order.
#[async_trait]
pub trait FrameSource: Send {
    /// `None` marks the end of the stream.
    async fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

#[async_trait]
pub trait VideoDecoder: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>>;
}

/// Single-person body pose model. Implementations may track across frames,
/// so callers feed frames of one video in order; `frame_index` restarts at 0
/// for every video.
#[async_trait]
pub trait PoseEstimator: Send {
    async fn estimate(
        &mut self,
        frame_index: u64,
        frame: &RgbImage,
    ) -> Result<Option<Vec<LandmarkPoint>>>;
}

#[async_trait]
pub trait KeypointSink: Send + Sync {
    async fn setup(&self) -> Result<()>;
    /// Returns the number of rows that were not already present.
    async fn insert_rows(&self, rows: &[KeypointRow]) -> Result<u64>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }
    async fn extract(&self, video: &Path) -> Result<Option<RawKeypoints>>;
    async fn transform(&self, raw: &RawKeypoints) -> Result<Vec<KeypointRow>>;
    async fn load(&self, rows: Vec<KeypointRow>) -> Result<u64>;
}
