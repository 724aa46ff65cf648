pub mod etl;
pub mod pipeline;

pub use crate::domain::model::{KeypointRow, PoseFrame, RawKeypoints, RunSummary};
pub use crate::domain::ports::{KeypointSink, Pipeline, PoseEstimator, Storage, VideoDecoder};
pub use crate::utils::error::Result;
