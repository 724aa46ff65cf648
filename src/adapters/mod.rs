// Adapters layer: concrete implementations of the domain ports.

pub mod database;
pub mod estimator;
pub mod ffmpeg;
pub mod storage;

pub use database::KeypointDatabase;
pub use estimator::ProcessPoseEstimator;
pub use ffmpeg::FfmpegDecoder;
pub use storage::LocalStorage;
