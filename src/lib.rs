pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{FfmpegDecoder, KeypointDatabase, LocalStorage, ProcessPoseEstimator};
pub use config::PipelineConfig;
pub use self::core::{etl::EtlEngine, pipeline::PosePipeline};
pub use utils::error::{EtlError, Result};
