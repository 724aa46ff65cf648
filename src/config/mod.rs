pub mod toml_config;

pub use toml_config::PipelineConfig;

#[cfg(feature = "cli")]
use clap::Parser;

/// Command-line surface of the `pose-pipeline` binary. With no flags the
/// binary runs against the container directories.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "pose-pipeline")]
#[command(about = "Extract body pose keypoints from videos and load them into SQLite")]
pub struct CliConfig {
    /// Optional TOML configuration file
    #[arg(short, long, env = "POSE_CONFIG")]
    pub config: Option<String>,

    /// Directory scanned for input videos
    #[arg(long, env = "POSE_INPUT_DIR")]
    pub input_dir: Option<String>,

    /// Directory receiving one raw keypoints JSON per video
    #[arg(long, env = "POSE_KEYPOINTS_DIR")]
    pub keypoints_dir: Option<String>,

    /// SQLite database file
    #[arg(long, env = "POSE_DATABASE")]
    pub database: Option<String>,

    /// File name pattern of input videos
    #[arg(long)]
    pub pattern: Option<String>,

    /// Pose estimator worker executable
    #[arg(long, env = "POSE_ESTIMATOR_CMD")]
    pub estimator_command: Option<String>,

    /// Extra arguments passed to the estimator worker
    #[arg(long, value_delimiter = ',')]
    pub estimator_args: Vec<String>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub model_complexity: Option<u8>,

    #[arg(long)]
    pub min_detection_confidence: Option<f64>,

    #[arg(long)]
    pub min_tracking_confidence: Option<f64>,

    /// Treat every frame as an unrelated image (disables tracking)
    #[arg(long)]
    pub static_image_mode: bool,

    #[arg(long, help = "Log CPU and memory usage after each video")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Resolves defaults, the optional TOML file and the flags into one config.
    pub fn resolve(&self) -> crate::utils::error::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        config.apply_overrides(self);
        Ok(config)
    }
}
