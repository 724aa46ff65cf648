use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Full runtime configuration. Every key is optional in the TOML document;
/// missing keys fall back to the container layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub estimator: EstimatorConfig,
    pub decoder: DecoderConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_dir: String,
    pub keypoints_dir: String,
    pub database: String,
    pub pattern: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: "/app/videos_input".to_string(),
            keypoints_dir: "/app/keypoints_output".to_string(),
            database: "/app/database/poses.db".to_string(),
            pattern: "*.mp4".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub command: String,
    pub args: Vec<String>,
    pub static_image_mode: bool,
    /// 0 fast, 1 balanced, 2 accurate
    pub model_complexity: u8,
    pub min_detection_confidence: f64,
    pub min_tracking_confidence: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            command: "pose-estimator".to_string(),
            args: Vec::new(),
            static_image_mode: false,
            model_complexity: 1,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: bool,
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid"))
}

impl PipelineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are kept verbatim.
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn input_dir(&self) -> &Path {
        Path::new(&self.paths.input_dir)
    }

    pub fn keypoints_dir(&self) -> &Path {
        Path::new(&self.paths.keypoints_dir)
    }

    pub fn database_path(&self) -> &Path {
        Path::new(&self.paths.database)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }

    /// Applies command-line flags (and their environment variables) on top of the file.
    #[cfg(feature = "cli")]
    pub fn apply_overrides(&mut self, cli: &crate::config::CliConfig) {
        if let Some(dir) = &cli.input_dir {
            self.paths.input_dir = dir.clone();
        }
        if let Some(dir) = &cli.keypoints_dir {
            self.paths.keypoints_dir = dir.clone();
        }
        if let Some(db) = &cli.database {
            self.paths.database = db.clone();
        }
        if let Some(pattern) = &cli.pattern {
            self.paths.pattern = pattern.clone();
        }
        if let Some(command) = &cli.estimator_command {
            self.estimator.command = command.clone();
        }
        if !cli.estimator_args.is_empty() {
            self.estimator.args = cli.estimator_args.clone();
        }
        if let Some(complexity) = cli.model_complexity {
            self.estimator.model_complexity = complexity;
        }
        if let Some(confidence) = cli.min_detection_confidence {
            self.estimator.min_detection_confidence = confidence;
        }
        if let Some(confidence) = cli.min_tracking_confidence {
            self.estimator.min_tracking_confidence = confidence;
        }
        if cli.static_image_mode {
            self.estimator.static_image_mode = true;
        }
        if cli.monitor {
            self.monitoring.enabled = true;
        }
        if cli.json_logs {
            self.monitoring.json_logs = true;
        }
    }
}

impl Validate for PipelineConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("paths.input_dir", &self.paths.input_dir)?;
        validation::validate_path("paths.keypoints_dir", &self.paths.keypoints_dir)?;
        validation::validate_path("paths.database", &self.paths.database)?;
        validation::validate_glob_pattern("paths.pattern", &self.paths.pattern)?;

        validation::validate_non_empty_string("estimator.command", &self.estimator.command)?;
        validation::validate_range(
            "estimator.model_complexity",
            self.estimator.model_complexity,
            0,
            2,
        )?;
        validation::validate_range(
            "estimator.min_detection_confidence",
            self.estimator.min_detection_confidence,
            0.0,
            1.0,
        )?;
        validation::validate_range(
            "estimator.min_tracking_confidence",
            self.estimator.min_tracking_confidence,
            0.0,
            1.0,
        )?;

        validation::validate_non_empty_string("decoder.ffmpeg", &self.decoder.ffmpeg)?;
        validation::validate_non_empty_string("decoder.ffprobe", &self.decoder.ffprobe)?;

        Ok(())
    }
}
