use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Could not open video '{path}': {reason}")]
    VideoOpenError { path: String, reason: String },

    #[error("Frame decoding failed for '{path}': {reason}")]
    DecodeError { path: String, reason: String },

    #[error("Pose estimator error: {message}")]
    EstimatorError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Inference,
    Storage,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn video_open(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::VideoOpenError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DecodeError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn estimator(message: impl Into<String>) -> Self {
        Self::EstimatorError {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigValidationError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            Self::VideoOpenError { .. } | Self::DecodeError { .. } => ErrorCategory::Input,
            Self::EstimatorError { .. } => ErrorCategory::Inference,
            Self::IoError(_) | Self::DatabaseError(_) => ErrorCategory::Storage,
            Self::SerializationError(_) | Self::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    /// Severity drives the exit code of the binary.
    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Inference | ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::VideoOpenError { .. } => {
                "Check that the file exists, is a readable video and that ffprobe is installed"
            }
            Self::DecodeError { .. } => "Check that ffmpeg is installed and the video is not corrupt",
            Self::EstimatorError { .. } => {
                "Check the estimator command and that the worker speaks the frame protocol"
            }
            Self::DatabaseError(_) => "Check that the database directory is writable",
            Self::IoError(_) => "Check file permissions and free disk space",
            Self::SerializationError(_) => "The keypoints JSON may be corrupt; delete it and re-run",
            Self::ConfigValidationError { .. } | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration file or command-line flags"
            }
            Self::ProcessingError { .. } => "Re-run with --verbose for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Input => format!("Video input problem: {}", self),
            ErrorCategory::Inference => format!("Pose estimation failed: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
            ErrorCategory::Processing => format!("Processing failed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
