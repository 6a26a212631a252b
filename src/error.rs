use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while extracting and aggregating dependencies.
///
/// Only [`AnalysisError::InvalidPath`] and [`AnalysisError::Pipeline`] ever reach the
/// consumer; per-file failures are logged by the pipeline and the file is skipped.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("Invalid project path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Failed to classify {}: {message}", path.display())]
    Classify { path: PathBuf, message: String },

    #[error("{0}")]
    Pipeline(String),

    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl AnalysisError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn classify(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Classify {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Per-file failures are recovered locally; everything else ends the run.
    pub fn is_file_local(&self) -> bool {
        matches!(
            self,
            AnalysisError::Parse { .. } | AnalysisError::Classify { .. } | AnalysisError::Io { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
