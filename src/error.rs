use std::fmt;

/// Custom error types for vidscrub application
#[derive(Debug)]
pub enum VidscrubError {
    /// File system related errors
    FileSystem { source: std::io::Error, path: std::path::PathBuf },

    /// Malformed zone or timestamp, rejected before compilation
    Validation { field: String, message: String },

    /// Degenerate pass plan (e.g. cut zones covering the whole timeline)
    Compilation { message: String },

    /// Transcoding engine invocation failure (non-zero exit, unreadable output)
    Engine { message: String, stderr: Option<String> },

    /// Temporary artifact create/delete failure
    Artifact { source: std::io::Error, path: std::path::PathBuf },

    /// Configuration validation errors
    Config { field: String, message: String },

    /// Missing external dependency
    MissingDependency { name: String, suggestion: String },

    /// General processing error
    Processing { message: String },
}

impl fmt::Display for VidscrubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VidscrubError::FileSystem { source, path } => {
                write!(f, "File system error for '{}': {}", path.display(), source)
            }
            VidscrubError::Validation { field, message } => {
                write!(f, "Validation error in '{}': {}", field, message)
            }
            VidscrubError::Compilation { message } => {
                write!(f, "Compilation error: {}", message)
            }
            VidscrubError::Engine { message, stderr } => {
                write!(f, "Engine error: {}", message)?;
                if let Some(stderr) = stderr {
                    write!(f, "\nStderr: {}", stderr)?;
                }
                Ok(())
            }
            VidscrubError::Artifact { source, path } => {
                write!(f, "Artifact error for '{}': {}", path.display(), source)
            }
            VidscrubError::Config { field, message } => {
                write!(f, "Configuration error in '{}': {}", field, message)
            }
            VidscrubError::MissingDependency { name, suggestion } => {
                write!(f, "Missing dependency '{}': {}", name, suggestion)
            }
            VidscrubError::Processing { message } => {
                write!(f, "Processing error: {}", message)
            }
        }
    }
}

impl std::error::Error for VidscrubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VidscrubError::FileSystem { source, .. } => Some(source),
            VidscrubError::Artifact { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for vidscrub operations
pub type Result<T> = std::result::Result<T, VidscrubError>;

/// Helper function to create validation errors
pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> VidscrubError {
    VidscrubError::Validation {
        field: field.into(),
        message: message.into(),
    }
}

/// Helper function to create compilation errors
pub fn compilation_error(message: impl Into<String>) -> VidscrubError {
    VidscrubError::Compilation {
        message: message.into(),
    }
}

/// Helper function to create engine errors
pub fn engine_error(message: impl Into<String>, stderr: Option<String>) -> VidscrubError {
    VidscrubError::Engine {
        message: message.into(),
        stderr,
    }
}

/// Helper function to create artifact errors
pub fn artifact_error(source: std::io::Error, path: std::path::PathBuf) -> VidscrubError {
    VidscrubError::Artifact { source, path }
}

/// Helper function to create configuration errors
pub fn config_error(field: impl Into<String>, message: impl Into<String>) -> VidscrubError {
    VidscrubError::Config {
        field: field.into(),
        message: message.into(),
    }
}

/// Helper function to create file system errors
pub fn fs_error(source: std::io::Error, path: std::path::PathBuf) -> VidscrubError {
    VidscrubError::FileSystem { source, path }
}

/// Trait for converting external errors to VidscrubError
pub trait IntoVidscrubError<T> {
    fn with_path(self, path: std::path::PathBuf) -> Result<T>;
    fn with_context(self, message: impl Into<String>) -> Result<T>;
}

impl<T> IntoVidscrubError<T> for std::result::Result<T, std::io::Error> {
    fn with_path(self, path: std::path::PathBuf) -> Result<T> {
        self.map_err(|e| fs_error(e, path))
    }

    fn with_context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| VidscrubError::Processing {
            message: format!("{}: {}", message.into(), e),
        })
    }
}

// Conversion from anyhow::Error to VidscrubError for compatibility
impl From<anyhow::Error> for VidscrubError {
    fn from(err: anyhow::Error) -> Self {
        VidscrubError::Processing {
            message: err.to_string(),
        }
    }
}
