//! Central error handling for the post-processing compositor
//!
//! Provides a unified RenderError enum with consistent categorization.
//! Stage failures never propagate past the compositor's draw entry point;
//! they are captured there and the frame is dropped.

/// Centralized error type for all compositor operations
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Device error: {0}")]
    Device(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl RenderError {
    /// Convenience constructors for common error types
    pub fn device<T: ToString>(msg: T) -> Self {
        RenderError::Device(msg.to_string())
    }

    pub fn upload<T: ToString>(msg: T) -> Self {
        RenderError::Upload(msg.to_string())
    }

    pub fn render<T: ToString>(msg: T) -> Self {
        RenderError::Render(msg.to_string())
    }
}

/// Result type alias for compositor operations
pub type RenderResult<T> = Result<T, RenderError>;
