//! Pipeline errors
//!
//! Every variant is recoverable: the operation that produced it leaves the
//! previous state intact, and the viewer reports it as a status message.

/// Errors raised by the effect pipeline and its GPU backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A shader program failed to compile or link
    Compile { label: String, message: String },
    /// An intermediate render target could not be created
    RenderTarget {
        width: u32,
        height: u32,
        message: String,
    },
    /// A structural edit on the base stage, or an unknown instance id
    InvalidOperation(String),
    /// An image could not be decoded or uploaded
    ImageLoad(String),
    /// A shader source could not be read
    ShaderSource { name: String, message: String },
    /// The presentation surface could not be acquired
    Surface(String),
    /// GPU adapter or device initialization failed
    Device(String),
    /// An effect descriptor violates its invariants
    InvalidDescriptor(String),
}

impl PipelineError {
    /// Shorthand for [`PipelineError::InvalidOperation`]
    pub fn invalid(message: impl Into<String>) -> Self {
        PipelineError::InvalidOperation(message.into())
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Compile { label, message } => {
                write!(f, "Shader compile error in {}: {}", label, message)
            }
            PipelineError::RenderTarget {
                width,
                height,
                message,
            } => write!(f, "Render target error ({}x{}): {}", width, height, message),
            PipelineError::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            PipelineError::ImageLoad(msg) => write!(f, "Image load error: {}", msg),
            PipelineError::ShaderSource { name, message } => {
                write!(f, "Shader source '{}' unavailable: {}", name, message)
            }
            PipelineError::Surface(msg) => write!(f, "Surface error: {}", msg),
            PipelineError::Device(msg) => write!(f, "GPU device error: {}", msg),
            PipelineError::InvalidDescriptor(msg) => write!(f, "Invalid effect descriptor: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<image::ImageError> for PipelineError {
    fn from(e: image::ImageError) -> Self {
        PipelineError::ImageLoad(e.to_string())
    }
}

/// Result alias used across the pipeline
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = PipelineError::RenderTarget {
            width: 0,
            height: 480,
            message: "zero-sized".into(),
        };
        assert_eq!(err.to_string(), "Render target error (0x480): zero-sized");

        let err = PipelineError::Compile {
            label: "Sharpness (sharpness)".into(),
            message: "unknown identifier".into(),
        };
        assert!(err.to_string().contains("Sharpness (sharpness)"));
    }
}
