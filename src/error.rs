//! Error types for the rendering core

use thiserror::Error;

/// Result type alias for rendering operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while orchestrating a render
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to create a session against the engine
    #[error("Session creation failed: {0}")]
    InitializationError(String),

    /// Failed to inject HTML into the session
    #[error("Failed to load content: {0}")]
    LoadError(String),

    /// Failed to render content
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Operation timed out while `step` was in flight
    #[error("Operation timed out after {ms}ms during {step}")]
    Timeout { ms: u64, step: &'static str },

    /// A session handle was used after it had been released
    #[error("Session {0} used after release")]
    SessionReleased(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// PDF/A conversion failed
    #[error("PDF/A conversion failed: {0}")]
    ConversionError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// The stage of a render an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Session,
    Injection,
    Rendering,
    Conversion,
    Internal,
}

impl Phase {
    /// Stage a named engine step belongs to
    pub fn of_step(step: &str) -> Phase {
        match step {
            "navigate_blank" | "top_frame_id" | "set_document_content" => Phase::Injection,
            "print_to_pdf" | "set_viewport" | "capture_viewport" | "capture_full_page" => {
                Phase::Rendering
            }
            "pdfa_conversion" => Phase::Conversion,
            _ => Phase::Session,
        }
    }
}

impl Error {
    /// Classify the error by the render stage that produced it.
    pub fn phase(&self) -> Phase {
        match self {
            Error::InitializationError(_) => Phase::Session,
            Error::Timeout { step, .. } => Phase::of_step(step),
            Error::LoadError(_) => Phase::Injection,
            Error::RenderError(_) => Phase::Rendering,
            Error::ConversionError(_) => Phase::Conversion,
            Error::SessionReleased(_) | Error::ConfigError(_) | Error::Other(_) => Phase::Internal,
        }
    }

    /// True for errors that indicate a bug in the caller rather than an engine failure.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Error::SessionReleased(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_follow_the_render_pipeline() {
        assert_eq!(Error::InitializationError("x".into()).phase(), Phase::Session);
        assert_eq!(Error::LoadError("x".into()).phase(), Phase::Injection);
        assert_eq!(Error::RenderError("x".into()).phase(), Phase::Rendering);
        assert_eq!(Error::ConversionError("x".into()).phase(), Phase::Conversion);
    }

    #[test]
    fn timeouts_are_classified_by_step() {
        let timeout = |step| Error::Timeout { ms: 30000, step };
        assert_eq!(timeout("open").phase(), Phase::Session);
        assert_eq!(timeout("set_document_content").phase(), Phase::Injection);
        assert_eq!(timeout("capture_full_page").phase(), Phase::Rendering);
        assert_eq!(timeout("pdfa_conversion").phase(), Phase::Conversion);
    }

    #[test]
    fn released_session_is_a_programming_error() {
        let err = Error::SessionReleased(7);
        assert!(err.is_programming_error());
        assert_eq!(err.to_string(), "Session 7 used after release");
        assert!(!Error::RenderError("boom".into()).is_programming_error());
    }

    #[test]
    fn timeout_message_names_the_step() {
        let err = Error::Timeout { ms: 250, step: "print_to_pdf" };
        assert_eq!(err.to_string(), "Operation timed out after 250ms during print_to_pdf");
    }
}
