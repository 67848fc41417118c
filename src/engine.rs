//! Backend seam between the rendering core and the external engine
//!
//! A `RenderEngine` is the process-wide handle to the rendering engine and is
//! injected into the `SessionManager`. Each call to `open_session` yields a
//! private `EngineSession` that is used for exactly one render and then closed.
//!
//! Session primitives are blocking. The core runs them on the blocking thread
//! pool and never issues two of them concurrently against the same session.

use crate::options::PrintConfiguration;
use crate::Result;

/// Process-wide handle to a rendering engine
pub trait RenderEngine: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Create a fresh, isolated session
    fn open_session(&self) -> Result<Box<dyn EngineSession>>;
}

/// One isolated automation session against the engine
pub trait EngineSession: Send + Sync {
    /// Put the top-level browsing context into a blank state
    fn navigate_blank(&self) -> Result<()>;

    /// Identifier of the top-level frame
    fn top_frame_id(&self) -> Result<String>;

    /// Replace the document of `frame_id` with `html` without any network fetch
    fn set_document_content(&self, frame_id: &str, html: &str) -> Result<()>;

    /// Print the current document, forwarding only the fields set in `config`
    fn print_to_pdf(&self, config: &PrintConfiguration) -> Result<Vec<u8>>;

    /// Resize the viewport
    fn set_viewport(&self, width: u32, height: u32) -> Result<()>;

    /// Capture exactly the current viewport as PNG
    fn capture_viewport(&self, width: u32, height: u32) -> Result<Vec<u8>>;

    /// Capture the whole scrollable document as a single image
    ///
    /// A `quality` of 100 produces PNG.
    fn capture_full_page(&self, width: u32, quality: u8) -> Result<Vec<u8>>;

    /// Release every engine resource held by the session
    fn close(&self) -> Result<()>;
}
