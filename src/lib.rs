//! RFox Print
//!
//! Renders raw HTML to PDF or PNG by driving an external engine (Chrome)
//! over the DevTools protocol, and exposes that as a small HTTP service.
//!
//! # Pipeline
//!
//! - [`options`] turns a loose JSON option bag into a typed configuration
//! - [`session::SessionManager`] opens one isolated, deadline-bound session per render
//! - [`inject::load_html`] makes the HTML the top-level document without any network fetch
//! - [`pdf::render_pdf`] / [`screenshot::render_screenshot`] produce the output bytes
//! - [`pdfa::PdfaConverter`] post-processes PDFs for the PDF/A endpoints
//!
//! # Example
//!
//! ```no_run
//! use rfprint::{PassthroughConverter, RenderService, SessionManager, StubEngine};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> rfprint::Result<()> {
//! let sessions = SessionManager::new(Arc::new(StubEngine::new()), Duration::from_secs(30));
//! let service = RenderService::new(sessions, Arc::new(PassthroughConverter));
//! let pdf = service.print("<h1>Hello</h1>", None).await?;
//! assert!(pdf.starts_with(b"%PDF-"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Phase, Result};

pub mod config;
pub mod engine;
pub mod inject;
pub mod options;
pub mod pdf;
pub mod pdfa;
pub mod screenshot;
pub mod server;
pub mod service;
pub mod session;
pub mod stub;

#[cfg(feature = "cdp")]
pub mod cdp;

pub use engine::{EngineSession, RenderEngine};
pub use options::{
    translate_print, translate_screenshot, FromOptions, OptionBag, PrintConfiguration,
    ScreenshotConfiguration,
};
pub use pdfa::{GhostscriptConverter, PassthroughConverter, PdfaConverter};
pub use service::RenderService;
pub use session::{RenderSession, SessionManager, DEFAULT_SESSION_DEADLINE};
pub use stub::StubEngine;

#[cfg(feature = "cdp")]
pub use cdp::{ChromeEngine, EngineSource};
