//! End-to-end render operations
//!
//! Each operation translates its options, runs inside one session from the
//! `SessionManager`, and for PDF/A variants hands the PDF to the configured
//! converter after the session has been released.

use crate::inject::load_html;
use crate::options::{translate_print, translate_screenshot, OptionBag};
use crate::pdf::render_pdf;
use crate::pdfa::PdfaConverter;
use crate::screenshot::render_screenshot;
use crate::session::SessionManager;
use crate::Result;
use log::debug;
use std::sync::Arc;

/// The rendering core behind the HTTP endpoints
#[derive(Clone)]
pub struct RenderService {
    sessions: SessionManager,
    converter: Arc<dyn PdfaConverter>,
}

impl RenderService {
    pub fn new(sessions: SessionManager, converter: Arc<dyn PdfaConverter>) -> Self {
        Self {
            sessions,
            converter,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn converter_name(&self) -> &'static str {
        self.converter.name()
    }

    /// Render `html` to PDF
    pub async fn print(&self, html: &str, options: Option<&OptionBag>) -> Result<Vec<u8>> {
        let config = translate_print(options);
        let html = html.to_owned();
        debug!("print: {} bytes of html", html.len());

        self.sessions
            .with_session(move |session| {
                Box::pin(async move {
                    load_html(session, &html).await?;
                    render_pdf(session, &config).await
                })
            })
            .await
    }

    /// Render `html` to PDF, then convert the result to PDF/A
    pub async fn print_pdfa(&self, html: &str, options: Option<&OptionBag>) -> Result<Vec<u8>> {
        let pdf = self.print(html, options).await?;
        self.converter.convert(pdf, options).await
    }

    /// Convert an existing PDF to PDF/A
    pub async fn convert_pdfa(&self, pdf: Vec<u8>, options: Option<&OptionBag>) -> Result<Vec<u8>> {
        self.converter.convert(pdf, options).await
    }

    /// Render `html` to a PNG screenshot
    pub async fn screenshot(&self, html: &str, options: Option<&OptionBag>) -> Result<Vec<u8>> {
        let config = translate_screenshot(options);
        let html = html.to_owned();
        debug!(
            "screenshot: {}x{} full_page={}",
            config.width, config.height, config.full_page
        );

        self.sessions
            .with_session(move |session| {
                Box::pin(async move {
                    load_html(session, &html).await?;
                    render_screenshot(session, &config).await
                })
            })
            .await
    }
}
