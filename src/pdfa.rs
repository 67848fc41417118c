//! PDF/A conversion boundary
//!
//! The render pipeline hands finished PDFs to a `PdfaConverter` and returns
//! whatever it produces. `PassthroughConverter` is the default and returns
//! its input unchanged; `GhostscriptConverter` pipes the document through
//! Ghostscript's `pdfwrite` device.

use crate::options::OptionBag;
use crate::{Error, Result};
use futures::future::BoxFuture;
use log::{debug, warn};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// PDF/A part used when the request does not ask for one
pub const DEFAULT_PDFA_LEVEL: u8 = 3;

/// Longest a single Ghostscript run may take
pub const CONVERSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Turns PDF bytes into PDF/A bytes
pub trait PdfaConverter: Send + Sync {
    fn name(&self) -> &'static str;

    fn convert<'a>(
        &'a self,
        pdf: Vec<u8>,
        options: Option<&'a OptionBag>,
    ) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Returns the input unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughConverter;

impl PdfaConverter for PassthroughConverter {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn convert<'a>(
        &'a self,
        pdf: Vec<u8>,
        _options: Option<&'a OptionBag>,
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            warn!("PDF/A conversion is not configured, returning the original PDF");
            Ok(pdf)
        })
    }
}

/// Converts through an external Ghostscript binary
#[derive(Debug, Clone)]
pub struct GhostscriptConverter {
    program: String,
}

impl GhostscriptConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// `pdfa_level` from the request options, if it names a valid PDF/A part.
    pub fn level(options: Option<&OptionBag>) -> u8 {
        options
            .and_then(|o| o.get("pdfa_level"))
            .and_then(serde_json::Value::as_f64)
            .filter(|level| matches!(*level as i64, 1..=3) && level.fract() == 0.0)
            .map(|level| level as u8)
            .unwrap_or(DEFAULT_PDFA_LEVEL)
    }

    /// Ghostscript arguments reading the PDF from stdin and writing to stdout.
    pub fn arguments(level: u8) -> Vec<String> {
        vec![
            format!("-dPDFA={}", level),
            "-dBATCH".into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            "-sColorConversionStrategy=RGB".into(),
            "-sDEVICE=pdfwrite".into(),
            "-dPDFACompatibilityPolicy=1".into(),
            "-sOutputFile=-".into(),
            "-".into(),
        ]
    }

    async fn run(&self, pdf: Vec<u8>, level: u8) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(Self::arguments(level))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ConversionError(format!("failed to start {}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::ConversionError("ghostscript stdin unavailable".into()))?;
        let feeding = tokio::spawn(async move {
            let written = stdin.write_all(&pdf).await;
            drop(stdin);
            written
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::ConversionError(format!("ghostscript failed: {}", e)))?;

        match feeding.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::ConversionError(format!("writing input failed: {}", e))),
            Err(e) => return Err(Error::ConversionError(format!("input task failed: {}", e))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ConversionError(format!(
                "ghostscript exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(Error::ConversionError("ghostscript produced no output".into()));
        }
        Ok(output.stdout)
    }
}

impl Default for GhostscriptConverter {
    fn default() -> Self {
        Self::new("gs")
    }
}

impl PdfaConverter for GhostscriptConverter {
    fn name(&self) -> &'static str {
        "ghostscript"
    }

    fn convert<'a>(
        &'a self,
        pdf: Vec<u8>,
        options: Option<&'a OptionBag>,
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let level = Self::level(options);
            debug!("converting {} bytes to PDF/A-{}", pdf.len(), level);
            tokio::time::timeout(CONVERSION_TIMEOUT, self.run(pdf, level))
                .await
                .map_err(|_| Error::Timeout {
                    ms: CONVERSION_TIMEOUT.as_millis() as u64,
                    step: "pdfa_conversion",
                })?
        })
    }
}
