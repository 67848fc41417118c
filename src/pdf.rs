//! Print-to-PDF rendering

use crate::options::PrintConfiguration;
use crate::session::RenderSession;
use crate::{Error, Result};
use log::debug;

/// File signature every PDF starts with
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Print the session's current document to PDF.
///
/// Only the fields set in `config` are forwarded; the engine fills in the
/// rest. Page-count metadata returned alongside the bytes is discarded.
pub async fn render_pdf(session: &RenderSession, config: &PrintConfiguration) -> Result<Vec<u8>> {
    debug!(
        "session {}: printing with {} explicit option(s)",
        session.id(),
        config.explicit_fields()
    );

    let pdf = session.print_to_pdf(config).await.map_err(|e| match e {
        Error::RenderError(_) | Error::SessionReleased(_) | Error::Timeout { .. } => e,
        other => Error::RenderError(format!("print to PDF: {}", other)),
    })?;

    if pdf.is_empty() {
        return Err(Error::RenderError("engine returned an empty PDF".into()));
    }
    Ok(pdf)
}
