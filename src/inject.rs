//! Loading inline HTML into a session without a hosting URL

use crate::session::RenderSession;
use crate::{Error, Result};

fn load_error(step: &str, err: Error) -> Error {
    match err {
        Error::SessionReleased(_) | Error::Timeout { .. } => err,
        other => Error::LoadError(format!("{}: {}", step, other)),
    }
}

/// Make `html` the document of the session's top-level frame.
///
/// The frame is first reset to a blank document, then its content is
/// replaced directly, so no network request is ever issued for the page
/// itself. Each step must complete before the next starts.
pub async fn load_html(session: &RenderSession, html: &str) -> Result<()> {
    session
        .navigate_blank()
        .await
        .map_err(|e| load_error("blank navigation", e))?;

    let frame_id = session
        .top_frame_id()
        .await
        .map_err(|e| load_error("frame tree", e))?;

    session
        .set_document_content(&frame_id, html)
        .await
        .map_err(|e| load_error("set document content", e))
}
