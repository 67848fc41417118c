//! Viewport and full-page screenshots

use crate::options::ScreenshotConfiguration;
use crate::session::RenderSession;
use crate::{Error, Result};

/// Quality used for full-page captures; 100 keeps the output lossless PNG
pub const FULL_PAGE_QUALITY: u8 = 100;

/// Signature every PNG stream starts with
pub const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

fn dimension(name: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| Error::RenderError(format!("invalid viewport {}: {}", name, value)))
}

fn render_error(step: &str, err: Error) -> Error {
    match err {
        Error::RenderError(_) | Error::SessionReleased(_) | Error::Timeout { .. } => err,
        other => Error::RenderError(format!("{}: {}", step, other)),
    }
}

/// Capture the session's current document as PNG.
///
/// The viewport is resized to the configured size first. With `full_page`
/// the whole scrollable document is captured as one image, otherwise exactly
/// the viewport.
pub async fn render_screenshot(
    session: &RenderSession,
    config: &ScreenshotConfiguration,
) -> Result<Vec<u8>> {
    let width = dimension("width", config.width)?;
    let height = dimension("height", config.height)?;

    session
        .set_viewport(width, height)
        .await
        .map_err(|e| render_error("set viewport", e))?;

    let png = if config.full_page {
        session
            .capture_full_page(width, FULL_PAGE_QUALITY)
            .await
            .map_err(|e| render_error("full page capture", e))?
    } else {
        session
            .capture_viewport(width, height)
            .await
            .map_err(|e| render_error("viewport capture", e))?
    };

    if !png.starts_with(PNG_SIGNATURE) {
        return Err(Error::RenderError("engine returned a non-PNG capture".into()));
    }
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_dimensions() {
        assert!(dimension("width", 0).is_err());
        assert!(dimension("height", -720).is_err());
        assert!(dimension("width", i64::MAX).is_err());
        assert_eq!(dimension("width", 1280).unwrap(), 1280);
    }
}
