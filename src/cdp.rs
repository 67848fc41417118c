//! Chrome DevTools Protocol engine implementation

use crate::engine::{EngineSession, RenderEngine};
use crate::options::PrintConfiguration;
use crate::session::TEARDOWN_TIMEOUT;
use crate::{Error, Result};
use headless_chrome::browser::tab::Tab;
use base64::Engine as _;
use headless_chrome::protocol::cdp::{Emulation, Page, Target};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DOCUMENT_HEIGHT_SCRIPT: &str = r#"
(function() {
    const root = document.documentElement;
    const body = document.body;
    return Math.max(root ? root.scrollHeight : 0, body ? body.scrollHeight : 0);
})()
"#;

/// Where sessions get their Chrome from
#[derive(Debug, Clone)]
pub enum EngineSource {
    /// An already-running Chrome exposing a DevTools WebSocket endpoint.
    /// Each session opens its own connection to it.
    Connect { ws_url: String },
    /// Launch a private headless Chrome for every session
    Launch {
        chrome_path: Option<PathBuf>,
        sandbox: bool,
    },
}

/// CDP-based engine (uses the `headless_chrome` crate)
///
/// The engine itself holds no connection. Every session gets a private
/// connection and a fresh tab, both dropped when the session is closed. In
/// connect mode the tab also lives in its own browser context, so cookies and
/// storage never leak between sessions sharing one Chrome.
pub struct ChromeEngine {
    source: EngineSource,
    session_timeout: Duration,
}

impl ChromeEngine {
    pub fn new(source: EngineSource, session_timeout: Duration) -> Self {
        Self {
            source,
            session_timeout,
        }
    }

    pub fn source(&self) -> &EngineSource {
        &self.source
    }

    fn connect(&self) -> Result<Browser> {
        // Outlive the session deadline so teardown still has a live connection.
        let idle = self.session_timeout + TEARDOWN_TIMEOUT;

        match &self.source {
            EngineSource::Connect { ws_url } => Browser::connect_with_timeout(ws_url.clone(), idle)
                .map_err(|e| {
                    Error::InitializationError(format!("Failed to connect to {}: {}", ws_url, e))
                }),
            EngineSource::Launch {
                chrome_path,
                sandbox,
            } => {
                let launch_options = LaunchOptions::default_builder()
                    .headless(true)
                    .sandbox(*sandbox)
                    .path(chrome_path.clone())
                    .window_size(Some((1280, 720)))
                    .idle_browser_timeout(idle)
                    .build()
                    .map_err(|e| {
                        Error::InitializationError(format!("Failed to build launch options: {}", e))
                    })?;

                Browser::new(launch_options)
                    .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))
            }
        }
    }

    /// Reach the engine once and report its product string.
    pub fn health_check(&self) -> Result<String> {
        let browser = self.connect()?;
        let version = browser
            .get_version()
            .map_err(|e| Error::InitializationError(format!("Failed to query version: {}", e)))?;
        Ok(version.product)
    }
}

impl RenderEngine for ChromeEngine {
    fn name(&self) -> &'static str {
        "chrome"
    }

    fn open_session(&self) -> Result<Box<dyn EngineSession>> {
        let browser = self.connect()?;

        let (tab, context_id) = match &self.source {
            EngineSource::Connect { .. } => {
                let context = browser.new_context().map_err(|e| {
                    Error::InitializationError(format!("Failed to create browser context: {}", e))
                })?;
                let tab = context
                    .new_tab()
                    .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
                (tab, Some(context.get_id().to_string()))
            }
            // A launched Chrome is already private to this session.
            EngineSource::Launch { .. } => {
                let tab = browser
                    .new_tab()
                    .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
                (tab, None)
            }
        };
        tab.set_default_timeout(self.session_timeout);
        debug!("opened tab {} (context {:?})", tab.get_target_id(), context_id);

        Ok(Box::new(ChromeSession {
            tab,
            context_id,
            browser: Mutex::new(Some(browser)),
            viewport: Mutex::new((1280, 720)),
        }))
    }
}

struct ChromeSession {
    tab: Arc<Tab>,
    context_id: Option<String>,
    browser: Mutex<Option<Browser>>,
    viewport: Mutex<(u32, u32)>,
}

fn clip(width: u32, height: u32) -> Page::Viewport {
    Page::Viewport {
        x: 0.0,
        y: 0.0,
        width: width as f64,
        height: height as f64,
        scale: 1.0,
    }
}

fn device_metrics(width: u32, height: u32) -> Emulation::SetDeviceMetricsOverride {
    Emulation::SetDeviceMetricsOverride {
        width,
        height,
        device_scale_factor: 1.0,
        mobile: false,
        scale: None,
        screen_width: None,
        screen_height: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    }
}

impl ChromeSession {
    fn capture(
        &self,
        format: Page::CaptureScreenshotFormatOption,
        quality: Option<u32>,
        area: Page::Viewport,
    ) -> Result<Vec<u8>> {
        let shot = self
            .tab
            .call_method(Page::CaptureScreenshot {
                format: Some(format),
                quality,
                clip: Some(area),
                from_surface: Some(true),
                capture_beyond_viewport: Some(true),
                optimize_for_speed: None,
            })
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))?;

        base64::engine::general_purpose::STANDARD
            .decode(shot.data)
            .map_err(|e| Error::RenderError(format!("Screenshot data is not base64: {}", e)))
    }

    fn dispose_context(&self, context_id: &str) -> Result<()> {
        let browser = self
            .browser
            .lock()
            .map_err(|_| Error::Other("browser handle poisoned".into()))?;
        let browser = browser
            .as_ref()
            .ok_or_else(|| Error::Other("browser already dropped".into()))?;
        browser
            .call_method(Target::DisposeBrowserContext {
                browser_context_id: context_id.to_string(),
            })
            .map_err(|e| Error::Other(format!("Failed to dispose context {}: {}", context_id, e)))?;
        Ok(())
    }
}

impl EngineSession for ChromeSession {
    fn navigate_blank(&self) -> Result<()> {
        self.tab
            .navigate_to("about:blank")
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;
        Ok(())
    }

    fn top_frame_id(&self) -> Result<String> {
        let tree = self
            .tab
            .call_method(Page::GetFrameTree(None))
            .map_err(|e| Error::LoadError(format!("Failed to get frame tree: {}", e)))?;
        Ok(tree.frame_tree.frame.id)
    }

    fn set_document_content(&self, frame_id: &str, html: &str) -> Result<()> {
        self.tab
            .call_method(Page::SetDocumentContent {
                frame_id: frame_id.to_string(),
                html: html.to_string(),
            })
            .map_err(|e| Error::LoadError(format!("Failed to set document content: {}", e)))?;
        Ok(())
    }

    fn print_to_pdf(&self, config: &PrintConfiguration) -> Result<Vec<u8>> {
        let options = PrintToPdfOptions {
            landscape: config.landscape,
            display_header_footer: config.display_header_footer,
            print_background: config.print_background,
            scale: config.scale,
            paper_width: config.paper_width,
            paper_height: config.paper_height,
            margin_top: config.margin_top,
            margin_bottom: config.margin_bottom,
            margin_left: config.margin_left,
            margin_right: config.margin_right,
            page_ranges: config.page_ranges.clone(),
            ..Default::default()
        };

        self.tab
            .print_to_pdf(Some(options))
            .map_err(|e| Error::RenderError(format!("Print to PDF failed: {}", e)))
    }

    fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.tab
            .call_method(device_metrics(width, height))
            .map_err(|e| Error::RenderError(format!("Failed to set viewport: {}", e)))?;
        if let Ok(mut viewport) = self.viewport.lock() {
            *viewport = (width, height);
        }
        Ok(())
    }

    fn capture_viewport(&self, width: u32, height: u32) -> Result<Vec<u8>> {
        self.capture(Page::CaptureScreenshotFormatOption::Png, None, clip(width, height))
    }

    fn capture_full_page(&self, width: u32, quality: u8) -> Result<Vec<u8>> {
        let measured = self
            .tab
            .evaluate(DOCUMENT_HEIGHT_SCRIPT, false)
            .map_err(|e| Error::RenderError(format!("Failed to measure document: {}", e)))?;
        let document_height = measured
            .value
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            .ceil() as u32;

        // The viewport stays as set; the clip reaches past it.
        let viewport_height = self.viewport.lock().map(|v| v.1).unwrap_or(720);
        let height = document_height.max(viewport_height);

        let (format, quality) = if quality >= 100 {
            (Page::CaptureScreenshotFormatOption::Png, None)
        } else {
            (Page::CaptureScreenshotFormatOption::Jpeg, Some(quality as u32))
        };

        self.capture(format, quality, clip(width, height))
    }

    fn close(&self) -> Result<()> {
        // Disposing the context closes its tab with it.
        let disposed = match &self.context_id {
            Some(id) => match self.dispose_context(id) {
                Ok(()) => true,
                Err(err) => {
                    warn!("{}; closing tab instead", err);
                    false
                }
            },
            None => false,
        };
        let closed = if disposed {
            Ok(true)
        } else {
            self.tab
                .close(true)
                .map_err(|e| Error::Other(format!("Failed to close tab: {}", e)))
        };

        // Dropping the browser ends the connection, or the process in launch mode.
        if let Ok(mut browser) = self.browser.lock() {
            drop(browser.take());
        }

        closed.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_starts_at_origin() {
        let viewport = clip(800, 600);
        assert_eq!((viewport.x, viewport.y), (0.0, 0.0));
        assert_eq!((viewport.width, viewport.height), (800.0, 600.0));
        assert_eq!(viewport.scale, 1.0);
    }

    #[test]
    fn device_metrics_pin_an_unscaled_desktop_viewport() {
        let metrics = device_metrics(1024, 768);
        assert_eq!((metrics.width, metrics.height), (1024, 768));
        assert_eq!(metrics.device_scale_factor, 1.0);
        assert!(!metrics.mobile);
    }

    #[test]
    fn test_chrome_session_creation() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let engine = ChromeEngine::new(
            EngineSource::Launch {
                chrome_path: None,
                sandbox: false,
            },
            Duration::from_secs(30),
        );
        let session = match engine.open_session() {
            Ok(session) => session,
            Err(e) => {
                eprintln!("Skipping Chrome session test because Chrome is not available or failed to launch: {}", e);
                return;
            }
        };
        assert!(session.close().is_ok());
    }
}
