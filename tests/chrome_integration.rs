//! Round trips against a real Chrome

#![cfg(feature = "cdp")]

use rfprint::{ChromeEngine, EngineSource, PassthroughConverter, RenderService, SessionManager};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn service() -> RenderService {
    let source = match std::env::var("CHROME_WS_URL") {
        Ok(ws_url) => EngineSource::Connect { ws_url },
        Err(_) => EngineSource::Launch {
            chrome_path: None,
            sandbox: false,
        },
    };
    let deadline = Duration::from_secs(30);
    let sessions = SessionManager::new(Arc::new(ChromeEngine::new(source, deadline)), deadline);
    RenderService::new(sessions, Arc::new(PassthroughConverter))
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_print_pdf() {
    let pdf = service()
        .print("<html><body><h1>Hello PDF</h1></body></html>", None)
        .await
        .expect("print failed");
    assert!(pdf.starts_with(b"%PDF-"));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_print_pdf_with_options() {
    let options = json!({ "landscape": true, "print_background": true, "scale": 0.8 });
    let pdf = service()
        .print("<p>landscape</p>", options.as_object())
        .await
        .expect("print failed");
    assert!(pdf.starts_with(b"%PDF-"));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_viewport_screenshot() {
    let options = json!({ "width": 800, "height": 600 });
    let png = service()
        .screenshot("<h1>Shot</h1>", options.as_object())
        .await
        .expect("screenshot failed");
    let image = image::load_from_memory(&png).expect("not a png");
    assert_eq!((image.width(), image.height()), (800, 600));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_full_page_screenshot() {
    let html = "<div style=\"height: 3000px\">tall</div>";
    let options = json!({ "width": 800, "height": 600, "full_page": true });
    let png = service()
        .screenshot(html, options.as_object())
        .await
        .expect("screenshot failed");
    let image = image::load_from_memory(&png).expect("not a png");
    assert!(image.height() >= 600);
}
