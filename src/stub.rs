//! Deterministic in-memory engine
//!
//! `StubEngine` stands in for Chrome in tests and local development. It
//! enforces the same step ordering as a real engine, emits PDF- and
//! PNG-shaped output, and counts how often each session is closed. Any step
//! can be made to fail or to hang until the session is closed.

use crate::engine::{EngineSession, RenderEngine};
use crate::options::PrintConfiguration;
use crate::{Error, Result};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Pixels of document height the stub lays out per line of HTML
pub const STUB_LINE_HEIGHT: u32 = 40;

/// Longest a hung step waits for its session to be closed
const HANG_LIMIT: Duration = Duration::from_secs(10);

/// Engine steps that can be made to fail or hang
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubStep {
    Open,
    NavigateBlank,
    FrameTree,
    SetContent,
    Print,
    SetViewport,
    Capture,
    Close,
}

#[derive(Default)]
struct Counters {
    next_id: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
    close_calls: Mutex<HashMap<u64, usize>>,
    steps: Mutex<HashMap<u64, Vec<StubStep>>>,
}

/// In-memory engine backend
#[derive(Clone, Default)]
pub struct StubEngine {
    fail_at: Option<StubStep>,
    hang_at: Option<StubStep>,
    open_delay: Option<Duration>,
    counters: Arc<Counters>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `step` fail on every session
    pub fn failing_at(mut self, step: StubStep) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Make `step` block until the session is closed
    pub fn hanging_at(mut self, step: StubStep) -> Self {
        self.hang_at = Some(step);
        self
    }

    /// Delay session creation
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Sessions successfully opened so far
    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Total close calls across all sessions
    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Close calls per session id
    pub fn close_calls(&self) -> HashMap<u64, usize> {
        self.counters
            .close_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Steps issued against each session, in order
    pub fn steps(&self) -> HashMap<u64, Vec<StubStep>> {
        self.counters
            .steps
            .lock()
            .map(|steps| steps.clone())
            .unwrap_or_default()
    }
}

impl RenderEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn open_session(&self) -> Result<Box<dyn EngineSession>> {
        if let Some(delay) = self.open_delay {
            std::thread::sleep(delay);
        }
        if self.fail_at == Some(StubStep::Open) {
            return Err(Error::InitializationError("stub engine refused connection".into()));
        }

        let id = self.counters.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(StubSession {
            id,
            fail_at: self.fail_at,
            hang_at: self.hang_at,
            counters: Arc::clone(&self.counters),
            closed: AtomicBool::new(false),
            document: Mutex::new(None),
            viewport: Mutex::new((1280, 720)),
        }))
    }
}

struct StubSession {
    id: u64,
    fail_at: Option<StubStep>,
    hang_at: Option<StubStep>,
    counters: Arc<Counters>,
    closed: AtomicBool,
    /// `None` until the context has been blanked
    document: Mutex<Option<String>>,
    viewport: Mutex<(u32, u32)>,
}

impl StubSession {
    fn frame_id(&self) -> String {
        format!("stub-frame-{}", self.id)
    }

    fn enter(&self, step: StubStep) -> Result<()> {
        if let Ok(mut steps) = self.counters.steps.lock() {
            steps.entry(self.id).or_default().push(step);
        }

        if self.hang_at == Some(step) {
            let started = Instant::now();
            while !self.closed.load(Ordering::SeqCst) && started.elapsed() < HANG_LIMIT {
                std::thread::sleep(Duration::from_millis(5));
            }
            return Err(Error::Other(format!("stub: target closed during {:?}", step)));
        }
        if self.fail_at == Some(step) {
            return Err(Error::Other(format!("stub: {:?} rejected by engine", step)));
        }
        if self.closed.load(Ordering::SeqCst) && step != StubStep::Close {
            return Err(Error::Other("stub: target closed".into()));
        }
        Ok(())
    }

    fn document(&self) -> Result<String> {
        self.document
            .lock()
            .map_err(|_| Error::Other("stub: document lock poisoned".into()))?
            .clone()
            .ok_or_else(|| Error::Other("stub: no document in top-level frame".into()))
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport.lock().map(|v| *v).unwrap_or((1280, 720))
    }
}

fn encode_png(width: u32, height: u32) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(Error::Other(format!("stub: invalid clip {}x{}", width, height)));
    }
    let canvas = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .map_err(|e| Error::Other(format!("stub: png encoding failed: {}", e)))?;
    Ok(bytes)
}

impl EngineSession for StubSession {
    fn navigate_blank(&self) -> Result<()> {
        self.enter(StubStep::NavigateBlank)?;
        if let Ok(mut document) = self.document.lock() {
            *document = Some(String::new());
        }
        Ok(())
    }

    fn top_frame_id(&self) -> Result<String> {
        self.enter(StubStep::FrameTree)?;
        self.document()?;
        Ok(self.frame_id())
    }

    fn set_document_content(&self, frame_id: &str, html: &str) -> Result<()> {
        self.enter(StubStep::SetContent)?;
        if frame_id != self.frame_id() {
            return Err(Error::Other(format!("stub: no frame with id {}", frame_id)));
        }
        let mut document = self
            .document
            .lock()
            .map_err(|_| Error::Other("stub: document lock poisoned".into()))?;
        match document.as_mut() {
            Some(content) => {
                *content = html.to_owned();
                Ok(())
            }
            None => Err(Error::Other("stub: frame has no document".into())),
        }
    }

    fn print_to_pdf(&self, config: &PrintConfiguration) -> Result<Vec<u8>> {
        self.enter(StubStep::Print)?;
        let html = self.document()?;
        let mut pdf = format!("%PDF-1.4\n%stub session {}\n%{:?}\n", self.id, config).into_bytes();
        pdf.extend_from_slice(html.as_bytes());
        pdf.extend_from_slice(b"\n%%EOF\n");
        Ok(pdf)
    }

    fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.enter(StubStep::SetViewport)?;
        if let Ok(mut viewport) = self.viewport.lock() {
            *viewport = (width, height);
        }
        Ok(())
    }

    fn capture_viewport(&self, width: u32, height: u32) -> Result<Vec<u8>> {
        self.enter(StubStep::Capture)?;
        self.document()?;
        encode_png(width, height)
    }

    fn capture_full_page(&self, width: u32, quality: u8) -> Result<Vec<u8>> {
        self.enter(StubStep::Capture)?;
        if quality != 100 {
            return Err(Error::Other("stub: only lossless capture is supported".into()));
        }
        let html = self.document()?;
        let lines = html.lines().count() as u32;
        let height = self.viewport().1.max(lines * STUB_LINE_HEIGHT);
        encode_png(width, height)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.counters.close_calls.lock() {
            *calls.entry(self.id).or_default() += 1;
        }
        self.enter(StubStep::Close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_requires_a_blank_frame_first() {
        let engine = StubEngine::new();
        let session = engine.open_session().unwrap();
        assert!(session.top_frame_id().is_err());

        session.navigate_blank().unwrap();
        let frame = session.top_frame_id().unwrap();
        session.set_document_content(&frame, "<p>hi</p>").unwrap();
        let pdf = session.print_to_pdf(&PrintConfiguration::default()).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));

        session.close().unwrap();
        assert_eq!(engine.closed(), 1);
    }

    #[test]
    fn wrong_frame_id_is_rejected() {
        let engine = StubEngine::new();
        let session = engine.open_session().unwrap();
        session.navigate_blank().unwrap();
        assert!(session.set_document_content("frame-x", "<p/>").is_err());
    }

    #[test]
    fn viewport_capture_matches_clip() {
        let engine = StubEngine::new();
        let session = engine.open_session().unwrap();
        session.navigate_blank().unwrap();
        let png = session.capture_viewport(320, 200).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 200));
    }

    #[test]
    fn close_failure_is_still_counted() {
        let engine = StubEngine::new().failing_at(StubStep::Close);
        let session = engine.open_session().unwrap();
        assert!(session.close().is_err());
        assert_eq!(engine.closed(), 1);
    }
}
