//! Session lifecycle: acquire, bound by a deadline, guaranteed release
//!
//! `SessionManager::with_session` is the only way the core obtains a
//! `RenderSession`. Every session it opens is released exactly once, whether
//! the body succeeds, fails, panics or runs past the deadline.

use crate::engine::{EngineSession, RenderEngine};
use crate::options::PrintConfiguration;
use crate::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, warn};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Hard wall-clock budget of one session, measured from its creation
pub const DEFAULT_SESSION_DEADLINE: Duration = Duration::from_secs(30);

/// Upper bound on how long releasing a session may take
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one engine session, valid for a single render
///
/// Every operation fails with `Error::SessionReleased` once the handle has
/// been released.
pub struct RenderSession {
    id: u64,
    created_at: Instant,
    deadline: Instant,
    released: AtomicBool,
    step: Mutex<&'static str>,
    inner: Arc<dyn EngineSession>,
}

impl RenderSession {
    fn new(inner: Box<dyn EngineSession>, created_at: Instant, budget: Duration) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            created_at,
            deadline: created_at + budget,
            released: AtomicBool::new(false),
            step: Mutex::new("open"),
            inner: Arc::from(inner),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Name of the most recent engine step started on this session
    pub fn current_step(&self) -> &'static str {
        self.step.lock().map(|s| *s).unwrap_or("unknown")
    }

    async fn run<T, F>(&self, step: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EngineSession) -> Result<T> + Send + 'static,
    {
        if self.is_released() {
            return Err(Error::SessionReleased(self.id));
        }
        if let Ok(mut current) = self.step.lock() {
            *current = step;
        }
        debug!("session {}: {}", self.id, step);

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(inner.as_ref()))
            .await
            .map_err(|e| Error::Other(format!("{} worker failed: {}", step, e)))?
    }

    pub async fn navigate_blank(&self) -> Result<()> {
        self.run("navigate_blank", |s| s.navigate_blank()).await
    }

    pub async fn top_frame_id(&self) -> Result<String> {
        self.run("top_frame_id", |s| s.top_frame_id()).await
    }

    pub async fn set_document_content(&self, frame_id: &str, html: &str) -> Result<()> {
        let frame_id = frame_id.to_owned();
        let html = html.to_owned();
        self.run("set_document_content", move |s| s.set_document_content(&frame_id, &html))
            .await
    }

    pub async fn print_to_pdf(&self, config: &PrintConfiguration) -> Result<Vec<u8>> {
        let config = config.clone();
        self.run("print_to_pdf", move |s| s.print_to_pdf(&config)).await
    }

    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.run("set_viewport", move |s| s.set_viewport(width, height))
            .await
    }

    pub async fn capture_viewport(&self, width: u32, height: u32) -> Result<Vec<u8>> {
        self.run("capture_viewport", move |s| s.capture_viewport(width, height))
            .await
    }

    pub async fn capture_full_page(&self, width: u32, quality: u8) -> Result<Vec<u8>> {
        self.run("capture_full_page", move |s| s.capture_full_page(width, quality))
            .await
    }

    /// Close the underlying engine session.
    ///
    /// Succeeds at most once; later calls fail with `Error::SessionReleased`.
    pub async fn release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Err(Error::SessionReleased(self.id));
        }
        debug!(
            "session {}: release after {:?}",
            self.id,
            self.created_at.elapsed()
        );

        let inner = Arc::clone(&self.inner);
        let closing = tokio::task::spawn_blocking(move || inner.close());
        match tokio::time::timeout(TEARDOWN_TIMEOUT, closing).await {
            Ok(Ok(closed)) => closed,
            Ok(Err(e)) => Err(Error::Other(format!("release worker failed: {}", e))),
            Err(_) => Err(Error::Timeout {
                ms: TEARDOWN_TIMEOUT.as_millis() as u64,
                step: "release",
            }),
        }
    }
}

/// Owns the lifecycle of render sessions against one engine
#[derive(Clone)]
pub struct SessionManager {
    engine: Arc<dyn RenderEngine>,
    deadline: Duration,
    admission: Option<Arc<Semaphore>>,
}

impl SessionManager {
    pub fn new(engine: Arc<dyn RenderEngine>, deadline: Duration) -> Self {
        Self {
            engine,
            deadline,
            admission: None,
        }
    }

    /// Cap the number of sessions open at once. Without a cap every call
    /// opens its session immediately.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.admission = Some(Arc::new(Semaphore::new(max_sessions)));
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Run `body` against a fresh session and release the session afterwards.
    ///
    /// The deadline starts when the session is requested from the engine. On
    /// expiry the in-flight engine call is abandoned, the session is still
    /// released, and the call fails with `Error::Timeout`. A release failure
    /// is logged and never replaces the body's outcome.
    pub async fn with_session<T, F>(&self, body: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'s> FnOnce(&'s RenderSession) -> BoxFuture<'s, Result<T>>,
    {
        let _permit = match &self.admission {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Other(format!("session admission closed: {}", e)))?,
            ),
            None => None,
        };

        let created_at = Instant::now();
        let deadline = tokio::time::Instant::from_std(created_at + self.deadline);
        let budget_ms = self.deadline.as_millis() as u64;

        let engine = Arc::clone(&self.engine);
        let mut opening = tokio::task::spawn_blocking(move || engine.open_session());
        let opened = tokio::time::timeout_at(deadline, &mut opening).await;
        let inner = match opened {
            Ok(joined) => joined
                .map_err(|e| Error::InitializationError(format!("session worker failed: {}", e)))??,
            Err(_) => {
                warn!("{}: session creation exceeded {}ms", self.engine.name(), budget_ms);
                // The engine may still hand the session over later; close it then.
                tokio::spawn(async move {
                    if let Ok(Ok(late)) = opening.await {
                        let closed = tokio::task::spawn_blocking(move || late.close()).await;
                        if let Ok(Err(err)) = closed {
                            warn!("failed to close late session: {}", err);
                        }
                    }
                });
                return Err(Error::Timeout {
                    ms: budget_ms,
                    step: "open",
                });
            }
        };

        let session = RenderSession::new(inner, created_at, self.deadline);
        debug!("session {}: opened on {}", session.id(), self.engine.name());

        let outcome =
            tokio::time::timeout_at(deadline, AssertUnwindSafe(body(&session)).catch_unwind()).await;
        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Other("render task panicked".into())),
            Err(_) => {
                let step = session.current_step();
                warn!(
                    "session {}: deadline of {}ms exceeded during {}",
                    session.id(),
                    budget_ms,
                    step
                );
                Err(Error::Timeout {
                    ms: budget_ms,
                    step,
                })
            }
        };

        match session.release().await {
            Ok(()) | Err(Error::SessionReleased(_)) => {}
            Err(err) => warn!("session {}: release failed: {}", session.id(), err),
        }

        result
    }
}
