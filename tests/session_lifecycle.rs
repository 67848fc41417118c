//! Session teardown and ordering guarantees, exercised against the stub engine

use rfprint::inject::load_html;
use rfprint::pdf::render_pdf;
use rfprint::screenshot::render_screenshot;
use rfprint::stub::StubStep;
use rfprint::{
    Error, Phase, PrintConfiguration, ScreenshotConfiguration, SessionManager, StubEngine,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn sessions(engine: &StubEngine, deadline: Duration) -> SessionManager {
    SessionManager::new(Arc::new(engine.clone()), deadline)
}

async fn print(sessions: &SessionManager, html: &str) -> rfprint::Result<Vec<u8>> {
    let html = html.to_owned();
    sessions
        .with_session(move |session| {
            Box::pin(async move {
                load_html(session, &html).await?;
                render_pdf(session, &PrintConfiguration::default()).await
            })
        })
        .await
}

fn assert_released_once(engine: &StubEngine) {
    let calls = engine.close_calls();
    assert_eq!(calls.len(), engine.opened(), "every opened session must be closed");
    assert!(calls.values().all(|n| *n == 1), "close calls per session: {:?}", calls);
}

#[tokio::test]
async fn test_success_releases_once() {
    let engine = StubEngine::new();
    let pdf = print(&sessions(&engine, Duration::from_secs(5)), "<p>ok</p>")
        .await
        .unwrap();

    assert!(pdf.starts_with(b"%PDF-"));
    assert_eq!(engine.opened(), 1);
    assert_released_once(&engine);
}

#[tokio::test]
async fn test_steps_run_in_pipeline_order() {
    let engine = StubEngine::new();
    print(&sessions(&engine, Duration::from_secs(5)), "<p>order</p>")
        .await
        .unwrap();

    let steps = engine.steps();
    let only = steps.values().next().unwrap();
    assert_eq!(
        only,
        &vec![
            StubStep::NavigateBlank,
            StubStep::FrameTree,
            StubStep::SetContent,
            StubStep::Print,
            StubStep::Close,
        ]
    );
}

#[tokio::test]
async fn test_injection_failure_releases_once() {
    for step in [StubStep::NavigateBlank, StubStep::FrameTree, StubStep::SetContent] {
        let engine = StubEngine::new().failing_at(step);
        let err = print(&sessions(&engine, Duration::from_secs(5)), "<p>x</p>")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::LoadError(_)), "{:?} gave {:?}", step, err);
        assert_released_once(&engine);
    }
}

#[tokio::test]
async fn test_render_failure_releases_once() {
    let engine = StubEngine::new().failing_at(StubStep::Print);
    let err = print(&sessions(&engine, Duration::from_secs(5)), "<p>x</p>")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RenderError(_)));
    assert!(err.to_string().contains("Print"));
    assert_released_once(&engine);
}

#[tokio::test]
async fn test_screenshot_failure_releases_once() {
    for step in [StubStep::SetViewport, StubStep::Capture] {
        let engine = StubEngine::new().failing_at(step);
        let config = ScreenshotConfiguration::default();
        let err = sessions(&engine, Duration::from_secs(5))
            .with_session(|session| {
                Box::pin(async move {
                    load_html(session, "<p>x</p>").await?;
                    render_screenshot(session, &config).await
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RenderError(_)), "{:?} gave {:?}", step, err);
        assert_released_once(&engine);
    }
}

#[tokio::test]
async fn test_deadline_aborts_hung_render_and_releases_once() {
    let engine = StubEngine::new().hanging_at(StubStep::Print);
    let started = Instant::now();
    let err = print(&sessions(&engine, Duration::from_millis(150)), "<p>slow</p>")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { ms: 150, step: "print_to_pdf" }));
    assert_eq!(err.phase(), Phase::Rendering);
    assert_eq!(err.to_string(), "Operation timed out after 150ms during print_to_pdf");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_released_once(&engine);
}

#[tokio::test]
async fn test_deadline_covers_hung_injection() {
    let engine = StubEngine::new().hanging_at(StubStep::SetContent);
    let err = print(&sessions(&engine, Duration::from_millis(100)), "<p>slow</p>")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { step: "set_document_content", .. }));
    assert_eq!(err.phase(), Phase::Injection);
    assert!(err.to_string().ends_with("during set_document_content"));
    assert_released_once(&engine);
}

#[tokio::test]
async fn test_release_failure_does_not_mask_result() {
    let engine = StubEngine::new().failing_at(StubStep::Close);
    let pdf = print(&sessions(&engine, Duration::from_secs(5)), "<p>kept</p>")
        .await
        .unwrap();

    assert!(pdf.starts_with(b"%PDF-"));
    assert_released_once(&engine);
}

#[tokio::test]
async fn test_panicking_body_still_releases() {
    let engine = StubEngine::new();
    let manager = sessions(&engine, Duration::from_secs(5));

    let err = manager
        .with_session(|session| {
            Box::pin(async move {
                session.navigate_blank().await?;
                if session.id() > 0 {
                    panic!("renderer bug");
                }
                Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Other(_)));
    assert_released_once(&engine);
}

#[tokio::test]
async fn test_slow_session_creation_times_out_and_late_session_is_closed() {
    let engine = StubEngine::new().with_open_delay(Duration::from_millis(300));
    let manager = sessions(&engine, Duration::from_millis(50));

    let err = manager
        .with_session(|_| Box::pin(async { Ok(()) }))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { ms: 50, step: "open" }));
    assert_eq!(err.phase(), Phase::Session);

    let waited = Instant::now();
    while engine.closed() == 0 && waited.elapsed() < Duration::from_secs(3) {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(engine.opened(), 1);
    assert_released_once(&engine);
}

#[tokio::test]
async fn test_sessions_are_never_shared() {
    let engine = StubEngine::new();
    let manager = sessions(&engine, Duration::from_secs(5));

    for i in 0..3 {
        print(&manager, &format!("<p>{}</p>", i)).await.unwrap();
    }

    assert_eq!(engine.opened(), 3);
    assert_eq!(engine.steps().len(), 3);
    assert_released_once(&engine);
}
