use clap::Parser;
use log::{error, info, warn};
use rfprint::config::{ConverterKind, EngineKind, ServiceConfig};
use rfprint::{
    GhostscriptConverter, PassthroughConverter, PdfaConverter, RenderEngine, RenderService,
    SessionManager, StubEngine,
};
use std::sync::Arc;

#[cfg(feature = "cdp")]
fn chrome_engine(config: &ServiceConfig) -> anyhow::Result<Arc<dyn RenderEngine>> {
    use rfprint::{ChromeEngine, EngineSource};

    let source = match &config.chrome_ws_url {
        Some(ws_url) => EngineSource::Connect {
            ws_url: ws_url.clone(),
        },
        None => EngineSource::Launch {
            chrome_path: config.chrome_path.clone(),
            sandbox: !config.no_sandbox,
        },
    };
    let engine = ChromeEngine::new(source, config.render_timeout());

    // Only a shared, already-running engine is worth probing up front.
    if config.chrome_ws_url.is_some() {
        match engine.health_check() {
            Ok(product) => info!("connected to {}", product),
            Err(e) => warn!("engine not reachable yet: {}", e),
        }
    }
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "cdp"))]
fn chrome_engine(_config: &ServiceConfig) -> anyhow::Result<Arc<dyn RenderEngine>> {
    anyhow::bail!("rfprint was built without the `cdp` feature; use --engine stub")
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    config.validate()?;

    let engine: Arc<dyn RenderEngine> = match config.engine {
        EngineKind::Chrome => chrome_engine(&config)?,
        EngineKind::Stub => Arc::new(StubEngine::new()),
    };

    let mut sessions = SessionManager::new(engine, config.render_timeout());
    if let Some(max_sessions) = config.max_sessions {
        sessions = sessions.with_max_sessions(max_sessions);
    }

    let converter: Arc<dyn PdfaConverter> = match config.pdfa_converter {
        ConverterKind::Passthrough => Arc::new(PassthroughConverter),
        ConverterKind::Ghostscript => Arc::new(GhostscriptConverter::new(config.gs_path.clone())),
    };

    let service = RenderService::new(sessions, converter);
    info!(
        "starting rfprint on port {} (engine: {}, pdfa: {}, deadline: {:?})",
        config.port,
        service.sessions().engine_name(),
        service.converter_name(),
        service.sessions().deadline()
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
    rfprint::server::serve(listener, service).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServiceConfig::parse();
    if let Err(e) = run(config).await {
        error!("rfprint failed: {}", e);
        std::process::exit(1);
    }
}
