//! Service configuration, read once at startup from flags and environment

use crate::{Error, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Which engine backend serves sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineKind {
    /// Chrome over the DevTools protocol
    Chrome,
    /// Deterministic in-memory engine for development
    Stub,
}

/// Which PDF/A converter post-processes PDFs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConverterKind {
    Passthrough,
    Ghostscript,
}

/// HTML to PDF/PNG rendering service
#[derive(Debug, Clone, Parser)]
#[command(name = "rfprint", version, about)]
pub struct ServiceConfig {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Engine backend
    #[arg(long, env = "RFPRINT_ENGINE", value_enum, default_value_t = EngineKind::Chrome)]
    pub engine: EngineKind,

    /// DevTools WebSocket URL of a running Chrome; a local Chrome is launched per session when unset
    #[arg(long, env = "CHROME_WS_URL")]
    pub chrome_ws_url: Option<String>,

    /// Chrome binary used in launch mode
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Launch Chrome without its sandbox
    #[arg(long)]
    pub no_sandbox: bool,

    /// Per-session deadline in seconds
    #[arg(long, env = "RENDER_TIMEOUT_SECS", default_value_t = 30)]
    pub render_timeout_secs: u64,

    /// Maximum number of concurrently open sessions; unlimited when unset
    #[arg(long, env = "RFPRINT_MAX_SESSIONS")]
    pub max_sessions: Option<usize>,

    /// PDF/A converter
    #[arg(long, env = "RFPRINT_PDFA_CONVERTER", value_enum, default_value_t = ConverterKind::Passthrough)]
    pub pdfa_converter: ConverterKind,

    /// Ghostscript binary used by the ghostscript converter
    #[arg(long, env = "GS_PATH", default_value = "gs")]
    pub gs_path: String,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.render_timeout_secs == 0 {
            return Err(Error::ConfigError("render timeout must be at least one second".into()));
        }
        if self.max_sessions == Some(0) {
            return Err(Error::ConfigError("max sessions must be positive when set".into()));
        }
        if let Some(url) = &self.chrome_ws_url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(Error::ConfigError(format!(
                    "chrome WebSocket URL must start with ws:// or wss://, got {}",
                    url
                )));
            }
        }
        Ok(())
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
