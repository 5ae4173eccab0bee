use std::sync::Arc;

use axum::Router;
use sar_engine::{CaseEngine, EngineConfig};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::router::build_router;

/// HTTP front end over one [`CaseEngine`].
pub struct SarServer {
    config: ServerConfig,
    engine: Arc<CaseEngine>,
}

impl SarServer {
    /// Create a server, loading the engine configuration named in `config`.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let engine_config = match &config.engine_config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };
        Ok(Self::with_engine(config, Arc::new(CaseEngine::new(engine_config))))
    }

    pub fn with_engine(config: ServerConfig, engine: Arc<CaseEngine>) -> Self {
        Self { config, engine }
    }

    pub fn engine(&self) -> &Arc<CaseEngine> {
        &self.engine
    }

    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.engine))
    }

    /// Bind and serve until the process is stopped.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "SAR case server listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
