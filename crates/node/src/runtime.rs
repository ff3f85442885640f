// node/src/runtime.rs
use crate::config::{load_accounts, GateConfig};
use anyhow::Context;
use kaon_client::{HttpTransport, KaonClient, Transport};
use rpc::{Analytics, HealthChecker, RecordingTransport, RpcConfig, RpcServer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use transformer::{default_transformer, Agent};

/// Everything behind one listening gateway
pub struct Gateway {
    config: GateConfig,
    client: KaonClient,
    server: Arc<RpcServer>,
    shutdown: CancellationToken,
}

impl Gateway {
    pub fn new(config: GateConfig) -> anyhow::Result<Self> {
        config.validate()?;
        tracing::info!("Initializing gateway components");

        let shutdown = CancellationToken::new();
        let accounts = load_accounts(config.accounts_file.as_deref())?;

        let kaon_analytics = Arc::new(Analytics::default());
        let eth_analytics = Arc::new(Analytics::default());

        let http = HttpTransport::new(&config.kaon_rpc, config.hide_kaond_logs)
            .context("couldn't create kaond transport")?;
        let transport: Arc<dyn Transport> = Arc::new(RecordingTransport::new(Arc::new(http), kaon_analytics.clone()));

        let client = KaonClient::new(transport, config.client_options(accounts), shutdown.clone());
        let agent = Agent::new(client.clone(), shutdown.clone());
        let transformer = default_transformer(&client, &agent)
            .map_err(|e| anyhow::anyhow!(e))
            .context("couldn't register proxies")?;
        tracing::info!("Registered {} methods", transformer.len());

        let health = Arc::new(HealthChecker::new(
            client.clone(),
            kaon_analytics,
            eth_analytics.clone(),
            config.health_check_percent,
        ));

        let rpc_config = RpcConfig {
            listen_addr: config.listen_addr(),
            cors_origins: config.cors_origins.clone(),
            single_threaded: config.single_threaded,
            debug: config.dev,
        };
        let server = Arc::new(RpcServer::new(
            rpc_config,
            transformer,
            agent,
            health,
            eth_analytics,
            shutdown.clone(),
        ));

        Ok(Self {
            config,
            client,
            server,
            shutdown,
        })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve until `stop` is called or the server fails
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(network = %self.config.network, "Starting eth-rpc-gate");
        if self.config.dev {
            tracing::warn!("Developer mode enabled, requests and responses are logged");
        }

        // Detection runs in the background; requests wait on it until it lands
        self.client.detector().ensure_started();

        self.server.clone().start().await?;
        Ok(())
    }

    pub fn stop(&self) {
        tracing::info!("Shutting down");
        self.shutdown.cancel();
    }
}
