// node/src/main.rs
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use node::{Gateway, GateConfig};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "eth-rpc-gate")]
#[command(about = "Ethereum JSON-RPC gateway for Kaon nodes", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Start(StartArgs),

    /// Write a default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "./eth-rpc-gate.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct StartArgs {
    /// Configuration file path, defaults are used when it doesn't exist
    #[arg(short, long, default_value = "./eth-rpc-gate.toml")]
    config: PathBuf,

    /// URL of the kaond RPC service
    #[arg(long)]
    kaon_rpc: Option<String>,

    /// auto, main, test or regtest
    #[arg(long)]
    network: Option<String>,

    /// Network interface to bind to
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Port to serve on
    #[arg(short, long)]
    port: Option<u16>,

    /// File with one WIF private key per line
    #[arg(long)]
    accounts: Option<PathBuf>,

    /// [regtest] address to mine blocks to after sending transactions
    #[arg(long)]
    generate_to_address: Option<String>,

    /// Blocks before a stake output can be spent
    #[arg(long)]
    mature_block_height: Option<u64>,

    /// Minimum request success rate for the health checks, in percent
    #[arg(long)]
    health_check_percent: Option<u32>,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// [Insecure] developer mode, logs every request and response
    #[arg(long)]
    dev: bool,

    /// Process RPC requests one at a time
    #[arg(long)]
    single_threaded: bool,

    /// Skip block transactions that can't be fetched instead of failing
    #[arg(long)]
    ignore_transactions: bool,

    /// Hide kaond request and response logs
    #[arg(long)]
    hide_kaond_logs: bool,
}

impl StartArgs {
    /// Flags win over the file and the environment
    fn apply(self, config: &mut GateConfig) {
        if let Some(url) = self.kaon_rpc {
            config.kaon_rpc = url;
        }
        if let Some(network) = self.network {
            config.network = network;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(accounts) = self.accounts {
            config.accounts_file = Some(accounts);
        }
        if let Some(address) = self.generate_to_address {
            config.generate_to_address = Some(address);
        }
        if let Some(height) = self.mature_block_height {
            config.mature_block_height = height;
        }
        if let Some(percent) = self.health_check_percent {
            config.health_check_percent = percent;
        }
        if let Some(log_file) = self.log_file {
            config.log_file = Some(log_file);
        }
        config.dev |= self.dev;
        config.single_threaded |= self.single_threaded;
        config.ignore_unknown_transactions |= self.ignore_transactions;
        config.hide_kaond_logs |= self.hide_kaond_logs;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => {
            let config_path = args.config.clone();
            let found = config_path.exists();
            let mut config = GateConfig::load(&config_path)?;
            config.apply_env()?;
            args.apply(&mut config);

            init_logging(cli.debug || config.dev, config.log_file.as_deref())?;
            if found {
                tracing::info!("Loaded configuration from {}", config_path.display());
            } else {
                tracing::info!("No config file at {}, using defaults", config_path.display());
            }

            start_gateway(config).await?;
        }
        Commands::Init { output, force } => {
            init_logging(cli.debug, None)?;
            init_config(&output, force)?;
        }
    }

    Ok(())
}

fn init_logging(debug: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let log_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "eth_rpc_gate={level},node={level},rpc={level},transformer={level},kaon_client={level},hyper=warn",
            level = log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("couldn't open log file {}", path.display()))?;
            registry
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
    Ok(())
}

async fn start_gateway(config: GateConfig) -> anyhow::Result<()> {
    let gateway = std::sync::Arc::new(Gateway::new(config)?);

    let shutdown = gateway.shutdown_token();
    let signal = gateway.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => {
                        tracing::info!("Received shutdown signal");
                        signal.stop();
                    }
                    Err(e) => tracing::error!(error = %e, "Couldn't listen for shutdown signal"),
                }
            }
            _ = shutdown.cancelled() => {}
        }
    });

    let result = gateway.run().await;
    // Stop subscriptions and retries even when the server failed on its own
    gateway.stop();
    result?;

    tracing::info!("Gateway stopped gracefully");
    Ok(())
}

fn init_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists, pass --force to overwrite", output.display());
    }
    GateConfig::default().to_file(output)?;

    tracing::info!("Default configuration written to {}", output.display());
    tracing::info!("Edit kaon_rpc in {} to point at your node", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "eth-rpc-gate",
            "start",
            "--network",
            "regtest",
            "--port",
            "8545",
            "--dev",
        ])
        .unwrap();
        let Commands::Start(args) = cli.command else {
            panic!("expected start");
        };

        let mut config = GateConfig {
            network: "main".into(),
            single_threaded: true,
            ..Default::default()
        };
        args.apply(&mut config);
        assert_eq!(config.network, "regtest");
        assert_eq!(config.port, 8545);
        assert!(config.dev);
        assert!(config.single_threaded);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let path = std::env::temp_dir().join(format!("eth-rpc-gate-init-{}.toml", std::process::id()));
        init_config(&path, false).unwrap();
        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();

        let written = GateConfig::from_file(&path).unwrap();
        assert_eq!(written, GateConfig::default());
        std::fs::remove_file(&path).unwrap();
    }
}
