//! Roster - service registry command line

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use roster::observability::{init_metrics, init_tracing, TracingConfig};
use roster::{DescriptorInput, Registry, RegistryConfig};
use std::net::SocketAddr;
use tracing::info;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Lease-based service discovery over redis")]
struct Cli {
    /// Store host
    #[arg(long, global = true, env = "REGISTRY_HOST")]
    host: Option<String>,

    /// Store port
    #[arg(long, global = true, env = "REGISTRY_PORT")]
    port: Option<u16>,

    /// Key namespace
    #[arg(long, global = true, env = "REGISTRY_NAMESPACE")]
    namespace: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long, global = true, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an instance and hold the lease until interrupted
    Join {
        /// Service name
        name: String,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        protocol: Option<String>,
        /// Hostname to advertise instead of the local address
        #[arg(long)]
        hostname: Option<String>,
        /// Extra metadata, repeatable
        #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },
    /// Print every live instance as JSON
    List { name: Option<String> },
    /// Print one live instance chosen at random
    Lookup { name: Option<String> },
}

fn parse_meta(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(TracingConfig::from_env()).map_err(|e| anyhow!(e))?;
    if let Some(addr) = cli.metrics_addr {
        init_metrics(addr)
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("failed to serve metrics on {addr}"))?;
        info!(addr = %addr, "Metrics exporter listening");
    }

    let mut config = RegistryConfig::from_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }

    let registry = Registry::connect(config)
        .await
        .context("failed to open registry")?;

    match cli.command {
        Commands::Join {
            name,
            port,
            protocol,
            hostname,
            meta,
        } => {
            let mut input = DescriptorInput::new();
            input.port = port;
            input.protocol = protocol;
            input.hostname = hostname;
            for (key, value) in meta {
                input = input.meta(key, value);
            }
            hold(&registry, &name, input).await
        }
        Commands::List { name } => {
            let list = registry.list(name.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&list)?);
            Ok(())
        }
        Commands::Lookup { name } => match registry.lookup(name.as_deref()).await? {
            Some(found) => {
                println!("{}", serde_json::to_string_pretty(&found)?);
                Ok(())
            }
            None => Err(anyhow!(
                "no live instance of {}",
                name.as_deref().unwrap_or("any service")
            )),
        },
    }
}

async fn hold(registry: &Registry, name: &str, input: DescriptorInput) -> anyhow::Result<()> {
    let joined = registry
        .join(name, input)
        .await
        .with_context(|| format!("failed to join {name}"))?;
    info!(service = %name, url = %joined.url, "Holding lease, press Ctrl-C to leave");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    let released = registry.leave(name).await?;
    info!(service = %name, released = released, "Left registry");
    Ok(())
}
