use std::time::Duration;

use clap::Parser;
use pl_quorum::QuorumPolicy;
use pl_relay::{Relay, RelayConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Peer ledger relay daemon.
#[derive(Parser, Debug)]
#[command(
    name = "pl-relay",
    version,
    about = "Peer ledger relay hub",
    long_about = "Accepts node connections, forwards block requests and \
                  announcements, and answers longest-chain requests by polling \
                  every connected node."
)]
struct Cli {
    /// TCP port to listen on.
    #[arg(short, long, default_value_t = 3000, env = "PL_RELAY_PORT")]
    port: u16,

    /// Give up waiting for a longest-chain quorum after this many
    /// milliseconds and answer with the replies received so far.  Omit to
    /// wait for every peer indefinitely.
    #[arg(long, env = "PL_QUORUM_TIMEOUT_MS")]
    quorum_timeout_ms: Option<u64>,

    /// Suppress log output to stderr (run silently).
    #[arg(short, long, default_value_t = false, env = "PL_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::from_default_env().add_directive("pl_relay=info".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let config = RelayConfig {
        port: cli.port,
        policy: QuorumPolicy::from_timeout(cli.quorum_timeout_ms.map(Duration::from_millis)),
        quiet: cli.quiet,
        ..RelayConfig::default()
    };

    info!(port = config.port, policy = ?config.policy, "Starting peer ledger relay");

    let (mut relay, mut events) = Relay::bind(config).await?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("RelayEvent: {event:?}");
        }
    });

    tokio::select! {
        _ = relay.run() => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
