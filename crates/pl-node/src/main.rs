use clap::Parser;
use pl_blockchain::DEFAULT_DIFFICULTY;
use pl_node::{NodeCommand, NodeConfig, NodeEvent, NodeRuntime};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Peer ledger node with an interactive console.
#[derive(Parser, Debug)]
#[command(
    name = "pl-node",
    version,
    about = "Peer ledger node",
    long_about = "Connects to a relay, syncs the longest chain and mines blocks. \
                  Type `tx <sender> <recipient> <amount>`, `mine`, `status`, \
                  `chain`, `pending` or `quit` on stdin."
)]
struct Cli {
    /// Relay address as host:port.
    #[arg(short, long, default_value = "127.0.0.1:3000", env = "PL_RELAY_ADDR")]
    relay: String,

    /// Leading zero bits required of block hashes.
    #[arg(short, long, default_value_t = DEFAULT_DIFFICULTY, env = "PL_DIFFICULTY")]
    difficulty: u32,

    /// Suppress log output to stderr.
    #[arg(short, long, default_value_t = false, env = "PL_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::from_default_env().add_directive("pl_node=info".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let config = NodeConfig {
        relay_addr: cli.relay,
        difficulty: cli.difficulty,
        quiet: cli.quiet,
    };

    info!(relay = %config.relay_addr, difficulty = config.difficulty, "Starting node");

    let (mut runtime, mut events) = NodeRuntime::start(config).await?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(event);
        }
    });

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<NodeCommand>() {
                Ok(cmd) => {
                    let quit = cmd == NodeCommand::Shutdown;
                    if cmd_tx.send(cmd).is_err() || quit {
                        break;
                    }
                }
                Err(e) => eprintln!("{e}"),
            }
        }
    });

    tokio::select! {
        _ = runtime.run(cmd_rx) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    Ok(())
}

/// Console rendering.  Status and listings go to stdout; everything else is
/// already covered by the log.
fn print_event(event: NodeEvent) {
    match event {
        NodeEvent::Status(status) => println!("[{}] {}", status.chain_len, status.label()),
        NodeEvent::Chain(blocks) => {
            for block in blocks {
                println!(
                    "#{} {} prev={} nonce={} txs={} ts={}",
                    block.index,
                    block.short_hash(),
                    block.previous_hash.get(..12).unwrap_or(&block.previous_hash),
                    block.nonce,
                    block.transactions.len(),
                    block.timestamp,
                );
                for tx in &block.transactions {
                    println!("    {tx}");
                }
            }
        }
        NodeEvent::Pending(txs) if txs.is_empty() => println!("No pending transactions."),
        NodeEvent::Pending(txs) => {
            for tx in txs {
                println!("{tx}");
            }
        }
        NodeEvent::BlockRejected { index, reason } => warn!("Block #{index} rejected: {reason}"),
        other => info!("NodeEvent: {other:?}"),
    }
}
