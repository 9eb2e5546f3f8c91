use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fairplay::{
    config::BotConfig,
    entity::UserId,
    queue::{Queue, QueueItem, QueueKind},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fairplay", version, about = "Fair playback queues and now-playing status")]
struct Args {
    /// TOML configuration file. Defaults to ./fairplay.toml when present.
    #[arg(long, global = true, env = "FAIRPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved configuration.
    Config,
    /// Enqueue one item per requester, in order, and print the resulting queue.
    Queue {
        /// Insertion policy; defaults to the configured `queue_type`.
        #[arg(long)]
        kind: Option<QueueKind>,

        #[arg(required = true)]
        requesters: Vec<UserId>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = BotConfig::load(args.config.as_deref()).context("loading configuration")?;
    init_tracing(&config, args.json_logs);

    match args.command {
        Command::Config => {
            print!("{}", config.to_toml().context("rendering configuration")?);
        }
        Command::Queue { kind, requesters } => {
            let kind = kind.unwrap_or(config.queue_type);
            let mut queue = Queue::new(kind);
            for (n, requester) in requesters.into_iter().enumerate() {
                let index = queue.add(QueueItem::new(requester, n + 1));
                tracing::debug!(%requester, index, "enqueued");
            }

            println!("{kind} queue:");
            for (index, item) in queue.iter().enumerate() {
                println!("{:>3}. request #{} from {}", index + 1, item.payload, item.requester);
            }
        }
    }
    Ok(())
}

fn init_tracing(config: &BotConfig, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fairplay={}", config.log_level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
