use clap::Parser;
use log::{info, warn};
use server::config::SimConfig;
use server::game::GameState;
use server::network::{BoxError, Server, ServerOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "10")]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// World seed; random when omitted
    #[arg(short, long)]
    seed: Option<u64>,

    /// Warn when a tick takes longer than this many milliseconds
    #[arg(long, default_value = "50")]
    slow_tick_ms: u64,

    /// Resend full state every this many ticks (0 disables)
    #[arg(long, default_value = "50")]
    resync_ticks: u64,

    /// Map files, top floor first; the bundled maps are used when omitted
    #[arg(short, long)]
    levels: Vec<PathBuf>,

    /// JSON file overriding simulation tuning
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.tick_rate == 0 {
        return Err("tick rate must be at least 1".into());
    }

    let config = match &args.config {
        Some(path) => {
            info!("Loading simulation config from {}", path.display());
            SimConfig::load(path)?
        }
        None => SimConfig::default(),
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    let game = if args.levels.is_empty() {
        GameState::with_bundled_levels(config, seed)?
    } else {
        let maps = args
            .levels
            .iter()
            .map(std::fs::read_to_string)
            .collect::<Result<Vec<_>, _>>()?;
        GameState::new(&maps, config, seed)?
    };

    let options = ServerOptions {
        tick_duration: Duration::from_secs_f64(1.0 / args.tick_rate as f64),
        max_clients: args.max_clients,
        slow_tick: Duration::from_millis(args.slow_tick_ms),
        resync_ticks: args.resync_ticks,
    };
    if options.slow_tick > options.tick_duration {
        warn!("Slow tick threshold is longer than the tick itself");
    }

    info!(
        "Starting server at {} Hz with seed {} (max {} clients)",
        args.tick_rate, seed, args.max_clients
    );
    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, game, options).await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            shutdown.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}
