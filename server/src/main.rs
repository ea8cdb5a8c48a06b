use clap::Parser;
use log::info;
use server::{LevelConfig, Server, ServerConfig};
use shared::WINDOW_SIZE;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multiplayer platformer server")]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 picks a free port)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Platform updates per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Maximum number of connected players
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Number of static platforms
    #[arg(short = 's', long, default_value = "3")]
    static_platforms: usize,

    /// Number of moving platforms
    #[arg(short = 'n', long, default_value = "6")]
    moving_platforms: usize,

    /// Seed for the level generator
    #[arg(long)]
    seed: Option<u64>,

    /// Write the bound port number to this file
    #[arg(long)]
    port_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        tick_rate: args.tick_rate,
        max_clients: args.max_clients,
        port_file: args.port_file,
        level: LevelConfig {
            window_size: WINDOW_SIZE,
            static_platforms: args.static_platforms,
            moving_platforms: args.moving_platforms,
            seed: args.seed,
        },
    };

    info!(
        "Starting server on {} at {} Hz",
        config.bind_address(),
        config.tick_rate
    );

    let server = Server::bind(config.clone()).await?;
    if let Some(path) = &config.port_file {
        server.publish_port(path)?;
    }

    server.run().await?;
    Ok(())
}
