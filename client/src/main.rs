use clap::Parser;
use client::network::Client;
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Read the server port from this file and connect to localhost
    #[arg(long)]
    port_file: Option<PathBuf>,

    /// Simulation frames per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Press keys at random instead of waiting for input
    #[arg(short, long)]
    autopilot: bool,

    /// Seed for the autopilot
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many frames
    #[arg(long)]
    ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let address = match &args.port_file {
        Some(path) => {
            let port: u16 = std::fs::read_to_string(path)?.trim().parse()?;
            format!("127.0.0.1:{}", port)
        }
        None => args.server.clone(),
    };

    info!("Starting client...");
    info!("Connecting to: {}", address);

    let mut client = Client::connect(&address).await?;
    if args.autopilot {
        client.enable_autopilot(args.seed);
    }

    client.run(args.tick_rate, args.ticks).await?;

    Ok(())
}
