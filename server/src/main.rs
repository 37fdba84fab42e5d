use clap::Parser;
use log::info;
use server::network::Server;

/// Multi-player mancala server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
}

/// Parses command-line arguments, binds the listener and plays one game.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let address = format!("0.0.0.0:{}", args.port);
    let server = Server::bind(&address).await?;

    let scores = server.run().await?;
    info!("Game finished with {} player(s) at the table", scores.len());

    Ok(())
}
