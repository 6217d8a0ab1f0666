use clap::Parser;
use entregas::cli::{self, Cli};
use entregas::{config, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&config.logging);

    if let Err(e) = cli::run(cli, &config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
