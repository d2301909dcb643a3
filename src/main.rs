mod auth;
mod cli;
mod config;
mod error;
mod output;
mod providers;
mod report;

use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting jenlens - Jenkins build inspection tool");

    if let Err(err) = cli.execute().await {
        eprintln!("Error: {err:#}");
        let code = err
            .downcast_ref::<error::JenLensError>()
            .map_or(1, error::JenLensError::exit_code);
        std::process::exit(code);
    }
}
