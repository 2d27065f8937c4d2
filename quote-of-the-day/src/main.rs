use std::{io::IsTerminal, process::ExitCode};

use clap::{CommandFactory, Parser};
use tracing::error;

use quote_of_the_day::{
    cli::Cli,
    server::Server,
    signal::{QuitFlag, install_signal_handlers},
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_usage() {
    eprintln!("{}", Cli::command().render_usage());
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let quit = QuitFlag::new();
    if let Err(err) = install_signal_handlers(quit.clone()) {
        error!(error = %err, "failed to install signal handlers");
        return ExitCode::FAILURE;
    }

    let mut server = Server::new(cli.into_config(), quit);
    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            print_usage();
            ExitCode::FAILURE
        }
    }
}
