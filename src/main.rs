use clap::Parser;
use doc_guardian::{
    Action, Cli, ShutdownFlag,
    handlers::{handle_check, handle_heal, handle_list, handle_rollback},
};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let shutdown = ShutdownFlag::new();
    if let Err(e) = shutdown.install_signal_handler() {
        warn!(error = %e, "could not install signal handler");
    }

    match cli.action() {
        Action::List => handle_list(&cli),
        Action::Rollback => handle_rollback(&cli),
        Action::Check => handle_check(&cli, &shutdown),
        Action::Heal => handle_heal(&cli, &shutdown),
    }
}

/// Logs go to stderr so report output on stdout stays machine-readable.
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
