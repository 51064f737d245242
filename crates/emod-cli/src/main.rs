use std::process::ExitCode;

use clap::Parser;
use emod_cli::cli::{Cli, Commands};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }

    let result = match &cli.command {
        Commands::Solve(args) => commands::solve::handle(args).map(|summary| {
            if summary.status.is_optimal() {
                info!("solve command successful");
                ExitCode::SUCCESS
            } else {
                error!(status = %summary.status, "solve finished without an optimum");
                ExitCode::from(2)
            }
        }),
        Commands::Flags { scenario, format } => {
            commands::flags::handle(scenario, *format).map(|()| ExitCode::SUCCESS)
        }
        Commands::Inspect { scenario, format } => {
            commands::inspect::handle(scenario, *format).map(|()| ExitCode::SUCCESS)
        }
        Commands::Completions { shell, out } => {
            commands::completions::handle(*shell, out.as_deref()).map(|()| ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("command failed: {:?}", err);
            ExitCode::FAILURE
        }
    }
}
