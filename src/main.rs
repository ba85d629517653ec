use std::env;
use std::io;
use std::process::ExitCode;

use resources_flow::csv::{read_catalog, read_commands, write_balances};
use resources_flow::{FlowConfig, Session};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: resources-flow <packs.csv> <attempts.csv> [flow.yaml]";

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let (Some(packs_path), Some(attempts_path)) = (args.next(), args.next()) else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    for path in [&packs_path, &attempts_path] {
        if !path.ends_with(".csv") {
            warn!(path, "input file seems to not be a csv file");
        }
    }

    let config = match args.next() {
        Some(path) => match FlowConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => FlowConfig::default(),
    };

    let catalog = match read_catalog(&packs_path) {
        Ok((catalog, errors)) => {
            for e in errors {
                warn!("{e}");
            }
            catalog
        }
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let commands = match read_commands(attempts_path) {
        Ok(commands) => commands,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut session = Session::new(catalog, config);
    let (command_sender, command_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in commands {
            match result {
                Ok(command) => {
                    if command_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    session.run(ReceiverStream::new(command_receiver)).await;

    if let Err(e) = write_balances(io::stdout().lock(), session.wallet().balances()) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
