use anyhow::{Context, Result};
use rayshell::io_adapters::{LineSource, StreamSource, TerminalSource};
use rayshell::signals::InterruptFlag;
use rayshell::{Args, ExitReason, Shell, ShellConfig};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Quiet by default; RUST_LOG=debug shows dispatch decisions and child statuses.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Args = argh::from_env();
    let config = match ShellConfig::from_args(args) {
        Ok(config) => config,
        Err(err) => {
            println!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(reason) => {
            tracing::debug!(?reason, "shell finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &ShellConfig) -> Result<ExitReason> {
    let interrupt = InterruptFlag::install().context("failed to install signal handlers")?;
    let mut shell = Shell::new(config, interrupt);

    let mut source: Box<dyn LineSource> = if config.interactive {
        Box::new(TerminalSource::new()?)
    } else {
        Box::new(StreamSource::stdin())
    };
    shell.run(source.as_mut())
}
