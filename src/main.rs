mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use niv_config::{Config, ConfigLoader};
use niv_frontend::{TerminalDialogs, event_message, status_line};
use niv_io::{IoCoordinator, SaveStatus};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cli::CliArgs;

/// How long to block for a worker before refreshing progress.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_filter(filter);
    tracing_subscriber::registry().with(console).init();
}

fn load_config(args: &CliArgs) -> Result<Config> {
    match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("cannot load configuration {}", path.display())),
        None => {
            let mut loader = ConfigLoader::new();
            loader.load().context("cannot load configuration")?;
            Ok(loader.get().clone())
        }
    }
}

/// Pump completions until no worker is left, echoing events.
fn drain(io: &mut IoCoordinator<TerminalDialogs>) {
    while !io.buffers().in_flight().is_idle() {
        if !io.wait_for_completion(POLL_INTERVAL) {
            io.report_progress();
        }
        report_events(io);
    }
    if let Err(err) = io.dialogs_mut().clear_progress() {
        tracing::debug!(error = %err, "cannot clear progress line");
    }
}

fn report_events(io: &mut IoCoordinator<TerminalDialogs>) {
    for event in io.take_events() {
        tracing::debug!(?event, "io event");
        if let Some((message, kind)) = event_message(&event) {
            if let Err(err) = io.dialogs_mut().show_message(&message, kind) {
                tracing::warn!(error = %err, "cannot write to terminal");
            }
        }
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing();

    let config = load_config(&args)?;
    let mut dialogs = TerminalDialogs::new();
    if let Some(choice) = args.assumed_choice() {
        dialogs = dialogs.assume(choice);
    }
    let mut io = IoCoordinator::new(config.io, dialogs)?;

    for (position, path) in args.paths.iter().enumerate() {
        if let Err(err) = io.open(path, args.open_flags(position)) {
            tracing::warn!(path = %path.display(), error = %err, "open failed");
            eprintln!("niv: {}: {err}", path.display());
        }
        report_events(&mut io);
    }
    drain(&mut io);

    for buffer in io.buffers().iter() {
        println!("{}", status_line(buffer));
    }

    if let Some(output) = &args.output {
        let index = io.current_index();
        let status = io
            .save_as(index, output, args.output_encoding)
            .with_context(|| format!("cannot write {}", output.display()))?;
        if status == SaveStatus::Started {
            drain(&mut io);
        }
        report_events(&mut io);
    }

    if !io.prepare_exit()? {
        tracing::info!("exit cancelled");
    }
    report_events(&mut io);
    Ok(())
}
