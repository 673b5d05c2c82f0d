use std::{env, process::exit};

use delivery_window::{
    cli::{CliArgs, CliError, USAGE},
    event::{load_events, EventError},
    report::{write_history, ReportError},
    window::{AggregateError, SlidingWindowAggregator},
};
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{
    fmt::format::FmtSpan, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Cli(#[from] CliError),
    #[error(transparent)]
    Events(#[from] EventError),
    #[error("Event #{index} could not be added: {source}")]
    Aggregate {
        index: usize,
        source: AggregateError,
    },
    #[error(transparent)]
    Window(#[from] AggregateError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Reads the event log, runs it through the window and writes the history of
/// averages. Nothing is written unless every event was accepted.
#[tracing::instrument(level = "info", skip_all, fields(input = %args.input_file.display(), window_size = args.window_size))]
fn process(args: &CliArgs) -> Result<usize, AppError> {
    args.ensure_input_exists()?;
    let mut window = SlidingWindowAggregator::new(args.window_size)?;

    let events = load_events(&args.input_file)?;
    info!("Processing {} events", events.len());
    for (index, event) in events.iter().enumerate() {
        window
            .add_event(event)
            .map_err(|source| AppError::Aggregate { index, source })?;
    }
    debug!(
        "{} events left in the window at the end of the log",
        window.running_event_count()
    );

    let history = window.finalize();
    write_history(&args.output_file, &history)?;
    Ok(history.len())
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match CliArgs::parse_from(env::args().skip(1)) {
        Ok(args) => args,
        Err(CliError::Help) => {
            println!("{USAGE}");
            return;
        }
        Err(err) => {
            eprintln!("{err}\n{USAGE}");
            exit(2);
        }
    };

    if let Err(err) = process(&args) {
        error!("{}", err);
        if let AppError::Cli(cli_err) = &err {
            if cli_err.is_usage_error() {
                eprintln!("{USAGE}");
            }
        }
        exit(1);
    }
}
