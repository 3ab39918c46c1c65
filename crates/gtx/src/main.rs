mod booking;
mod error;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use gtx_core::{DispatchMode, ExecutorConfig, ReversalFailurePolicy};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::booking::{Booking, Outcome};
use crate::error::{CliError, Result};
use crate::services::{Faults, Services, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Explicit flow handle on the calling thread
    Blocking,
    /// Task-scoped flow on a multi-threaded tokio runtime
    Reactive,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DispatchArg {
    Await,
    Detached,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Continue,
    Abort,
}

#[derive(Parser)]
#[command(name = "gtx")]
#[command(about = "Run a simulated booking through compensating transactions", long_about = None)]
struct Cli {
    /// Executor used to run the booking
    #[arg(long, value_enum, default_value_t = Mode::Blocking)]
    mode: Mode,

    /// Seats to book
    #[arg(long, default_value_t = 2)]
    seats: u32,

    /// Price of one seat in cents
    #[arg(long, default_value_t = 4_500)]
    price_cents: u64,

    /// Seats available before the booking
    #[arg(long, default_value_t = 10)]
    capacity: u32,

    /// Make the forward call of this step fail
    #[arg(long, value_enum)]
    fail_at: Option<Stage>,

    /// Make the reversal of this step fail
    #[arg(long, value_enum)]
    fail_reversal_of: Option<Stage>,

    /// How reversals are run in reactive mode (overrides the config file)
    #[arg(long, value_enum)]
    dispatch: Option<DispatchArg>,

    /// What to do when a reversal fails (overrides the config file)
    #[arg(long, value_enum)]
    on_reversal_failure: Option<PolicyArg>,

    /// How long a failed reactive booking waits for detached reversals
    #[arg(long, default_value_t = 1_000)]
    settle_timeout_ms: u64,

    /// TOML file with a [transactions] table
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let services = Arc::new(Services::new(
        cli.capacity,
        Faults {
            fail_at: cli.fail_at,
            fail_reversal_of: cli.fail_reversal_of,
        },
    ));
    let booking = Booking {
        seats: cli.seats,
        price_cents: cli.price_cents,
    };

    let outcome = match cli.mode {
        Mode::Blocking => booking::run_blocking(&services, booking, config),
        Mode::Reactive => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(CliError::Runtime)?;
            runtime.block_on(booking::run_reactive(
                &services,
                booking,
                config,
                Duration::from_millis(cli.settle_timeout_ms),
            ))
        }
    };

    report(outcome)
}

fn resolve_config(cli: &Cli) -> Result<ExecutorConfig> {
    let mut config = match &cli.config {
        Some(path) => ExecutorConfig::load(path)?,
        None => ExecutorConfig::default(),
    };
    if let Some(dispatch) = cli.dispatch {
        config = config.with_dispatch(match dispatch {
            DispatchArg::Await => DispatchMode::Await,
            DispatchArg::Detached => DispatchMode::Detached,
        });
    }
    if let Some(policy) = cli.on_reversal_failure {
        config = config.with_reversal_failure(match policy {
            PolicyArg::Continue => ReversalFailurePolicy::Continue,
            PolicyArg::Abort => ReversalFailurePolicy::Abort,
        });
    }
    Ok(config)
}

fn report(outcome: Outcome) -> Result<()> {
    if let Ok(ticket) = &outcome.ticket {
        println!("booked ticket #{ticket}");
    }
    println!("{}", outcome.snapshot);
    println!("{}", outcome.audit.summary());

    outcome.ticket.map(|_| ()).map_err(CliError::from)
}

fn print_error(error: &CliError) {
    eprintln!("error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("caused by: {cause}");
        source = std::error::Error::source(cause);
    }
}
