//! Binary entry point: wires the CLI, `.fuzzer` file, mutation engine,
//! monitor, and session driver together and maps setup failures onto
//! the distinguished exit codes named in §6.
//!
//! Setup failures are wrapped in `anyhow` for the log line (so the
//! printed chain includes the human-facing context) while the match
//! that picks the exit code still dispatches on the concrete typed
//! error from `replayfuzz::error`.

use replayfuzz::cli::{exit_code, Cli};
use replayfuzz::driver::{DriverConfig, SessionDriver};
use replayfuzz::logger::{self, DumpDir, Logger};
use replayfuzz::monitor::{Monitor, MonitorHandle, PingMonitor};
use replayfuzz::mutation::MutationEngine;
use replayfuzz::processor::{IdentityProcessor, SwallowingExceptionProcessor};
use replayfuzz::{fuzzerfile, StopReason};

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

fn setup_failure(err: anyhow::Error, code: i32) -> ExitCode {
    error!("{err:#}");
    ExitCode::from(code as u8)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let run_bounds = match cli.resolve_run_bounds().context("invalid CLI arguments") {
        Ok(bounds) => bounds,
        Err(err) => return setup_failure(err, exit_code::INVALID_RANGE),
    };

    let fuzzer_data = match fuzzerfile::read_from_file(&cli.prepped_fuzz).context("could not load fuzzer file") {
        Ok(data) => data,
        Err(err) => return setup_failure(err, exit_code::IO_SETUP_FAILURE),
    };

    let mutation_engine = MutationEngine::new(cli.mutator.clone());
    if !mutation_engine.ensure_available() {
        error!(mutator = %cli.mutator.display(), "mutator binary not found");
        return ExitCode::from(exit_code::MUTATOR_NOT_FOUND as u8);
    }

    let (logger, dump_dir) = match build_log_sinks(&cli) {
        Ok(sinks) => sinks,
        Err(err) => return setup_failure(err, exit_code::IO_SETUP_FAILURE),
    };

    let monitor: Box<dyn Monitor> = Box::new(PingMonitor::new(
        cli.target_host.clone(),
        fuzzer_data.target_port,
        Duration::from_millis(500),
    ));
    let monitor_handle = MonitorHandle::spawn(monitor);

    let driver_config = DriverConfig {
        target_host: cli.target_host.clone(),
        sleep_time: Duration::from_secs_f64(cli.sleep_time),
        min_run: run_bounds.min_run,
        max_run: run_bounds.max_run,
        loop_seeds: run_bounds.loop_seeds,
        dump_raw: cli.dump_raw,
        log_all: cli.log_all,
    };

    let mut driver = SessionDriver::new(
        fuzzer_data,
        driver_config,
        mutation_engine,
        monitor_handle,
        Box::new(IdentityProcessor),
        Box::new(SwallowingExceptionProcessor),
        logger,
        dump_dir,
    );

    info!(target_host = %cli.target_host, "starting fuzz session");
    match driver.fuzz() {
        StopReason::MaxRunReached => info!("reached configured run limit"),
        StopReason::Halted => info!("halted"),
        StopReason::DumpRawComplete => info!("dump-raw run complete"),
    }

    ExitCode::from(exit_code::OK as u8)
}

fn build_log_sinks(cli: &Cli) -> anyhow::Result<(Option<Logger>, Option<DumpDir>)> {
    if cli.dump_raw.is_some() && cli.quiet {
        let dir = DumpDir::quiet().context("creating dumpraw directory")?;
        return Ok((None, Some(dir)));
    }
    if cli.quiet {
        return Ok((None, None));
    }

    let logger = Logger::new(&cli.prepped_fuzz, &logger::timestamp_now()).context("creating log directory")?;
    let dump_dir = cli.dump_raw.is_some().then(|| DumpDir::shared_with(&logger));
    Ok((Some(logger), dump_dir))
}
