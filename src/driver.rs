//! The per-run state machine and outer iteration loop (§4.6).
//!
//! Reconciles [`MonitorEvent`]s with run progress, owns logging and
//! failure accounting, and decides termination. This crate owns its own
//! run loop rather than plugging into someone else's `fuzz_loop` as an
//! `Executor`, so the outer loop lives here instead of being driven by
//! an external harness.

use crate::connection::{self, Connection, ConnectionParams};
use crate::data::{FuzzerData, RunState};
use crate::error::{ControlSignal, RunError};
use crate::logger::{DumpDir, Logger};
use crate::monitor::{MonitorEvent, MonitorHandle};
use crate::mutation::MutationEngine;
use crate::processor::{ExceptionProcessor, HookContext, MessageProcessor};
use std::time::Duration;
use tracing::{info, warn};

/// Configuration the driver needs beyond what's already in
/// [`FuzzerData`]: everything sourced from the CLI (§6).
pub struct DriverConfig {
    pub target_host: String,
    pub sleep_time: Duration,
    pub min_run: i64,
    pub max_run: i64,
    pub loop_seeds: Option<Vec<i64>>,
    pub dump_raw: Option<i64>,
    pub log_all: bool,
}

/// Why the outer loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxRunReached,
    Halted,
    DumpRawComplete,
}

pub struct SessionDriver {
    fuzzer_data: FuzzerData,
    config: DriverConfig,
    mutation_engine: MutationEngine,
    monitor: MonitorHandle,
    message_processor: Box<dyn MessageProcessor>,
    exception_processor: Box<dyn ExceptionProcessor>,
    logger: Option<Logger>,
    dump_dir: Option<DumpDir>,
    /// The most recently completed run's [`RunState`] (received buffers,
    /// highest message reached), kept so `HaltAndLogLast` can pair it
    /// with `last_snapshot` from the iteration before the current one.
    previous_run_state: Option<RunState>,
}

impl SessionDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fuzzer_data: FuzzerData,
        config: DriverConfig,
        mutation_engine: MutationEngine,
        monitor: MonitorHandle,
        message_processor: Box<dyn MessageProcessor>,
        exception_processor: Box<dyn ExceptionProcessor>,
        logger: Option<Logger>,
        dump_dir: Option<DumpDir>,
    ) -> Self {
        Self {
            fuzzer_data,
            config,
            mutation_engine,
            monitor,
            message_processor,
            exception_processor,
            logger,
            dump_dir,
            previous_run_state: None,
        }
    }

    /// Runs the outer loop until termination (§4.6).
    pub fn fuzz(&mut self) -> StopReason {
        let mut iteration = if self.fuzzer_data.should_perform_test_run {
            self.config.min_run - 1
        } else {
            self.config.min_run
        };
        let mut failure_count: u32 = 0;
        let mut paused = false;

        loop {
            let last_snapshot = self.fuzzer_data.message_collection.clone();
            // The run_state paired with `last_snapshot`: both describe
            // the iteration before this one, which is what
            // `HaltAndLogLast` must log together.
            let prior_run_state = self.previous_run_state.take();

            if paused {
                std::thread::sleep(Duration::from_millis(500));
                if let Some(signal) = self.poll_monitor_once(paused) {
                    match signal {
                        ControlSignal::Resume => paused = false,
                        other => self.log_unhandled_while_paused(&other),
                    }
                }
                self.previous_run_state = prior_run_state;
                continue;
            }

            if let Some(signal) = self.poll_monitor_once(paused) {
                let stop = self.handle_signal(&mut paused, &mut iteration, &mut failure_count, signal, &last_snapshot, false, None, prior_run_state.as_ref());
                self.previous_run_state = prior_run_state;
                if let Some(stop) = stop {
                    return stop;
                }
                continue;
            }

            if self.config.dump_raw.is_none() && self.config.sleep_time.as_secs_f64() > 0.0 {
                info!(seconds = self.config.sleep_time.as_secs_f64(), "sleeping between iterations");
                std::thread::sleep(self.config.sleep_time);
            }

            let seed = self.select_seed(iteration);
            info!(iteration, seed, "running iteration");

            let was_test_run = self.fuzzer_data.should_perform_test_run && iteration == self.config.min_run - 1;
            let (run_state, outcome) = self.perform_run(iteration, seed);

            if self.config.log_all {
                if let Some(logger) = &self.logger {
                    let _ = logger.output_log(iteration, &self.fuzzer_data.message_collection, "LogAll ", Some(&run_state));
                }
            }

            let control = match outcome {
                Ok(()) => None,
                Err(RunError::Control(signal)) => Some(signal),
                Err(run_error) => self.resolve_control_signal(run_error),
            };

            let post_signal = self.poll_monitor_once(paused);
            let mut advanced = false;

            if let Some(signal) = control {
                if let Some(stop) = self.handle_signal(&mut paused, &mut iteration, &mut failure_count, signal, &last_snapshot, was_test_run, Some(&run_state), prior_run_state.as_ref()) {
                    self.previous_run_state = Some(run_state);
                    return stop;
                }
                advanced = true;
            }
            if let Some(signal) = post_signal {
                if let Some(stop) = self.handle_signal(&mut paused, &mut iteration, &mut failure_count, signal, &last_snapshot, was_test_run, Some(&run_state), prior_run_state.as_ref()) {
                    self.previous_run_state = Some(run_state);
                    return stop;
                }
                advanced = true;
            }

            self.previous_run_state = Some(run_state);

            if advanced {
                continue;
            }

            // No control signal: advance normally.
            iteration += 1;

            if self.config.dump_raw.is_some() {
                return StopReason::DumpRawComplete;
            }
            if self.config.max_run >= 0 && iteration > self.config.max_run {
                return StopReason::MaxRunReached;
            }
        }
    }

    fn select_seed(&self, iteration: i64) -> i64 {
        if let Some(seed) = self.config.dump_raw {
            return seed;
        }
        if self.fuzzer_data.should_perform_test_run && iteration == self.config.min_run - 1 {
            return -1;
        }
        if let Some(seeds) = &self.config.loop_seeds {
            if !seeds.is_empty() {
                let idx = (iteration.rem_euclid(seeds.len() as i64)) as usize;
                return seeds[idx];
            }
        }
        iteration
    }

    fn poll_monitor_once(&self, paused: bool) -> Option<ControlSignal> {
        let event = self.monitor.try_pop()?;
        if paused && !matches!(event, MonitorEvent::Pause | MonitorEvent::Resume) {
            warn!(?event, "monitor event received while paused, ignoring");
            return None;
        }
        Some(to_control_signal(event))
    }

    fn log_unhandled_while_paused(&self, signal: &ControlSignal) {
        warn!(%signal, "unhandled control signal observed while paused");
    }

    /// Common control-signal dispatch, used at both the pre-run and
    /// post-run poll points (§4.6 "Control-signal handling").
    ///
    /// `current_run_state` is the just-completed run's state, if any run
    /// has executed this iteration yet; `prior_run_state` is the
    /// previous iteration's, paired with `last_snapshot`, for
    /// `HaltAndLogLast`.
    #[allow(clippy::too_many_arguments)]
    fn handle_signal(
        &mut self,
        paused: &mut bool,
        iteration: &mut i64,
        failure_count: &mut u32,
        signal: ControlSignal,
        last_snapshot: &crate::data::MessageCollection,
        was_test_run: bool,
        current_run_state: Option<&RunState>,
        prior_run_state: Option<&RunState>,
    ) -> Option<StopReason> {
        match signal {
            ControlSignal::Pause => {
                *paused = true;
                info!("paused");
                None
            }
            ControlSignal::Resume => {
                if *paused {
                    *paused = false;
                    info!("resumed");
                } else {
                    warn!("received resume while not paused, ignoring");
                }
                None
            }
            ControlSignal::LogCrash(detail) => {
                if *failure_count == 0 {
                    info!(%detail, "crash detected");
                    if let Some(logger) = &self.logger {
                        let run_state = current_run_state.or(prior_run_state);
                        let _ = logger.output_log(*iteration, &self.fuzzer_data.message_collection, &detail, run_state);
                    }
                }
                *failure_count += 1;
                if *failure_count < self.fuzzer_data.failure_threshold {
                    info!(failures = *failure_count, threshold = self.fuzzer_data.failure_threshold, "retrying seed after failure");
                    std::thread::sleep(self.fuzzer_data.failure_timeout);
                } else {
                    info!("failure threshold reached, abandoning seed");
                    *failure_count = 0;
                    *iteration += 1;
                }
                None
            }
            ControlSignal::AbortRun(detail) => {
                info!(%detail, "run aborted");
                *iteration += 1;
                None
            }
            ControlSignal::RetryRun(detail) => {
                info!(%detail, "retrying current run");
                None
            }
            ControlSignal::HaltAndLog(detail) => {
                if let Some(logger) = &self.logger {
                    let run_state = current_run_state.or(prior_run_state);
                    let _ = logger.output_log(*iteration, &self.fuzzer_data.message_collection, &detail, run_state);
                }
                info!(%detail, "halt and log");
                Some(StopReason::Halted)
            }
            ControlSignal::HaltAndLogLast(detail) => {
                if let Some(logger) = &self.logger {
                    if *iteration > self.config.min_run && !was_test_run {
                        let logged_iteration = if self.config.min_run == self.config.max_run {
                            *iteration
                        } else {
                            *iteration - 1
                        };
                        let _ = logger.output_last_log(logged_iteration, last_snapshot, &detail, prior_run_state);
                    }
                }
                info!(%detail, "halt and log last");
                Some(StopReason::Halted)
            }
            ControlSignal::Halt => {
                info!("halt");
                Some(StopReason::Halted)
            }
        }
    }

    fn resolve_control_signal(&mut self, error: RunError) -> Option<ControlSignal> {
        self.exception_processor.process_exception(&error)
    }

    /// Executes one full run: open connection, walk messages in order,
    /// close connection (§4.6.1). Returns the run's [`RunState`]
    /// alongside the outcome so the caller can hand received buffers and
    /// the highest message reached to the logger.
    fn perform_run(&mut self, iteration: i64, seed: i64) -> (RunState, Result<(), RunError>) {
        if let Some(logger) = &mut self.logger {
            logger.reset_for_new_run();
        }

        let mut run_state = RunState::new(iteration, seed);

        if let Err(signal) = self.message_processor.pre_connect(seed, &self.config.target_host, self.fuzzer_data.target_port) {
            return (run_state, Err(control_as_run_error(signal)));
        }

        let mut connection = match connection::open(ConnectionParams {
            proto: self.fuzzer_data.proto,
            host: &self.config.target_host,
            port: self.fuzzer_data.target_port,
            source_ip: self.fuzzer_data.source_ip.as_deref(),
            source_port: self.fuzzer_data.source_port,
            seed,
        }) {
            Ok(c) => c,
            Err(e) => return (run_state, Err(RunError::Connection(e))),
        };

        let result = self.walk_messages(&mut *connection, &mut run_state, iteration, seed);
        connection.close();
        (run_state, result)
    }

    fn walk_messages(&mut self, connection: &mut dyn Connection, run_state: &mut RunState, iteration: i64, seed: i64) -> Result<(), RunError> {
        let receive_timeout = self.fuzzer_data.receive_timeout;
        let message_count = self.fuzzer_data.message_collection.len();

        for idx in 0..message_count {
            self.fuzzer_data.message_collection.message_mut(idx).reset_altered();

            let is_outbound = self.fuzzer_data.message_collection.messages()[idx].is_outbound();
            if is_outbound {
                self.send_message(connection, idx, iteration, seed, receive_timeout)?;
            } else {
                self.receive_message(connection, idx, iteration, seed, receive_timeout, run_state)?;
            }

            run_state.set_highest_message_number(idx);
        }

        Ok(())
    }

    fn receive_message(
        &mut self,
        connection: &mut dyn Connection,
        idx: usize,
        iteration: i64,
        seed: i64,
        receive_timeout: Duration,
        run_state: &mut RunState,
    ) -> Result<(), RunError> {
        let expected_len = self.fuzzer_data.message_collection.messages()[idx].effective_bytes().len();
        let data = connection.receive(expected_len, receive_timeout).map_err(RunError::Connection)?;

        let message = &self.fuzzer_data.message_collection.messages()[idx];
        let ctx = HookContext::whole_message(iteration, message.is_fuzzed(), message.original_subcomponents(), vec![data.clone()]);
        if let Err(signal) = self.message_processor.post_receive_process(&data, &ctx) {
            return Err(control_as_run_error(signal));
        }

        run_state.record_received(idx, data.clone());

        if self.config.dump_raw.is_some() {
            if let Some(dump_dir) = &self.dump_dir {
                let _ = dump_dir.dump_inbound(iteration, seed, &data);
            }
        }

        Ok(())
    }

    fn send_message(
        &mut self,
        connection: &mut dyn Connection,
        idx: usize,
        iteration: i64,
        seed: i64,
        receive_timeout: Duration,
    ) -> Result<(), RunError> {
        let original = self.fuzzer_data.message_collection.messages()[idx].original_subcomponents();
        let is_fuzzed = self.fuzzer_data.message_collection.messages()[idx].is_fuzzed();
        let has_multiple = self.fuzzer_data.message_collection.messages()[idx].subcomponents().len() > 1;

        if has_multiple {
            self.pre_fuzz_subcomponents(idx, iteration, &original)?;
            if seed >= 0 {
                self.mutate_subcomponents(idx, seed)?;
            }
            self.pre_send_subcomponents(idx, iteration, &original)?;
        } else {
            self.pre_fuzz_whole_message(idx, iteration, is_fuzzed, &original)?;
            if seed >= 0 {
                self.mutate_subcomponents(idx, seed)?;
            }
        }

        let altered = self.fuzzer_data.message_collection.messages()[idx].effective_bytes();
        let actual = self.fuzzer_data.message_collection.messages()[idx].altered_subcomponents();
        let ctx = HookContext::whole_message(iteration, is_fuzzed, original.clone(), actual);
        let payload = self
            .message_processor
            .pre_send_process(altered, &ctx)
            .map_err(control_as_run_error)?;

        if let Some(dump_dir) = &self.dump_dir {
            if self.config.dump_raw.is_some() {
                let _ = dump_dir.dump_outbound(iteration, seed, is_fuzzed, &payload);
            }
        }

        connection.send(&payload, receive_timeout).map_err(RunError::Connection)
    }

    fn pre_fuzz_subcomponents(&mut self, msg_idx: usize, iteration: i64, original: &[Vec<u8>]) -> Result<(), RunError> {
        let count = self.fuzzer_data.message_collection.messages()[msg_idx].subcomponents().len();
        for j in 0..count {
            let actual = self.fuzzer_data.message_collection.messages()[msg_idx].altered_subcomponents();
            let message = &self.fuzzer_data.message_collection.messages()[msg_idx];
            let sc = &message.subcomponents()[j];
            let ctx = HookContext::subcomponent(iteration, j, sc.is_fuzzed(), original.to_vec(), actual);
            let bytes = sc.altered().to_vec();
            let result = self
                .message_processor
                .pre_fuzz_subcomponent_process(bytes, &ctx)
                .map_err(control_as_run_error)?;
            self.fuzzer_data.message_collection.message_mut(msg_idx).subcomponent_mut(j).set_altered(result);
        }
        Ok(())
    }

    fn pre_send_subcomponents(&mut self, msg_idx: usize, iteration: i64, original: &[Vec<u8>]) -> Result<(), RunError> {
        let count = self.fuzzer_data.message_collection.messages()[msg_idx].subcomponents().len();
        for j in 0..count {
            let actual = self.fuzzer_data.message_collection.messages()[msg_idx].altered_subcomponents();
            let message = &self.fuzzer_data.message_collection.messages()[msg_idx];
            let sc = &message.subcomponents()[j];
            let ctx = HookContext::subcomponent(iteration, j, sc.is_fuzzed(), original.to_vec(), actual);
            let bytes = sc.altered().to_vec();
            let result = self
                .message_processor
                .pre_send_subcomponent_process(bytes, &ctx)
                .map_err(control_as_run_error)?;
            self.fuzzer_data.message_collection.message_mut(msg_idx).subcomponent_mut(j).set_altered(result);
        }
        Ok(())
    }

    fn pre_fuzz_whole_message(&mut self, msg_idx: usize, iteration: i64, is_fuzzed: bool, original: &[Vec<u8>]) -> Result<(), RunError> {
        let actual = self.fuzzer_data.message_collection.messages()[msg_idx].altered_subcomponents();
        let ctx = HookContext::whole_message(iteration, is_fuzzed, original.to_vec(), actual.clone());
        let bytes = actual[0].clone();
        let result = self
            .message_processor
            .pre_fuzz_process(bytes, &ctx)
            .map_err(control_as_run_error)?;
        self.fuzzer_data.message_collection.message_mut(msg_idx).subcomponent_mut(0).set_altered(result);
        Ok(())
    }

    /// Mutation phase (§4.6.2): for each fuzz-flagged subcomponent,
    /// replace its altered bytes with `MutationEngine(altered, seed)`.
    /// Only invoked when `seed >= 0`.
    fn mutate_subcomponents(&mut self, msg_idx: usize, seed: i64) -> Result<(), RunError> {
        let count = self.fuzzer_data.message_collection.messages()[msg_idx].subcomponents().len();
        for j in 0..count {
            let sc = &self.fuzzer_data.message_collection.messages()[msg_idx].subcomponents()[j];
            if !sc.is_fuzzed() {
                continue;
            }
            let input = sc.altered().to_vec();
            let mutated = self.mutation_engine.mutate(&input, seed).map_err(RunError::Mutator)?;
            self.fuzzer_data.message_collection.message_mut(msg_idx).subcomponent_mut(j).set_altered(mutated);
        }
        Ok(())
    }
}

fn control_as_run_error(signal: ControlSignal) -> RunError {
    RunError::Control(signal)
}

fn to_control_signal(event: MonitorEvent) -> ControlSignal {
    match event {
        MonitorEvent::Crash(detail) => ControlSignal::LogCrash(detail),
        MonitorEvent::Pause => ControlSignal::Pause,
        MonitorEvent::Resume => ControlSignal::Resume,
        MonitorEvent::AbortRun(detail) => ControlSignal::AbortRun(detail),
        MonitorEvent::RetryRun(detail) => ControlSignal::RetryRun(detail),
        MonitorEvent::Halt => ControlSignal::Halt,
        MonitorEvent::HaltAndLogLast(detail) => ControlSignal::HaltAndLogLast(detail),
        MonitorEvent::HaltAndLog(detail) => ControlSignal::HaltAndLog(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Direction, FuzzerData, Message, MessageCollection, Subcomponent, TransportKind};
    use crate::monitor::NullMonitor;
    use crate::processor::{IdentityProcessor, SwallowingExceptionProcessor};

    fn minimal_fuzzer_data(failure_threshold: u32) -> FuzzerData {
        FuzzerData {
            proto: TransportKind::Tcp,
            target_port: 0,
            source_ip: None,
            source_port: None,
            receive_timeout: Duration::from_secs(1),
            failure_threshold,
            failure_timeout: Duration::from_millis(1),
            processor_directory: None,
            should_perform_test_run: false,
            message_collection: MessageCollection::new(vec![Message::new(
                Direction::Outbound,
                false,
                vec![Subcomponent::new(vec![1, 2], false)],
            )]),
        }
    }

    fn test_driver(failure_threshold: u32) -> SessionDriver {
        SessionDriver::new(
            minimal_fuzzer_data(failure_threshold),
            DriverConfig {
                target_host: "127.0.0.1".to_string(),
                sleep_time: Duration::ZERO,
                min_run: 0,
                max_run: 10,
                loop_seeds: None,
                dump_raw: None,
                log_all: false,
            },
            MutationEngine::new("/bin/true"),
            MonitorHandle::spawn(Box::new(NullMonitor)),
            Box::new(IdentityProcessor),
            Box::new(SwallowingExceptionProcessor),
            None,
            None,
        )
    }

    fn empty_snapshot() -> crate::data::MessageCollection {
        MessageCollection::new(vec![])
    }

    // Scenario 2 (§8): --loop 0,2-4 cycles through [0,2,3,4].
    #[test]
    fn select_seed_cycles_through_loop_seeds() {
        let mut driver = test_driver(3);
        driver.config.loop_seeds = Some(vec![0, 2, 3, 4]);
        let expected = [0, 2, 3, 4, 0, 2, 3, 4];
        for (iteration, want) in expected.iter().enumerate() {
            assert_eq!(driver.select_seed(iteration as i64), *want);
        }
    }

    #[test]
    fn select_seed_without_loop_mode_is_the_iteration_itself() {
        let driver = test_driver(3);
        assert_eq!(driver.select_seed(7), 7);
    }

    #[test]
    fn select_seed_test_run_is_minus_one() {
        let mut driver = test_driver(3);
        driver.fuzzer_data.should_perform_test_run = true;
        driver.config.min_run = 5;
        assert_eq!(driver.select_seed(4), -1);
        assert_eq!(driver.select_seed(5), 5);
    }

    #[test]
    fn select_seed_dump_raw_overrides_everything() {
        let mut driver = test_driver(3);
        driver.config.dump_raw = Some(99);
        driver.config.loop_seeds = Some(vec![0, 1]);
        assert_eq!(driver.select_seed(0), 99);
    }

    #[test]
    fn pause_then_resume_round_trips() {
        let mut driver = test_driver(3);
        let mut iteration = 0i64;
        let mut failure_count = 0u32;
        let mut paused = false;
        let snapshot = empty_snapshot();

        let stop = driver.handle_signal(&mut paused, &mut iteration, &mut failure_count, ControlSignal::Pause, &snapshot, false, None, None);
        assert!(stop.is_none());
        assert!(paused);
        assert_eq!(iteration, 0, "pause must not advance the iteration");

        let stop = driver.handle_signal(&mut paused, &mut iteration, &mut failure_count, ControlSignal::Resume, &snapshot, false, None, None);
        assert!(stop.is_none());
        assert!(!paused);
        assert_eq!(iteration, 0);
    }

    #[test]
    fn resume_while_not_paused_is_ignored() {
        let mut driver = test_driver(3);
        let mut iteration = 3i64;
        let mut failure_count = 0u32;
        let mut paused = false;
        let snapshot = empty_snapshot();

        driver.handle_signal(&mut paused, &mut iteration, &mut failure_count, ControlSignal::Resume, &snapshot, false, None, None);
        assert!(!paused);
        assert_eq!(iteration, 3);
    }

    // Scenario 3 (§8): failure_threshold=3, three Crash signals on the
    // same seed -> two retries, then the third resets failure_count and
    // advances the iteration by exactly one.
    #[test]
    fn crash_under_threshold_retries_then_advances_on_the_threshold_th_occurrence() {
        let mut driver = test_driver(3);
        let mut iteration = 5i64;
        let mut failure_count = 0u32;
        let mut paused = false;
        let snapshot = empty_snapshot();

        driver.handle_signal(&mut paused, &mut iteration, &mut failure_count, ControlSignal::LogCrash("segv".into()), &snapshot, false, None, None);
        assert_eq!(iteration, 5);
        assert_eq!(failure_count, 1);

        driver.handle_signal(&mut paused, &mut iteration, &mut failure_count, ControlSignal::LogCrash("segv".into()), &snapshot, false, None, None);
        assert_eq!(iteration, 5);
        assert_eq!(failure_count, 2);

        driver.handle_signal(&mut paused, &mut iteration, &mut failure_count, ControlSignal::LogCrash("segv".into()), &snapshot, false, None, None);
        assert_eq!(iteration, 6, "threshold reached: advance by one");
        assert_eq!(failure_count, 0, "failure_count resets at the threshold");
    }

    #[test]
    fn abort_run_advances_without_touching_failure_count() {
        let mut driver = test_driver(3);
        let mut iteration = 2i64;
        let mut failure_count = 1u32;
        let mut paused = false;
        let snapshot = empty_snapshot();

        driver.handle_signal(&mut paused, &mut iteration, &mut failure_count, ControlSignal::AbortRun("boom".into()), &snapshot, false, None, None);
        assert_eq!(iteration, 3);
        assert_eq!(failure_count, 1);
    }

    #[test]
    fn retry_run_does_not_advance() {
        let mut driver = test_driver(3);
        let mut iteration = 2i64;
        let mut failure_count = 0u32;
        let mut paused = false;
        let snapshot = empty_snapshot();

        driver.handle_signal(&mut paused, &mut iteration, &mut failure_count, ControlSignal::RetryRun("again".into()), &snapshot, false, None, None);
        assert_eq!(iteration, 2);
    }

    #[test]
    fn halt_terminates_immediately() {
        let mut driver = test_driver(3);
        let mut iteration = 2i64;
        let mut failure_count = 0u32;
        let mut paused = false;
        let snapshot = empty_snapshot();

        let stop = driver.handle_signal(&mut paused, &mut iteration, &mut failure_count, ControlSignal::Halt, &snapshot, false, None, None);
        assert_eq!(stop, Some(StopReason::Halted));
    }

    // Scenario 5 (§8): HaltAndLogLast logs the pre-run snapshot under
    // `current - 1` once the driver is clearly past the test-run
    // placeholder, and always terminates.
    #[test]
    fn halt_and_log_last_logs_under_current_minus_one_and_terminates() {
        let tmp = std::env::temp_dir().join(format!("replayfuzz-driver-test-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        let fuzzer_file = tmp.join("session.fuzzer");
        std::fs::write(&fuzzer_file, "{}").unwrap();
        let logger = crate::logger::Logger::new(&fuzzer_file, "2024-01-01,000000").unwrap();
        let log_dir = logger.dir().to_path_buf();

        let mut driver = test_driver(3);
        driver.logger = Some(logger);
        driver.config.min_run = 1;
        driver.config.max_run = 10;

        let mut iteration = 4i64;
        let mut failure_count = 0u32;
        let mut paused = false;
        let snapshot = empty_snapshot();

        let mut prior_run_state = RunState::new(3, 3);
        prior_run_state.record_received(0, vec![0xaa]);
        prior_run_state.set_highest_message_number(0);

        let stop = driver.handle_signal(
            &mut paused,
            &mut iteration,
            &mut failure_count,
            ControlSignal::HaltAndLogLast("oops".into()),
            &snapshot,
            false,
            None,
            Some(&prior_run_state),
        );
        assert_eq!(stop, Some(StopReason::Halted));
        let log_path = log_dir.join("iteration-3-last.log");
        assert!(log_path.exists());
        let body = std::fs::read_to_string(&log_path).unwrap();
        assert!(body.contains("highest message completed: Some(0)"));

        std::fs::remove_dir_all(&tmp).unwrap();
    }

    #[test]
    fn halt_and_log_last_skips_logging_for_the_test_run_placeholder() {
        let tmp = std::env::temp_dir().join(format!("replayfuzz-driver-test-testrun-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        let fuzzer_file = tmp.join("session.fuzzer");
        std::fs::write(&fuzzer_file, "{}").unwrap();
        let logger = crate::logger::Logger::new(&fuzzer_file, "2024-01-01,000000").unwrap();
        let log_dir = logger.dir().to_path_buf();

        let mut driver = test_driver(3);
        driver.logger = Some(logger);
        driver.config.min_run = 1;
        driver.config.max_run = 10;

        let mut iteration = 0i64; // min_run - 1: the test-run placeholder
        let mut failure_count = 0u32;
        let mut paused = false;
        let snapshot = empty_snapshot();

        driver.handle_signal(
            &mut paused,
            &mut iteration,
            &mut failure_count,
            ControlSignal::HaltAndLogLast("oops".into()),
            &snapshot,
            true,
            None,
            None,
        );
        let entries: Vec<_> = std::fs::read_dir(&log_dir).unwrap().collect();
        assert!(entries.is_empty(), "no log should be written for the test-run placeholder");

        std::fs::remove_dir_all(&tmp).unwrap();
    }
}
