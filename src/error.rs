use std::path::PathBuf;

/// Errors that can terminate the fuzzer before the driver loop starts.
///
/// These always cause the process to exit with a distinct, non-zero code
/// (see [`crate::cli::ExitCode`]) rather than being routed through the
/// in-run exception machinery.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not read fuzzer file {path}: {source}")]
    FuzzerFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse fuzzer file {path}: {source}")]
    FuzzerFileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid --range value {0:?}")]
    InvalidRange(String),

    #[error("invalid --loop value {0:?}")]
    InvalidLoop(String),

    #[error("mutator binary not found at {0}")]
    MutatorNotFound(PathBuf),

    #[error("a message collection must contain at least one message")]
    EmptyMessageCollection,

    #[error("message {0} has no subcomponents")]
    EmptyMessage(usize),

    #[error("invalid hex in subcomponent bytes: {0:?}")]
    InvalidHex(String),
}

/// Transport-level failures raised by the [`crate::connection::Connection`] trait.
#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    #[error("connection refused by {0}")]
    ConnectionRefused(String),

    #[error("timed out connecting to {0}")]
    ConnectionTimeout(String),

    #[error("timed out sending data")]
    SendTimeout,

    #[error("timed out receiving data")]
    ReceiveTimeout,

    #[error("transport error: {0}")]
    TransportError(String),
}

/// Failures raised by the [`crate::mutation::MutationEngine`].
#[derive(thiserror::Error, Debug)]
pub enum MutatorError {
    #[error("mutator exited with a non-zero status or produced no output")]
    MutatorFailed,
}

/// Anything that can go wrong during a single run, before it reaches the
/// driver's control-signal dispatch in [`crate::driver`].
///
/// A [`ControlSignal`] is not itself a `RunError` — the exception
/// processor translates a `RunError` into a `ControlSignal`, which the
/// driver then matches on directly.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Mutator(#[from] MutatorError),

    #[error("processor hook failed: {0}")]
    Processor(String),

    /// A processor hook asked the driver to act directly (§4.5, §9):
    /// carries the original [`ControlSignal`] through instead of losing
    /// it to string formatting, so the driver dispatches it without
    /// going through [`crate::processor::ExceptionProcessor`] at all.
    #[error("{0}")]
    Control(ControlSignal),
}

/// The typed control channel between monitor/processor code and the
/// session driver (§4.6, §9 "control-by-exception -> tagged events").
#[derive(Debug, Clone)]
pub enum ControlSignal {
    Pause,
    Resume,
    AbortRun(String),
    RetryRun(String),
    LogCrash(String),
    Halt,
    HaltAndLogLast(String),
    HaltAndLog(String),
}

impl std::fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::AbortRun(d) => write!(f, "abort run: {d}"),
            Self::RetryRun(d) => write!(f, "retry run: {d}"),
            Self::LogCrash(d) => write!(f, "crash: {d}"),
            Self::Halt => write!(f, "halt"),
            Self::HaltAndLogLast(d) => write!(f, "halt and log last: {d}"),
            Self::HaltAndLog(d) => write!(f, "halt and log: {d}"),
        }
    }
}
