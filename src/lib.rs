//! replayfuzz replays a recorded multi-message network conversation
//! against a live target, mutating selected byte ranges on each pass.
//!
//! # Overview
//! A `.fuzzer` file records an ordered sequence of inbound/outbound
//! messages, each split into one or more subcomponents. Subcomponents
//! flagged as fuzzable are rewritten by an external mutator binary
//! before every send; the rest of the conversation is replayed
//! byte-for-byte. A background monitor watches the target out of band
//! and raises typed control signals -- pause, abort, crash, halt -- that
//! the session driver reconciles with run progress between iterations.
//!
//! # Components
//! - **data** -- the in-memory session model: [`data::FuzzerData`],
//!   [`data::MessageCollection`], [`data::Message`], [`data::Subcomponent`].
//! - **fuzzerfile** -- reads a `.fuzzer` file on disk into a [`data::FuzzerData`].
//! - **mutation** -- [`mutation::MutationEngine`], the subprocess-backed
//!   byte mutator.
//! - **connection** -- [`connection::Connection`] and its tcp/tls/udp/raw
//!   implementations.
//! - **monitor** -- [`monitor::Monitor`], [`monitor::MonitorHandle`], and
//!   the bundled [`monitor::PingMonitor`].
//! - **processor** -- [`processor::MessageProcessor`] and
//!   [`processor::ExceptionProcessor`], the user-overridable hook points.
//! - **driver** -- [`driver::SessionDriver`], the outer iteration loop.
//! - **logger** -- per-run iteration logs and raw dumps.
//! - **cli** -- the command-line surface.
//! - **error** -- typed errors at each layer boundary.

#![allow(clippy::new_without_default)]

pub mod cli;
pub mod connection;
pub mod data;
pub mod driver;
pub mod error;
pub mod fuzzerfile;
pub mod logger;
pub mod monitor;
pub mod mutation;
pub mod processor;

pub use connection::{Connection, ConnectionParams};
pub use data::{Direction, FuzzerData, Message, MessageCollection, Subcomponent, TransportKind};
pub use driver::{DriverConfig, SessionDriver, StopReason};
pub use error::{ConfigError, ConnectionError, ControlSignal, MutatorError, RunError};
pub use monitor::{Monitor, MonitorEvent, MonitorHandle, MonitorSink, NullMonitor, PingMonitor};
pub use mutation::MutationEngine;
pub use processor::{
    AbortOnTransportError, ExceptionProcessor, HookContext, HookResult, IdentityProcessor,
    MessageProcessor, SwallowingExceptionProcessor,
};
