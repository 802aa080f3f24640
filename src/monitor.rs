//! Background producer of typed [`MonitorEvent`]s, consumed by the
//! driver through a thread-safe, non-blocking queue (§4.4).
//!
//! The driver never calls a blocking `pop`; it polls with `try_pop`
//! before and after each run (the "bracketed polling" property in §8).

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::net::TcpStream;
use std::thread::JoinHandle;
use std::time::Duration;

/// A tagged event raised by the monitor, consumed by the driver (§3).
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Crash(String),
    Pause,
    Resume,
    AbortRun(String),
    RetryRun(String),
    Halt,
    HaltAndLogLast(String),
    HaltAndLog(String),
}

/// Out-of-band observer of the target process.
///
/// `run` is expected to loop until `should_stop` returns `true`,
/// pushing events to `sink` as it observes them. Implementations should
/// sleep between observations rather than busy-loop.
pub trait Monitor: Send + 'static {
    fn run(&mut self, sink: MonitorSink, should_stop: &dyn Fn() -> bool);
}

/// The producer half of the monitor channel, handed to a [`Monitor`].
#[derive(Clone)]
pub struct MonitorSink {
    tx: Sender<MonitorEvent>,
}

impl MonitorSink {
    pub fn push(&self, event: MonitorEvent) {
        let _ = self.tx.send(event);
    }
}

/// Owns the background worker and the consumer half of the channel.
///
/// Started at driver construction; terminated deterministically when
/// the driver drops it (the stop flag is checked by the monitor's own
/// loop, and the handle is joined in `Drop`).
pub struct MonitorHandle {
    rx: Receiver<MonitorEvent>,
    stop: std::sync::Arc<std::sync::atomic::AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn spawn(mut monitor: Box<dyn Monitor>) -> Self {
        let (tx, rx) = unbounded();
        let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let stop_for_worker = stop.clone();

        let worker = std::thread::spawn(move || {
            let sink = MonitorSink { tx };
            let should_stop = move || stop_for_worker.load(std::sync::atomic::Ordering::Relaxed);
            monitor.run(sink, &should_stop);
        });

        Self {
            rx,
            stop,
            worker: Some(worker),
        }
    }

    /// Non-blocking pop: returns `None` immediately if the queue is empty.
    pub fn try_pop(&self) -> Option<MonitorEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop.store(true, std::sync::atomic::Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// A monitor with no target observation: events only come from whatever
/// the user installs through the processor directory. Used when no
/// concrete monitor is configured.
pub struct NullMonitor;

impl Monitor for NullMonitor {
    fn run(&mut self, _sink: MonitorSink, should_stop: &dyn Fn() -> bool) {
        while !should_stop() {
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}

/// Default concrete monitor (§4.4 EXPANSION E): periodically probes the
/// target with a lightweight TCP connect and raises `Crash` once a
/// target that was previously reachable stops accepting connections.
pub struct PingMonitor {
    host: String,
    port: u16,
    interval: Duration,
}

impl PingMonitor {
    pub fn new(host: impl Into<String>, port: u16, interval: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            interval,
        }
    }
}

impl Monitor for PingMonitor {
    fn run(&mut self, sink: MonitorSink, should_stop: &dyn Fn() -> bool) {
        let mut was_reachable = false;
        let addr = format!("{}:{}", self.host, self.port);

        while !should_stop() {
            let reachable = addr
                .parse()
                .ok()
                .and_then(|sa| TcpStream::connect_timeout(&sa, Duration::from_millis(500)).ok())
                .is_some();

            if was_reachable && !reachable {
                sink.push(MonitorEvent::Crash(format!(
                    "target {}:{} stopped accepting connections",
                    self.host, self.port
                )));
            }
            was_reachable = was_reachable || reachable;

            std::thread::sleep(self.interval);
        }
    }
}
