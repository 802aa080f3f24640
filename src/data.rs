//! In-memory representation of a recorded session (§3, §4.1).
//!
//! `FuzzerData` is loaded once from a `.fuzzer` file and is immutable
//! afterwards except for subcomponents' `altered` buffers, which the
//! driver resets and mutates once per run.

use serde::{Deserialize, Serialize};

/// Direction of a [`Message`] relative to the fuzzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// A contiguous byte range of a message carrying its own fuzz flag.
///
/// `altered` is reset to bytewise-equal to `original` at the start of
/// every run; `original` never changes after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcomponent {
    original: Vec<u8>,
    altered: Vec<u8>,
    is_fuzzed: bool,
}

impl Subcomponent {
    pub fn new(original: Vec<u8>, is_fuzzed: bool) -> Self {
        Self {
            altered: original.clone(),
            original,
            is_fuzzed,
        }
    }

    pub fn original(&self) -> &[u8] {
        &self.original
    }

    pub fn altered(&self) -> &[u8] {
        &self.altered
    }

    pub fn set_altered(&mut self, bytes: Vec<u8>) {
        self.altered = bytes;
    }

    pub fn is_fuzzed(&self) -> bool {
        self.is_fuzzed
    }

    /// Sets `altered` equal to `original`.
    pub fn reset_altered(&mut self) {
        self.altered.clear();
        self.altered.extend_from_slice(&self.original);
    }
}

/// An ordered list of [`Subcomponent`]s plus direction and a fuzz flag.
///
/// Invariant: the number of subcomponents is fixed after load and must
/// be at least one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    direction: Direction,
    is_fuzzed: bool,
    subcomponents: Vec<Subcomponent>,
}

impl Message {
    pub fn new(direction: Direction, is_fuzzed: bool, subcomponents: Vec<Subcomponent>) -> Self {
        Self {
            direction,
            is_fuzzed,
            subcomponents,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_outbound(&self) -> bool {
        self.direction == Direction::Outbound
    }

    pub fn is_fuzzed(&self) -> bool {
        self.is_fuzzed
    }

    pub fn subcomponents(&self) -> &[Subcomponent] {
        &self.subcomponents
    }

    pub fn subcomponent_mut(&mut self, idx: usize) -> &mut Subcomponent {
        &mut self.subcomponents[idx]
    }

    /// Concatenation of the subcomponents' current altered bytes: the
    /// unit sent on the wire and the expected-length hint for inbound
    /// messages.
    pub fn effective_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for sc in &self.subcomponents {
            out.extend_from_slice(sc.altered());
        }
        out
    }

    pub fn original_subcomponents(&self) -> Vec<Vec<u8>> {
        self.subcomponents.iter().map(|sc| sc.original().to_vec()).collect()
    }

    pub fn altered_subcomponents(&self) -> Vec<Vec<u8>> {
        self.subcomponents.iter().map(|sc| sc.altered().to_vec()).collect()
    }

    pub fn reset_altered(&mut self) {
        for sc in &mut self.subcomponents {
            sc.reset_altered();
        }
    }
}

/// Ordered sequence of [`Message`]s: the playback order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageCollection {
    messages: Vec<Message>,
}

impl MessageCollection {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_mut(&mut self, idx: usize) -> &mut Message {
        &mut self.messages[idx]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Transport kind named by the `.fuzzer` file (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Tcp,
    Udp,
    Tls,
    Raw,
    L2raw,
}

/// Container loaded from the `.fuzzer` file (§3, §6).
///
/// Immutable after load except subcomponents' altered buffers, reached
/// through `message_collection.message_mut(idx)`.
#[derive(Debug, Clone)]
pub struct FuzzerData {
    pub proto: TransportKind,
    pub target_port: u16,
    pub source_ip: Option<String>,
    pub source_port: Option<u16>,
    pub receive_timeout: std::time::Duration,
    pub failure_threshold: u32,
    pub failure_timeout: std::time::Duration,
    pub processor_directory: Option<std::path::PathBuf>,
    pub should_perform_test_run: bool,
    pub message_collection: MessageCollection,
}

/// Per-run ephemeral state: created at run start, discarded or logged
/// at run end (§3).
#[derive(Debug, Clone)]
pub struct RunState {
    pub iteration: i64,
    pub seed: i64,
    pub highest_message_number: Option<usize>,
    pub received: Vec<(usize, Vec<u8>)>,
}

impl RunState {
    pub fn new(iteration: i64, seed: i64) -> Self {
        Self {
            iteration,
            seed,
            highest_message_number: None,
            received: Vec::new(),
        }
    }

    pub fn record_received(&mut self, message_idx: usize, data: Vec<u8>) {
        self.received.push((message_idx, data));
    }

    pub fn set_highest_message_number(&mut self, idx: usize) {
        self.highest_message_number = Some(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_altered_restores_original_bytes() {
        let mut sc = Subcomponent::new(vec![1, 2, 3], true);
        sc.set_altered(vec![9, 9]);
        assert_ne!(sc.altered(), sc.original());
        sc.reset_altered();
        assert_eq!(sc.altered(), sc.original());
    }

    #[test]
    fn effective_bytes_concatenates_subcomponents() {
        let msg = Message::new(
            Direction::Outbound,
            false,
            vec![
                Subcomponent::new(vec![1, 2], false),
                Subcomponent::new(vec![3, 4], true),
            ],
        );
        assert_eq!(msg.effective_bytes(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn message_reset_altered_resets_every_subcomponent() {
        let mut msg = Message::new(
            Direction::Outbound,
            false,
            vec![Subcomponent::new(vec![1, 2], false)],
        );
        msg.subcomponent_mut(0).set_altered(vec![0xff]);
        msg.reset_altered();
        assert_eq!(msg.effective_bytes(), vec![1, 2]);
    }

    #[test]
    fn direction_predicates() {
        let out = Message::new(Direction::Outbound, true, vec![Subcomponent::new(vec![0], true)]);
        let inb = Message::new(Direction::Inbound, false, vec![Subcomponent::new(vec![0], false)]);
        assert!(out.is_outbound());
        assert!(out.is_fuzzed());
        assert!(!inb.is_outbound());
        assert!(!inb.is_fuzzed());
    }
}
