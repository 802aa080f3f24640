//! Concrete `.fuzzer` file reader (SPEC_FULL.md §B).
//!
//! Named an external collaborator in the distilled spec -- the core
//! only consumes the resulting [`FuzzerData`] -- but a complete repo
//! ships a working reader so the binary runs end to end. JSON is the
//! wire format; the field names match §6 exactly.

use crate::data::{Direction, FuzzerData, Message, MessageCollection, Subcomponent, TransportKind};
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct RawSubcomponent {
    /// Original bytes, hex-encoded (keeps the file human-editable and
    /// JSON-safe for arbitrary binary payloads).
    original_hex: String,
    #[serde(default)]
    is_fuzzed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawDirection {
    Outbound,
    Inbound,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    direction: RawDirection,
    #[serde(default)]
    is_fuzzed: bool,
    subcomponents: Vec<RawSubcomponent>,
}

#[derive(Debug, Deserialize)]
struct RawFuzzerFile {
    proto: TransportKind,
    target_port: u16,
    #[serde(default)]
    source_ip: Option<String>,
    #[serde(default)]
    source_port: Option<u16>,
    receive_timeout: f64,
    failure_threshold: u32,
    failure_timeout: f64,
    #[serde(default)]
    processor_directory: Option<String>,
    #[serde(default)]
    should_perform_test_run: bool,
    messages: Vec<RawMessage>,
}

/// Reads and parses a `.fuzzer` file into a [`FuzzerData`].
///
/// `processor_directory` is resolved relative to the fuzzer file's own
/// directory, matching the original Python's
/// `os.path.join(self.fuzzer_folder, ...)` continuity rule (kept per
/// SPEC_FULL.md §B); the literal value `"default"` or an absent field
/// both mean "no processor directory".
pub fn read_from_file(path: &Path) -> Result<FuzzerData, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FuzzerFileIo {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawFuzzerFile = serde_json::from_str(&contents).map_err(|source| ConfigError::FuzzerFileParse {
        path: path.to_path_buf(),
        source,
    })?;

    let fuzzer_folder = path.parent().unwrap_or_else(|| Path::new("."));
    let processor_directory = match raw.processor_directory.as_deref() {
        None | Some("default") => None,
        Some(dir) => Some(fuzzer_folder.join(dir)),
    };

    let mut messages = Vec::with_capacity(raw.messages.len());
    for (idx, raw_message) in raw.messages.into_iter().enumerate() {
        if raw_message.subcomponents.is_empty() {
            return Err(ConfigError::EmptyMessage(idx));
        }
        let subcomponents = raw_message
            .subcomponents
            .into_iter()
            .map(decode_subcomponent)
            .collect::<Result<Vec<_>, _>>()?;
        let direction = match raw_message.direction {
            RawDirection::Outbound => Direction::Outbound,
            RawDirection::Inbound => Direction::Inbound,
        };
        messages.push(Message::new(direction, raw_message.is_fuzzed, subcomponents));
    }

    if messages.is_empty() {
        return Err(ConfigError::EmptyMessageCollection);
    }

    Ok(FuzzerData {
        proto: raw.proto,
        target_port: raw.target_port,
        source_ip: raw.source_ip,
        source_port: raw.source_port,
        receive_timeout: Duration::from_secs_f64(raw.receive_timeout),
        failure_threshold: raw.failure_threshold,
        failure_timeout: Duration::from_secs_f64(raw.failure_timeout),
        processor_directory,
        should_perform_test_run: raw.should_perform_test_run,
        message_collection: MessageCollection::new(messages),
    })
}

fn decode_subcomponent(sc: RawSubcomponent) -> Result<Subcomponent, ConfigError> {
    let bytes = hex_decode(&sc.original_hex).map_err(|_| ConfigError::InvalidHex(sc.original_hex.clone()))?;
    Ok(Subcomponent::new(bytes, sc.is_fuzzed))
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char).to_digit(16).ok_or(())?;
        let lo = (chunk[1] as char).to_digit(16).ok_or(())?;
        out.push(((hi << 4) | lo) as u8);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("session.fuzzer");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn reads_a_minimal_two_message_fuzzer_file() {
        let tmp = std::env::temp_dir().join(format!("replayfuzz-fuzzerfile-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();

        let body = r#"{
            "proto": "tcp",
            "target_port": 9999,
            "receive_timeout": 2.0,
            "failure_threshold": 3,
            "failure_timeout": 1.0,
            "should_perform_test_run": true,
            "messages": [
                {"direction": "outbound", "is_fuzzed": true, "subcomponents": [{"original_hex": "0102", "is_fuzzed": true}]},
                {"direction": "inbound", "subcomponents": [{"original_hex": "aa"}]}
            ]
        }"#;
        let path = write_fixture(&tmp, body);

        let data = read_from_file(&path).unwrap();
        assert_eq!(data.target_port, 9999);
        assert_eq!(data.message_collection.len(), 2);
        assert_eq!(data.message_collection.messages()[0].effective_bytes(), vec![0x01, 0x02]);
        assert!(data.message_collection.messages()[0].is_outbound());
        assert!(!data.message_collection.messages()[1].is_outbound());

        std::fs::remove_dir_all(&tmp).unwrap();
    }

    #[test]
    fn rejects_empty_message_collection() {
        let tmp = std::env::temp_dir().join(format!("replayfuzz-fuzzerfile-empty-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        let body = r#"{
            "proto": "udp", "target_port": 1, "receive_timeout": 1.0,
            "failure_threshold": 1, "failure_timeout": 1.0, "messages": []
        }"#;
        let path = write_fixture(&tmp, body);
        assert!(matches!(read_from_file(&path), Err(ConfigError::EmptyMessageCollection)));
        std::fs::remove_dir_all(&tmp).unwrap();
    }
}
