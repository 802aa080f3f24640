//! Per-invocation log directory layout (§6):
//! `<fuzzer_basename>_logs/<YYYY-MM-DD,HHMMSS>/`, with per-run files
//! naming iteration, role, seed, and an optional `-fuzzed` suffix.
//!
//! Distinct from the `tracing` diagnostics emitted by the driver --
//! this is the domain-specific crash/dump artifact trail named in §6,
//! not a logging-crate concern (see SPEC_FULL.md §A).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::data::{MessageCollection, RunState};

/// Owns the per-invocation log directory and writes iteration logs and
/// raw dumps into it.
pub struct Logger {
    dir: PathBuf,
}

impl Logger {
    /// Builds `<fuzzer_basename>_logs/<timestamp>/` under the fuzzer
    /// file's own directory and creates it.
    pub fn new(fuzzer_file_path: &Path, timestamp: &str) -> io::Result<Self> {
        let stem = fuzzer_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "fuzzer".to_string());
        let parent = fuzzer_file_path.parent().unwrap_or_else(|| Path::new("."));
        let dir = parent.join(format!("{stem}_logs")).join(timestamp);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Called at the start of each run so stale per-run state doesn't
    /// leak into the next iteration's log (§4.6.1 step 1).
    pub fn reset_for_new_run(&mut self) {}

    /// Writes an iteration log tagged with `reason` (a crash detail,
    /// `"LogAll "`, or a halt detail). `run_state`, when available,
    /// contributes the received buffers and highest-message-reached
    /// recorded during that run (§3, §4.6.1c).
    pub fn output_log(&self, iteration: i64, collection: &MessageCollection, reason: &str, run_state: Option<&RunState>) -> io::Result<()> {
        let path = self.dir.join(format!("iteration-{iteration}.log"));
        let body = render_collection(collection, reason, run_state);
        fs::write(path, body)
    }

    /// Writes the pre-run snapshot under `iteration` for
    /// `HaltAndLogLast` (§4.6: "the logged payload is the pre-run deep
    /// copy, not the post-mutation state"), paired with the previous
    /// run's received buffers.
    pub fn output_last_log(&self, iteration: i64, last_snapshot: &MessageCollection, reason: &str, run_state: Option<&RunState>) -> io::Result<()> {
        let path = self.dir.join(format!("iteration-{iteration}-last.log"));
        let body = render_collection(last_snapshot, reason, run_state);
        fs::write(path, body)
    }
}

fn render_collection(collection: &MessageCollection, reason: &str, run_state: Option<&RunState>) -> String {
    let mut body = format!("{reason}\n");
    for (idx, message) in collection.messages().iter().enumerate() {
        body.push_str(&format!(
            "message {idx} ({:?}, fuzzed={}): {:02x?}\n",
            message.direction(),
            message.is_fuzzed(),
            message.effective_bytes()
        ));
        if let Some(rs) = run_state {
            if let Some((_, received)) = rs.received.iter().find(|(recv_idx, _)| *recv_idx == idx) {
                body.push_str(&format!("  received: {received:02x?}\n"));
            }
        }
    }
    if let Some(rs) = run_state {
        body.push_str(&format!("highest message completed: {:?}\n", rs.highest_message_number));
    }
    body
}

/// A dump-only sink used in `--dump-raw` mode: writes into the same
/// directory unless `--quiet`, in which case into `dumpraw/` (§6).
pub struct DumpDir {
    dir: PathBuf,
}

impl DumpDir {
    pub fn quiet() -> io::Result<Self> {
        let dir = PathBuf::from("dumpraw");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn shared_with(logger: &Logger) -> Self {
        Self { dir: logger.dir().to_path_buf() }
    }

    fn dump_path(&self, iteration: i64, role: &str, seed: i64, fuzzed: bool) -> PathBuf {
        let mut name = format!("{iteration}-{role}-seed-{seed}");
        if fuzzed {
            name.push_str("-fuzzed");
        }
        self.dir.join(name)
    }

    pub fn dump_outbound(&self, iteration: i64, seed: i64, fuzzed: bool, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.dump_path(iteration, "outbound", seed, fuzzed), bytes)
    }

    pub fn dump_inbound(&self, iteration: i64, seed: i64, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.dump_path(iteration, "inbound", seed, false), bytes)
    }
}

/// Current local timestamp formatted as `YYYY-MM-DD,HHMMSS` without
/// pulling in a date/time crate -- the corpus has no chrono dependency
/// for this style of CLI tool, so this stays on `std::time` plus a
/// small civil-calendar conversion.
pub fn timestamp_now() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_unix_timestamp(secs as i64)
}

fn format_unix_timestamp(secs: i64) -> String {
    const SECS_PER_DAY: i64 = 86_400;
    let days = secs.div_euclid(SECS_PER_DAY);
    let time_of_day = secs.rem_euclid(SECS_PER_DAY);

    let (year, month, day) = civil_from_days(days);
    let hour = time_of_day / 3600;
    let minute = (time_of_day % 3600) / 60;
    let second = time_of_day % 60;

    format!("{year:04}-{month:02}-{day:02},{hour:02}{minute:02}{second:02}")
}

/// Howard Hinnant's `civil_from_days` algorithm, days-since-epoch to
/// (year, month, day).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if m <= 2 { y + 1 } else { y };
    (year, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_unix_timestamp_known_value() {
        // 2024-01-02 03:04:05 UTC
        assert_eq!(format_unix_timestamp(1704164645), "2024-01-02,030405");
    }

    #[test]
    fn logger_creates_directory_and_writes_log() {
        let tmp = std::env::temp_dir().join(format!("replayfuzz-test-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        let fuzzer_file = tmp.join("session.fuzzer");
        std::fs::write(&fuzzer_file, "{}").unwrap();

        let logger = Logger::new(&fuzzer_file, "2024-01-01,000000").unwrap();
        assert!(logger.dir().exists());

        let collection = MessageCollection::new(vec![]);
        logger.output_log(0, &collection, "test", None).unwrap();
        assert!(logger.dir().join("iteration-0.log").exists());

        std::fs::remove_dir_all(&tmp).unwrap();
    }

    #[test]
    fn output_log_renders_received_buffers_and_highest_message() {
        let tmp = std::env::temp_dir().join(format!("replayfuzz-test-runstate-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        let fuzzer_file = tmp.join("session.fuzzer");
        std::fs::write(&fuzzer_file, "{}").unwrap();

        let logger = Logger::new(&fuzzer_file, "2024-01-01,000000").unwrap();
        let collection = MessageCollection::new(vec![]);

        let mut run_state = RunState::new(0, 5);
        run_state.record_received(1, vec![0xaa, 0xbb]);
        run_state.set_highest_message_number(1);

        logger.output_log(0, &collection, "test", Some(&run_state)).unwrap();
        let body = std::fs::read_to_string(logger.dir().join("iteration-0.log")).unwrap();
        assert!(body.contains("aa"));
        assert!(body.contains("highest message completed: Some(1)"));

        std::fs::remove_dir_all(&tmp).unwrap();
    }
}
