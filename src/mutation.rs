//! Deterministic `(bytes, seed) -> bytes` mutation (§4.2).
//!
//! The reference engine shells out to an external mutator binary,
//! piping `input` to its stdin and reading its stdout to completion.
//! Seed `-1` is the sentinel for "no mutation" and is handled by the
//! caller (the engine is simply never invoked on that path, per §4.6.2).

use crate::error::MutatorError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Wraps an opaque, subprocess-backed byte mutator.
#[derive(Debug, Clone)]
pub struct MutationEngine {
    mutator_path: PathBuf,
}

impl MutationEngine {
    /// Creates a new engine bound to the given mutator binary.
    ///
    /// Does not check that the binary exists; call
    /// [`MutationEngine::ensure_available`] during startup so a missing
    /// mutator is reported as a `ConfigError` rather than failing mid-run.
    pub fn new(mutator_path: impl Into<PathBuf>) -> Self {
        Self {
            mutator_path: mutator_path.into(),
        }
    }

    pub fn mutator_path(&self) -> &Path {
        &self.mutator_path
    }

    /// Fatal at startup if the mutator binary can't be found (§4.2).
    pub fn ensure_available(&self) -> bool {
        self.mutator_path.is_file()
    }

    /// Mutates `input` deterministically given `seed`.
    ///
    /// `seed` must be `>= 0`; the no-mutation sentinel (`-1`) is the
    /// driver's responsibility, not this engine's.
    pub fn mutate(&self, input: &[u8], seed: i64) -> Result<Vec<u8>, MutatorError> {
        debug_assert!(seed >= 0, "seed -1 must bypass the mutation engine");

        let mut child = Command::new(&self.mutator_path)
            .arg("--seed")
            .arg(seed.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|_| MutatorError::MutatorFailed)?;

        {
            let stdin = child.stdin.as_mut().ok_or(MutatorError::MutatorFailed)?;
            stdin.write_all(input).map_err(|_| MutatorError::MutatorFailed)?;
        }

        let output = child.wait_with_output().map_err(|_| MutatorError::MutatorFailed)?;

        if !output.status.success() || output.stdout.is_empty() {
            return Err(MutatorError::MutatorFailed);
        }

        Ok(output.stdout)
    }
}
