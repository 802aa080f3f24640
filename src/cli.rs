//! Command-line surface (§6). Named as an external collaborator in the
//! distilled spec; implemented here with `clap` derive so the binary is
//! runnable (SPEC_FULL.md §A).

use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "replayfuzz", about = "Replay and mutate a recorded multi-message conversation against a live target")]
pub struct Cli {
    /// Path to the `.fuzzer` file produced by the prep step.
    #[arg(long = "prepped-fuzz", value_name = "PATH")]
    pub prepped_fuzz: PathBuf,

    /// Target host to connect to.
    #[arg(long = "target-host", value_name = "ADDR")]
    pub target_host: String,

    /// Path to the external mutator binary, looked up on `PATH` by
    /// default.
    #[arg(long = "mutator", value_name = "PATH", default_value = "radamsa")]
    pub mutator: PathBuf,

    /// Seconds to sleep between iterations.
    #[arg(long = "sleep-time", value_name = "SECONDS", default_value_t = 0.0)]
    pub sleep_time: f64,

    /// Inclusive seed range: `A-B`, `A-` (unbounded upper), or `A` (exactly one seed).
    #[arg(long = "range", value_name = "RANGE")]
    pub range: Option<String>,

    /// Comma/range list of seeds to loop over, e.g. `0,2-4`.
    #[arg(long = "loop", value_name = "LIST")]
    pub loop_seeds: Option<String>,

    /// Perform a single run with this exact seed, dump its wire bytes, and exit.
    #[arg(long = "dump-raw", value_name = "SEED")]
    pub dump_raw: Option<i64>,

    /// Don't write iteration logs; dump-raw artifacts go to `dumpraw/` instead.
    #[arg(long)]
    pub quiet: bool,

    /// Write the iteration log after every run, not just on crash/halt.
    #[arg(long = "log-all")]
    pub log_all: bool,
}

/// Resolved run-numbering bounds plus the optional seed-loop list (§4.6).
#[derive(Debug, Clone)]
pub struct RunBounds {
    pub min_run: i64,
    pub max_run: i64,
    pub loop_seeds: Option<Vec<i64>>,
}

impl Cli {
    pub fn resolve_run_bounds(&self) -> Result<RunBounds, ConfigError> {
        let (min_run, max_run) = match &self.range {
            Some(range) => parse_range(range)?,
            None => (0, -1),
        };
        let loop_seeds = match &self.loop_seeds {
            Some(list) => Some(parse_loop_list(list)?),
            None => None,
        };
        Ok(RunBounds { min_run, max_run, loop_seeds })
    }
}

/// Parses `--range`: `A-B`, `A-` (unbounded upper, `-1`), or bare `A`.
fn parse_range(s: &str) -> Result<(i64, i64), ConfigError> {
    if let Some((lo, hi)) = s.split_once('-') {
        let lo: i64 = lo.parse().map_err(|_| ConfigError::InvalidRange(s.to_string()))?;
        if hi.is_empty() {
            return Ok((lo, -1));
        }
        let hi: i64 = hi.parse().map_err(|_| ConfigError::InvalidRange(s.to_string()))?;
        if lo > hi {
            return Err(ConfigError::InvalidRange(s.to_string()));
        }
        Ok((lo, hi))
    } else {
        let v: i64 = s.parse().map_err(|_| ConfigError::InvalidRange(s.to_string()))?;
        Ok((v, v))
    }
}

/// Parses `--loop`: a comma-separated list of seeds and/or `A-B` ranges,
/// e.g. `0,2-4` -> `[0, 2, 3, 4]`.
fn parse_loop_list(s: &str) -> Result<Vec<i64>, ConfigError> {
    let mut out = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((lo, hi)) = part.split_once('-') {
            let lo: i64 = lo.parse().map_err(|_| ConfigError::InvalidLoop(s.to_string()))?;
            let hi: i64 = hi.parse().map_err(|_| ConfigError::InvalidLoop(s.to_string()))?;
            if lo > hi {
                return Err(ConfigError::InvalidLoop(s.to_string()));
            }
            out.extend(lo..=hi);
        } else {
            out.push(part.parse().map_err(|_| ConfigError::InvalidLoop(s.to_string()))?);
        }
    }
    if out.is_empty() {
        return Err(ConfigError::InvalidLoop(s.to_string()));
    }
    Ok(out)
}

/// Distinguished process exit codes (§6).
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const MUTATOR_NOT_FOUND: i32 = 3;
    pub const INVALID_RANGE: i32 = 4;
    pub const IO_SETUP_FAILURE: i32 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_range_bounded() {
        assert_eq!(parse_range("1-50").unwrap(), (1, 50));
    }

    #[test]
    fn parse_range_unbounded_upper() {
        assert_eq!(parse_range("3-").unwrap(), (3, -1));
    }

    #[test]
    fn parse_range_exact() {
        assert_eq!(parse_range("7").unwrap(), (7, 7));
    }

    #[test]
    fn parse_range_rejects_inverted_bounds() {
        assert!(parse_range("50-1").is_err());
    }

    #[test]
    fn parse_loop_list_expands_ranges() {
        assert_eq!(parse_loop_list("0,2-4").unwrap(), vec![0, 2, 3, 4]);
    }

    #[test]
    fn parse_loop_list_rejects_garbage() {
        assert!(parse_loop_list("a-b").is_err());
    }
}
