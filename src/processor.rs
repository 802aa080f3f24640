//! User-supplied hooks invoked at fixed points during a run (§4.5).
//!
//! All hooks are optional; the default implementations are identity
//! (byte-transforming hooks) or no-ops (side-effect-only hooks). `ctx`
//! snapshots are recomputed immediately before each hook call so a
//! mutation performed by hook *k-1* is visible to hook *k* (§4.5).

use crate::error::ControlSignal;

/// Context passed to every [`MessageProcessor`] hook.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub iteration: i64,
    /// Subcomponent index, or `-1` for the whole-message path.
    pub subcomponent_index: i32,
    pub is_fuzzed: bool,
    pub original_subcomponents: Vec<Vec<u8>>,
    pub altered_subcomponents: Vec<Vec<u8>>,
}

impl HookContext {
    pub fn whole_message(iteration: i64, is_fuzzed: bool, original: Vec<Vec<u8>>, altered: Vec<Vec<u8>>) -> Self {
        Self {
            iteration,
            subcomponent_index: -1,
            is_fuzzed,
            original_subcomponents: original,
            altered_subcomponents: altered,
        }
    }

    pub fn subcomponent(iteration: i64, index: usize, is_fuzzed: bool, original: Vec<Vec<u8>>, altered: Vec<Vec<u8>>) -> Self {
        Self {
            iteration,
            subcomponent_index: index as i32,
            is_fuzzed,
            original_subcomponents: original,
            altered_subcomponents: altered,
        }
    }
}

/// A `Result` whose error is a driver-visible control signal (§9: hooks
/// that need to signal the driver return `Result<T, ControlSignal>`
/// rather than raising).
pub type HookResult<T> = Result<T, ControlSignal>;

/// User-supplied callbacks invoked at fixed points (§4.5). Every method
/// defaults to identity (byte-transforming) or no-op (side-effect-only).
pub trait MessageProcessor: Send {
    fn pre_connect(&mut self, _seed: i64, _host: &str, _port: u16) -> HookResult<()> {
        Ok(())
    }

    fn pre_fuzz_process(&mut self, bytes: Vec<u8>, _ctx: &HookContext) -> HookResult<Vec<u8>> {
        Ok(bytes)
    }

    fn pre_fuzz_subcomponent_process(&mut self, bytes: Vec<u8>, _ctx: &HookContext) -> HookResult<Vec<u8>> {
        Ok(bytes)
    }

    fn pre_send_process(&mut self, bytes: Vec<u8>, _ctx: &HookContext) -> HookResult<Vec<u8>> {
        Ok(bytes)
    }

    fn pre_send_subcomponent_process(&mut self, bytes: Vec<u8>, _ctx: &HookContext) -> HookResult<Vec<u8>> {
        Ok(bytes)
    }

    fn post_receive_process(&mut self, _bytes: &[u8], _ctx: &HookContext) -> HookResult<()> {
        Ok(())
    }
}

/// Identity processor: every hook's default behavior, with nothing
/// overridden. Used when the processor directory supplies none.
#[derive(Debug, Default)]
pub struct IdentityProcessor;

impl MessageProcessor for IdentityProcessor {}

/// Handles any in-run exception that isn't already a [`ControlSignal`]
/// (§4.5, §7). May re-raise a control signal or swallow the exception,
/// in which case the run is considered to have completed normally.
pub trait ExceptionProcessor: Send {
    fn process_exception(&mut self, error: &crate::error::RunError) -> Option<ControlSignal>;
}

/// Default exception processor: swallows everything (matches the
/// Python original's behavior when no custom processor is installed --
/// `process_exception` is a no-op unless overridden).
#[derive(Debug, Default)]
pub struct SwallowingExceptionProcessor;

impl ExceptionProcessor for SwallowingExceptionProcessor {
    fn process_exception(&mut self, _error: &crate::error::RunError) -> Option<ControlSignal> {
        None
    }
}

/// An exception processor that converts any transport failure into an
/// `AbortRun`, a common, minimal customization (kept here as a
/// ready-to-use building block, not a default).
#[derive(Debug, Default)]
pub struct AbortOnTransportError;

impl ExceptionProcessor for AbortOnTransportError {
    fn process_exception(&mut self, error: &crate::error::RunError) -> Option<ControlSignal> {
        match error {
            crate::error::RunError::Connection(e) => Some(ControlSignal::AbortRun(e.to_string())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionError;

    #[test]
    fn identity_processor_passes_bytes_through() {
        let mut proc = IdentityProcessor;
        let ctx = HookContext::whole_message(0, false, vec![vec![1, 2]], vec![vec![1, 2]]);
        assert_eq!(proc.pre_fuzz_process(vec![1, 2], &ctx).unwrap(), vec![1, 2]);
        assert_eq!(proc.pre_send_process(vec![3, 4], &ctx).unwrap(), vec![3, 4]);
    }

    #[test]
    fn swallowing_exception_processor_swallows() {
        let mut proc = SwallowingExceptionProcessor;
        let err = crate::error::RunError::Connection(ConnectionError::SendTimeout);
        assert!(proc.process_exception(&err).is_none());
    }

    #[test]
    fn abort_on_transport_error_converts_connection_errors() {
        let mut proc = AbortOnTransportError;
        let err = crate::error::RunError::Connection(ConnectionError::SendTimeout);
        assert!(matches!(proc.process_exception(&err), Some(ControlSignal::AbortRun(_))));
    }
}
