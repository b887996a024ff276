//! Best-effort handling of instrumentation side effects.
//!
//! Sink failures must never reach the caller of an instrumented operation.
//! They are logged and dropped here instead of being silently ignored.

use calltally_core::Result;

pub trait BestEffort {
    /// Log and discard an error; `what` names the dropped side effect.
    fn best_effort(self, what: &'static str);
}

impl BestEffort for Result<()> {
    fn best_effort(self, what: &'static str) {
        if let Err(e) = self {
            tracing::warn!(code = e.code().as_str(), error = %e, "{} failed, metric dropped", what);
        }
    }
}
