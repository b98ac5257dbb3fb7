//! Results of side operations that must never fail the primary flow.
//!
//! A failed best-effort step (stamping `last_login_at`, removing a rotated
//! refresh token) is logged here once and then handed back as a value the
//! caller inspects or drops explicitly.

use tracing::warn;

use super::AuthError;

/// Outcome of a best-effort operation.
#[must_use = "inspect the outcome or call `.ignore()` to discard it"]
#[derive(Debug)]
pub struct NonFatal<T> {
    op: &'static str,
    outcome: Option<T>,
}

impl<T> NonFatal<T> {
    /// Record the result of `op`, logging a failure as a warning.
    pub fn from_result(op: &'static str, result: Result<T, AuthError>) -> Self {
        let outcome = match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(op, error = %e, "best-effort operation failed; continuing");
                None
            }
        };
        Self { op, outcome }
    }

    /// Name of the operation.
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Whether the operation failed.
    pub fn failed(&self) -> bool {
        self.outcome.is_none()
    }

    /// The value, if the operation succeeded.
    pub fn ok(self) -> Option<T> {
        self.outcome
    }

    /// Discard the outcome.
    pub fn ignore(self) {}
}
