//! Run cancellation.
//!
//! A `CancelToken` is observed between network fetches and before each
//! subprocess invocation. A cancelled token causes a mid-flight
//! subprocess to be killed rather than leaked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

/// The run was cancelled by the caller.
#[derive(Debug, Error, Diagnostic)]
#[error("operation cancelled")]
#[diagnostic(code(moor::cancelled))]
pub struct Cancelled;

/// Cheap, cloneable cancellation flag shared across a run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Error out if the token has been cancelled; called at suspension
    /// points.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_live() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.check().is_err());
    }
}
