//! Shared utilities: cancellation, diagnostics, filesystem helpers, and
//! subprocess execution.

pub mod cancel;
pub mod diagnostic;
pub mod fs;
pub mod process;

pub use cancel::CancelToken;
pub use diagnostic::Diagnostic;
pub use process::ProcessBuilder;
