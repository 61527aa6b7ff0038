//! Version-control integration.
//!
//! All git interaction is subprocess calls with the project root as the
//! working directory. Failures are recoverable: callers log them and carry
//! on without version control.

mod adapter;
mod error;

pub use adapter::{CommitSummary, GitAdapter, RevertTarget};
pub use error::GitError;
