//! Internal error taxonomy for storage operations.
//!
//! [`StoreError`] never crosses the [`KeyValueStore`](crate::store::KeyValueStore)
//! boundary: every public operation degrades to an absent/false result
//! instead. The enum exists so the retry machinery can distinguish failure
//! modes and so log output carries the underlying cause.

use std::time::Duration;

/// Errors raised by the remote backend's connection and command plumbing.
///
/// Callers of the public store API never see these; they are logged at the
/// point where an operation gives up and the result collapses to absent.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Establishing (or re-establishing) the server connection failed.
    #[error("redis connection failed: {0}")]
    Connection(#[source] redis::RedisError),

    /// A command was sent but the server reported an error or the link broke.
    #[error("redis command failed: {0}")]
    Command(#[source] redis::RedisError),

    /// The operation did not finish within its time budget.
    #[error("{op} timed out after {after:?}")]
    Timeout {
        /// The command or phase that timed out.
        op: &'static str,
        /// The budget that elapsed.
        after: Duration,
    },
}
