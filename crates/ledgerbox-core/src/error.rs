//! Error types for the Ledgerbox core.

/// Reason a context-bound future stopped before producing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    /// The context (or one of its ancestors) was cancelled.
    #[error("context cancelled")]
    Cancelled,

    /// The context deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}
