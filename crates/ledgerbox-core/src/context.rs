//! Cancellable, deadline-bearing execution context.
//!
//! A [`Context`] pairs a [`CancellationToken`] with an optional deadline.
//! Derived contexts ([`Context::child`], [`Context::with_timeout`],
//! [`Context::with_deadline`]) hold a child token, so cancelling a derived
//! context never affects its parent while cancelling the parent reaches
//! every descendant. A derived deadline can only tighten, never extend, the
//! parent's deadline.
//!
//! Storage operations bound themselves with [`Context::scope`], which returns
//! a [`Scope`]: the derived context plus a drop guard that cancels it on
//! every exit path.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use ledgerbox_core::{Context, Interrupted};
//!
//! # tokio_test::block_on(async {
//! let ctx = Context::background();
//! let scope = ctx.scope(Duration::from_millis(10));
//!
//! let result = scope.run(std::future::pending::<()>()).await;
//! assert_eq!(result, Err(Interrupted::DeadlineExceeded));
//! # });
//! ```

use std::future::Future;
use std::ops::Deref;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::trace;

use crate::error::Interrupted;

/// Execution context passed into every storage operation.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A root context with no deadline that is never cancelled unless
    /// [`cancel`](Self::cancel) is called on it.
    #[must_use]
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A root context driven by an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a context that can be cancelled independently of `self`.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a context whose deadline is at most `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Derive a context whose deadline is the earlier of `deadline` and the
    /// current one.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = self
            .deadline
            .map_or(deadline, |current| current.min(deadline));
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a bounded scope for a single operation.
    ///
    /// The scope's deadline is the smaller of the remaining time on `self`
    /// and `timeout`. Dropping the scope cancels its token, releasing any
    /// work still attached to it.
    #[must_use]
    pub fn scope(&self, timeout: Duration) -> Scope {
        let ctx = self.with_timeout(timeout);
        let guard = ctx.token.clone().drop_guard();
        Scope { ctx, _guard: guard }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether this context (or an ancestor) has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, saturating at zero.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has already passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// The underlying cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Drive `fut` until it completes, the context is cancelled, or the
    /// deadline elapses, whichever happens first.
    ///
    /// Cancellation wins over the deadline, and both win over a future that
    /// becomes ready in the same poll.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }

        let deadline = self.deadline;
        let expiry = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Interrupted::Cancelled),
            () = expiry => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        };

        if let Err(reason) = &outcome {
            trace!(%reason, "context interrupted future");
        }
        outcome
    }

    /// Sleep for `duration`, returning early if the context ends first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.run(tokio::time::sleep(duration)).await
    }
}

/// A context bound to a single operation.
///
/// Dereferences to [`Context`]. The scope's token is cancelled when the
/// scope is dropped, whether the operation succeeded, failed, or timed out.
#[derive(Debug)]
pub struct Scope {
    ctx: Context,
    _guard: DropGuard,
}

impl Scope {
    /// The scoped context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

impl Deref for Scope {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}
