//! Confirmation polling.
//!
//! Bucket creation and bucket/object deletion are accepted by S3 before they
//! are visible to every reader. [`wait_for_presence`] closes that gap: it
//! probes existence until the wanted [`Presence`] is observed, the attempt
//! budget in [`WaitPolicy`] runs out, or the context ends.

use std::future::Future;
use std::time::Duration;

use ledgerbox_core::Context;
use serde::{Deserialize, Serialize};
use tracing::trace;
use typed_builder::TypedBuilder;

use crate::error::{Operation, StorageError, StorageResult};

/// Whether a bucket or object is currently visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The resource exists.
    Present,
    /// The resource does not exist.
    Absent,
}

/// Polling cadence for existence confirmation.
///
/// The defaults match the standard S3 `BucketExists`/`ObjectNotExists`
/// waiters: a 5 second delay between probes and at most 20 probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct WaitPolicy {
    /// Delay between consecutive probes.
    #[builder(default = Duration::from_secs(5))]
    pub interval: Duration,
    /// Maximum number of probes, the first one included.
    #[builder(default = 20)]
    pub max_attempts: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 20,
        }
    }
}

/// Probe until `want` is observed.
///
/// The first probe is issued immediately. Probe errors end the wait and are
/// returned as-is; an interrupted probe or delay maps to
/// [`StorageError::Timeout`] or [`StorageError::Cancelled`].
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// use ledgerbox_core::Context;
/// use ledgerbox_storage::error::Operation;
/// use ledgerbox_storage::wait::{wait_for_presence, Presence, WaitPolicy};
///
/// # tokio_test::block_on(async {
/// let probes = AtomicU32::new(0);
/// let policy = WaitPolicy::builder().interval(Duration::from_millis(1)).build();
///
/// wait_for_presence(&Context::background(), policy, Operation::CreateBucket, Presence::Present, || async {
///     let n = probes.fetch_add(1, Ordering::SeqCst);
///     Ok(if n >= 2 { Presence::Present } else { Presence::Absent })
/// })
/// .await
/// .unwrap();
///
/// assert_eq!(probes.load(Ordering::SeqCst), 3);
/// # });
/// ```
pub async fn wait_for_presence<F, Fut>(
    ctx: &Context,
    policy: WaitPolicy,
    operation: Operation,
    want: Presence,
    mut probe: F,
) -> StorageResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<Presence>>,
{
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        let seen = ctx
            .run(probe())
            .await
            .map_err(|reason| StorageError::interrupted(operation, reason))??;

        trace!(%operation, attempt, ?seen, ?want, "existence probe");
        if seen == want {
            return Ok(());
        }

        if attempt < attempts {
            ctx.sleep(policy.interval)
                .await
                .map_err(|reason| StorageError::interrupted(operation, reason))?;
        }
    }

    Err(StorageError::ConfirmationExhausted {
        operation,
        attempts,
    })
}
