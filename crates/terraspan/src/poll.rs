//! Convergence polling for eventually-consistent resources.
//!
//! "Apply returned success" does not mean "the resource is usable": DNS
//! still has to propagate, load balancer health checks have to pass, nodes
//! have to register. [`poll_until`] bridges that gap with a bounded,
//! synchronous retry loop: invoke the probe, sleep a fixed interval, try
//! again, up to an attempt budget. The probe is re-run fresh each attempt
//! and may perform real network I/O; transient probe failures and
//! "not yet ready" results are treated identically as retry triggers.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Terminal outcomes of a polling loop.
#[derive(Debug, Error)]
pub enum PollError<E>
where
    E: fmt::Debug + fmt::Display,
{
    /// The attempt budget ran out. The final probe's error is attached as
    /// the cause; intermediate failures are discarded.
    #[error("'{description}' did not succeed after {attempts} attempts, last error: {cause}")]
    Timeout {
        description: String,
        attempts: u32,
        cause: E,
    },

    /// The caller's [`CancelToken`] fired between attempts.
    #[error("'{description}' cancelled after {attempts} attempts")]
    Cancelled { description: String, attempts: u32 },
}

impl<E> PollError<E>
where
    E: fmt::Debug + fmt::Display,
{
    /// Number of probe invocations that ran before the loop gave up.
    pub fn attempts(&self) -> u32 {
        match self {
            PollError::Timeout { attempts, .. } | PollError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Cooperative cancellation flag for [`poll_until_cancellable`].
///
/// Cloning shares the flag, so one side of a test can abort another side's
/// long wait (e.g. a 30×10s convergence loop) on an unrelated fatal error.
/// The token is only observed between attempts; it does not interrupt a
/// probe that is already running.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Retry `probe` until it succeeds, sleeping `interval` between attempts.
///
/// Returns the first successful probe value; prior failed attempts are
/// discarded. Fails with [`PollError::Timeout`] once `max_attempts` probe
/// invocations have failed, with the final error attached. The wait is
/// blocking from the caller's perspective; a bounded attempt count is the
/// sole stopping condition.
///
/// A probe that succeeds on the k-th call returns after exactly k
/// invocations and roughly `(k - 1) * interval` of sleeping.
pub fn poll_until<T, E, F>(
    description: &str,
    max_attempts: u32,
    interval: Duration,
    probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Result<T, E>,
    E: fmt::Debug + fmt::Display,
{
    poll_loop(description, max_attempts, interval, None, probe)
}

/// [`poll_until`], but aborting early when `cancel` fires.
///
/// Cancellation is checked before each attempt and again before each
/// sleep, so a cancelled loop never starts a new probe or a new wait.
pub fn poll_until_cancellable<T, E, F>(
    description: &str,
    max_attempts: u32,
    interval: Duration,
    cancel: &CancelToken,
    probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Result<T, E>,
    E: fmt::Debug + fmt::Display,
{
    poll_loop(description, max_attempts, interval, Some(cancel), probe)
}

fn poll_loop<T, E, F>(
    description: &str,
    max_attempts: u32,
    interval: Duration,
    cancel: Option<&CancelToken>,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Result<T, E>,
    E: fmt::Debug + fmt::Display,
{
    // A zero budget would have no error to attach; treat it as one attempt.
    let max_attempts = max_attempts.max(1);
    let mut last_error: Option<E> = None;

    for attempt in 1..=max_attempts {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(PollError::Cancelled {
                    description: description.to_string(),
                    attempts: attempt - 1,
                });
            }
        }

        match probe() {
            Ok(value) => {
                tracing::debug!(description, attempt, "probe succeeded");
                return Ok(value);
            }
            Err(error) => {
                tracing::debug!(description, attempt, max_attempts, %error, "probe failed");
                last_error = Some(error);
            }
        }

        if attempt < max_attempts {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(PollError::Cancelled {
                        description: description.to_string(),
                        attempts: attempt,
                    });
                }
            }
            thread::sleep(interval);
        }
    }

    match last_error {
        Some(cause) => Err(PollError::Timeout {
            description: description.to_string(),
            attempts: max_attempts,
            cause,
        }),
        // Unreachable in practice: the loop always records an error before
        // falling through. Kept as a typed fallback instead of a panic.
        None => Err(PollError::Cancelled {
            description: description.to_string(),
            attempts: 0,
        }),
    }
}
