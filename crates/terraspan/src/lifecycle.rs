//! Lifecycle controller: init → plan/apply → destroy.
//!
//! The controller drives one [`Session`] through the provisioning engine's
//! command interface and upholds the cleanup guarantee. State transitions
//! are enforced here and nowhere else:
//!
//! ```text
//! Uninitialized --init--> Initialized --apply--> Applied
//!                             |
//!                             +------plan--> Planned
//! any state --destroy--> Destroyed
//! any state --unretryable error--> Failed (only destroy is valid after)
//! ```
//!
//! Transient engine failures (API throttling, eventual-consistency races
//! during resource creation) are retried transparently under the session's
//! [`RetryPolicy`]; everything else propagates immediately with the
//! engine's stdout/stderr surfaced verbatim. Every error that escapes this
//! module is fatal to the calling test.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::engine::{
    apply_args, destroy_args, init_args, output_args, plan_args, CommandOutput, EngineError,
    EngineRequest, EngineRunner, TerraformCli,
};
use crate::outputs::OutputSet;
use crate::session::{LifecycleState, Session};

/// Engine error classes worth retrying by default: transient API
/// throttling and connection-level races seen across providers.
const DEFAULT_RETRYABLE_PATTERNS: &[&str] = &[
    "(?i)throttl",
    "RequestLimitExceeded",
    "(?i)too many requests",
    "connection reset by peer",
    "TLS handshake timeout",
    "timeout while waiting for state",
    "(?i)temporarily unavailable",
    "ResourceNotReady",
];

// The pattern literals are compile-checked by a unit test, so the expect
// cannot fire at runtime.
#[allow(clippy::expect_used)]
static DEFAULT_RETRYABLE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DEFAULT_RETRYABLE_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("default retryable pattern"))
        .collect()
});

/// Backoff strategy between engine retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Sleep the same interval every time.
    Fixed,
    /// Double the interval after each attempt, capped at `max_interval`.
    Exponential { max_interval: Duration },
}

/// Bounded retry budget for engine invocations, configured per session.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_interval: Duration,
    backoff: Backoff,
    patterns: Vec<Regex>,
}

impl RetryPolicy {
    /// No retries: every engine failure is fatal on the first attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_interval: Duration::from_secs(5),
            backoff: Backoff::Fixed,
            patterns: Vec::new(),
        }
    }

    /// Three attempts, five seconds apart, retrying the stock set of
    /// transient engine errors.
    pub fn default_retryable() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(5),
            backoff: Backoff::Fixed,
            patterns: DEFAULT_RETRYABLE.clone(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Add a retryable-error pattern on top of the existing set.
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn initial_interval(&self) -> Duration {
        self.initial_interval
    }

    pub(crate) fn is_retryable(&self, engine_output: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(engine_output))
    }

    pub(crate) fn next_interval(&self, current: Duration) -> Duration {
        match self.backoff {
            Backoff::Fixed => current,
            Backoff::Exponential { max_interval } => (current * 2).min(max_interval),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// An engine invocation failed fatally.
///
/// Retryable failures are consumed inside the controller's retry loop;
/// whatever escapes carries the engine's stdout/stderr verbatim and marks
/// the session [`LifecycleState::Failed`].
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(
        "engine {operation} exited with code {exit_code} after {attempts} attempt(s)\n\
         --- stdout ---\n{stdout}\n--- stderr ---\n{stderr}"
    )]
    CommandFailed {
        operation: &'static str,
        exit_code: i32,
        attempts: u32,
        stdout: String,
        stderr: String,
    },

    #[error("cannot {operation} a session in state '{state}'")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error("engine output was unreadable: {0}")]
    UnreadableOutputs(#[from] crate::outputs::ValidationError),
}

/// Destroy failed after the test body already ran.
///
/// Reported distinctly from the primary result: it means billable cloud
/// resources may have leaked and need manual intervention.
#[derive(Debug, Error)]
#[error("destroy failed in '{}': {source}", .working_dir.display())]
pub struct CleanupError {
    pub working_dir: PathBuf,
    #[source]
    pub source: ProvisioningError,
}

/// Result of a dry run.
///
/// Deliberately opaque: plan output is not equivalent to applied output
/// and must not be treated as one, so there are no key/value accessors
/// here — only the engine's rendered plan for logging or substring checks.
#[derive(Debug, Clone)]
pub struct PlanReport {
    raw: String,
}

impl PlanReport {
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Drives sessions through the provisioning engine.
///
/// Stateless apart from the runner, so one controller may serve many
/// sessions; each session's ordering guarantees come from `&mut Session`.
#[derive(Debug)]
pub struct Controller<R: EngineRunner = TerraformCli> {
    runner: R,
}

impl Controller<TerraformCli> {
    /// A controller over the `terraform` binary on `PATH`.
    pub fn new() -> Self {
        Self {
            runner: TerraformCli::new(),
        }
    }
}

impl Default for Controller<TerraformCli> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: EngineRunner> Controller<R> {
    /// A controller over a custom engine runner (alternative binary, or a
    /// scripted engine in tests).
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Initialize the session's working directory.
    pub fn init(&self, session: &mut Session) -> Result<(), ProvisioningError> {
        self.expect_state(session, "init", &[LifecycleState::Uninitialized])?;
        self.run_step(session, "init", init_args(session.colored_output()))?;
        session.set_state(LifecycleState::Initialized);
        Ok(())
    }

    /// Dry-run the configuration. No real infrastructure is touched and no
    /// output set is produced.
    pub fn plan(&self, session: &mut Session) -> Result<PlanReport, ProvisioningError> {
        self.expect_state(
            session,
            "plan",
            &[LifecycleState::Initialized, LifecycleState::Planned],
        )?;
        let output = self.run_step(
            session,
            "plan",
            plan_args(session.variables(), session.colored_output()),
        )?;
        session.set_state(LifecycleState::Planned);
        Ok(PlanReport { raw: output.stdout })
    }

    /// Apply the configuration and read back the output set.
    ///
    /// The previous apply's outputs (if any) are discarded before the
    /// engine runs, so a stale set can never be consulted afterwards.
    pub fn apply(&self, session: &mut Session) -> Result<OutputSet, ProvisioningError> {
        self.expect_state(
            session,
            "apply",
            &[
                LifecycleState::Initialized,
                LifecycleState::Planned,
                LifecycleState::Applied,
            ],
        )?;

        session.clear_outputs();
        session.mark_apply_attempted();
        self.run_step(
            session,
            "apply",
            apply_args(session.variables(), session.colored_output()),
        )?;

        let raw = self.run_step(session, "output", output_args(None, session.colored_output()))?;
        let outputs = match OutputSet::from_engine_json(&raw.stdout) {
            Ok(outputs) => outputs,
            Err(error) => {
                session.set_state(LifecycleState::Failed);
                return Err(ProvisioningError::UnreadableOutputs(error));
            }
        };

        session.store_outputs(outputs.clone());
        session.set_state(LifecycleState::Applied);
        tracing::info!(
            working_dir = %session.working_dir().display(),
            outputs = outputs.len(),
            "environment applied"
        );
        Ok(outputs)
    }

    /// `init` followed by `apply`.
    pub fn init_and_apply(&self, session: &mut Session) -> Result<OutputSet, ProvisioningError> {
        self.init(session)?;
        self.apply(session)
    }

    /// `init` followed by `plan`, for tests that validate configuration
    /// shape without creating real resources.
    pub fn init_and_plan(&self, session: &mut Session) -> Result<PlanReport, ProvisioningError> {
        self.init(session)?;
        self.plan(session)
    }

    /// Re-read a single named output from the engine.
    ///
    /// Only valid while the session is applied; prefer the [`OutputSet`]
    /// returned by [`Controller::apply`] unless an external actor may have
    /// changed the environment since.
    pub fn read_output(
        &self,
        session: &Session,
        key: &str,
    ) -> Result<serde_json::Value, ProvisioningError> {
        self.expect_state(session, "read outputs of", &[LifecycleState::Applied])?;
        let raw = self.run_with_retries(
            session,
            "output",
            output_args(Some(key), session.colored_output()),
        )?;
        serde_json::from_str(&raw.stdout).map_err(|e| {
            ProvisioningError::UnreadableOutputs(crate::outputs::ValidationError::Malformed {
                reason: e.to_string(),
            })
        })
    }

    /// Tear the environment down.
    ///
    /// Idempotent: destroying a destroyed session is a no-op, and a
    /// session that never attempted an apply transitions straight to
    /// `Destroyed` without invoking the engine (plan-only tests create
    /// nothing to delete). A failed apply still destroys for real, since
    /// partial resources may exist.
    pub fn destroy(&self, session: &mut Session) -> Result<(), CleanupError> {
        if session.state() == LifecycleState::Destroyed {
            return Ok(());
        }

        if !session.apply_attempted() {
            tracing::debug!(
                working_dir = %session.working_dir().display(),
                "no apply was attempted; destroy is a no-op"
            );
            session.set_state(LifecycleState::Destroyed);
            return Ok(());
        }

        match self.run_with_retries(
            session,
            "destroy",
            destroy_args(session.variables(), session.colored_output()),
        ) {
            Ok(_) => {
                session.clear_outputs();
                session.set_state(LifecycleState::Destroyed);
                tracing::info!(
                    working_dir = %session.working_dir().display(),
                    "environment destroyed"
                );
                Ok(())
            }
            // State is left as-is so the caller may retry the destroy.
            Err(source) => Err(CleanupError {
                working_dir: session.working_dir().to_path_buf(),
                source,
            }),
        }
    }

    /// Wrap a session in a guard that destroys it on every exit path.
    pub fn scoped(&self, session: Session) -> ScopedSession<'_, R> {
        ScopedSession {
            controller: self,
            session,
        }
    }

    fn expect_state(
        &self,
        session: &Session,
        operation: &'static str,
        allowed: &[LifecycleState],
    ) -> Result<(), ProvisioningError> {
        if allowed.contains(&session.state()) {
            Ok(())
        } else {
            Err(ProvisioningError::InvalidState {
                operation,
                state: session.state(),
            })
        }
    }

    /// Run one engine step and mark the session failed if it errors.
    fn run_step(
        &self,
        session: &mut Session,
        operation: &'static str,
        args: Vec<String>,
    ) -> Result<CommandOutput, ProvisioningError> {
        let result = self.run_with_retries(session, operation, args);
        if result.is_err() {
            session.set_state(LifecycleState::Failed);
        }
        result
    }

    /// Invoke the engine, retrying transient failures under the session's
    /// policy. This loop and the convergence poller are the only loci of
    /// automatic recovery in the harness.
    fn run_with_retries(
        &self,
        session: &Session,
        operation: &'static str,
        args: Vec<String>,
    ) -> Result<CommandOutput, ProvisioningError> {
        let policy = session.retry_policy();
        let max_attempts = policy.max_attempts();
        let mut interval = policy.initial_interval();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request = EngineRequest {
                working_dir: session.working_dir().to_path_buf(),
                args: args.clone(),
                env: session.env().clone(),
            };
            let output = self.runner.run(&request)?;

            if output.success() {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "engine succeeded after retry");
                }
                return Ok(output);
            }

            if attempt < max_attempts && policy.is_retryable(&output.combined()) {
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    interval_secs = interval.as_secs_f64(),
                    "transient engine error, retrying"
                );
                thread::sleep(interval);
                interval = policy.next_interval(interval);
                continue;
            }

            return Err(ProvisioningError::CommandFailed {
                operation,
                exit_code: output.exit_code,
                attempts: attempt,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
    }
}

/// RAII guard over a session: destroys it when the guard goes out of
/// scope, whether the owning test returns normally or unwinds from a
/// failed assertion. A destroy failure during scope exit is logged loudly
/// instead of masking the primary test result; call
/// [`ScopedSession::destroy`] explicitly to observe the [`CleanupError`].
pub struct ScopedSession<'c, R: EngineRunner> {
    controller: &'c Controller<R>,
    session: Session,
}

impl<R: EngineRunner> ScopedSession<'_, R> {
    pub fn init_and_apply(&mut self) -> Result<OutputSet, ProvisioningError> {
        self.controller.init_and_apply(&mut self.session)
    }

    pub fn init_and_plan(&mut self) -> Result<PlanReport, ProvisioningError> {
        self.controller.init_and_plan(&mut self.session)
    }

    pub fn apply(&mut self) -> Result<OutputSet, ProvisioningError> {
        self.controller.apply(&mut self.session)
    }

    pub fn plan(&mut self) -> Result<PlanReport, ProvisioningError> {
        self.controller.plan(&mut self.session)
    }

    pub fn read_output(&self, key: &str) -> Result<serde_json::Value, ProvisioningError> {
        self.controller.read_output(&self.session, key)
    }

    /// Destroy now and surface any cleanup failure. The eventual drop
    /// becomes a no-op afterwards.
    pub fn destroy(&mut self) -> Result<(), CleanupError> {
        self.controller.destroy(&mut self.session)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn outputs(&self) -> Option<&OutputSet> {
        self.session.outputs()
    }
}

impl<R: EngineRunner> Drop for ScopedSession<'_, R> {
    fn drop(&mut self) {
        if let Err(error) = self.controller.destroy(&mut self.session) {
            // Never panic out of drop; make the leak impossible to miss.
            tracing::error!(
                working_dir = %self.session.working_dir().display(),
                %error,
                "destroy failed during scope exit; cloud resources may have leaked and require manual cleanup"
            );
        }
    }
}
