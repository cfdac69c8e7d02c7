//! Provisioning sessions.
//!
//! A [`Session`] wraps one logical ephemeral environment: the working
//! directory handed to the provisioning engine, the variable set, the
//! environment overrides, and the lifecycle state. A session is owned
//! exclusively by the test that created it and is only mutated by the
//! lifecycle controller's init/plan/apply/destroy calls.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::lifecycle::RetryPolicy;
use crate::outputs::OutputSet;

/// Lifecycle state of a session.
///
/// Sessions only move forward except on failure, which may terminate the
/// sequence early. `Destroyed` must eventually be reached from any
/// non-terminal state once real resources were applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    Planned,
    Applied,
    Destroyed,
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Planned => "planned",
            LifecycleState::Applied => "applied",
            LifecycleState::Destroyed => "destroyed",
            LifecycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One logical ephemeral environment under test.
///
/// Built with chained setters, in the spirit of the engine's own option
/// structs:
///
/// ```
/// use terraspan::session::Session;
/// use terraspan::lifecycle::RetryPolicy;
///
/// let session = Session::new("infra/modules/network/aws")
///     .with_var("environment", "test")
///     .with_var("vpc_cidr", "10.0.0.0/16")
///     .with_env("AWS_DEFAULT_REGION", "us-east-1")
///     .with_retry_policy(RetryPolicy::default_retryable());
/// ```
#[derive(Debug)]
pub struct Session {
    working_dir: PathBuf,
    variables: BTreeMap<String, Value>,
    env: BTreeMap<String, String>,
    colored_output: bool,
    retry: RetryPolicy,
    state: LifecycleState,
    apply_attempted: bool,
    outputs: Option<OutputSet>,
}

impl Session {
    /// A session for the infrastructure definition in `working_dir`.
    ///
    /// Defaults: no variables, no environment overrides, color disabled
    /// (clean logs under test runners), no retries.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            variables: BTreeMap::new(),
            env: BTreeMap::new(),
            colored_output: false,
            retry: RetryPolicy::none(),
            state: LifecycleState::Uninitialized,
            apply_attempted: false,
            outputs: None,
        }
    }

    /// Set one engine variable. Scalars, lists, and nested maps are all
    /// accepted as JSON values.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Merge a batch of engine variables.
    pub fn with_vars(mut self, vars: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.variables.extend(vars);
        self
    }

    /// Set an environment variable for engine invocations, layered on top
    /// of the inherited process environment. Credential values are
    /// forwarded opaquely and never inspected.
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Enable or disable colored engine output.
    pub fn with_colored_output(mut self, colored: bool) -> Self {
        self.colored_output = colored;
        self
    }

    /// Replace the retry policy for engine invocations.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn colored_output(&self) -> bool {
        self.colored_output
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether an apply was ever attempted, successfully or not. A failed
    /// apply may still have created partial resources, so destroy must run
    /// for it.
    pub fn apply_attempted(&self) -> bool {
        self.apply_attempted
    }

    /// Outputs of the most recent successful apply, if any.
    pub fn outputs(&self) -> Option<&OutputSet> {
        self.outputs.as_ref()
    }

    pub(crate) fn set_state(&mut self, state: LifecycleState) {
        self.state = state;
    }

    pub(crate) fn mark_apply_attempted(&mut self) {
        self.apply_attempted = true;
    }

    pub(crate) fn clear_outputs(&mut self) {
        self.outputs = None;
    }

    pub(crate) fn store_outputs(&mut self, outputs: OutputSet) {
        self.outputs = Some(outputs);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("/tmp/infra");
        assert_eq!(session.state(), LifecycleState::Uninitialized);
        assert!(!session.apply_attempted());
        assert!(!session.colored_output());
        assert!(session.variables().is_empty());
        assert!(session.env().is_empty());
        assert!(session.outputs().is_none());
    }

    #[test]
    fn test_with_var_accepts_scalars_lists_and_maps() {
        let session = Session::new("/tmp/infra")
            .with_var("environment", "test")
            .with_var("port", 80)
            .with_var("node_instance_types", json!(["t3.medium"]))
            .with_var("tags", json!({"TestName": "NetworkModuleTest"}));

        assert_eq!(session.variables().len(), 4);
        assert_eq!(session.variables().get("port"), Some(&json!(80)));
        assert_eq!(
            session.variables().get("tags"),
            Some(&json!({"TestName": "NetworkModuleTest"}))
        );
    }

    #[test]
    fn test_with_vars_merges_and_later_values_win() {
        let session = Session::new("/tmp/infra")
            .with_var("region", "nyc1")
            .with_vars([("region".to_string(), json!("us-east-1"))]);
        assert_eq!(session.variables().get("region"), Some(&json!("us-east-1")));
    }

    #[test]
    fn test_env_overrides_are_recorded() {
        let session = Session::new("/tmp/infra").with_env("AWS_DEFAULT_REGION", "us-east-1");
        assert_eq!(
            session.env().get("AWS_DEFAULT_REGION").map(String::as_str),
            Some("us-east-1")
        );
    }

    #[test]
    fn test_state_display_names() {
        assert_eq!(LifecycleState::Uninitialized.to_string(), "uninitialized");
        assert_eq!(LifecycleState::Applied.to_string(), "applied");
        assert_eq!(LifecycleState::Destroyed.to_string(), "destroyed");
    }
}
