//! Provider abstraction matrix.
//!
//! One abstract test body runs against N provider-specific variable sets,
//! each as an independently scheduled concurrent case. Provider selection
//! is a closed tagged union rather than string switches scattered through
//! test bodies: each [`Provider`] variant carries its own required-variable
//! schema and is validated when the matrix is built, not when a case
//! happens to run.
//!
//! A failure in one provider case never aborts its siblings; the matrix
//! reports per-case pass/fail.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use serde_json::Value;
use thiserror::Error;

use crate::outputs::{OutputSet, ValidationError};

/// The closed set of supported providers, each with the variables its
/// infrastructure definitions require beyond the shared ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    Aws {
        region: String,
    },
    Azure {
        location: String,
        resource_group: String,
        subscription_id: String,
    },
    Gcp {
        region: String,
        project_id: String,
    },
    DigitalOcean {
        region: String,
    },
}

impl Provider {
    /// Stable identifier, also passed to the engine as the `provider`
    /// variable selecting the implementation module.
    pub fn id(&self) -> &'static str {
        match self {
            Provider::Aws { .. } => "aws",
            Provider::Azure { .. } => "azure",
            Provider::Gcp { .. } => "gcp",
            Provider::DigitalOcean { .. } => "digitalocean",
        }
    }

    /// The provider-specific variable set, including the `provider`
    /// discriminator itself.
    pub fn variables(&self) -> BTreeMap<String, Value> {
        let mut vars = BTreeMap::new();
        vars.insert("provider".to_string(), Value::String(self.id().to_string()));
        match self {
            Provider::Aws { region } | Provider::DigitalOcean { region } => {
                vars.insert("region".to_string(), Value::String(region.clone()));
            }
            Provider::Azure {
                location,
                resource_group,
                subscription_id,
            } => {
                vars.insert("region".to_string(), Value::String(location.clone()));
                vars.insert(
                    "resource_group_name".to_string(),
                    Value::String(resource_group.clone()),
                );
                vars.insert(
                    "subscription_id".to_string(),
                    Value::String(subscription_id.clone()),
                );
            }
            Provider::Gcp { region, project_id } => {
                vars.insert("region".to_string(), Value::String(region.clone()));
                vars.insert("project_id".to_string(), Value::String(project_id.clone()));
            }
        }
        vars
    }

    fn validate(&self) -> Result<(), MatrixError> {
        let require = |field: &'static str, value: &str| {
            if value.is_empty() {
                Err(MatrixError::MissingField {
                    provider: self.id(),
                    field,
                })
            } else {
                Ok(())
            }
        };
        match self {
            Provider::Aws { region } | Provider::DigitalOcean { region } => {
                require("region", region)
            }
            Provider::Azure {
                location,
                resource_group,
                subscription_id,
            } => {
                require("location", location)?;
                require("resource_group", resource_group)?;
                require("subscription_id", subscription_id)
            }
            Provider::Gcp { region, project_id } => {
                require("region", region)?;
                require("project_id", project_id)
            }
        }
    }
}

/// The matrix was misconstructed. Raised when the matrix is built, so a
/// bad case never reaches a cloud account.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatrixError {
    #[error("provider matrix has no cases")]
    NoCases,

    #[error("provider '{provider}' appears in more than one case")]
    DuplicateProvider { provider: &'static str },

    #[error("provider case '{provider}' has an empty required field '{field}'")]
    MissingField {
        provider: &'static str,
        field: &'static str,
    },
}

/// One entry in the matrix: a provider, variable overrides layered on top
/// of the provider schema, and the output keys the shared contract
/// requires from this provider. Immutable once the matrix is built.
#[derive(Debug, Clone)]
pub struct ProviderCase {
    provider: Provider,
    overrides: BTreeMap<String, Value>,
    expected_outputs: BTreeSet<String>,
}

impl ProviderCase {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            overrides: BTreeMap::new(),
            expected_outputs: BTreeSet::new(),
        }
    }

    /// Layer a case-specific variable on top of the provider schema.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    /// Require an output key from this provider's applied environment.
    pub fn expect_output(mut self, key: impl Into<String>) -> Self {
        self.expected_outputs.insert(key.into());
        self
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn expected_outputs(&self) -> impl Iterator<Item = &str> {
        self.expected_outputs.iter().map(String::as_str)
    }

    /// The full variable set for this case: provider schema first, then
    /// case overrides (overrides win).
    pub fn variables(&self) -> BTreeMap<String, Value> {
        let mut vars = self.provider.variables();
        for (name, value) in &self.overrides {
            vars.insert(name.clone(), value.clone());
        }
        vars
    }

    /// Check the cross-provider output contract: every expected key must
    /// be present and non-empty. Provider-specific extra keys are fine.
    pub fn check_contract(&self, outputs: &OutputSet) -> Result<(), ValidationError> {
        outputs.require_keys(self.expected_outputs())
    }
}

/// How one case ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed,
    /// The body returned an error.
    Failed(String),
    /// The body panicked (e.g. a failed assertion); the panic was caught
    /// and did not disturb sibling cases.
    Panicked(String),
}

/// Per-case results of one matrix run. Never short-circuits: every case
/// is reported, even when siblings failed.
#[derive(Debug, Clone)]
pub struct MatrixReport {
    results: Vec<(String, CaseOutcome)>,
}

impl MatrixReport {
    pub fn all_passed(&self) -> bool {
        self.results
            .iter()
            .all(|(_, outcome)| *outcome == CaseOutcome::Passed)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &CaseOutcome)> {
        self.results
            .iter()
            .map(|(provider, outcome)| (provider.as_str(), outcome))
    }

    pub fn outcome_for(&self, provider: &str) -> Option<&CaseOutcome> {
        self.results
            .iter()
            .find(|(id, _)| id == provider)
            .map(|(_, outcome)| outcome)
    }

    /// Assertion helper for tests: fails with a per-case summary when any
    /// case did not pass.
    #[track_caller]
    pub fn assert_all_passed(&self) {
        assert!(self.all_passed(), "provider matrix had failures:\n{self}");
    }
}

impl fmt::Display for MatrixReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (provider, outcome) in &self.results {
            match outcome {
                CaseOutcome::Passed => writeln!(f, "  {provider}: passed")?,
                CaseOutcome::Failed(reason) => writeln!(f, "  {provider}: FAILED: {reason}")?,
                CaseOutcome::Panicked(reason) => writeln!(f, "  {provider}: PANICKED: {reason}")?,
            }
        }
        Ok(())
    }
}

/// A validated set of provider cases plus the machinery to run one test
/// body against all of them concurrently.
#[derive(Debug, Clone)]
pub struct Matrix {
    cases: Vec<ProviderCase>,
}

impl Matrix {
    /// Validate and build a matrix. Rejected: zero cases, two cases for
    /// the same provider, or a provider with an empty required field.
    pub fn new(cases: Vec<ProviderCase>) -> Result<Self, MatrixError> {
        if cases.is_empty() {
            return Err(MatrixError::NoCases);
        }
        let mut seen = BTreeSet::new();
        for case in &cases {
            case.provider.validate()?;
            if !seen.insert(case.provider.id()) {
                return Err(MatrixError::DuplicateProvider {
                    provider: case.provider.id(),
                });
            }
        }
        Ok(Self { cases })
    }

    pub fn cases(&self) -> &[ProviderCase] {
        &self.cases
    }

    /// Run `body` once per case, each case on its own thread.
    ///
    /// Execution order across cases is unspecified; the body must not rely
    /// on shared mutable state (each case builds its own session and its
    /// own namespace token). Panics inside a case are caught and recorded
    /// against that case only.
    pub fn run<F>(&self, body: F) -> MatrixReport
    where
        F: Fn(&ProviderCase) -> anyhow::Result<()> + Sync,
    {
        let body = &body;
        let results = thread::scope(|scope| {
            let handles: Vec<_> = self
                .cases
                .iter()
                .map(|case| {
                    let provider = case.provider.id().to_string();
                    let handle = scope.spawn(move || {
                        match catch_unwind(AssertUnwindSafe(|| body(case))) {
                            Ok(Ok(())) => CaseOutcome::Passed,
                            Ok(Err(error)) => CaseOutcome::Failed(format!("{error:#}")),
                            Err(payload) => CaseOutcome::Panicked(panic_message(payload.as_ref())),
                        }
                    });
                    (provider, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(provider, handle)| {
                    let outcome = handle
                        .join()
                        .unwrap_or_else(|payload| CaseOutcome::Panicked(panic_message(payload.as_ref())));
                    tracing::info!(provider = %provider, ?outcome, "matrix case finished");
                    (provider, outcome)
                })
                .collect()
        });

        MatrixReport { results }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
