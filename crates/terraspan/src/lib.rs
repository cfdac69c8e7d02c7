//! Ephemeral-infrastructure test harness.
//!
//! Terraspan provisions isolated, uniquely-named infrastructure per test run
//! by driving a Terraform-compatible provisioning engine as a subprocess,
//! waits for asynchronous cloud convergence, validates a provider-agnostic
//! output contract, and guarantees teardown regardless of test outcome.
//!
//! # Building blocks
//!
//! - [`namespace::NamespaceToken`]: collision-free identifiers for parallel
//!   test runs sharing one cloud account.
//! - [`session::Session`]: one logical environment (working directory,
//!   variables, environment overrides, lifecycle state).
//! - [`lifecycle::Controller`]: init → plan/apply → destroy state machine
//!   with transparent retries for transient engine errors, plus the
//!   [`lifecycle::ScopedSession`] guard that destroys on every exit path.
//! - [`poll`]: bounded convergence polling for eventually-consistent
//!   resources (load balancer routable, nodes registered).
//! - [`outputs::OutputSet`]: provider-blind output contract validation.
//! - [`matrix::Matrix`]: one abstract test body run concurrently against
//!   N provider-specific variable sets with per-case failure isolation.
//!
//! # Example
//!
//! ```no_run
//! use terraspan::lifecycle::Controller;
//! use terraspan::namespace::NamespaceToken;
//! use terraspan::session::Session;
//!
//! let token = NamespaceToken::generate();
//! let session = Session::new("infra/examples/load_balancing/aws")
//!     .with_var("name", format!("lb-test-{token}"))
//!     .with_var("environment", "test");
//!
//! let controller = Controller::new();
//! let mut env = controller.scoped(session);
//! let outputs = env.init_and_apply().expect("apply should succeed");
//! outputs.require_non_empty("load_balancer_dns").expect("dns output");
//! // Dropping `env` destroys the infrastructure, even on panic.
//! ```

pub mod engine;
pub mod http;
pub mod lifecycle;
pub mod matrix;
pub mod namespace;
pub mod outputs;
pub mod poll;
pub mod session;
pub mod workdir;

pub use engine::{CommandOutput, EngineError, EngineRequest, EngineRunner, TerraformCli};
pub use http::{wait_for_http_body, wait_for_http_ok, HttpProbeError};
pub use lifecycle::{
    Backoff, CleanupError, Controller, PlanReport, ProvisioningError, RetryPolicy, ScopedSession,
};
pub use matrix::{CaseOutcome, Matrix, MatrixError, MatrixReport, Provider, ProviderCase};
pub use namespace::NamespaceToken;
pub use outputs::{OutputSet, ValidationError};
pub use poll::{poll_until, poll_until_cancellable, CancelToken, PollError};
pub use session::{LifecycleState, Session};
pub use workdir::{copy_to_temp, StagedWorkdir, WorkdirError};
