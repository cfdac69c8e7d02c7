//! Environment Test Suite
//!
//! This crate exercises the multi-cloud infrastructure definitions (AWS,
//! Azure, GCP, DigitalOcean, local Docker, Kubernetes) through the
//! `terraspan` harness: each test provisions an isolated, uniquely-named
//! ephemeral environment, asserts on the resulting outputs, and tears it
//! down again on every exit path.
//!
//! # Features
//!
//! - `plan`: plan-only configuration checks, no real infrastructure
//! - `local`: Docker-provider environment (requires a local Docker daemon)
//! - `aws` / `gcp` / `azure` / `digitalocean`: real cloud applies
//!   (require the matching provider credentials in the environment)
//! - `kubernetes`: DigitalOcean Kubernetes cluster end-to-end (requires
//!   DO credentials and `kubectl` in PATH)
//! - `load-balancing`: cross-provider load balancer matrix (requires all
//!   cloud credentials)
//! - `all`: everything
//!
//! # Prerequisites
//!
//! 1. A Terraform-compatible engine binary in PATH
//! 2. The infrastructure definitions checked out under `<repo>/infra`
//!    (override with `TERRASPAN_INFRA_DIR`)
//! 3. Provider credentials exported for the suites you enable; credential
//!    variables are forwarded to the engine opaquely, never inspected
//!
//! # Usage
//!
//! ```bash
//! # From repo root - runs 0 infra-tests (no default features)
//! cargo test
//!
//! # Configuration-shape checks only (fast, no cloud)
//! cargo test -p infra-tests --features plan
//!
//! # Local Docker environment
//! cargo test -p infra-tests --features local
//!
//! # Pre-release validation - full suite (slow, provisions real clouds)
//! cargo test -p infra-tests --features all
//! ```

pub mod fixtures;
pub mod logging;
pub mod paths;
pub mod providers;
