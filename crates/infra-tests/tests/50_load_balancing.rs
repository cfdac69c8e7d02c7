//! Load balancer provisioning per provider, and the cross-provider
//! abstraction matrix.
//!
//! The individual tests exercise each provider's own module and outputs;
//! the matrix test runs one provider-blind body against all four variable
//! sets concurrently, with per-case failure isolation.

#![cfg(feature = "load-balancing")]

use std::time::Duration;

use anyhow::Context;
use infra_tests::{logging, paths, providers};
use terraspan::http::wait_for_http_ok;
use terraspan::lifecycle::{Controller, RetryPolicy};
use terraspan::matrix::Matrix;
use terraspan::namespace::NamespaceToken;
use terraspan::session::Session;

const CONVERGENCE_ATTEMPTS: u32 = 30;
const CONVERGENCE_INTERVAL: Duration = Duration::from_secs(10);

#[test]
fn test_load_balancing_digitalocean() {
    logging::init();

    let token = NamespaceToken::generate();
    let workdir = paths::stage("examples/load_balancing/digital-ocean");

    let controller = Controller::new();
    let mut env = controller.scoped(
        Session::new(workdir.path())
            .with_var("name", format!("lb-test-{token}"))
            .with_var("region", "nyc1")
            .with_var("provider", "digitalocean")
            .with_vars(providers::shared_lb_vars())
            .with_retry_policy(RetryPolicy::default_retryable()),
    );

    let outputs = env.init_and_apply().expect("load balancer should apply");
    outputs
        .require_non_empty("load_balancer_ip")
        .expect("load balancer IP must not be empty");
    outputs
        .require_non_empty("load_balancer_id")
        .expect("load balancer id must not be empty");
}

#[test]
fn test_load_balancing_aws() {
    logging::init();

    let token = NamespaceToken::generate();
    let workdir = paths::stage("examples/load_balancing/aws");
    let region = providers::aws_region();

    let controller = Controller::new();
    let mut env = controller.scoped(
        Session::new(workdir.path())
            .with_var("name", format!("lb-test-{token}"))
            .with_var("region", region.clone())
            .with_var("provider", "aws")
            .with_vars(providers::shared_lb_vars())
            .with_env("AWS_DEFAULT_REGION", region)
            .with_retry_policy(RetryPolicy::default_retryable()),
    );

    let outputs = env.init_and_apply().expect("load balancer should apply");
    let dns = outputs
        .require_string("load_balancer_dns")
        .expect("load balancer DNS must not be empty")
        .to_string();
    outputs
        .require_non_empty("load_balancer_arn")
        .expect("load balancer ARN must not be empty");

    // DNS propagation plus target health checks take a while.
    wait_for_http_ok(
        &format!("http://{dns}"),
        CONVERGENCE_ATTEMPTS,
        CONVERGENCE_INTERVAL,
    )
    .expect("load balancer should become routable");
}

#[test]
fn test_load_balancing_gcp() {
    logging::init();

    let token = NamespaceToken::generate();
    let workdir = paths::stage("examples/load_balancing/gcp");

    let controller = Controller::new();
    let mut env = controller.scoped(
        Session::new(workdir.path())
            .with_var("name", format!("lb-test-{token}"))
            .with_var("region", "us-central1")
            .with_var("provider", "gcp")
            .with_var("project_id", providers::gcp_project_id())
            .with_vars(providers::shared_lb_vars())
            .with_retry_policy(RetryPolicy::default_retryable()),
    );

    let outputs = env.init_and_apply().expect("load balancer should apply");
    let ip = outputs
        .require_string("load_balancer_ip")
        .expect("load balancer IP must not be empty")
        .to_string();
    outputs
        .require_non_empty("load_balancer_name")
        .expect("load balancer name must not be empty");

    wait_for_http_ok(
        &format!("http://{ip}"),
        CONVERGENCE_ATTEMPTS,
        CONVERGENCE_INTERVAL,
    )
    .expect("load balancer should become routable");
}

#[test]
fn test_load_balancing_azure() {
    logging::init();

    let token = NamespaceToken::generate();
    let workdir = paths::stage("examples/load_balancing/azure");

    let controller = Controller::new();
    let mut env = controller.scoped(
        Session::new(workdir.path())
            .with_var("load_balancer_name", format!("lb-test-{token}"))
            .with_var("resource_group_name", format!("rg-test-{token}"))
            .with_var("location", "eastus")
            .with_var("environment", "test")
            .with_var("health_check_path", "/health")
            .with_var("enable_https", true)
            .with_var(
                "tags",
                serde_json::json!({"Environment": "Test", "Terraform": "true"}),
            )
            .with_retry_policy(RetryPolicy::default_retryable()),
    );

    let outputs = env.init_and_apply().expect("load balancer should apply");
    outputs
        .require_non_empty("load_balancer_id")
        .expect("load balancer id must not be empty");
    outputs
        .require_non_empty("load_balancer_ip")
        .expect("load balancer IP must not be empty");
    outputs
        .require_non_empty("frontend_ip_configuration_name")
        .expect("frontend IP configuration name must not be empty");

    // Balancing rules and the health probe are modelled as outputs too.
    for key in ["http_rule_name", "https_rule_name", "health_probe_name"] {
        outputs
            .require_non_empty(key)
            .unwrap_or_else(|e| panic!("{key} must be exposed: {e}"));
    }
}

#[test]
fn test_load_balancing_abstraction_matrix() {
    logging::init();

    // Azure's resource group name needs a token of its own; case-level
    // names are generated inside the body so no two cases share one.
    let matrix_token = NamespaceToken::generate();
    let matrix = Matrix::new(providers::load_balancer_cases(&matrix_token))
        .expect("matrix construction should validate");

    let report = matrix.run(|case| {
        let token = NamespaceToken::generate();
        let workdir = paths::stage("examples/load_balancing/main");

        let controller = Controller::new();
        let mut env = controller.scoped(
            Session::new(workdir.path())
                .with_var("name", format!("lb-test-{token}"))
                .with_vars(case.variables())
                .with_retry_policy(RetryPolicy::default_retryable()),
        );

        let outputs = env
            .init_and_apply()
            .with_context(|| format!("applying the abstract module on {}", case.provider().id()))?;
        // The provider-blind contract: same logical keys from every cloud.
        case.check_contract(&outputs)?;
        Ok(())
    });

    report.assert_all_passed();
}
