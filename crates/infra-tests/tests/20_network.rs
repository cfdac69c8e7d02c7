//! Network module applies per provider.

#![cfg(any(feature = "aws", feature = "gcp", feature = "digitalocean"))]

use infra_tests::{logging, paths, providers};
use serde_json::json;
use terraspan::lifecycle::{Controller, RetryPolicy};
use terraspan::namespace::NamespaceToken;
use terraspan::session::Session;

#[cfg(feature = "aws")]
#[test]
fn test_network_module_aws() {
    logging::init();

    let token = NamespaceToken::generate();
    let workdir = paths::stage("modules/network/aws");

    let controller = Controller::new();
    let mut env = controller.scoped(
        Session::new(workdir.path())
            .with_var("environment", "test")
            .with_var("project_name", format!("test-net-{token}"))
            .with_var("vpc_cidr", "10.0.0.0/16")
            .with_var("tags", json!({"TestName": "NetworkModuleTest"}))
            .with_env("AWS_DEFAULT_REGION", providers::aws_region())
            .with_retry_policy(RetryPolicy::default_retryable()),
    );

    let outputs = env.init_and_apply().expect("network module should apply");

    outputs
        .require_non_empty("vpc_id")
        .expect("VPC id must not be empty");

    // One subnet per availability zone, public and private.
    outputs
        .require_count("public_subnet_ids", 3)
        .expect("there must be exactly 3 public subnets");
    outputs
        .require_count("private_subnet_ids", 3)
        .expect("there must be exactly 3 private subnets");
}

#[cfg(feature = "digitalocean")]
#[test]
#[ignore = "requires DigitalOcean credentials"]
fn test_network_module_digitalocean() {
    logging::init();

    let token = NamespaceToken::generate();
    let workdir = paths::stage("modules/network/digital-ocean");

    let controller = Controller::new();
    let mut env = controller.scoped(
        Session::new(workdir.path())
            .with_var("environment", "test")
            .with_var("project_name", format!("test-net-{token}"))
            .with_var("vpc_cidr", "10.0.0.0/16")
            .with_retry_policy(RetryPolicy::default_retryable()),
    );

    let outputs = env.init_and_apply().expect("network module should apply");
    outputs
        .require_non_empty("vpc_id")
        .expect("VPC id must not be empty");
}

#[cfg(feature = "gcp")]
#[test]
#[ignore = "requires GCP credentials"]
fn test_network_module_gcp() {
    logging::init();

    let token = NamespaceToken::generate();
    let workdir = paths::stage("modules/network/gcp");

    let controller = Controller::new();
    let mut env = controller.scoped(
        Session::new(workdir.path())
            .with_var("environment", "test")
            .with_var("project_name", format!("test-net-{token}"))
            .with_var("project_id", providers::gcp_project_id())
            .with_var("vpc_cidr", "10.0.0.0/16")
            .with_var("tags", json!({"TestName": "NetworkModuleTest"}))
            .with_retry_policy(RetryPolicy::default_retryable()),
    );

    let outputs = env.init_and_apply().expect("network module should apply");
    outputs
        .require_non_empty("vpc_self_link")
        .expect("VPC self link must not be empty");
    outputs
        .require_non_empty("private_subnet_self_link")
        .expect("private subnet self link must not be empty");
}
