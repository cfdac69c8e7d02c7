//! Per-provider variable schemas and credential lookups.
//!
//! Region defaults, project/subscription lookups, and the shared variable
//! set live here so test bodies stay provider-blind. Credential values are
//! read from the environment and handed to the engine opaquely; nothing in
//! this module validates them.

use std::env;

use serde_json::{json, Value};
use terraspan::matrix::{Provider, ProviderCase};
use terraspan::namespace::NamespaceToken;

/// Output keys every provider's load balancer module must expose,
/// whatever the underlying resource shapes are.
pub const LOAD_BALANCER_CONTRACT: [&str; 2] = ["load_balancer_endpoint", "load_balancer_id"];

/// AWS region for test runs, `AWS_DEFAULT_REGION` or `us-east-1`.
pub fn aws_region() -> String {
    env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "us-east-1".to_string())
}

/// GCP project id from the environment.
pub fn gcp_project_id() -> String {
    env::var("GOOGLE_CLOUD_PROJECT")
        .or_else(|_| env::var("GCP_PROJECT_ID"))
        .expect("GOOGLE_CLOUD_PROJECT (or GCP_PROJECT_ID) must be set for GCP tests")
}

/// Azure subscription id from the environment.
pub fn azure_subscription_id() -> String {
    env::var("ARM_SUBSCRIPTION_ID").expect("ARM_SUBSCRIPTION_ID must be set for Azure tests")
}

pub fn aws_provider() -> Provider {
    Provider::Aws {
        region: aws_region(),
    }
}

pub fn gcp_provider() -> Provider {
    Provider::Gcp {
        region: "us-central1".to_string(),
        project_id: gcp_project_id(),
    }
}

pub fn digitalocean_provider() -> Provider {
    Provider::DigitalOcean {
        region: "nyc1".to_string(),
    }
}

/// Azure needs a resource group per test run; the namespace token keeps
/// concurrently running groups apart.
pub fn azure_provider(token: &NamespaceToken) -> Provider {
    Provider::Azure {
        location: "eastus".to_string(),
        resource_group: format!("rg-test-{token}"),
        subscription_id: azure_subscription_id(),
    }
}

/// The variables every load balancer case shares, whichever provider runs
/// it. The unique `name` is supplied per case by the test body.
pub fn shared_lb_vars() -> Vec<(String, Value)> {
    vec![
        ("environment".to_string(), json!("test")),
        ("protocol".to_string(), json!("http")),
        ("port".to_string(), json!(80)),
        ("target_port".to_string(), json!(8080)),
    ]
}

/// The four-provider load balancer matrix.
///
/// Azure additionally needs the virtual network wiring the other providers
/// derive implicitly.
pub fn load_balancer_cases(token: &NamespaceToken) -> Vec<ProviderCase> {
    vec![
        lb_case(aws_provider()),
        lb_case(azure_provider(token))
            .with_var("vnet_name", format!("vnet-test-{token}"))
            .with_var("subnet_name", format!("subnet-test-{token}")),
        lb_case(gcp_provider()),
        lb_case(digitalocean_provider()),
    ]
}

fn lb_case(provider: Provider) -> ProviderCase {
    let mut case = ProviderCase::new(provider);
    for (name, value) in shared_lb_vars() {
        case = case.with_var(name, value);
    }
    for key in LOAD_BALANCER_CONTRACT {
        case = case.expect_output(key);
    }
    case
}
