//! HTTP convergence probes.
//!
//! A freshly applied load balancer is not routable the instant apply
//! returns: health checks have to pass and DNS has to propagate. These
//! helpers wrap the convergence poller around a blocking HTTP GET so tests
//! can wait for an endpoint to actually serve traffic.

use std::time::Duration;

use thiserror::Error;

use crate::poll::{poll_until, PollError};

/// Per-request timeout, separate from the polling budget.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum HttpProbeError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status}")]
    Status { status: u16 },

    #[error("body did not contain '{needle}'")]
    BodyMismatch { needle: String },
}

/// Wait until a GET on `url` returns a success status; yields the body.
pub fn wait_for_http_ok(
    url: &str,
    max_attempts: u32,
    interval: Duration,
) -> Result<String, PollError<HttpProbeError>> {
    let description = format!("GET {url} succeeds");
    poll_until(&description, max_attempts, interval, || fetch_ok(url))
}

/// Wait until a GET on `url` returns a success status *and* the body
/// contains `needle`; yields the body.
pub fn wait_for_http_body(
    url: &str,
    needle: &str,
    max_attempts: u32,
    interval: Duration,
) -> Result<String, PollError<HttpProbeError>> {
    let description = format!("GET {url} returns '{needle}'");
    poll_until(&description, max_attempts, interval, || {
        let body = fetch_ok(url)?;
        if body.contains(needle) {
            Ok(body)
        } else {
            Err(HttpProbeError::BodyMismatch {
                needle: needle.to_string(),
            })
        }
    })
}

fn fetch_ok(url: &str) -> Result<String, HttpProbeError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(HttpProbeError::Status {
            status: status.as_u16(),
        });
    }
    Ok(response.text()?)
}
