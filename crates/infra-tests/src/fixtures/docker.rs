//! Docker CLI fixture for the local-provider tests.
//!
//! The local environment provisions containers through the engine's Docker
//! provider; these helpers inspect the daemon afterwards, the same way an
//! operator would (`docker ps`, `docker network inspect`).

use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("failed to invoke docker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("docker {args:?} exited with code {exit_code}: {stderr}")]
    CommandFailed {
        args: Vec<String>,
        exit_code: i32,
        stderr: String,
    },
}

/// Thin wrapper over the `docker` CLI.
#[derive(Debug, Default)]
pub struct DockerCli;

impl DockerCli {
    pub fn new() -> Self {
        Self
    }

    /// Run a docker subcommand and return its stdout.
    pub fn run(&self, args: &[&str]) -> Result<String, DockerError> {
        tracing::debug!(?args, "invoking docker");
        let output = Command::new("docker").args(args).output()?;
        if !output.status.success() {
            return Err(DockerError::CommandFailed {
                args: args.iter().map(|s| s.to_string()).collect(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Names of running containers whose name matches `filter`.
    pub fn running_container_names(&self, filter: &str) -> Result<Vec<String>, DockerError> {
        let stdout = self.run(&[
            "ps",
            "--filter",
            &format!("name={filter}"),
            "--format",
            "{{.Names}}",
        ])?;
        Ok(stdout.lines().map(str::to_string).collect())
    }

    /// Raw `docker network inspect` document for `network`.
    pub fn network_inspect(&self, network: &str) -> Result<String, DockerError> {
        self.run(&["network", "inspect", network])
    }
}
