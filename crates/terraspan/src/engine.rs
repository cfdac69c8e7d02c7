//! Command interface to the provisioning engine.
//!
//! The engine (a Terraform-compatible CLI) is an opaque process boundary:
//! the harness hands it a working directory, arguments, and environment
//! overrides, and gets back an exit code plus verbatim stdout/stderr. The
//! [`EngineRunner`] trait is the seam that lets the lifecycle controller be
//! driven against a scripted engine in tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;
use thiserror::Error;

/// Errors raised while invoking the engine process itself.
///
/// A non-zero exit code is not an `EngineError`; it is reported through
/// [`CommandOutput`] so the caller can classify it as retryable or fatal.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// One engine invocation: which directory to run in, the full argument
/// list, and environment variables layered on top of the inherited process
/// environment.
///
/// Credential variables (cloud tokens, subscription ids) are forwarded
/// opaquely through the inherited environment; the harness never inspects
/// them.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub working_dir: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Captured result of one engine invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// True when the engine exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout and stderr concatenated, for retryable-pattern matching.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Executes engine invocations.
pub trait EngineRunner {
    fn run(&self, request: &EngineRequest) -> Result<CommandOutput, EngineError>;
}

impl<T: EngineRunner + ?Sized> EngineRunner for &T {
    fn run(&self, request: &EngineRequest) -> Result<CommandOutput, EngineError> {
        (**self).run(request)
    }
}

/// Production runner: spawns the engine binary as a subprocess and waits
/// for it to exit, capturing stdout and stderr verbatim.
#[derive(Debug, Clone)]
pub struct TerraformCli {
    binary: PathBuf,
}

impl TerraformCli {
    /// Runner for the `terraform` binary found on `PATH`.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("terraform"),
        }
    }

    /// Runner for an alternative engine binary (e.g. an OpenTofu-compatible
    /// CLI or a pinned path).
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for TerraformCli {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRunner for TerraformCli {
    fn run(&self, request: &EngineRequest) -> Result<CommandOutput, EngineError> {
        let command_line = format!("{} {}", self.binary.display(), request.args.join(" "));
        tracing::debug!(
            working_dir = %request.working_dir.display(),
            command = %command_line,
            "invoking provisioning engine"
        );

        let output = Command::new(&self.binary)
            .args(&request.args)
            .current_dir(&request.working_dir)
            .envs(&request.env)
            .output()
            .map_err(|source| EngineError::Spawn {
                command: command_line,
                source,
            })?;

        Ok(CommandOutput {
            // A missing code means the process died on a signal; treat it
            // like a generic failure exit.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Arguments for `init`.
pub fn init_args(colored: bool) -> Vec<String> {
    let mut args = vec!["init".to_string(), "-input=false".to_string()];
    push_color_flag(&mut args, colored);
    args
}

/// Arguments for `plan` with the given variable set. Plan has no side
/// effects on real infrastructure.
pub fn plan_args(variables: &BTreeMap<String, Value>, colored: bool) -> Vec<String> {
    let mut args = vec!["plan".to_string(), "-input=false".to_string()];
    push_color_flag(&mut args, colored);
    args.extend(var_flags(variables));
    args
}

/// Arguments for `apply`.
pub fn apply_args(variables: &BTreeMap<String, Value>, colored: bool) -> Vec<String> {
    let mut args = vec![
        "apply".to_string(),
        "-input=false".to_string(),
        "-auto-approve".to_string(),
    ];
    push_color_flag(&mut args, colored);
    args.extend(var_flags(variables));
    args
}

/// Arguments for `destroy`.
pub fn destroy_args(variables: &BTreeMap<String, Value>, colored: bool) -> Vec<String> {
    let mut args = vec![
        "destroy".to_string(),
        "-input=false".to_string(),
        "-auto-approve".to_string(),
    ];
    push_color_flag(&mut args, colored);
    args.extend(var_flags(variables));
    args
}

/// Arguments for `output -json`, either for one key or the whole set.
pub fn output_args(key: Option<&str>, colored: bool) -> Vec<String> {
    let mut args = vec!["output".to_string()];
    push_color_flag(&mut args, colored);
    args.push("-json".to_string());
    if let Some(key) = key {
        args.push(key.to_string());
    }
    args
}

fn push_color_flag(args: &mut Vec<String>, colored: bool) {
    if !colored {
        args.push("-no-color".to_string());
    }
}

/// `-var name=value` flags for every variable, in deterministic order.
///
/// Plain strings pass through unquoted; lists, maps, numbers, and booleans
/// are JSON-encoded, which the engine accepts for complex variable types.
pub fn var_flags(variables: &BTreeMap<String, Value>) -> Vec<String> {
    let mut flags = Vec::with_capacity(variables.len() * 2);
    for (name, value) in variables {
        flags.push("-var".to_string());
        flags.push(format!("{name}={}", format_var_value(value)));
    }
    flags
}

fn format_var_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
