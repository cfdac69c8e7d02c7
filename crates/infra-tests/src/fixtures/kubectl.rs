//! kubectl fixture for the Kubernetes cluster tests.
//!
//! Talks to the cluster created by an applied session through the
//! kubeconfig the session exposed as an output. Everything goes through
//! `kubectl ... -o json`, parsed with serde_json, so the fixture stays a
//! thin veneer over the CLI.

use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KubectlError {
    #[error("failed to invoke kubectl: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("kubectl {args:?} exited with code {exit_code}: {stderr}")]
    CommandFailed {
        args: Vec<String>,
        exit_code: i32,
        stderr: String,
    },

    #[error("unexpected kubectl output: {reason}")]
    Malformed { reason: String },
}

/// A kubectl list document (`get ... -o json`).
#[derive(Debug, Deserialize)]
struct ItemList {
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: String,
}

/// `kubectl version -o json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionDocument {
    server_version: ServerVersion,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerVersion {
    git_version: String,
}

/// kubectl bound to one kubeconfig and namespace.
#[derive(Debug)]
pub struct Kubectl {
    kubeconfig: PathBuf,
    namespace: String,
}

impl Kubectl {
    pub fn new(kubeconfig: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            kubeconfig: kubeconfig.into(),
            namespace: namespace.into(),
        }
    }

    /// Names of the cluster's nodes.
    pub fn node_names(&self) -> Result<Vec<String>, KubectlError> {
        let doc = self.run(&["get", "nodes", "-o", "json"])?;
        parse_item_names(&doc)
    }

    /// The API server version string (e.g. `v1.26.3`).
    pub fn server_version(&self) -> Result<String, KubectlError> {
        let doc = self.run(&["version", "-o", "json"])?;
        let parsed: VersionDocument =
            serde_json::from_str(&doc).map_err(|e| KubectlError::Malformed {
                reason: e.to_string(),
            })?;
        Ok(parsed.server_version.git_version)
    }

    /// Names of all namespaces in the cluster.
    pub fn namespace_names(&self) -> Result<Vec<String>, KubectlError> {
        let doc = self.run(&["get", "namespaces", "-o", "json"])?;
        parse_item_names(&doc)
    }

    /// Names of the ConfigMaps in the bound namespace.
    pub fn config_map_names(&self) -> Result<Vec<String>, KubectlError> {
        let doc = self.run(&["get", "configmaps", "-n", &self.namespace, "-o", "json"])?;
        parse_item_names(&doc)
    }

    fn run(&self, args: &[&str]) -> Result<String, KubectlError> {
        let kubeconfig = self.kubeconfig.display().to_string();
        let mut full_args = vec!["--kubeconfig", kubeconfig.as_str()];
        full_args.extend_from_slice(args);

        tracing::debug!(args = ?full_args, "invoking kubectl");
        let output = Command::new("kubectl").args(&full_args).output()?;
        if !output.status.success() {
            return Err(KubectlError::CommandFailed {
                args: full_args.iter().map(|s| s.to_string()).collect(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Pull `items[*].metadata.name` out of a kubectl list document.
fn parse_item_names(doc: &str) -> Result<Vec<String>, KubectlError> {
    let parsed: ItemList = serde_json::from_str(doc).map_err(|e| KubectlError::Malformed {
        reason: e.to_string(),
    })?;
    Ok(parsed
        .items
        .into_iter()
        .map(|item| item.metadata.name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_names_reads_node_lists() {
        let doc = r#"{
            "apiVersion": "v1",
            "items": [
                {"metadata": {"name": "pool-1-abcd"}},
                {"metadata": {"name": "pool-1-efgh"}}
            ]
        }"#;
        assert_eq!(
            parse_item_names(doc).unwrap(),
            vec!["pool-1-abcd", "pool-1-efgh"]
        );
    }

    #[test]
    fn test_parse_item_names_handles_empty_lists() {
        assert!(parse_item_names(r#"{"items": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_item_names_rejects_documents_without_items() {
        let error = parse_item_names(r#"{"kind": "Status"}"#).unwrap_err();
        assert!(matches!(error, KubectlError::Malformed { .. }));
    }
}
