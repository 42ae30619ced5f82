//! Cluster interaction via the kubectl CLI.
//!
//! Apply and rollout-status are delegated to the external kubectl command
//! rather than a direct API client; the tool only needs these two porcelain
//! operations and inherits whatever auth context the operator's kubeconfig
//! provides. The binary resolves through `KUBECTL_BIN` with a PATH fallback.

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use crate::error::ClusterError;
use crate::tools::get_tool_path;

/// Submits a composite manifest document to the cluster.
pub struct ClusterApplier {
    kubectl: String,
}

impl ClusterApplier {
    pub fn new() -> Self {
        Self {
            kubectl: get_tool_path("kubectl"),
        }
    }

    #[cfg(test)]
    fn with_command(kubectl: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
        }
    }

    /// Stage the manifest in a scratch file and `kubectl apply` it.
    ///
    /// The scratch file is removed when the handle drops, on every exit
    /// path. Captured stdout comes back for display; a non-zero exit or any
    /// error output fails with both captured streams attached.
    pub async fn apply(&self, manifest: &str) -> Result<String, ClusterError> {
        let mut staged = NamedTempFile::new().map_err(ClusterError::Staging)?;
        staged
            .write_all(manifest.as_bytes())
            .map_err(ClusterError::Staging)?;
        staged.flush().map_err(ClusterError::Staging)?;

        let path = staged.path().display().to_string();
        debug!("{} apply -f {}", self.kubectl, path);

        let output = Command::new(&self.kubectl)
            .args(["apply", "-f", &path])
            .output()
            .await
            .map_err(|source| ClusterError::Command {
                command: format!("{} apply", self.kubectl),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() || !stderr.trim().is_empty() {
            return Err(ClusterError::ApplyFailed { stdout, stderr });
        }

        Ok(stdout)
    }
}

/// Polls rollout completion for a named deployment under a deadline.
pub struct RolloutWatcher {
    kubectl: String,
    timeout: Duration,
}

impl RolloutWatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            kubectl: get_tool_path("kubectl"),
            timeout,
        }
    }

    #[cfg(test)]
    fn with_command(kubectl: impl Into<String>, timeout: Duration) -> Self {
        Self {
            kubectl: kubectl.into(),
            timeout,
        }
    }

    /// Block until the deployment reports a finished rollout or the deadline
    /// expires.
    ///
    /// The status check runs with `kill_on_drop`: when the deadline elapses
    /// the wait future is dropped, which tears the kubectl process down. The
    /// deadline timer itself is dropped as soon as the check completes, so
    /// cleanup is deterministic on both paths.
    pub async fn wait(&self, service: &str) -> Result<String, ClusterError> {
        let deployment = format!("deployment/{}", service);
        debug!(
            "{} rollout status {} --all-namespaces (deadline {}s)",
            self.kubectl,
            deployment,
            self.timeout.as_secs()
        );

        let child = Command::new(&self.kubectl)
            .args(["rollout", "status", &deployment, "--all-namespaces"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ClusterError::Command {
                command: format!("{} rollout status", self.kubectl),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ClusterError::Command {
                command: format!("{} rollout status", self.kubectl),
                source,
            })?,
            Err(_) => {
                return Err(ClusterError::RolloutTimeout {
                    service: service.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() || !stderr.trim().is_empty() {
            return Err(ClusterError::RolloutFailed {
                service: service.to_string(),
                stderr,
            });
        }

        Ok(stdout)
    }
}
