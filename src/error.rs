//! Centralized error types for anvil
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use thiserror::Error;

/// Top-level error type for the deploy pipeline
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),
}

/// Environment configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No config found for env '{env}' (expected {path})")]
    NotFound { env: String, path: String },

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Manifest discovery and rendering errors
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest not found for microservice '{name}'")]
    NotFound { name: String },

    #[error("Failed to render template {path}: {source}")]
    Render {
        path: String,
        #[source]
        source: tera::Error,
    },

    // Rendering resolves configuration per template kind, so config
    // failures surface through composition.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Cluster apply and rollout errors
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Apply failed\nSTDOUT: {stdout}\nSTDERR: {stderr}")]
    ApplyFailed { stdout: String, stderr: String },

    #[error("Error while checking deployment status for service '{service}': {stderr}")]
    RolloutFailed { service: String, stderr: String },

    #[error("Rollout status check for '{service}' timed out after {timeout_secs}s")]
    RolloutTimeout { service: String, timeout_secs: u64 },

    #[error("Failed to run {command}: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage manifest for apply: {0}")]
    Staging(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_error_carries_both_streams() {
        let err = ClusterError::ApplyFailed {
            stdout: "namespace/services unchanged".to_string(),
            stderr: "error: the server could not find the requested resource".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("namespace/services unchanged"));
        assert!(message.contains("could not find the requested resource"));
    }

    #[test]
    fn test_rollout_timeout_display() {
        let err = ClusterError::RolloutTimeout {
            service: "auth".to_string(),
            timeout_secs: 300,
        };
        assert!(err.to_string().contains("timed out after 300s"));
    }

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::NotFound {
            env: "prod".to_string(),
            path: "conf/prod.yml".to_string(),
        };
        let deploy_err: DeployError = config_err.into();
        assert!(matches!(deploy_err, DeployError::Config(_)));

        let manifest_err = ManifestError::NotFound {
            name: "auth".to_string(),
        };
        let deploy_err: DeployError = manifest_err.into();
        assert!(matches!(deploy_err, DeployError::Manifest(_)));
    }

    #[test]
    fn test_config_error_nests_into_manifest_error() {
        let config_err = ConfigError::NotFound {
            env: "prod".to_string(),
            path: "secrets/prod.yml".to_string(),
        };
        let manifest_err: ManifestError = config_err.into();
        assert!(manifest_err.to_string().contains("No config found"));
    }
}
