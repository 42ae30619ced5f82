//! The apply pipeline: resolve configuration, compose manifests, submit to
//! the cluster, watch the rollout.
//!
//! The stages run strictly in sequence and every operational failure is
//! fatal: a failed apply never reaches the watch stage, and a failed or
//! timed-out watch terminates the run with the captured diagnostics.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::cli::Cli;
use crate::config::ConfigResolver;
use crate::k8s::{ClusterApplier, RolloutWatcher};
use crate::manifest::{ComposeOptions, ManifestComposer, Target};
use crate::tools::get_tool_path;

pub async fn execute(cli: Cli) -> Result<()> {
    let timeout = humantime::parse_duration(&cli.timeout)
        .with_context(|| format!("Invalid --timeout value: {}", cli.timeout))?;

    let root = PathBuf::from(&cli.root);
    let target = cli.target();

    info!("🎯 Environment: {}", cli.env);
    match &target {
        Target::Microservice(name) => info!("📦 Microservice: {}", name),
        Target::All => info!("📦 Target: all manifests"),
    }

    let resolver = ConfigResolver::new(&root, cli.env.clone()).with_overrides(
        cli.microservice.clone(),
        cli.image.clone(),
        cli.db_migration_image.clone(),
    );
    let options = ComposeOptions {
        with_configmap: cli.with_configmap,
        with_secrets: cli.with_secrets,
        with_volumes: cli.with_volumes,
    };

    info!("━━━ Step 1/3: Compose ━━━");
    let composer = ManifestComposer::new(&root, &resolver, options);
    let composite = composer.compose(&target)?;

    if cli.dry_run {
        println!("{}", composite);
        return Ok(());
    }

    let kubectl = get_tool_path("kubectl");
    which::which(&kubectl)
        .with_context(|| format!("{} not found; it is required to apply manifests", kubectl))?;

    info!("━━━ Step 2/3: Apply ━━━");
    let applier = ClusterApplier::new();
    let output = applier.apply(&composite).await?;
    print!("{}", output);

    match &target {
        Target::Microservice(name) => {
            info!("━━━ Step 3/3: Watch rollout ━━━");

            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap(),
            );
            pb.set_message(format!("Waiting for deployment/{} to roll out...", name));
            pb.enable_steady_tick(std::time::Duration::from_millis(100));

            let watcher = RolloutWatcher::new(timeout);
            let result = watcher.wait(name).await;
            pb.finish_and_clear();

            print!("{}", result?);
        }
        Target::All => {
            // No single deployment to track when applying everything
            info!("⏭️  Skipping rollout watch for --all");
        }
    }

    println!("{}", "✅ Deployment complete".bright_green().bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn deploy_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        std::fs::write(
            root.join("namespaces.yml"),
            "kind: Namespace\nmetadata:\n  name: services",
        )
        .unwrap();
        std::fs::create_dir_all(root.join("app/auth")).unwrap();
        std::fs::write(
            root.join("app/auth/auth.yml"),
            "kind: Deployment\nimage: {{ conf.auth.image }}",
        )
        .unwrap();
        write_conf(root, "prod", "auth:\n  image: registry.local/auth:v1");

        dir
    }

    fn write_conf(root: &Path, env: &str, content: &str) {
        std::fs::create_dir_all(root.join("conf")).unwrap();
        std::fs::write(root.join("conf").join(format!("{}.yml", env)), content).unwrap();
    }

    fn dry_run_cli(root: &Path) -> Cli {
        Cli {
            env: "prod".to_string(),
            microservice: Some("auth".to_string()),
            image: Some("img:v2".to_string()),
            db_migration_image: None,
            dry_run: true,
            with_configmap: false,
            with_secrets: false,
            with_volumes: false,
            all: false,
            root: root.display().to_string(),
            timeout: "300s".to_string(),
            verbose: false,
        }
    }

    #[tokio::test]
    async fn test_dry_run_never_touches_the_cluster() {
        // No kubectl exists anywhere near this tree; dry-run must succeed
        // without ever resolving or invoking it.
        let dir = deploy_root();
        execute(dry_run_cli(dir.path())).await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_failure_stops_before_watch() {
        use std::os::unix::fs::PermissionsExt;

        let dir = deploy_root();
        let bin = tempfile::tempdir().unwrap();
        let log = bin.path().join("calls.log");
        let kubectl = bin.path().join("kubectl");
        std::fs::write(
            &kubectl,
            format!(
                "#!/bin/sh\necho \"$1\" >> {}\necho \"error: denied\" >&2\nexit 1\n",
                log.display()
            ),
        )
        .unwrap();
        let mut perms = std::fs::metadata(&kubectl).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&kubectl, perms).unwrap();

        std::env::set_var("KUBECTL_BIN", &kubectl);
        let mut cli = dry_run_cli(dir.path());
        cli.dry_run = false;
        let result = execute(cli).await;
        std::env::remove_var("KUBECTL_BIN");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("Apply failed"));

        // Exactly one kubectl invocation: the apply. No rollout status check.
        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls.lines().collect::<Vec<_>>(), vec!["apply"]);
    }

    #[tokio::test]
    async fn test_missing_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("namespaces.yml"), "kind: Namespace").unwrap();

        let err = execute(dry_run_cli(dir.path())).await.unwrap_err();
        assert!(err.to_string().contains("No config found"));
    }

    #[tokio::test]
    async fn test_invalid_timeout_is_rejected() {
        let dir = deploy_root();
        let mut cli = dry_run_cli(dir.path());
        cli.timeout = "soon".to_string();

        let err = execute(cli).await.unwrap_err();
        assert!(err.to_string().contains("Invalid --timeout"));
    }
}
