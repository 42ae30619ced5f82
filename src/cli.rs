//! CLI definitions for anvil
//!
//! This module contains all CLI argument parsing structures using clap.

use clap::{ArgGroup, Parser};

use crate::manifest::Target;

#[derive(Parser, Debug)]
#[command(
    name = "anvil",
    version,
    about = "Composes cluster manifests and applies them with rollout tracking",
    group(ArgGroup::new("target").required(true).multiple(false))
)]
pub struct Cli {
    /// Environment to apply against
    #[arg(short, long)]
    pub env: String,

    /// Microservice to apply
    #[arg(short, long, group = "target")]
    pub microservice: Option<String>,

    /// Docker image of the microservice
    #[arg(short, long)]
    pub image: Option<String>,

    /// Docker image of the microservice db migration
    #[arg(long)]
    pub db_migration_image: Option<String>,

    /// Do not apply. Just print all manifests to be applied
    #[arg(short, long)]
    pub dry_run: bool,

    /// Attach configMaps to the manifest
    #[arg(long = "with_configmap")]
    pub with_configmap: bool,

    /// Attach secrets to the manifest
    #[arg(long = "with_secrets")]
    pub with_secrets: bool,

    /// Attach volumes to the manifest
    #[arg(long = "with_volumes")]
    pub with_volumes: bool,

    /// Apply all manifests across all namespaces
    #[arg(long, group = "target")]
    pub all: bool,

    /// Deploy root holding manifest templates and environment config
    #[arg(long, env = "ANVIL_ROOT", default_value = ".")]
    pub root: String,

    /// Rollout watch timeout (e.g. "300s", "5m")
    #[arg(long, default_value = "300s")]
    pub timeout: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The deployment target selected on the command line. The clap group
    /// guarantees exactly one of `--microservice`/`--all` was given.
    pub fn target(&self) -> Target {
        match &self.microservice {
            Some(name) => Target::Microservice(name.clone()),
            None => Target::All,
        }
    }
}
