//! Per-environment deployment configuration.
//!
//! Environment config lives at `{root}/{kind}/{env}.yml`, one document per
//! template kind, mapping microservice name to its settings. The resolver
//! loads the document fresh on every call (nothing is cached between runs)
//! and layers CLI-supplied image overrides on top for the selected
//! microservice before handing the mapping to the template engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration document category. Each kind has its own directory of
/// per-environment files under the deploy root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Conf,
    Secrets,
}

impl TemplateKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            TemplateKind::Conf => "conf",
            TemplateKind::Secrets => "secrets",
        }
    }
}

/// Per-microservice settings within an environment document.
///
/// Only the image fields are interpreted by the resolver; any other keys are
/// carried through untouched for templates to reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_migration_image: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Full environment mapping: microservice name → settings.
pub type EnvConfig = BTreeMap<String, ServiceSettings>;

/// Loads an environment's configuration document and applies
/// per-microservice overrides.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    root: PathBuf,
    env: String,
    microservice: Option<String>,
    image: Option<String>,
    db_migration_image: Option<String>,
}

impl ConfigResolver {
    pub fn new(root: impl Into<PathBuf>, env: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            env: env.into(),
            microservice: None,
            image: None,
            db_migration_image: None,
        }
    }

    /// Select a microservice and the image overrides to apply to its entry.
    pub fn with_overrides(
        mut self,
        microservice: Option<String>,
        image: Option<String>,
        db_migration_image: Option<String>,
    ) -> Self {
        self.microservice = microservice;
        self.image = image;
        self.db_migration_image = db_migration_image;
        self
    }

    /// Path to the configuration document for `(kind, env)`.
    fn config_path(&self, kind: TemplateKind) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(format!("{}.yml", self.env))
    }

    /// Load the `(kind, env)` document and apply CLI overrides.
    ///
    /// When a microservice is selected, its entry is created empty if absent
    /// and each image field is overwritten only when the corresponding
    /// override was supplied. Returns the full mapping rather than the single
    /// entry: templates may reference settings of other microservices.
    pub fn resolve(&self, kind: TemplateKind) -> Result<EnvConfig, ConfigError> {
        let path = self.config_path(kind);
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                env: self.env.clone(),
                path: path.display().to_string(),
            });
        }

        let content = read_to_string(&path)?;
        let mut conf: EnvConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        if let Some(name) = &self.microservice {
            let entry = conf.entry(name.clone()).or_default();
            if let Some(image) = &self.image {
                entry.image = Some(image.clone());
            }
            if let Some(image) = &self.db_migration_image {
                entry.db_migration_image = Some(image.clone());
            }
        }

        Ok(conf)
    }
}

fn read_to_string(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })
}
