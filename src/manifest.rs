//! Manifest template discovery and composition.
//!
//! Templates live under the deploy root: shared documents
//! (`namespaces.yml`, `configMaps.yml`, `secrets.yml`, `volumes.yml`) at the
//! top level, per-microservice manifests named `{target}.yml` anywhere under
//! `app/`. Each template renders against the resolved environment
//! configuration, exposed to the template as `conf`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tera::{Context, Tera};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{ConfigResolver, TemplateKind};
use crate::error::ManifestError;

/// Filesystem artifacts that are never manifests.
const IGNORE_PATTERNS: &str = r"\.DS_Store";

/// Separator between documents in the composite manifest.
const DOCUMENT_SEPARATOR: &str = "\n---\n";

/// The microservice (or "all") selected for composition and apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Microservice(String),
    All,
}

fn ignore_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(IGNORE_PATTERNS).unwrap())
}

/// Walk the manifest tree under `{root}/app`, yielding `(file_name,
/// directory)` for every manifest file.
///
/// Lazy and restartable: each call starts a fresh walk. Entries come back in
/// sorted order so composition does not depend on filesystem enumeration
/// order.
pub fn all_manifests(root: &Path) -> impl Iterator<Item = (String, PathBuf)> {
    WalkDir::new(root.join("app"))
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            if ignore_pattern().is_match(&name) {
                return None;
            }
            let dir = entry.path().parent()?.to_path_buf();
            Some((name, dir))
        })
}

/// Locate the manifest for a single microservice by exact file name.
///
/// First match wins if a name is somehow duplicated across directories.
pub fn find_manifest(root: &Path, microservice: &str) -> Result<PathBuf, ManifestError> {
    let wanted = format!("{}.yml", microservice);
    all_manifests(root)
        .find(|(name, _)| *name == wanted)
        .map(|(name, dir)| dir.join(name))
        .ok_or_else(|| ManifestError::NotFound {
            name: microservice.to_string(),
        })
}

/// Documents attached to the composite beyond the namespace and target docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposeOptions {
    pub with_configmap: bool,
    pub with_secrets: bool,
    pub with_volumes: bool,
}

/// Renders manifest templates against resolved environment configuration and
/// joins them into a single submission document.
pub struct ManifestComposer<'a> {
    root: PathBuf,
    resolver: &'a ConfigResolver,
    options: ComposeOptions,
}

impl<'a> ManifestComposer<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        resolver: &'a ConfigResolver,
        options: ComposeOptions,
    ) -> Self {
        Self {
            root: root.into(),
            resolver,
            options,
        }
    }

    /// Render one template file against the `(kind, env)` configuration.
    fn render(&self, path: &Path, kind: TemplateKind) -> Result<String, ManifestError> {
        let conf = self.resolver.resolve(kind)?;

        let name = path.display().to_string();
        let mut tera = Tera::default();
        tera.add_template_file(path, Some(name.as_str()))
            .map_err(|source| ManifestError::Render {
                path: name.clone(),
                source,
            })?;

        let mut context = Context::new();
        context.insert("conf", &conf);

        tera.render(&name, &context)
            .map_err(|source| ManifestError::Render { path: name, source })
    }

    /// Compose the full submission document for `target`.
    ///
    /// Document order is fixed regardless of flag order: the namespace
    /// document, then the optional configMap, secret, and volume documents,
    /// then the target document(s). The secrets document renders against the
    /// secrets-kind configuration; everything else against the conf kind.
    pub fn compose(&self, target: &Target) -> Result<String, ManifestError> {
        let mut documents = Vec::new();

        documents.push(self.render(&self.root.join("namespaces.yml"), TemplateKind::Conf)?);

        if self.options.with_configmap {
            documents.push(self.render(&self.root.join("configMaps.yml"), TemplateKind::Conf)?);
        }
        if self.options.with_secrets {
            documents.push(self.render(&self.root.join("secrets.yml"), TemplateKind::Secrets)?);
        }
        if self.options.with_volumes {
            documents.push(self.render(&self.root.join("volumes.yml"), TemplateKind::Conf)?);
        }

        match target {
            Target::All => {
                for (name, dir) in all_manifests(&self.root) {
                    debug!("Rendering manifest {} from {}", name, dir.display());
                    documents.push(self.render(&dir.join(&name), TemplateKind::Conf)?);
                }
            }
            Target::Microservice(name) => {
                let path = find_manifest(&self.root, name)?;
                documents.push(self.render(&path, TemplateKind::Conf)?);
            }
        }

        Ok(documents.join(DOCUMENT_SEPARATOR))
    }
}
