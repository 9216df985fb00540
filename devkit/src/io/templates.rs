//! Bundled config-file templates and writing them into a project.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::package::FileSpec;
use crate::core::repository::RepoSlug;

/// Asset names with this suffix are rendered; all others are copied verbatim.
pub const TEMPLATE_SUFFIX: &str = ".jinja";

const BUNDLED: [(&str, &str); 4] = [
    ("jest.config.js", include_str!("../../assets/jest.config.js")),
    (".babelrc", include_str!("../../assets/.babelrc")),
    ("tsconfig.json", include_str!("../../assets/tsconfig.json")),
    (
        "changeset-action.yml.jinja",
        include_str!("../../assets/changeset-action.yml.jinja"),
    ),
];

/// Variables visible to templates.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    /// The project's `package.json`.
    pub pkg: Value,
    /// Repository owner/name, when the manifest has a `.git` repository URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<RepoSlug>,
}

/// Named template sources.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    sources: BTreeMap<String, String>,
}

impl TemplateStore {
    /// Templates compiled into the binary.
    pub fn bundled() -> Self {
        Self::from_entries(BUNDLED)
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            sources: entries
                .into_iter()
                .map(|(name, source)| (name.into(), source.into()))
                .collect(),
        }
    }

    pub fn source(&self, name: &str) -> Result<&str> {
        self.sources
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("unknown template '{name}'"))
    }

    /// Contents for `name`: rendered if it is a `.jinja` template, else verbatim.
    pub fn render(&self, name: &str, ctx: &TemplateContext) -> Result<String> {
        let source = self.source(name)?;
        if !name.ends_with(TEMPLATE_SUFFIX) {
            return Ok(source.to_string());
        }
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        env.render_str(source, ctx)
            .with_context(|| format!("render template '{name}'"))
    }
}

/// Render every file and write it under `root`, creating parent directories.
///
/// Returns the written paths in input order.
#[instrument(skip_all, fields(root = %root.display(), files = files.len()))]
pub fn write_files(
    store: &TemplateStore,
    root: &Path,
    files: &[FileSpec],
    ctx: &TemplateContext,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let target = resolve_output(root, &file.output)?;
        let contents = store.render(&file.template, ctx)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&target, contents).with_context(|| format!("write {}", target.display()))?;
        debug!(path = %target.display(), template = %file.template, "wrote file");
        written.push(target);
    }
    Ok(written)
}

/// Join `output` onto `root`, refusing paths that leave the project.
fn resolve_output(root: &Path, output: &str) -> Result<PathBuf> {
    let rel = Path::new(output);
    if output.is_empty()
        || rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        bail!("output path '{output}' must be relative to the project root");
    }
    Ok(root.join(rel))
}
