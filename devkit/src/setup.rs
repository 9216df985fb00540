//! Orchestration for `devkit setup`.
//!
//! Configuration problems (missing manifest, no package manager, unknown
//! package, failing descriptor) abort before any task runs. Task failures are
//! reported through the returned [`RunSummary`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::manifest::Manifest;
use crate::core::package::PackageMetadata;
use crate::core::task::TaskSnapshot;
use crate::io::manifest_store::{ManifestError, find_manifest, read_manifest};
use crate::io::package_manager::detect_package_manager;
use crate::io::process::ProcessRunner;
use crate::io::templates::TemplateStore;
use crate::registry::Registry;
use crate::resolve::resolve;
use crate::runner::{RunObserver, RunOptions, RunSummary, TaskRunner};
use crate::tasks::{TaskEnv, build_tasks};

/// The project being set up, located from the working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupProject {
    pub manifest_path: PathBuf,
    pub root: PathBuf,
    pub manifest: Manifest,
}

/// Find and parse the nearest `package.json` at or above `cwd`.
pub fn locate_project(cwd: &Path) -> Result<SetupProject, ManifestError> {
    let manifest_path = find_manifest(cwd)?;
    let manifest = read_manifest(&manifest_path)?;
    let root = manifest_path
        .parent()
        .map_or_else(|| cwd.to_path_buf(), Path::to_path_buf);
    Ok(SetupProject {
        manifest_path,
        root,
        manifest,
    })
}

/// External collaborators used by a setup run.
pub struct SetupServices<'a> {
    pub runner: Arc<dyn ProcessRunner>,
    pub metadata: &'a dyn PackageMetadata,
    pub templates: Arc<TemplateStore>,
    /// Whether a program is available on `PATH`.
    pub has_command: &'a dyn Fn(&str) -> bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupOptions {
    pub fail_fast: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// No package was selected; nothing ran.
    NothingSelected,
    Completed(RunSummary),
}

/// Resolve `packages` and run the setup tasks for `project`.
#[instrument(skip_all, fields(root = %project.root.display(), packages = packages.len()))]
pub fn run_setup<O>(
    project: &SetupProject,
    registry: &Registry,
    packages: &[String],
    options: SetupOptions,
    services: &SetupServices<'_>,
    observer: &mut O,
) -> Result<SetupOutcome>
where
    O: RunObserver + ?Sized,
{
    let selected = registry.select(packages)?;
    if selected.is_empty() {
        debug!("no packages selected");
        return Ok(SetupOutcome::NothingSelected);
    }

    let package_manager = detect_package_manager(&project.root, services.has_command)?;
    info!(%package_manager, "detected package manager");

    let resolved = resolve(&selected, &project.manifest, services.metadata)
        .context("resolve package configuration")?;

    let env = TaskEnv {
        root: project.root.clone(),
        manifest_path: project.manifest_path.clone(),
        package_manager,
        runner: Arc::clone(&services.runner),
        templates: Arc::clone(&services.templates),
    };
    let tasks = build_tasks(resolved, &env);

    let mut runner = TaskRunner::new(
        tasks,
        RunOptions {
            fail_on_rejected: options.fail_fast,
        },
    );
    let summary = runner.run(observer, |tasks: &[TaskSnapshot]| {
        debug!(tasks = tasks.len(), "setup tasks settled");
    })?;
    Ok(SetupOutcome::Completed(summary))
}
