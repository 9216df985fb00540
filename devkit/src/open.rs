//! Orchestration for `devkit open`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::io::config::OpenConfig;
use crate::io::editor::{copy_to_clipboard, open_in_editor};
use crate::io::process::ProcessRunner;
use crate::io::projects::{FinderOptions, Project, find_projects, resolve_roots};

/// Roots to scan: `extra_roots` when given, else the configured ones.
pub fn scan_roots(
    config: &OpenConfig,
    extra_roots: &[PathBuf],
    home: Option<&Path>,
) -> Vec<PathBuf> {
    let roots = if extra_roots.is_empty() {
        config.roots.as_slice()
    } else {
        extra_roots
    };
    resolve_roots(roots, home)
}

/// Discover projects for the picker.
pub fn discover_projects(config: &OpenConfig, extra_roots: &[PathBuf]) -> Vec<Project> {
    let home = dirs::home_dir();
    let roots = scan_roots(config, extra_roots, home.as_deref());
    find_projects(&roots, &FinderOptions::from_config(config))
}

/// What happened after a project was picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOutcome {
    pub editor: String,
    /// Clipboard program used, if the copy worked.
    pub clipboard: Option<&'static str>,
}

/// Open `project` in `editor`, then copy its path to the clipboard.
///
/// A missing editor is an error; a failed clipboard copy is not.
#[instrument(skip(runner, project), fields(project = %project.path.display()))]
pub fn open_project(
    runner: &dyn ProcessRunner,
    editor: &str,
    project: &Project,
) -> Result<OpenOutcome> {
    open_in_editor(runner, editor, &project.path)?;
    info!(editor, "editor launched");

    let path = project.path.display().to_string();
    let clipboard = copy_to_clipboard(runner, &project.path, &path);
    if clipboard.is_none() {
        warn!("no clipboard program succeeded");
    }
    Ok(OpenOutcome {
        editor: editor.to_string(),
        clipboard,
    })
}
