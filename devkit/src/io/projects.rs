//! Project discovery under configured root directories.
//!
//! A directory containing a `.git` entry is a project and is never descended
//! into. Each directory level is scanned breadth-first by a bounded pool of
//! scoped threads; the final list is sorted by path.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::io::config::{ExpandRule, OpenConfig};
use crate::io::git::{GIT_MARKER, read_branch};

/// A discovered project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderOptions {
    /// Directory names never descended into.
    pub ignore: Vec<String>,
    /// Maximum threads scanning one level.
    pub workers: usize,
    /// Named subfolders listed as separate projects.
    pub expand: Vec<ExpandRule>,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self::from_config(&OpenConfig::default())
    }
}

impl FinderOptions {
    pub fn from_config(config: &OpenConfig) -> Self {
        Self {
            ignore: config.ignore.clone(),
            workers: config.scan_workers,
            expand: config.expand.clone(),
        }
    }
}

/// Outcome of reading one directory.
enum DirScan {
    Project(PathBuf),
    Children(Vec<PathBuf>),
    Skipped,
}

/// Resolve relative roots against `home`. Roots stay as given without a home directory.
pub fn resolve_roots(roots: &[PathBuf], home: Option<&Path>) -> Vec<PathBuf> {
    roots
        .iter()
        .map(|root| match home {
            Some(home) if root.is_relative() => home.join(root),
            _ => root.clone(),
        })
        .collect()
}

/// Find every project under `roots`, sorted by path, with expansions inserted
/// right after their parent project.
#[instrument(skip_all, fields(roots = roots.len(), workers = options.workers))]
pub fn find_projects(roots: &[PathBuf], options: &FinderOptions) -> Vec<Project> {
    let mut found = Vec::new();
    let mut frontier: Vec<PathBuf> = roots.to_vec();

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for scan in scan_level(&frontier, options) {
            match scan {
                DirScan::Project(path) => found.push(path),
                DirScan::Children(children) => next.extend(children),
                DirScan::Skipped => {}
            }
        }
        frontier = next;
    }

    found.sort();
    found.dedup();
    debug!(count = found.len(), "projects found");

    let mut projects = Vec::with_capacity(found.len());
    for path in found {
        let project = Project {
            name: dir_name(&path),
            branch: read_branch(&path),
            path,
        };
        let expansions = expand(&project, &options.expand);
        projects.push(project);
        projects.extend(expansions);
    }
    projects
}

/// Scan one level with at most `options.workers` threads.
fn scan_level(level: &[PathBuf], options: &FinderOptions) -> Vec<DirScan> {
    let workers = options.workers.max(1);
    let chunk_size = level.len().div_ceil(workers).max(1);

    thread::scope(|scope| {
        let handles: Vec<_> = level
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|dir| scan_dir(dir, &options.ignore))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(scans) => scans,
                Err(_) => {
                    warn!("directory scan thread panicked");
                    Vec::new()
                }
            })
            .collect()
    })
}

fn scan_dir(dir: &Path, ignore: &[String]) -> DirScan {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), err = %err, "skipping unreadable directory");
            return DirScan::Skipped;
        }
    };

    let mut children = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name == GIT_MARKER {
            return DirScan::Project(dir.to_path_buf());
        }
        // `file_type` does not follow symlinks.
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        if ignore.iter().any(|ignored| name.to_str() == Some(ignored.as_str())) {
            continue;
        }
        children.push(entry.path());
    }
    DirScan::Children(children)
}

fn expand(project: &Project, rules: &[ExpandRule]) -> Vec<Project> {
    rules
        .iter()
        .filter(|rule| rule.project == project.name)
        .flat_map(|rule| rule.subfolders.iter())
        .filter(|subfolder| project.path.join(subfolder).is_dir())
        .map(|subfolder| Project {
            name: format!("{}/{subfolder}", project.name),
            path: project.path.join(subfolder),
            branch: project.branch.clone(),
        })
        .collect()
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
