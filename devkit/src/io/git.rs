//! Read-only git metadata for discovered projects.
//!
//! Only `.git/HEAD` is inspected; no `git` subprocess is spawned per project.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

/// Name of the version-control marker entry.
pub const GIT_MARKER: &str = ".git";

/// Branch checked out in `project`, or `None` for detached heads and
/// unreadable metadata.
#[instrument(level = "trace", skip_all, fields(project = %project.display()))]
pub fn read_branch(project: &Path) -> Option<String> {
    let git_dir = resolve_git_dir(project)?;
    let head = match fs::read_to_string(git_dir.join("HEAD")) {
        Ok(head) => head,
        Err(err) => {
            debug!(err = %err, "HEAD unreadable");
            return None;
        }
    };
    parse_head(&head)
}

/// The git directory for `project`, following `gitdir:` files used by
/// worktrees and submodules.
fn resolve_git_dir(project: &Path) -> Option<PathBuf> {
    let marker = project.join(GIT_MARKER);
    if marker.is_dir() {
        return Some(marker);
    }
    let contents = fs::read_to_string(&marker).ok()?;
    let target = contents.trim().strip_prefix("gitdir:")?.trim();
    let target = Path::new(target);
    Some(if target.is_absolute() {
        target.to_path_buf()
    } else {
        project.join(target)
    })
}

fn parse_head(head: &str) -> Option<String> {
    head.trim()
        .strip_prefix("ref:")
        .map(str::trim)
        .map(|reference| {
            reference
                .strip_prefix("refs/heads/")
                .unwrap_or(reference)
                .to_string()
        })
}
