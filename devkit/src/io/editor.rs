//! Launching an editor on a project and copying its path to the clipboard.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::io::process::{CommandRequest, ProcessRunner, run_checked};

pub const DEFAULT_EDITOR: &str = "code";

/// Clipboard programs tried in order, with their arguments.
const CLIPBOARD_PROGRAMS: [(&str, &[&str]); 4] = [
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("clip.exe", &[]),
];

/// Editor program: configured value, else `$EDITOR`, else `code`.
pub fn editor_command(configured: Option<&str>, env_editor: Option<&str>) -> String {
    configured
        .or(env_editor)
        .map(str::trim)
        .filter(|editor| !editor.is_empty())
        .unwrap_or(DEFAULT_EDITOR)
        .to_string()
}

/// Split an editor setting like `code --wait` into program and leading args.
fn split_editor(editor: &str) -> (String, Vec<String>) {
    let mut parts = editor.split_whitespace().map(str::to_string);
    let program = parts.next().unwrap_or_else(|| DEFAULT_EDITOR.to_string());
    (program, parts.collect())
}

/// Resolve the editor on `PATH` and open `project` with it.
#[instrument(skip(runner))]
pub fn open_in_editor(runner: &dyn ProcessRunner, editor: &str, project: &Path) -> Result<()> {
    let (program, mut args) = split_editor(editor);
    let resolved: PathBuf =
        which::which(&program).with_context(|| format!("editor `{program}` not found on PATH"))?;
    debug!(editor = %resolved.display(), "launching editor");
    args.push(project.display().to_string());
    let request = CommandRequest::new(resolved.display().to_string(), args, project);
    run_checked(runner, &request)?;
    Ok(())
}

/// Copy `text` to the clipboard with the first available program.
///
/// Returns the program used, or `None` when no clipboard program worked.
pub fn copy_to_clipboard(runner: &dyn ProcessRunner, cwd: &Path, text: &str) -> Option<&'static str> {
    for (program, args) in CLIPBOARD_PROGRAMS {
        if which::which(program).is_err() {
            continue;
        }
        let request = CommandRequest::new(program, args.iter().copied(), cwd).with_stdin(text);
        match run_checked(runner, &request) {
            Ok(_) => return Some(program),
            Err(err) => warn!(program, err = %format!("{err:#}"), "clipboard copy failed"),
        }
    }
    None
}
