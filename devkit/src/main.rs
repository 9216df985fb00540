//! devkit command-line entry point.
//!
//! `devkit open` picks a project and opens it in an editor; `devkit setup`
//! adds tooling packages to the JavaScript project in the current directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use devkit::exit_codes;
use devkit::io::config::{CONFIG_ENV, DevkitConfig, load_config_or_default};
use devkit::io::editor::editor_command;
use devkit::io::metadata::NpmMetadata;
use devkit::io::package_manager::on_path;
use devkit::io::process::{ProcessRunner, SystemProcessRunner};
use devkit::io::templates::TemplateStore;
use devkit::logging;
use devkit::open::{discover_projects, open_project};
use devkit::registry::Registry;
use devkit::setup::{SetupOptions, SetupOutcome, SetupServices, locate_project, run_setup};
use devkit::ui;

#[derive(Parser)]
#[command(
    name = "devkit",
    version,
    about = "Open projects in your editor and set up JavaScript tooling"
)]
struct Cli {
    /// Config file (default: <config dir>/devkit/config.toml).
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pick a git project and open it in your editor.
    Open {
        /// Directory to scan instead of the configured roots (repeatable).
        #[arg(long = "root")]
        roots: Vec<PathBuf>,
    },
    /// Add tooling packages to the project in the current directory.
    Setup {
        /// Stop at the first failed task.
        #[arg(long, overrides_with = "no_fail_fast")]
        fail_fast: bool,
        /// Keep running tasks after a failure.
        #[arg(long, overrides_with = "fail_fast")]
        no_fail_fast: bool,
        /// Packages to add without prompting (comma separated or repeated).
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        packages: Option<Vec<String>>,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            ui::error(&format!("{err:#}"));
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config_or_default(cli.config.as_deref())?;
    match cli.command {
        Command::Open { roots } => cmd_open(&config, &roots),
        Command::Setup {
            fail_fast,
            no_fail_fast,
            packages,
        } => {
            let fail_fast = resolve_fail_fast(config.setup.fail_fast, fail_fast, no_fail_fast);
            let cwd = std::env::current_dir().context("read current directory")?;
            cmd_setup(&config, &cwd, fail_fast, packages)
        }
    }
}

/// Command-line flags win over the configured default.
fn resolve_fail_fast(configured: bool, fail_fast: bool, no_fail_fast: bool) -> bool {
    if fail_fast {
        true
    } else if no_fail_fast {
        false
    } else {
        configured
    }
}

fn cmd_open(config: &DevkitConfig, roots: &[PathBuf]) -> Result<i32> {
    let projects = discover_projects(&config.open, roots);
    if projects.is_empty() {
        ui::warning("No projects found");
        return Ok(exit_codes::OK);
    }
    let Some(project) = ui::select_project(&projects)? else {
        ui::info("Cancelled");
        return Ok(exit_codes::OK);
    };

    let env_editor = std::env::var("EDITOR").ok();
    let editor = editor_command(config.open.editor.as_deref(), env_editor.as_deref());
    let runner = SystemProcessRunner::new(config.process.output_limit_bytes);
    let outcome = open_project(&runner, &editor, project)?;

    ui::success(&format!("Opened {} in {}", project.name, outcome.editor));
    match outcome.clipboard {
        Some(_) => ui::info(&format!("Copied {} to clipboard", project.path.display())),
        None => ui::warning("Could not copy the project path to the clipboard"),
    }
    Ok(exit_codes::OK)
}

fn cmd_setup(
    config: &DevkitConfig,
    cwd: &Path,
    fail_fast: bool,
    packages: Option<Vec<String>>,
) -> Result<i32> {
    let project = locate_project(cwd)?;
    let registry = Registry::builtin();

    let packages = match packages {
        Some(packages) => packages,
        None => match ui::select_packages(&registry)? {
            Some(packages) => packages,
            None => {
                ui::info("Cancelled");
                return Ok(exit_codes::OK);
            }
        },
    };

    let runner: Arc<dyn ProcessRunner> =
        Arc::new(SystemProcessRunner::new(config.process.output_limit_bytes));
    let metadata = NpmMetadata::new(Arc::clone(&runner), &project.root);
    let services = SetupServices {
        runner,
        metadata: &metadata,
        templates: Arc::new(TemplateStore::bundled()),
        has_command: &on_path,
    };

    let mut renderer = ui::TaskRenderer::new();
    let outcome = run_setup(
        &project,
        &registry,
        &packages,
        SetupOptions { fail_fast },
        &services,
        &mut renderer,
    )?;

    match outcome {
        SetupOutcome::NothingSelected => {
            ui::info("No packages selected");
            Ok(exit_codes::OK)
        }
        SetupOutcome::Completed(summary) => {
            ui::print_summary(&summary);
            if summary.has_rejected() {
                Ok(exit_codes::TASKS_FAILED)
            } else {
                Ok(exit_codes::OK)
            }
        }
    }
}
