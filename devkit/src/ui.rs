//! Terminal presentation: selection prompts, task spinners and messages.

use std::time::Duration;

use anyhow::Result;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{FuzzySelect, MultiSelect};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::core::task::{RunState, RunStatus, TaskSnapshot, TaskState};
use crate::io::projects::Project;
use crate::registry::Registry;
use crate::runner::{RunObserver, RunSummary};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Ask which packages to add. `None` if the prompt was cancelled.
pub fn select_packages(registry: &Registry) -> Result<Option<Vec<String>>> {
    let labels: Vec<String> = registry
        .iter()
        .map(|package| format!("{} {}", package.name, style(&package.description).dim()))
        .collect();
    let picked = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Select packages to add (space to toggle, enter to confirm)")
        .items(&labels)
        .interact_opt()?;
    Ok(picked.map(|indices| {
        registry
            .iter()
            .enumerate()
            .filter(|(index, _)| indices.contains(index))
            .map(|(_, package)| package.name.clone())
            .collect()
    }))
}

/// Fuzzy-pick a project. `None` if the prompt was cancelled.
pub fn select_project(projects: &[Project]) -> Result<Option<&Project>> {
    let labels: Vec<String> = projects.iter().map(project_label).collect();
    let picked = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Open project")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    Ok(picked.and_then(|index| projects.get(index)))
}

fn project_label(project: &Project) -> String {
    match &project.branch {
        Some(branch) => format!("{} {}", project.name, style(format!("({branch})")).dim()),
        None => project.name.clone(),
    }
}

fn plain_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} {msg}")
        .map(|style| style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// One spinner line per task, redrawn from the run state after each transition.
///
/// Lines are created on the first transition, when the task list is known.
#[derive(Default)]
pub struct TaskRenderer {
    multi: MultiProgress,
    bars: Vec<ProgressBar>,
    shown: Vec<Option<TaskState>>,
}

impl TaskRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_bars(&mut self, tasks: &[TaskSnapshot]) {
        if self.bars.len() == tasks.len() {
            return;
        }
        self.bars = tasks
            .iter()
            .map(|task| {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(plain_style());
                bar.set_message(format!("{} {}", style("○").dim(), task.name));
                bar
            })
            .collect();
        self.shown = vec![None; tasks.len()];
    }
}

impl RunObserver for TaskRenderer {
    fn on_transition(&mut self, state: &RunState) {
        self.ensure_bars(state.tasks());
        let done = state.status() == RunStatus::Done;
        for ((task, bar), shown) in state
            .tasks()
            .iter()
            .zip(&self.bars)
            .zip(self.shown.iter_mut())
        {
            let skipped = done && task.state == TaskState::Idle;
            if *shown == Some(task.state) && !skipped {
                continue;
            }
            *shown = Some(task.state);
            match task.state {
                TaskState::Idle if skipped => bar.finish_with_message(format!(
                    "{} {} {}",
                    style("○").dim(),
                    style(&task.name).dim(),
                    style("skipped").dim()
                )),
                TaskState::Idle => {}
                TaskState::Pending => {
                    bar.set_style(spinner_style());
                    bar.set_message(format!("{} {}", task.name, style(&task.description).dim()));
                    bar.enable_steady_tick(Duration::from_millis(100));
                }
                TaskState::Resolved => {
                    bar.set_style(plain_style());
                    bar.finish_with_message(format!("{} {}", style("✓").green().bold(), task.name));
                }
                TaskState::Rejected => {
                    bar.set_style(plain_style());
                    let reason = task.error.as_deref().unwrap_or("failed");
                    let first_line = reason.lines().next().unwrap_or(reason);
                    bar.finish_with_message(format!(
                        "{} {} {}",
                        style("✗").red().bold(),
                        task.name,
                        style(first_line).red()
                    ));
                }
            }
        }
    }
}

/// Print the outcome of a setup run, listing every failed task in full.
pub fn print_summary(summary: &RunSummary) {
    let skipped = summary
        .tasks
        .iter()
        .filter(|task| task.state == TaskState::Idle)
        .count();

    if !summary.has_rejected() {
        success("Setup complete");
        return;
    }

    header("Errors");
    for failure in &summary.errors {
        error(&format!("{}: {}", failure.task.name, failure.message));
    }
    if skipped > 0 {
        warning(&format!("{skipped} task(s) skipped after the first failure"));
    }
}
