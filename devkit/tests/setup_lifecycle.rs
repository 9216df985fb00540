//! End-to-end setup runs against a temp project with scripted processes.
//!
//! These tests drive `run_setup` through resolution and all four tasks and
//! check what lands on disk, what commands ran, and how task failures settle
//! with fail-fast on and off.

use std::sync::Arc;

use serde_json::json;

use devkit::core::task::TaskState;
use devkit::io::templates::TemplateStore;
use devkit::registry::Registry;
use devkit::runner::NoopObserver;
use devkit::setup::{SetupOptions, SetupOutcome, SetupServices, locate_project, run_setup};
use devkit::test_support::{ScriptedProcessRunner, StaticMetadata, TempProject, failed_output};

fn yarn_project() -> TempProject {
    let project = TempProject::new(&json!({
        "name": "demo",
        "version": "1.0.0",
        "repository": "https://github.com/octo/demo.git"
    }))
    .expect("project");
    project.write_file("yarn.lock", "").expect("lockfile");
    project
}

fn setup(
    project: &TempProject,
    runner: Arc<ScriptedProcessRunner>,
    packages: &[&str],
    fail_fast: bool,
) -> SetupOutcome {
    let located = locate_project(project.path()).expect("locate");
    let metadata = StaticMetadata::new();
    let services = SetupServices {
        runner,
        metadata: &metadata,
        templates: Arc::new(TemplateStore::bundled()),
        has_command: &|_| false,
    };
    let packages: Vec<String> = packages.iter().map(ToString::to_string).collect();
    run_setup(
        &located,
        &Registry::builtin(),
        &packages,
        SetupOptions { fail_fast },
        &services,
        &mut NoopObserver,
    )
    .expect("setup")
}

fn states(outcome: &SetupOutcome) -> Vec<TaskState> {
    match outcome {
        SetupOutcome::Completed(summary) => summary.tasks.iter().map(|t| t.state).collect(),
        SetupOutcome::NothingSelected => panic!("expected a completed run"),
    }
}

/// Full run: husky, prettier and changesets against a yarn project.
///
/// Checks the install command, the merged manifest, the rendered release
/// workflow and the post-setup command, in that order of execution.
#[test]
fn full_setup_installs_merges_writes_and_runs_scripts() {
    let project = yarn_project();
    let runner = Arc::new(ScriptedProcessRunner::default());

    let outcome = setup(
        &project,
        runner.clone(),
        &["changesets", "prettier", "husky"],
        true,
    );
    assert_eq!(states(&outcome), vec![TaskState::Resolved; 4]);

    assert_eq!(
        runner.command_lines(),
        vec![
            "yarn add --dev husky prettier @changesets/cli",
            "npx changeset init",
        ]
    );
    for call in runner.calls() {
        assert_eq!(call.cwd, project.path());
    }

    let manifest = project.read_manifest().expect("manifest");
    assert_eq!(manifest["name"], "demo");
    assert_eq!(manifest["prettier"]["singleQuote"], true);
    assert_eq!(manifest["husky"], json!({ "hooks": {} }));
    assert_eq!(
        manifest["scripts"]["release"],
        "npm run build && npx changeset publish"
    );

    let workflow = project
        .read_file(".github/workflows/release.yml")
        .expect("workflow");
    assert!(workflow.contains("octo/demo"));
    assert!(workflow.contains("${{ secrets."));
}

#[test]
fn fail_fast_leaves_later_tasks_idle() {
    let project = yarn_project();
    let runner = Arc::new(ScriptedProcessRunner::new(vec![failed_output(
        1,
        "network unreachable",
    )]));

    let outcome = setup(&project, runner.clone(), &["prettier"], true);
    assert_eq!(
        states(&outcome),
        vec![
            TaskState::Rejected,
            TaskState::Idle,
            TaskState::Idle,
            TaskState::Idle
        ]
    );
    let SetupOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run");
    };
    assert!(summary.has_rejected());
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].message.contains("network unreachable"));

    assert_eq!(runner.command_lines(), vec!["yarn add --dev prettier"]);
    let manifest = project.read_manifest().expect("manifest");
    assert!(manifest.get("prettier").is_none());
}

#[test]
fn without_fail_fast_later_tasks_still_run() {
    let project = yarn_project();
    let runner = Arc::new(ScriptedProcessRunner::new(vec![failed_output(
        1,
        "network unreachable",
    )]));

    let outcome = setup(&project, runner, &["prettier", "typescript"], false);
    assert_eq!(
        states(&outcome),
        vec![
            TaskState::Rejected,
            TaskState::Resolved,
            TaskState::Resolved,
            TaskState::Resolved
        ]
    );

    let manifest = project.read_manifest().expect("manifest");
    assert_eq!(manifest["prettier"]["trailingComma"], "all");
    let tsconfig = project.read_file("tsconfig.json").expect("tsconfig");
    assert!(tsconfig.contains("compilerOptions"));
}

#[test]
fn unknown_package_is_rejected_before_any_task() {
    let project = yarn_project();
    let located = locate_project(project.path()).expect("locate");
    let runner = Arc::new(ScriptedProcessRunner::default());
    let metadata = StaticMetadata::new();
    let services = SetupServices {
        runner: runner.clone(),
        metadata: &metadata,
        templates: Arc::new(TemplateStore::bundled()),
        has_command: &|_| false,
    };

    let err = run_setup(
        &located,
        &Registry::builtin(),
        &["prettier".to_string(), "rome".to_string()],
        SetupOptions { fail_fast: true },
        &services,
        &mut NoopObserver,
    )
    .expect_err("unknown package");
    assert!(err.to_string().contains("rome"));
    assert!(runner.calls().is_empty());
}
