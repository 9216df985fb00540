//! Turn a resolved configuration into the four setup tasks.
//!
//! Each action reads what it needs from disk when it runs, so a task never
//! works from a manifest captured before an earlier task changed it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::package::{CommandLine, FileSpec, ResolvedConfig};
use crate::io::manifest_store::{read_manifest, write_manifest};
use crate::io::package_manager::PackageManager;
use crate::io::process::{CommandRequest, ProcessRunner, run_checked};
use crate::io::templates::{TemplateContext, TemplateStore, write_files};
use crate::runner::TaskDefinition;

/// Everything the task actions need at run time.
#[derive(Clone)]
pub struct TaskEnv {
    /// Directory containing `package.json`; working directory of every command.
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub package_manager: PackageManager,
    pub runner: Arc<dyn ProcessRunner>,
    pub templates: Arc<TemplateStore>,
}

/// Build, in order: install packages, update package.json, create config
/// files, run post-setup scripts.
pub fn build_tasks(resolved: ResolvedConfig, env: &TaskEnv) -> Vec<TaskDefinition> {
    let ResolvedConfig {
        contributions,
        dependencies,
        dev_dependencies,
        files,
        post_setup_commands,
        ..
    } = resolved;
    let fragments: Vec<Value> = contributions
        .into_iter()
        .map(|contribution| contribution.manifest_fragment)
        .collect();

    let install_env = env.clone();
    let manifest_env = env.clone();
    let files_env = env.clone();
    let scripts_env = env.clone();

    vec![
        TaskDefinition::new(
            "Install packages",
            "Install dev and prod dependencies",
            move || install_packages(&install_env, &dependencies, &dev_dependencies),
        ),
        TaskDefinition::new(
            "Update package.json",
            "Add configs to package.json",
            move || update_manifest(&manifest_env, &fragments),
        ),
        TaskDefinition::new("Create config files", "Write out config files", move || {
            create_config_files(&files_env, &files)
        }),
        TaskDefinition::new(
            "Run post-setup scripts",
            "Run package setup commands",
            move || run_post_setup(&scripts_env, &post_setup_commands),
        ),
    ]
}

fn install_packages(
    env: &TaskEnv,
    dependencies: &[String],
    dev_dependencies: &[String],
) -> Result<()> {
    for (packages, dev) in [(dependencies, false), (dev_dependencies, true)] {
        if packages.is_empty() {
            debug!(dev, "nothing to install");
            continue;
        }
        let request = CommandRequest::new(
            env.package_manager.program(),
            env.package_manager.install_command(packages, dev),
            env.root.clone(),
        );
        info!(command = %request.display(), "installing packages");
        run_checked(env.runner.as_ref(), &request)?;
    }
    Ok(())
}

/// Fold each package's fragment onto the on-disk manifest, in package order.
fn update_manifest(env: &TaskEnv, fragments: &[Value]) -> Result<()> {
    let mut manifest = read_manifest(&env.manifest_path)?;
    for fragment in fragments {
        manifest.merge(fragment)?;
    }
    write_manifest(&env.manifest_path, &manifest)?;
    Ok(())
}

fn create_config_files(env: &TaskEnv, files: &[FileSpec]) -> Result<()> {
    if files.is_empty() {
        return Ok(());
    }
    let manifest = read_manifest(&env.manifest_path)?;
    let ctx = TemplateContext {
        github: manifest.repository(),
        pkg: manifest.into_value(),
    };
    write_files(&env.templates, &env.root, files, &ctx)?;
    Ok(())
}

fn run_post_setup(env: &TaskEnv, commands: &[CommandLine]) -> Result<()> {
    for command in commands {
        let Some((program, args)) = command.split_first() else {
            bail!("empty post-setup command");
        };
        let request = CommandRequest::new(program.as_str(), args.iter().cloned(), env.root.clone());
        info!(command = %request.display(), "running post-setup command");
        run_checked(env.runner.as_ref(), &request)
            .with_context(|| format!("post-setup command `{}`", request.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::PackageContribution;
    use crate::core::task::TaskState;
    use crate::runner::{NoopObserver, RunOptions, TaskRunner};
    use crate::test_support::{ScriptedProcessRunner, TempProject, failed_output, ok_output};
    use serde_json::json;

    fn env(project: &TempProject, runner: Arc<ScriptedProcessRunner>) -> TaskEnv {
        TaskEnv {
            root: project.path().to_path_buf(),
            manifest_path: project.manifest_path(),
            package_manager: PackageManager::Yarn,
            runner,
            templates: Arc::new(TemplateStore::bundled()),
        }
    }

    fn resolved(
        dependencies: &[&str],
        dev: &[&str],
        fragment: serde_json::Value,
        files: Vec<FileSpec>,
        commands: Vec<CommandLine>,
    ) -> ResolvedConfig {
        ResolvedConfig::aggregate(vec![PackageContribution {
            package: "test".to_string(),
            dependencies: dependencies.iter().map(|s| s.to_string()).collect(),
            dev_dependencies: dev.iter().map(|s| s.to_string()).collect(),
            manifest_fragment: fragment,
            files,
            post_setup_commands: commands,
        }])
    }

    fn contribution(package: &str, fragment: serde_json::Value) -> PackageContribution {
        PackageContribution {
            package: package.to_string(),
            dependencies: Vec::new(),
            dev_dependencies: Vec::new(),
            manifest_fragment: fragment,
            files: Vec::new(),
            post_setup_commands: Vec::new(),
        }
    }

    fn command(parts: &[&str]) -> CommandLine {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builds_four_tasks_in_order() {
        let project = TempProject::new(&json!({ "name": "demo" })).expect("project");
        let runner = Arc::new(ScriptedProcessRunner::default());
        let tasks = build_tasks(
            resolved(&[], &[], json!({}), Vec::new(), Vec::new()),
            &env(&project, runner),
        );
        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Install packages",
                "Update package.json",
                "Create config files",
                "Run post-setup scripts"
            ]
        );
    }

    #[test]
    fn install_skips_empty_lists() {
        let project = TempProject::new(&json!({ "name": "demo" })).expect("project");
        let runner = Arc::new(ScriptedProcessRunner::default());
        let mut tasks = build_tasks(
            resolved(&[], &["jest", "prettier"], json!({}), Vec::new(), Vec::new()),
            &env(&project, runner.clone()),
        );
        let install = tasks.remove(0);
        (install.action)().expect("install");
        assert_eq!(runner.command_lines(), vec!["yarn add --dev jest prettier"]);
        assert_eq!(runner.calls()[0].cwd, project.path());
    }

    #[test]
    fn update_manifest_reads_latest_disk_state() {
        let project = TempProject::new(&json!({ "name": "demo" })).expect("project");
        let runner = Arc::new(ScriptedProcessRunner::default());
        let mut tasks = build_tasks(
            resolved(&[], &[], json!({ "scripts": { "test": "jest" } }), Vec::new(), Vec::new()),
            &env(&project, runner),
        );

        // Simulates the install step adding devDependencies after the tasks were built.
        project
            .write_manifest(&json!({
                "devDependencies": { "jest": "^29.0.0" },
                "name": "demo",
                "readme": "ignored"
            }))
            .expect("rewrite");

        let update = tasks.remove(1);
        (update.action)().expect("update");

        let raw = project.read_file("package.json").expect("read");
        assert_eq!(
            raw,
            "{\n  \"name\": \"demo\",\n  \"scripts\": {\n    \"test\": \"jest\"\n  },\n  \"devDependencies\": {\n    \"jest\": \"^29.0.0\"\n  }\n}\n"
        );
    }

    #[test]
    fn update_manifest_applies_fragments_one_package_at_a_time() {
        let project = TempProject::new(&json!({ "name": "demo", "husky": { "legacy": true } }))
            .expect("project");
        let runner = Arc::new(ScriptedProcessRunner::default());
        let resolved = ResolvedConfig::aggregate(vec![
            contribution("a", json!({ "husky": "off" })),
            contribution("b", json!({ "husky": { "hooks": {} } })),
        ]);
        let mut tasks = build_tasks(resolved, &env(&project, runner));

        let update = tasks.remove(1);
        (update.action)().expect("update");

        let manifest = project.read_manifest().expect("manifest");
        assert_eq!(manifest["husky"], json!({ "hooks": {} }));
    }

    #[test]
    fn non_object_fragment_rejects_update_and_keeps_manifest() {
        let original = json!({ "name": "demo", "version": "1.0.0" });
        let project = TempProject::new(&original).expect("project");
        let runner = Arc::new(ScriptedProcessRunner::default());
        let mut tasks = build_tasks(
            resolved(&[], &[], serde_json::Value::Null, Vec::new(), Vec::new()),
            &env(&project, runner),
        );

        let update = tasks.remove(1);
        let err = (update.action)().expect_err("null fragment");
        assert!(err.to_string().contains("must be a JSON object"));
        assert_eq!(project.read_manifest().expect("manifest"), original);
    }

    #[test]
    fn config_files_render_repository_slug() {
        let project = TempProject::new(&json!({
            "name": "demo",
            "repository": { "type": "git", "url": "git@github.com:octo/demo.git" }
        }))
        .expect("project");
        let runner = Arc::new(ScriptedProcessRunner::default());
        let mut tasks = build_tasks(
            resolved(
                &[],
                &[],
                json!({}),
                vec![FileSpec::new(
                    "changeset-action.yml.jinja",
                    ".github/workflows/release.yml",
                )],
                Vec::new(),
            ),
            &env(&project, runner),
        );
        let files = tasks.remove(2);
        (files.action)().expect("files");
        let workflow = project
            .read_file(".github/workflows/release.yml")
            .expect("workflow");
        assert!(workflow.contains("'octo/demo'"));
    }

    #[test]
    fn post_setup_stops_at_first_failure() {
        let project = TempProject::new(&json!({ "name": "demo" })).expect("project");
        let runner = Arc::new(ScriptedProcessRunner::new(vec![
            ok_output(""),
            failed_output(2, "boom"),
        ]));
        let mut tasks = build_tasks(
            resolved(
                &[],
                &[],
                json!({}),
                Vec::new(),
                vec![
                    command(&["first"]),
                    command(&["second", "--flag"]),
                    command(&["third"]),
                ],
            ),
            &env(&project, runner.clone()),
        );
        let scripts = tasks.remove(3);
        let err = (scripts.action)().expect_err("fails");
        assert!(format!("{err:#}").contains("second --flag"));
        assert_eq!(runner.command_lines(), vec!["first", "second --flag"]);
    }

    #[test]
    fn failed_install_rejects_only_that_task() {
        let project = TempProject::new(&json!({ "name": "demo" })).expect("project");
        let runner = Arc::new(ScriptedProcessRunner::new(vec![failed_output(1, "offline")]));
        let tasks = build_tasks(
            resolved(&["react"], &[], json!({ "private": true }), Vec::new(), Vec::new()),
            &env(&project, runner),
        );
        let mut task_runner = TaskRunner::new(tasks, RunOptions::default());
        let summary = task_runner.run(&mut NoopObserver, |_| {}).expect("run");

        let states: Vec<TaskState> = summary.tasks.iter().map(|t| t.state).collect();
        assert_eq!(
            states,
            vec![
                TaskState::Rejected,
                TaskState::Resolved,
                TaskState::Resolved,
                TaskState::Resolved
            ]
        );
        assert!(summary.errors[0].message.contains("offline"));
        assert_eq!(project.read_manifest().expect("manifest")["private"], true);
    }
}
