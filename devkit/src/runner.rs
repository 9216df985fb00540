//! Sequential task runner.
//!
//! Drives [`RunState`] by executing one task action at a time. Action errors
//! and panics are captured into task state and never escape [`TaskRunner::run`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::task::{
    RunEvent, RunState, TaskError, TaskId, TaskSnapshot, Transition, TransitionError,
};

/// Zero-argument unit of work. Runs at most once.
pub type Action = Box<dyn FnOnce() -> Result<()>>;

/// A task before it is handed to the runner.
pub struct TaskDefinition {
    pub name: String,
    pub description: String,
    pub action: Action,
}

impl TaskDefinition {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            action: Box::new(action),
        }
    }
}

impl std::fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop at the first rejected task, leaving the rest idle.
    pub fail_on_rejected: bool,
}

/// Receives the run state after every transition.
pub trait RunObserver {
    fn on_transition(&mut self, state: &RunState);
}

/// Observer that ignores every transition.
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_transition(&mut self, _state: &RunState) {}
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub tasks: Vec<TaskSnapshot>,
    pub errors: Vec<TaskError>,
}

impl RunSummary {
    pub fn has_rejected(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Owns a task list and executes it once.
pub struct TaskRunner {
    state: RunState,
    actions: Vec<Option<Action>>,
}

impl TaskRunner {
    /// Assign ids and take ownership of the actions.
    pub fn new(definitions: Vec<TaskDefinition>, options: RunOptions) -> Self {
        let mut snapshots = Vec::with_capacity(definitions.len());
        let mut actions = Vec::with_capacity(definitions.len());
        for definition in definitions {
            snapshots.push(TaskSnapshot::new(
                TaskId::generate(),
                definition.name,
                definition.description,
            ));
            actions.push(Some(definition.action));
        }
        Self {
            state: RunState::new(snapshots, options.fail_on_rejected),
            actions,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Execute tasks in order until none can start, then call `on_done` once.
    ///
    /// Fails only on misuse (running the same runner twice); task failures
    /// are recorded in the returned summary.
    #[instrument(skip_all, fields(tasks = self.actions.len(), fail_on_rejected = self.state.fail_on_rejected()))]
    pub fn run<O, F>(&mut self, observer: &mut O, on_done: F) -> Result<RunSummary, TransitionError>
    where
        O: RunObserver + ?Sized,
        F: FnOnce(&[TaskSnapshot]),
    {
        let mut next = self.state.apply(RunEvent::Start)?;
        observer.on_transition(&self.state);

        while let Transition::Execute(index) = next {
            let outcome = self.execute(index);
            next = self.state.apply(RunEvent::Settled(outcome))?;
            observer.on_transition(&self.state);
        }

        info!(rejected = self.state.errors().len(), "task run done");
        on_done(self.state.tasks());
        Ok(RunSummary {
            tasks: self.state.tasks().to_vec(),
            errors: self.state.errors(),
        })
    }

    fn execute(&mut self, index: usize) -> Result<(), String> {
        let name = self.state.tasks()[index].name.clone();
        let Some(action) = self.actions.get_mut(index).and_then(Option::take) else {
            return Err(format!("task '{name}' has no action"));
        };

        debug!(task = %name, "running task");
        let outcome = match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(result) => result.map_err(|err| format!("{err:#}")),
            Err(payload) => Err(format!("task panicked: {}", panic_message(payload.as_ref()))),
        };
        match &outcome {
            Ok(()) => debug!(task = %name, "task resolved"),
            Err(message) => warn!(task = %name, err = %message, "task rejected"),
        }
        outcome
    }
}

/// Text of a panic payload from `catch_unwind` or a thread join.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{RunStatus, TaskState};
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn task(name: &str, ok: bool, log: &Log) -> TaskDefinition {
        let log = Rc::clone(log);
        let label = name.to_string();
        TaskDefinition::new(name, format!("{name} description"), move || {
            log.borrow_mut().push(label.clone());
            if ok { Ok(()) } else { Err(anyhow!("{label} failed")) }
        })
    }

    #[derive(Default)]
    struct RecordingObserver {
        statuses: Vec<RunStatus>,
    }

    impl RunObserver for RecordingObserver {
        fn on_transition(&mut self, state: &RunState) {
            self.statuses.push(state.status());
        }
    }

    fn states(tasks: &[TaskSnapshot]) -> Vec<TaskState> {
        tasks.iter().map(|t| t.state).collect()
    }

    #[test]
    fn resolves_all_tasks_in_order() {
        let log = Log::default();
        let mut runner = TaskRunner::new(
            vec![task("one", true, &log), task("two", true, &log), task("three", true, &log)],
            RunOptions::default(),
        );
        let mut done_calls = 0;
        let summary = runner
            .run(&mut NoopObserver, |tasks| {
                done_calls += 1;
                assert!(tasks.iter().all(|t| t.state == TaskState::Resolved));
            })
            .expect("run");

        assert_eq!(done_calls, 1);
        assert_eq!(*log.borrow(), vec!["one", "two", "three"]);
        assert!(!summary.has_rejected());
    }

    #[test]
    fn empty_list_calls_on_done_without_pending() {
        let mut runner = TaskRunner::new(Vec::new(), RunOptions::default());
        let mut observer = RecordingObserver::default();
        let mut seen = None;
        runner
            .run(&mut observer, |tasks| seen = Some(tasks.len()))
            .expect("run");

        assert_eq!(seen, Some(0));
        assert_eq!(observer.statuses, vec![RunStatus::Done]);
    }

    #[test]
    fn keeps_going_after_rejection_by_default() {
        let log = Log::default();
        let mut runner = TaskRunner::new(
            vec![task("t1", true, &log), task("t2", false, &log), task("t3", true, &log)],
            RunOptions::default(),
        );
        let summary = runner.run(&mut NoopObserver, |_| {}).expect("run");

        assert_eq!(
            states(&summary.tasks),
            vec![TaskState::Resolved, TaskState::Rejected, TaskState::Resolved]
        );
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].task.name, "t2");
        assert_eq!(summary.errors[0].message, "t2 failed");
    }

    #[test]
    fn fail_fast_leaves_remaining_tasks_idle() {
        let log = Log::default();
        let mut runner = TaskRunner::new(
            vec![task("t1", true, &log), task("t2", false, &log), task("t3", true, &log)],
            RunOptions {
                fail_on_rejected: true,
            },
        );
        let summary = runner.run(&mut NoopObserver, |_| {}).expect("run");

        assert_eq!(
            states(&summary.tasks),
            vec![TaskState::Resolved, TaskState::Rejected, TaskState::Idle]
        );
        assert_eq!(*log.borrow(), vec!["t1", "t2"]);
    }

    #[test]
    fn panicking_action_is_rejected_and_run_completes() {
        let log = Log::default();
        let mut runner = TaskRunner::new(
            vec![
                TaskDefinition::new("explode", "", || panic!("template index out of range")),
                task("after", true, &log),
            ],
            RunOptions::default(),
        );
        let mut done_calls = 0;
        let summary = runner
            .run(&mut NoopObserver, |_| done_calls += 1)
            .expect("run");

        assert_eq!(done_calls, 1);
        assert_eq!(runner.state().status(), RunStatus::Done);
        assert_eq!(
            states(&summary.tasks),
            vec![TaskState::Rejected, TaskState::Resolved]
        );
        assert_eq!(
            summary.errors[0].message,
            "task panicked: template index out of range"
        );
        assert_eq!(*log.borrow(), vec!["after"]);
    }

    #[test]
    fn second_run_fails_loudly() {
        let log = Log::default();
        let mut runner = TaskRunner::new(vec![task("t1", true, &log)], RunOptions::default());
        runner.run(&mut NoopObserver, |_| {}).expect("first run");
        let err = runner.run(&mut NoopObserver, |_| {}).expect_err("second run");
        assert_eq!(err, TransitionError::AlreadyStarted);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn task_ids_are_unique() {
        let log = Log::default();
        let runner = TaskRunner::new(
            vec![task("a", true, &log), task("b", true, &log)],
            RunOptions::default(),
        );
        let tasks = runner.state().tasks();
        assert_ne!(tasks[0].id, tasks[1].id);
    }

    #[test]
    fn error_message_keeps_context_chain() {
        let mut runner = TaskRunner::new(
            vec![TaskDefinition::new("write", "", || {
                Err(anyhow!("permission denied")).map_err(|e| e.context("write tsconfig.json"))
            })],
            RunOptions::default(),
        );
        let summary = runner.run(&mut NoopObserver, |_| {}).expect("run");
        assert_eq!(
            summary.errors[0].message,
            "write tsconfig.json: permission denied"
        );
    }
}
