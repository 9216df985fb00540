//! Task lifecycle state machine.
//!
//! One [`RunState`] owns the state of every task in a run and is advanced only
//! through [`RunState::apply`]. The reducer is pure: it never runs actions, it
//! tells the caller which task to execute next.
//!
//! ```text
//! task: Idle -> Pending -> Resolved | Rejected
//! run:  Idle -> Pending -> Done
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Stable task identifier, generated once when a task list is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Idle,
    Pending,
    Resolved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Pending,
    Done,
}

/// Read-only view of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub state: TaskState,
    /// Set once the task is rejected.
    pub error: Option<String>,
}

impl TaskSnapshot {
    pub fn new(id: TaskId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            state: TaskState::Idle,
            error: None,
        }
    }
}

/// A rejected task and the message it failed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskError {
    pub task: TaskSnapshot,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Begin the run.
    Start,
    /// The pending task's action finished.
    Settled(Result<(), String>),
}

/// What the caller must do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Run the action of the task at this index.
    Execute(usize),
    /// The run is over.
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("task run already started")]
    AlreadyStarted,
    #[error("task run has not started")]
    NotStarted,
    #[error("task run is already done")]
    AlreadyDone,
    #[error("no pending task to settle")]
    NothingPending,
}

/// State of every task in a run plus the run itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunState {
    tasks: Vec<TaskSnapshot>,
    status: RunStatus,
    fail_on_rejected: bool,
    #[serde(skip)]
    current: Option<usize>,
}

impl RunState {
    pub fn new(tasks: Vec<TaskSnapshot>, fail_on_rejected: bool) -> Self {
        Self {
            tasks,
            status: RunStatus::Idle,
            fail_on_rejected,
            current: None,
        }
    }

    pub fn tasks(&self) -> &[TaskSnapshot] {
        &self.tasks
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn fail_on_rejected(&self) -> bool {
        self.fail_on_rejected
    }

    /// Index of the pending task, if any.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Rejected tasks with their messages, in list order.
    pub fn errors(&self) -> Vec<TaskError> {
        self.tasks
            .iter()
            .filter(|task| task.state == TaskState::Rejected)
            .map(|task| TaskError {
                task: task.clone(),
                message: task.error.clone().unwrap_or_default(),
            })
            .collect()
    }

    pub fn has_rejected(&self) -> bool {
        self.tasks.iter().any(|task| task.state == TaskState::Rejected)
    }

    /// Advance the state machine by one event.
    pub fn apply(&mut self, event: RunEvent) -> Result<Transition, TransitionError> {
        match (self.status, event) {
            (RunStatus::Idle, RunEvent::Start) => Ok(self.advance()),
            (RunStatus::Idle, RunEvent::Settled(_)) => Err(TransitionError::NotStarted),
            (RunStatus::Pending, RunEvent::Start) => Err(TransitionError::AlreadyStarted),
            (RunStatus::Pending, RunEvent::Settled(outcome)) => self.settle(outcome),
            (RunStatus::Done, RunEvent::Start) => Err(TransitionError::AlreadyStarted),
            (RunStatus::Done, RunEvent::Settled(_)) => Err(TransitionError::AlreadyDone),
        }
    }

    fn settle(&mut self, outcome: Result<(), String>) -> Result<Transition, TransitionError> {
        let index = self.current.take().ok_or(TransitionError::NothingPending)?;
        let task = &mut self.tasks[index];
        let rejected = match outcome {
            Ok(()) => {
                task.state = TaskState::Resolved;
                false
            }
            Err(message) => {
                task.state = TaskState::Rejected;
                task.error = Some(message);
                true
            }
        };

        if rejected && self.fail_on_rejected {
            self.status = RunStatus::Done;
            return Ok(Transition::Done);
        }
        Ok(self.advance())
    }

    /// Move the first idle task to pending, or finish the run.
    fn advance(&mut self) -> Transition {
        match self.tasks.iter().position(|task| task.state == TaskState::Idle) {
            Some(index) => {
                self.tasks[index].state = TaskState::Pending;
                self.current = Some(index);
                self.status = RunStatus::Pending;
                Transition::Execute(index)
            }
            None => {
                self.status = RunStatus::Done;
                Transition::Done
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(n: usize, fail_on_rejected: bool) -> RunState {
        let tasks = (0..n)
            .map(|i| TaskSnapshot::new(TaskId::new(format!("t{i}")), format!("Task {i}"), ""))
            .collect();
        RunState::new(tasks, fail_on_rejected)
    }

    fn states(run: &RunState) -> Vec<TaskState> {
        run.tasks().iter().map(|t| t.state).collect()
    }

    #[test]
    fn empty_run_goes_straight_to_done() {
        let mut run = state(0, false);
        assert_eq!(run.apply(RunEvent::Start), Ok(Transition::Done));
        assert_eq!(run.status(), RunStatus::Done);
    }

    #[test]
    fn start_marks_first_task_pending() {
        let mut run = state(2, false);
        assert_eq!(run.apply(RunEvent::Start), Ok(Transition::Execute(0)));
        assert_eq!(run.status(), RunStatus::Pending);
        assert_eq!(states(&run), vec![TaskState::Pending, TaskState::Idle]);
        assert_eq!(run.current(), Some(0));
    }

    #[test]
    fn rejection_advances_without_fail_fast() {
        let mut run = state(3, false);
        run.apply(RunEvent::Start).expect("start");
        run.apply(RunEvent::Settled(Ok(()))).expect("t0");
        assert_eq!(
            run.apply(RunEvent::Settled(Err("boom".to_string()))),
            Ok(Transition::Execute(2))
        );
        assert_eq!(run.apply(RunEvent::Settled(Ok(()))), Ok(Transition::Done));
        assert_eq!(
            states(&run),
            vec![TaskState::Resolved, TaskState::Rejected, TaskState::Resolved]
        );
        let errors = run.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].task.id, TaskId::new("t1"));
        assert_eq!(errors[0].message, "boom");
    }

    #[test]
    fn rejection_stops_run_with_fail_fast() {
        let mut run = state(3, true);
        run.apply(RunEvent::Start).expect("start");
        run.apply(RunEvent::Settled(Ok(()))).expect("t0");
        assert_eq!(
            run.apply(RunEvent::Settled(Err("boom".to_string()))),
            Ok(Transition::Done)
        );
        assert_eq!(run.status(), RunStatus::Done);
        assert_eq!(
            states(&run),
            vec![TaskState::Resolved, TaskState::Rejected, TaskState::Idle]
        );
    }

    #[test]
    fn at_most_one_task_is_pending() {
        let mut run = state(4, false);
        let mut next = run.apply(RunEvent::Start).expect("start");
        while let Transition::Execute(_) = next {
            let pending = run
                .tasks()
                .iter()
                .filter(|t| t.state == TaskState::Pending)
                .count();
            assert_eq!(pending, 1);
            next = run.apply(RunEvent::Settled(Ok(()))).expect("settle");
        }
        assert!(run.tasks().iter().all(|t| t.state == TaskState::Resolved));
    }

    #[test]
    fn invalid_events_are_errors() {
        let mut run = state(1, false);
        assert_eq!(
            run.apply(RunEvent::Settled(Ok(()))),
            Err(TransitionError::NotStarted)
        );
        run.apply(RunEvent::Start).expect("start");
        assert_eq!(run.apply(RunEvent::Start), Err(TransitionError::AlreadyStarted));
        run.apply(RunEvent::Settled(Ok(()))).expect("settle");
        assert_eq!(
            run.apply(RunEvent::Settled(Ok(()))),
            Err(TransitionError::AlreadyDone)
        );
        assert_eq!(run.apply(RunEvent::Start), Err(TransitionError::AlreadyStarted));
    }
}
