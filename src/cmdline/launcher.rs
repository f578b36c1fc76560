#![forbid(unsafe_code)]

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::cmdline::matcher::strip_scope;
use crate::task::model::{Task, TaskEnded, TaskExecution};
use crate::task::registry::TaskRegistry;
use crate::task::slot::ActiveScopeSlot;

#[derive(Debug)]
pub enum LaunchOutcome {
    Started(LaunchHandle),
    /// No task has that name; shown to the user as `-- UNDEFINED TASK --`.
    UndefinedTask,
    /// The host refused to start the task. Already logged.
    Rejected(String),
}

/// A started execution. Awaiting [`LaunchHandle::finished`] is optional: the
/// scope slot is cleaned up either way.
#[derive(Debug)]
pub struct LaunchHandle {
    pub execution: TaskExecution,
    completion: JoinHandle<Option<TaskEnded>>,
}

impl LaunchHandle {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.completion.is_finished()
    }

    /// Waits for the completion notification. `None` when the registry went
    /// away before reporting.
    pub async fn finished(self) -> Option<TaskEnded> {
        self.completion.await.ok().flatten()
    }
}

/// Resolves task names to tasks and hands them to the registry.
pub struct LaunchCoordinator {
    registry: Arc<dyn TaskRegistry>,
    slot: ActiveScopeSlot,
    multi_scope: bool,
}

impl LaunchCoordinator {
    #[must_use]
    pub fn new(registry: Arc<dyn TaskRegistry>, slot: ActiveScopeSlot, multi_scope: bool) -> Self {
        Self {
            registry,
            slot,
            multi_scope,
        }
    }

    #[must_use]
    pub fn slot(&self) -> &ActiveScopeSlot {
        &self.slot
    }

    /// Exact, case-sensitive lookup. In multi-root workspaces a name is only
    /// taken as is when exactly one task carries it; otherwise a trailing
    /// ` (scope)` annotation selects the task of that scope and nothing else.
    #[must_use]
    pub fn resolve<'a>(&self, name: &str, tasks: &'a [Task]) -> Option<&'a Task> {
        if !self.multi_scope {
            return tasks.iter().find(|t| t.name == name);
        }
        let mut exact = tasks.iter().filter(|t| t.name == name);
        if let (Some(task), None) = (exact.next(), exact.next()) {
            return Some(task);
        }
        let scopes: Vec<&str> = tasks.iter().filter_map(Task::scope_name).collect();
        let (key, scope) = strip_scope(name, &scopes);
        let scope = scope?;
        tasks
            .iter()
            .find(|t| t.name == key && t.scope_name() == Some(scope))
    }

    pub async fn launch(&self, name: &str, tasks: &[Task]) -> LaunchOutcome {
        match self.resolve(name, tasks) {
            Some(task) => self.launch_task(task).await,
            None => {
                tracing::debug!(task = name, "undefined task");
                LaunchOutcome::UndefinedTask
            }
        }
    }

    pub async fn launch_task(&self, task: &Task) -> LaunchOutcome {
        if self.multi_scope
            && let Some(scope) = task.scope_name()
        {
            self.slot.record(scope);
        }

        // Subscribe before executing so a fast completion is not missed.
        let mut ended = self.registry.subscribe_ended();

        let execution = match self.registry.execute_task(task).await {
            Ok(execution) => execution,
            Err(e) => {
                tracing::warn!(task = %task.name, error = %e, "task execution rejected");
                self.slot.clear();
                return LaunchOutcome::Rejected(e.to_string());
            }
        };
        tracing::debug!(task = %task.name, execution = %execution.id, "task started");

        let id = execution.id.clone();
        let slot = self.slot.clone();
        let completion = tokio::spawn(async move {
            loop {
                match ended.recv().await {
                    Ok(event) if event.execution == id => {
                        tracing::debug!(execution = %id, exit_code = ?event.exit_code, "task ended");
                        slot.clear();
                        return Some(event);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "missed task completion events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        slot.clear();
                        return None;
                    }
                }
            }
        });

        LaunchOutcome::Started(LaunchHandle {
            execution,
            completion,
        })
    }
}
