#![forbid(unsafe_code)]

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A workspace folder that owns a subset of the declared tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceFolder {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskScope {
    /// Single-root workspaces: the task belongs to the implicit root.
    Global,
    Folder(WorkspaceFolder),
}

/// Where a task declaration came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskSource {
    /// The project's own task configuration file.
    Workspace,
    /// Contributed by an extension or build-system auto-detection.
    Contributed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskIcon {
    pub id: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub icon: Option<TaskIcon>,
    pub scope: TaskScope,
    pub source: TaskSource,
    /// Host-specific payload; opaque to everything but the registry that built it.
    #[serde(default)]
    pub definition: serde_json::Value,
}

impl Task {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>, scope: TaskScope) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            detail: None,
            hidden: false,
            icon: None,
            scope,
            source: TaskSource::Workspace,
            definition: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn scope_name(&self) -> Option<&str> {
        match &self.scope {
            TaskScope::Folder(folder) if !folder.name.is_empty() => Some(folder.name.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_workspace_declared(&self) -> bool {
        self.source == TaskSource::Workspace
    }
}

/// Projection of a [`Task`] prepared for listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DisplayEntry {
    pub label: String,
    pub command: LaunchBinding,
    pub hidden: bool,
    pub tooltip: Option<String>,
    pub icon: Option<TaskIcon>,
}

/// The action an entry triggers when activated, with its argument.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LaunchBinding {
    pub action: &'static str,
    pub task: Task,
    pub scope: TaskScope,
}

pub const EXECUTE_TASK_ACTION: &str = "taskoutline.executeTask";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ExecutionId(String);

impl ExecutionId {
    #[must_use]
    pub fn new() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        let short: String = id.chars().take(6).collect();
        Self(format!("exec-{short}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle returned by the registry for a started task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskExecution {
    pub id: ExecutionId,
    pub task_name: String,
    pub started_at: String,
}

/// Completion notification; consumers match on `execution`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskEnded {
    pub execution: ExecutionId,
    pub exit_code: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_name_only_for_named_folders() {
        let global = Task::new("build", "shell", TaskScope::Global);
        assert_eq!(global.scope_name(), None);

        let folder = Task::new(
            "build",
            "shell",
            TaskScope::Folder(WorkspaceFolder {
                name: "api".to_owned(),
                path: PathBuf::from("/ws/api"),
            }),
        );
        assert_eq!(folder.scope_name(), Some("api"));

        let unnamed = Task::new(
            "build",
            "shell",
            TaskScope::Folder(WorkspaceFolder {
                name: String::new(),
                path: PathBuf::from("/"),
            }),
        );
        assert_eq!(unnamed.scope_name(), None);
    }

    #[test]
    fn execution_ids_are_short_and_distinct() {
        let a = ExecutionId::new();
        let b = ExecutionId::new();
        assert!(a.as_str().starts_with("exec-"));
        assert_eq!(a.as_str().len(), "exec-".len() + 6);
        assert_ne!(a, b);
    }
}
