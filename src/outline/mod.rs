#![forbid(unsafe_code)]

pub mod filter;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::TaskOutlineError;
use crate::task::declarations::{self, DeclarationIndex};
use crate::task::model::{DisplayEntry, Task, WorkspaceFolder};
use crate::task::registry::TaskRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationLocation {
    pub path: PathBuf,
    /// 0-based.
    pub line: usize,
}

/// List data provider: pulls tasks from the registry, resolves presentation
/// from the task files and exposes the visible entries.
///
/// Presentation consumers subscribe to [`TaskOutline::subscribe`] and re-pull
/// [`TaskOutline::entries`] whenever the generation changes.
pub struct TaskOutline {
    registry: Arc<dyn TaskRegistry>,
    folders: Vec<WorkspaceFolder>,
    config_file: String,
    unhide_all: bool,
    changed: watch::Sender<u64>,
}

impl TaskOutline {
    #[must_use]
    pub fn new(
        registry: Arc<dyn TaskRegistry>,
        folders: Vec<WorkspaceFolder>,
        config_file: impl Into<String>,
        unhide_all: bool,
    ) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            registry,
            folders,
            config_file: config_file.into(),
            unhide_all,
            changed,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    pub fn refresh(&self) {
        self.changed.send_modify(|generation| *generation += 1);
    }

    /// Flips the unhide-all state and notifies subscribers.
    pub fn toggle_unhide(&mut self) -> bool {
        self.unhide_all = !self.unhide_all;
        tracing::debug!(unhide_all = self.unhide_all, "toggled hidden tasks");
        self.refresh();
        self.unhide_all
    }

    #[must_use]
    pub fn unhide_all(&self) -> bool {
        self.unhide_all
    }

    #[must_use]
    pub fn is_multi_scope(&self) -> bool {
        self.folders.len() > 1
    }

    #[must_use]
    pub fn folders(&self) -> &[WorkspaceFolder] {
        &self.folders
    }

    /// Fetches workspace-declared tasks with hide flags and icons resolved.
    /// The task files are parsed once per call.
    pub async fn tasks(&self) -> anyhow::Result<Vec<Task>> {
        let mut tasks = self.registry.fetch_tasks().await?;
        tasks.retain(Task::is_workspace_declared);
        let folders = self.folders.clone();
        let config_file = self.config_file.clone();
        let index =
            tokio::task::spawn_blocking(move || DeclarationIndex::load(&folders, &config_file))
                .await?;
        let tasks = index.apply(tasks);
        tracing::debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    #[must_use]
    pub fn entries_for(&self, tasks: &[Task]) -> Vec<DisplayEntry> {
        filter::compute_visible(tasks, self.unhide_all, self.is_multi_scope())
    }

    pub async fn entries(&self) -> anyhow::Result<Vec<DisplayEntry>> {
        let tasks = self.tasks().await?;
        Ok(self.entries_for(&tasks))
    }

    /// Finds where `task` is declared. Only single-root workspaces are supported.
    pub fn declaration_of(
        &self,
        task: &Task,
    ) -> Result<Option<DeclarationLocation>, TaskOutlineError> {
        if self.is_multi_scope() {
            return Err(TaskOutlineError::MultiScopeUnsupported);
        }
        let folder = self
            .folders
            .first()
            .ok_or_else(|| TaskOutlineError::Other("no workspace folder is open".to_owned()))?;
        let path = declarations::declaration_path(&folder.path, &self.config_file);
        let line = declarations::locate_declaration(&path, &task.name)?;
        Ok(line.map(|line| DeclarationLocation { path, line }))
    }
}
