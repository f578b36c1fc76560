#![forbid(unsafe_code)]

use crate::task::model::{DisplayEntry, EXECUTE_TASK_ACTION, LaunchBinding, Task};

/// Formats a task name for display, annotating the owning scope when the
/// workspace has more than one.
#[must_use]
pub fn scoped_label(name: &str, scope: Option<&str>, multi_scope: bool) -> String {
    match scope {
        Some(scope) if multi_scope => format!("{name} ({scope})"),
        _ => name.to_owned(),
    }
}

/// Projects workspace-declared tasks into display entries sorted by label.
///
/// Hidden tasks are dropped unless `unhide_all` is set. Tasks contributed by
/// other sources never appear.
#[must_use]
pub fn compute_visible(tasks: &[Task], unhide_all: bool, multi_scope: bool) -> Vec<DisplayEntry> {
    let mut entries: Vec<DisplayEntry> = tasks
        .iter()
        .filter(|t| t.is_workspace_declared())
        .filter(|t| unhide_all || !t.hidden)
        .map(|t| DisplayEntry {
            label: scoped_label(&t.name, t.scope_name(), multi_scope),
            command: LaunchBinding {
                action: EXECUTE_TASK_ACTION,
                task: t.clone(),
                scope: t.scope.clone(),
            },
            hidden: t.hidden,
            tooltip: t.detail.clone(),
            icon: t.icon.clone(),
        })
        .collect();
    entries.sort_by(|a, b| a.label.cmp(&b.label));
    entries
}
