#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use crate::cmdline::buffer::{CommandLineBuffer, Insert};
use crate::cmdline::launcher::{LaunchCoordinator, LaunchHandle, LaunchOutcome};
use crate::cmdline::matcher;
use crate::task::model::{DisplayEntry, Task};

pub const UNDEFINED_TASK_TEXT: &str = "-- UNDEFINED TASK --";

/// Where the buffer is echoed after every mutation.
pub trait StatusLine: Send + Sync {
    fn show(&self, text: &str);
}

/// Keeps the latest status text in memory, for UIs that render on their own schedule.
#[derive(Debug, Default, Clone)]
pub struct SharedStatus {
    text: Arc<Mutex<String>>,
}

impl SharedStatus {
    #[must_use]
    pub fn text(&self) -> String {
        self.text.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl StatusLine for SharedStatus {
    fn show(&self, text: &str) {
        if let Ok(mut current) = self.text.lock() {
            text.clone_into(&mut *current);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Inactive,
    Entering,
    /// Waiting on an external picker for the request with this ticket.
    Disambiguating { ticket: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickRequest {
    pub ticket: u64,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabOutcome {
    /// Entry mode is not active.
    Inactive,
    NoMatch,
    /// The buffer now holds the single match. `auto_submit` asks the caller to
    /// submit right away.
    Completed { auto_submit: bool },
    Ambiguous(PickRequest),
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Inactive,
    Started(LaunchHandle),
    UndefinedTask,
    Rejected(String),
}

/// Entry-mode state machine around the command-line buffer.
///
/// `Inactive -> Entering (open) -> Entering (insert/back) -> Inactive (submit
/// or cancel)`. Tab completion either rewrites the buffer in place or moves to
/// `Disambiguating` until [`CommandLine::resolve_pick`] answers the ticket.
pub struct CommandLine {
    buffer: CommandLineBuffer,
    state: EntryState,
    next_ticket: u64,
    auto_submit_unique: bool,
    status: Arc<dyn StatusLine>,
}

impl CommandLine {
    #[must_use]
    pub fn new(status: Arc<dyn StatusLine>, auto_submit_unique: bool) -> Self {
        Self {
            buffer: CommandLineBuffer::new(),
            state: EntryState::Inactive,
            next_ticket: 0,
            auto_submit_unique,
            status,
        }
    }

    #[must_use]
    pub fn state(&self) -> EntryState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != EntryState::Inactive
    }

    #[must_use]
    pub fn contents(&self) -> String {
        self.buffer.contents()
    }

    fn echo(&self) {
        self.status.show(&self.buffer.contents());
    }

    pub fn open(&mut self) {
        self.buffer.open();
        self.state = EntryState::Entering;
        self.echo();
    }

    /// Returns `true` when the character asks for submission.
    pub fn insert(&mut self, ch: char) -> bool {
        if self.state != EntryState::Entering {
            return false;
        }
        match self.buffer.insert(ch) {
            Insert::Inserted => {
                self.echo();
                false
            }
            Insert::Submit => true,
            Insert::Ignored => false,
        }
    }

    pub fn back(&mut self) {
        if self.state == EntryState::Entering && self.buffer.backspace() {
            self.echo();
        }
    }

    pub fn cancel(&mut self) {
        self.buffer.reset();
        self.state = EntryState::Inactive;
        self.echo();
    }

    pub fn complete(&mut self, tasks: &[Task], multi_scope: bool) -> TabOutcome {
        if self.state != EntryState::Entering {
            return TabOutcome::Inactive;
        }
        let mut result = matcher::match_tasks(&self.buffer.query(), tasks, multi_scope);
        match result.matches.len() {
            0 => TabOutcome::NoMatch,
            1 => {
                let only = result.matches.remove(0);
                self.buffer.replace_query(&only);
                self.echo();
                TabOutcome::Completed {
                    auto_submit: self.auto_submit_unique,
                }
            }
            _ => {
                self.next_ticket += 1;
                let ticket = self.next_ticket;
                self.state = EntryState::Disambiguating { ticket };
                TabOutcome::Ambiguous(PickRequest {
                    ticket,
                    candidates: result.matches,
                })
            }
        }
    }

    /// Opens entry mode and offers every visible entry, as tab on an empty
    /// buffer would.
    pub fn show_list(&mut self, entries: &[DisplayEntry], multi_scope: bool) -> TabOutcome {
        self.open();
        let visible: Vec<Task> = entries.iter().map(|e| e.command.task.clone()).collect();
        self.complete(&visible, multi_scope)
    }

    /// Feeds a picker answer back. Answers for stale tickets, or arriving after
    /// entry mode ended, are dropped. `None` means the picker was dismissed.
    pub fn resolve_pick(&mut self, ticket: u64, choice: Option<&str>) -> bool {
        if self.state != (EntryState::Disambiguating { ticket }) {
            tracing::debug!(ticket, "discarding stale picker result");
            return false;
        }
        self.state = EntryState::Entering;
        if let Some(choice) = choice {
            self.buffer.replace_query(choice);
        }
        self.echo();
        true
    }

    /// Ends entry mode and hands the typed name to the launcher.
    pub async fn submit(&mut self, launcher: &LaunchCoordinator, tasks: &[Task]) -> SubmitOutcome {
        if self.state != EntryState::Entering {
            return SubmitOutcome::Inactive;
        }
        let name = self.buffer.query();
        self.buffer.reset();
        self.state = EntryState::Inactive;

        match launcher.launch(&name, tasks).await {
            LaunchOutcome::Started(handle) => {
                self.echo();
                SubmitOutcome::Started(handle)
            }
            LaunchOutcome::UndefinedTask => {
                self.status.show(UNDEFINED_TASK_TEXT);
                SubmitOutcome::UndefinedTask
            }
            LaunchOutcome::Rejected(msg) => {
                self.echo();
                SubmitOutcome::Rejected(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use async_trait::async_trait;
    use tokio::sync::broadcast;

    use super::*;
    use crate::error::TaskOutlineError;
    use crate::task::model::{
        ExecutionId, TaskEnded, TaskExecution, TaskScope, WorkspaceFolder,
    };
    use crate::task::registry::TaskRegistry;
    use crate::task::slot::ActiveScopeSlot;
    use crate::task::storage::MemoryStateStore;

    #[derive(Default)]
    struct RecordingStatus {
        lines: Mutex<Vec<String>>,
    }

    impl StatusLine for RecordingStatus {
        fn show(&self, text: &str) {
            self.lines.lock().expect("lines").push(text.to_owned());
        }
    }

    impl RecordingStatus {
        fn last(&self) -> Option<String> {
            self.lines.lock().expect("lines").last().cloned()
        }
    }

    struct StartingRegistry {
        ended: broadcast::Sender<TaskEnded>,
        executed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TaskRegistry for StartingRegistry {
        async fn fetch_tasks(&self) -> anyhow::Result<Vec<Task>> {
            Ok(Vec::new())
        }

        async fn execute_task(&self, task: &Task) -> Result<TaskExecution, TaskOutlineError> {
            self.executed.lock().expect("executed").push(task.name.clone());
            Ok(TaskExecution {
                id: ExecutionId::new(),
                task_name: task.name.clone(),
                started_at: String::new(),
            })
        }

        fn subscribe_ended(&self) -> broadcast::Receiver<TaskEnded> {
            self.ended.subscribe()
        }
    }

    fn launcher(multi_scope: bool) -> (Arc<StartingRegistry>, LaunchCoordinator) {
        let (ended, _) = broadcast::channel(4);
        let registry = Arc::new(StartingRegistry {
            ended,
            executed: Mutex::new(Vec::new()),
        });
        let slot = ActiveScopeSlot::new(Arc::new(MemoryStateStore::default()));
        let launcher = LaunchCoordinator::new(registry.clone(), slot, multi_scope);
        (registry, launcher)
    }

    fn global(names: &[&str]) -> Vec<Task> {
        names
            .iter()
            .map(|n| Task::new(*n, "shell", TaskScope::Global))
            .collect()
    }

    fn type_str(cl: &mut CommandLine, s: &str) {
        for ch in s.chars() {
            assert!(!cl.insert(ch));
        }
    }

    #[tokio::test]
    async fn ambiguous_completion_then_pick_then_submit() {
        let status = Arc::new(RecordingStatus::default());
        let mut cl = CommandLine::new(status.clone(), false);
        let tasks = global(&["build", "buildRelease"]);
        let (registry, launcher) = launcher(false);

        cl.open();
        type_str(&mut cl, "buil");
        assert_eq!(status.last().as_deref(), Some("/buil"));

        let TabOutcome::Ambiguous(req) = cl.complete(&tasks, false) else {
            panic!("expected ambiguity");
        };
        assert_eq!(req.candidates, vec!["build", "buildRelease"]);
        assert_eq!(cl.state(), EntryState::Disambiguating { ticket: req.ticket });

        assert!(cl.resolve_pick(req.ticket, Some("build")));
        assert_eq!(cl.contents(), "/build");
        assert_eq!(status.last().as_deref(), Some("/build"));

        assert!(cl.insert('\n'));
        let outcome = cl.submit(&launcher, &tasks).await;
        assert!(matches!(outcome, SubmitOutcome::Started(_)));
        assert_eq!(registry.executed.lock().unwrap().as_slice(), ["build"]);
        assert!(!cl.is_active());
        assert_eq!(status.last().as_deref(), Some(""));
    }

    #[test]
    fn unique_completion_rewrites_buffer_without_submitting() {
        let status = Arc::new(RecordingStatus::default());
        let mut cl = CommandLine::new(status.clone(), false);
        let tasks = global(&["test"]);

        cl.open();
        type_str(&mut cl, "te");
        assert_eq!(
            cl.complete(&tasks, false),
            TabOutcome::Completed { auto_submit: false }
        );
        assert_eq!(cl.contents(), "/test");
        assert_eq!(cl.state(), EntryState::Entering);
    }

    #[test]
    fn unique_completion_can_request_auto_submit() {
        let mut cl = CommandLine::new(Arc::new(SharedStatus::default()), true);
        cl.open();
        type_str(&mut cl, "te");
        assert_eq!(
            cl.complete(&global(&["test"]), false),
            TabOutcome::Completed { auto_submit: true }
        );
    }

    #[test]
    fn no_match_leaves_buffer_unchanged() {
        let mut cl = CommandLine::new(Arc::new(SharedStatus::default()), false);
        cl.open();
        type_str(&mut cl, "zz");
        assert_eq!(cl.complete(&global(&["build"]), false), TabOutcome::NoMatch);
        assert_eq!(cl.contents(), "/zz");
    }

    #[test]
    fn picker_result_after_cancel_is_discarded() {
        let status = SharedStatus::default();
        let mut cl = CommandLine::new(Arc::new(status.clone()), false);
        let tasks = global(&["build", "bundle"]);

        cl.open();
        type_str(&mut cl, "b");
        let TabOutcome::Ambiguous(req) = cl.complete(&tasks, false) else {
            panic!("expected ambiguity");
        };
        cl.cancel();
        assert!(!cl.resolve_pick(req.ticket, Some("build")));
        assert_eq!(cl.contents(), "");
        assert_eq!(status.text(), "");
        assert_eq!(cl.state(), EntryState::Inactive);
    }

    #[test]
    fn stale_ticket_is_discarded_and_dismissal_returns_to_entering() {
        let mut cl = CommandLine::new(Arc::new(SharedStatus::default()), false);
        let tasks = global(&["build", "bundle"]);

        cl.open();
        let TabOutcome::Ambiguous(first) = cl.complete(&tasks, false) else {
            panic!("expected ambiguity");
        };
        assert!(cl.resolve_pick(first.ticket, None));
        assert_eq!(cl.contents(), "/");

        let TabOutcome::Ambiguous(second) = cl.complete(&tasks, false) else {
            panic!("expected ambiguity");
        };
        assert!(!cl.resolve_pick(first.ticket, Some("build")));
        assert!(cl.resolve_pick(second.ticket, Some("bundle")));
        assert_eq!(cl.contents(), "/bundle");
    }

    #[test]
    fn input_is_ignored_while_disambiguating_or_inactive() {
        let mut cl = CommandLine::new(Arc::new(SharedStatus::default()), false);
        assert!(!cl.insert('a'));
        assert_eq!(cl.complete(&global(&["a"]), false), TabOutcome::Inactive);

        cl.open();
        let _ = cl.complete(&global(&["ab", "ac"]), false);
        assert!(!cl.insert('x'));
        cl.back();
        assert_eq!(cl.contents(), "/");
    }

    #[tokio::test]
    async fn undefined_submission_shows_marker_and_exits_entry_mode() {
        let status = Arc::new(RecordingStatus::default());
        let mut cl = CommandLine::new(status.clone(), false);
        let (_registry, launcher) = launcher(false);

        cl.open();
        type_str(&mut cl, "nope");
        let outcome = cl.submit(&launcher, &global(&["build"])).await;
        assert!(matches!(outcome, SubmitOutcome::UndefinedTask));
        assert_eq!(status.last().as_deref(), Some(UNDEFINED_TASK_TEXT));
        assert!(!cl.is_active());
    }

    #[tokio::test]
    async fn multi_scope_pick_launches_annotated_scope() {
        let folder = |name: &str| {
            TaskScope::Folder(WorkspaceFolder {
                name: name.to_owned(),
                path: PathBuf::from(name),
            })
        };
        let tasks = vec![
            Task::new("lint", "shell", folder("api")),
            Task::new("lint", "shell", folder("web")),
        ];
        let mut cl = CommandLine::new(Arc::new(SharedStatus::default()), false);
        let (registry, launcher) = launcher(true);

        cl.open();
        type_str(&mut cl, "l");
        let TabOutcome::Ambiguous(req) = cl.complete(&tasks, true) else {
            panic!("expected ambiguity");
        };
        assert_eq!(req.candidates, vec!["lint (api)", "lint (web)"]);
        cl.resolve_pick(req.ticket, Some("lint (web)"));
        let SubmitOutcome::Started(_) = cl.submit(&launcher, &tasks).await else {
            panic!("expected start");
        };
        assert_eq!(registry.executed.lock().unwrap().as_slice(), ["lint"]);
        assert_eq!(launcher.slot().current().as_deref(), Some("web"));
    }

    #[tokio::test]
    async fn bare_name_shared_by_scopes_is_undefined() {
        let folder = |name: &str| {
            TaskScope::Folder(WorkspaceFolder {
                name: name.to_owned(),
                path: PathBuf::from(name),
            })
        };
        let tasks = vec![
            Task::new("lint", "shell", folder("api")),
            Task::new("lint", "shell", folder("web")),
        ];
        let status = Arc::new(RecordingStatus::default());
        let mut cl = CommandLine::new(status.clone(), false);
        let (registry, launcher) = launcher(true);

        cl.open();
        type_str(&mut cl, "lint");
        let outcome = cl.submit(&launcher, &tasks).await;
        assert!(matches!(outcome, SubmitOutcome::UndefinedTask));
        assert_eq!(status.last().as_deref(), Some(UNDEFINED_TASK_TEXT));
        assert!(registry.executed.lock().unwrap().is_empty());
        assert_eq!(launcher.slot().current(), None);
    }

    #[test]
    fn show_list_offers_only_visible_entries() {
        let mut tasks = global(&["build", "secret", "test"]);
        tasks[1].hidden = true;
        let entries = crate::outline::filter::compute_visible(&tasks, false, false);
        let mut cl = CommandLine::new(Arc::new(SharedStatus::default()), false);

        let TabOutcome::Ambiguous(req) = cl.show_list(&entries, false) else {
            panic!("expected picker");
        };
        assert_eq!(req.candidates, vec!["build", "test"]);
        assert_eq!(cl.state(), EntryState::Disambiguating { ticket: req.ticket });
    }
}
