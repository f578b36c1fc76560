#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::TaskOutlineError;
use crate::host::workspace::Workspace;
use crate::task::declarations::{self, TaskArg, TaskDeclaration};
use crate::task::model::{ExecutionId, Task, TaskEnded, TaskExecution, TaskSource, WorkspaceFolder};
use crate::task::registry::TaskRegistry;

const DEFAULT_TASK_TYPE: &str = "shell";

/// Where a started task's stdout/stderr go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Inherit,
    /// Appended to `<dir>/<execution-id>.log`.
    LogDir(PathBuf),
}

/// Stand-in for an editor's task subsystem: reads the task files of a
/// [`Workspace`] and runs one task per request.
#[derive(Debug)]
pub struct LocalTaskHost {
    workspace: Workspace,
    config_file: String,
    shell: String,
    output: OutputMode,
    ended: broadcast::Sender<TaskEnded>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct LocalDefinition {
    folder: PathBuf,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    cwd: Option<String>,
}

impl LocalTaskHost {
    #[must_use]
    pub fn new(
        workspace: Workspace,
        config_file: impl Into<String>,
        shell: impl Into<String>,
        output: OutputMode,
    ) -> Self {
        let (ended, _) = broadcast::channel(64);
        Self {
            workspace,
            config_file: config_file.into(),
            shell: shell.into(),
            output,
            ended,
        }
    }

    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    #[must_use]
    pub fn log_path(&self, execution: &ExecutionId) -> Option<PathBuf> {
        match &self.output {
            OutputMode::Inherit => None,
            OutputMode::LogDir(dir) => Some(dir.join(format!("{execution}.log"))),
        }
    }

    fn task_from_declaration(&self, folder: &WorkspaceFolder, decl: TaskDeclaration) -> Task {
        let definition = LocalDefinition {
            folder: folder.path.clone(),
            command: decl.command,
            args: decl.args.iter().map(TaskArg::as_str).map(str::to_owned).collect(),
            cwd: decl.options.and_then(|o| o.cwd),
        };
        Task {
            name: decl.label,
            kind: decl.kind.unwrap_or_else(|| DEFAULT_TASK_TYPE.to_owned()),
            detail: decl.detail,
            hidden: false,
            icon: None,
            scope: self.workspace.scope_for(folder),
            source: TaskSource::Workspace,
            definition: serde_json::to_value(definition).unwrap_or_default(),
        }
    }

    fn build_command(
        &self,
        task: &Task,
        execution: &ExecutionId,
    ) -> Result<tokio::process::Command, String> {
        let def: LocalDefinition = serde_json::from_value(task.definition.clone())
            .map_err(|e| format!("task was not declared by this host: {e}"))?;
        let program = def
            .command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| "task has no command".to_owned())?;

        let program = substitute_variables(program, &def.folder);
        let args: Vec<String> = def
            .args
            .iter()
            .map(|a| substitute_variables(a, &def.folder))
            .collect();

        let mut cmd = if task.kind == "process" {
            let mut cmd = tokio::process::Command::new(&program);
            cmd.args(&args);
            cmd
        } else {
            let mut line = program;
            for arg in &args {
                line.push(' ');
                line.push_str(&shell_quote(arg));
            }
            let mut cmd = tokio::process::Command::new(&self.shell);
            cmd.arg(shell_flag(&self.shell)).arg(line);
            cmd
        };

        let cwd = match def.cwd.as_deref() {
            Some(cwd) => {
                let cwd = PathBuf::from(substitute_variables(cwd, &def.folder));
                if cwd.is_absolute() {
                    cwd
                } else {
                    def.folder.join(cwd)
                }
            }
            None => def.folder.clone(),
        };
        cmd.current_dir(cwd).stdin(Stdio::null());

        match &self.output {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::LogDir(dir) => {
                std::fs::create_dir_all(dir)
                    .map_err(|e| format!("failed to create {}: {e}", dir.display()))?;
                let path = dir.join(format!("{execution}.log"));
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
                let err = file
                    .try_clone()
                    .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
                cmd.stdout(Stdio::from(file)).stderr(Stdio::from(err));
            }
        }
        Ok(cmd)
    }
}

#[async_trait]
impl TaskRegistry for LocalTaskHost {
    async fn fetch_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let mut tasks = Vec::new();
        for folder in self.workspace.folders() {
            let path = declarations::declaration_path(&folder.path, &self.config_file);
            if !path.exists() {
                continue;
            }
            match declarations::read_declarations(&path) {
                Ok(decls) => {
                    tasks.extend(
                        decls
                            .into_iter()
                            .map(|d| self.task_from_declaration(folder, d)),
                    );
                }
                Err(e) => tracing::warn!(folder = %folder.name, error = %e, "skipping task file"),
            }
        }
        Ok(tasks)
    }

    async fn execute_task(&self, task: &Task) -> Result<TaskExecution, TaskOutlineError> {
        let rejected = |msg: String| TaskOutlineError::ExecutionRejected {
            task: task.name.clone(),
            msg,
        };

        let id = ExecutionId::new();
        let mut cmd = self.build_command(task, &id).map_err(rejected)?;
        let mut child = cmd.spawn().map_err(|e| rejected(e.to_string()))?;
        tracing::info!(task = %task.name, execution = %id, pid = ?child.id(), "spawned task");

        let ended = self.ended.clone();
        let execution = id.clone();
        tokio::spawn(async move {
            let exit_code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!(execution = %execution, error = %e, "failed to wait for task");
                    None
                }
            };
            // No subscribers is fine: nobody is waiting on this execution.
            let _ = ended.send(TaskEnded {
                execution,
                exit_code,
            });
        });

        Ok(TaskExecution {
            id,
            task_name: task.name.clone(),
            started_at: now_rfc3339(),
        })
    }

    fn subscribe_ended(&self) -> broadcast::Receiver<TaskEnded> {
        self.ended.subscribe()
    }
}

/// Expands `${workspaceFolder}`, `${workspaceFolderBasename}` and `${env:NAME}`.
/// Unknown variables are left untouched.
fn substitute_variables(input: &str, folder: &Path) -> String {
    let Ok(re) = Regex::new(r"\$\{([^}]+)\}") else {
        return input.to_owned();
    };
    re.replace_all(input, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        match key {
            "workspaceFolder" | "workspaceRoot" => folder.to_string_lossy().into_owned(),
            "workspaceFolderBasename" => crate::host::workspace::path_basename(folder),
            _ => key
                .strip_prefix("env:")
                .map(|name| std::env::var(name).unwrap_or_default())
                .unwrap_or_else(|| caps[0].to_owned()),
        }
    })
    .into_owned()
}

fn shell_flag(shell: &str) -> &'static str {
    let name = Path::new(shell)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(shell);
    if name.eq_ignore_ascii_case("cmd") {
        "/C"
    } else if name.eq_ignore_ascii_case("powershell") || name.eq_ignore_ascii_case("pwsh") {
        "-Command"
    } else {
        "-c"
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | ',' | '+' | '@'));
    if plain {
        return arg.to_owned();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('\'');
    for c in arg.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_owned())
}
