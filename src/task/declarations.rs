#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::TaskOutlineError;
use crate::task::model::{Task, TaskIcon, TaskScope, WorkspaceFolder};

/// Legacy marker: older task files hid entries by setting `"detail": "hide"`.
pub const LEGACY_HIDE_DETAIL: &str = "hide";

#[derive(Debug, Clone, Default, Deserialize)]
struct TasksFile {
    #[serde(default)]
    tasks: Vec<TaskDeclaration>,
}

/// One record of a task configuration file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskDeclaration {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub command: Option<String>,
    pub args: Vec<TaskArg>,
    pub detail: Option<String>,
    pub hide: bool,
    pub icon: Option<TaskIcon>,
    pub options: Option<TaskOptions>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TaskArg {
    Plain(String),
    Quoted { value: String },
}

impl TaskArg {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            TaskArg::Plain(s) | TaskArg::Quoted { value: s } => s,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskOptions {
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Presentation {
    pub hide: bool,
    pub icon: Option<TaskIcon>,
}

#[must_use]
pub fn declaration_path(root: &Path, config_file: &str) -> PathBuf {
    root.join(config_file)
}

pub fn read_declarations(path: &Path) -> Result<Vec<TaskDeclaration>, TaskOutlineError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        TaskOutlineError::ConfigurationUnreadable {
            path: path.to_path_buf(),
            msg: e.to_string(),
        }
    })?;
    parse_declarations(&raw).map_err(|msg| TaskOutlineError::ConfigurationUnreadable {
        path: path.to_path_buf(),
        msg,
    })
}

/// Parses a task file. Comments and trailing commas are accepted.
pub fn parse_declarations(raw: &str) -> Result<Vec<TaskDeclaration>, String> {
    let cleaned = strip_jsonc(raw);
    let file: TasksFile = serde_json::from_str(&cleaned).map_err(|e| e.to_string())?;
    Ok(file
        .tasks
        .into_iter()
        .filter(|d| !d.label.is_empty())
        .collect())
}

/// Label -> presentation lookup for every workspace folder, built once per refresh.
#[derive(Debug, Clone, Default)]
pub struct DeclarationIndex {
    folders: Vec<(String, HashMap<String, Presentation>)>,
}

impl DeclarationIndex {
    /// Reads every folder's task file. Unreadable files fail open: that folder
    /// simply contributes no hide flags or icons.
    #[must_use]
    pub fn load(folders: &[WorkspaceFolder], config_file: &str) -> Self {
        let mut index = Self::default();
        for folder in folders {
            let path = declaration_path(&folder.path, config_file);
            if !path.exists() {
                index.insert(&folder.name, &[]);
                continue;
            }
            let decls = match read_declarations(&path) {
                Ok(decls) => decls,
                Err(e) => {
                    tracing::warn!(folder = %folder.name, error = %e, "ignoring task configuration");
                    Vec::new()
                }
            };
            index.insert(&folder.name, &decls);
        }
        index
    }

    pub fn insert(&mut self, folder: &str, decls: &[TaskDeclaration]) {
        let map = decls
            .iter()
            .map(|d| {
                (
                    d.label.clone(),
                    Presentation {
                        hide: d.hide,
                        icon: d.icon.clone(),
                    },
                )
            })
            .collect();
        self.folders.push((folder.to_owned(), map));
    }

    #[must_use]
    pub fn lookup(&self, task: &Task) -> Option<&Presentation> {
        let map = match &task.scope {
            TaskScope::Folder(folder) => self
                .folders
                .iter()
                .find(|(name, _)| *name == folder.name)
                .map(|(_, map)| map),
            TaskScope::Global => self.folders.first().map(|(_, map)| map),
        }?;
        map.get(&task.name)
    }

    /// Resolves the hidden flag and icon of each task.
    #[must_use]
    pub fn apply(&self, tasks: Vec<Task>) -> Vec<Task> {
        tasks
            .into_iter()
            .map(|mut task| {
                if let Some(p) = self.lookup(&task) {
                    task.hidden = task.hidden || p.hide;
                    if p.icon.is_some() {
                        task.icon.clone_from(&p.icon);
                    }
                }
                if task.detail.as_deref() == Some(LEGACY_HIDE_DETAIL) {
                    task.hidden = true;
                }
                task
            })
            .collect()
    }
}

/// Returns the 0-based line of the first line containing `label`.
pub fn locate_declaration(path: &Path, label: &str) -> Result<Option<usize>, TaskOutlineError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        TaskOutlineError::ConfigurationUnreadable {
            path: path.to_path_buf(),
            msg: e.to_string(),
        }
    })?;
    Ok(raw.lines().position(|line| line.contains(label)))
}

fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '}' | ']' => {
                // Drop a trailing comma before the closing bracket.
                let trimmed = out.trim_end().len();
                if out[..trimmed].ends_with(',') {
                    out.truncate(trimmed - 1);
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
