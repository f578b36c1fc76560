#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::task::model::{TaskScope, WorkspaceFolder};

/// The folders opened together. One folder means a single-root workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    folders: Vec<WorkspaceFolder>,
}

impl Workspace {
    pub fn from_paths(paths: &[PathBuf]) -> anyhow::Result<Self> {
        if paths.is_empty() {
            let cwd = std::env::current_dir().context("failed to get current directory")?;
            return Self::from_paths(&[cwd]);
        }

        let mut folders: Vec<WorkspaceFolder> = Vec::with_capacity(paths.len());
        for path in paths {
            let path = std::fs::canonicalize(path)
                .with_context(|| format!("workspace folder {} not found", path.display()))?;
            if folders.iter().any(|f| f.path == path) {
                continue;
            }
            folders.push(WorkspaceFolder {
                name: path_basename(&path),
                path,
            });
        }
        Ok(Self { folders })
    }

    #[must_use]
    pub fn folders(&self) -> &[WorkspaceFolder] {
        &self.folders
    }

    #[must_use]
    pub fn is_multi_root(&self) -> bool {
        self.folders.len() > 1
    }

    /// Scope assigned to tasks declared in `folder`.
    #[must_use]
    pub fn scope_for(&self, folder: &WorkspaceFolder) -> TaskScope {
        if self.is_multi_root() {
            TaskScope::Folder(folder.clone())
        } else {
            TaskScope::Global
        }
    }
}

#[must_use]
pub fn path_basename(path: &Path) -> String {
    match path.file_name().and_then(|s| s.to_str()) {
        Some(name) => name.to_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folders_named_by_basename_and_deduplicated() {
        let td = tempfile::tempdir().expect("tempdir");
        let api = td.path().join("api");
        let web = td.path().join("web");
        std::fs::create_dir_all(&api).unwrap();
        std::fs::create_dir_all(&web).unwrap();

        let ws = Workspace::from_paths(&[api.clone(), web, api]).unwrap();
        let names: Vec<&str> = ws.folders().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["api", "web"]);
        assert!(ws.is_multi_root());
        assert!(matches!(ws.scope_for(&ws.folders()[0]), TaskScope::Folder(_)));
    }

    #[test]
    fn single_folder_uses_global_scope() {
        let td = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::from_paths(&[td.path().to_path_buf()]).unwrap();
        assert!(!ws.is_multi_root());
        assert_eq!(ws.scope_for(&ws.folders()[0]), TaskScope::Global);
    }

    #[test]
    fn missing_folder_is_an_error() {
        let td = tempfile::tempdir().expect("tempdir");
        assert!(Workspace::from_paths(&[td.path().join("nope")]).is_err());
    }
}
