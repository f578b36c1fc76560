#![forbid(unsafe_code)]

use crate::outline::filter::scoped_label;
use crate::task::model::Task;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub matches: Vec<String>,
    pub unique: bool,
}

/// Names starting with `prefix`. Case-sensitive; the empty prefix matches all.
#[must_use]
pub fn match_prefix(prefix: &str, names: &[String]) -> MatchResult {
    let matches: Vec<String> = names
        .iter()
        .filter(|n| n.starts_with(prefix))
        .cloned()
        .collect();
    let unique = matches.len() == 1;
    MatchResult { matches, unique }
}

/// Matches `prefix` against task names and annotates each hit with its scope
/// when the workspace has more than one.
#[must_use]
pub fn match_tasks(prefix: &str, tasks: &[Task], multi_scope: bool) -> MatchResult {
    let matches: Vec<String> = tasks
        .iter()
        .filter(|t| t.name.starts_with(prefix))
        .map(|t| scoped_label(&t.name, t.scope_name(), multi_scope))
        .collect();
    let unique = matches.len() == 1;
    MatchResult { matches, unique }
}

/// Splits a `name (scope)` candidate back into its lookup key and scope.
///
/// Only strips the suffix when `scope` names one of `scopes`, so task names
/// that legitimately end in parentheses stay intact.
#[must_use]
pub fn strip_scope<'a>(candidate: &'a str, scopes: &[&str]) -> (&'a str, Option<&'a str>) {
    let Some(body) = candidate.strip_suffix(')') else {
        return (candidate, None);
    };
    let Some(idx) = body.rfind(" (") else {
        return (candidate, None);
    };
    let scope = &body[idx + 2..];
    if scopes.iter().any(|s| *s == scope) {
        (&body[..idx], Some(scope))
    } else {
        (candidate, None)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::task::model::{TaskScope, WorkspaceFolder};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn empty_prefix_matches_everything() {
        let all = names(&["build", "buildRelease", "test"]);
        let res = match_prefix("", &all);
        assert_eq!(res.matches, all);
        assert!(!res.unique);
    }

    #[test]
    fn single_hit_is_unique() {
        let res = match_prefix("te", &names(&["build", "test"]));
        assert_eq!(res.matches, names(&["test"]));
        assert!(res.unique);
    }

    #[test]
    fn prefix_is_case_sensitive_and_not_substring() {
        let all = names(&["Build", "rebuild"]);
        assert!(match_prefix("build", &all).matches.is_empty());
        assert!(match_prefix("uild", &all).matches.is_empty());
        assert!(match_prefix("B", &all).unique);
    }

    #[test]
    fn ambiguous_prefix_lists_all_hits() {
        let res = match_prefix("buil", &names(&["build", "buildRelease", "test"]));
        assert_eq!(res.matches, names(&["build", "buildRelease"]));
        assert!(!res.unique);
    }

    #[test]
    fn task_matches_are_scope_annotated_in_multi_root() {
        let folder = |name: &str| {
            TaskScope::Folder(WorkspaceFolder {
                name: name.to_owned(),
                path: PathBuf::from(name),
            })
        };
        let tasks = vec![
            Task::new("lint", "shell", folder("api")),
            Task::new("lint", "shell", folder("web")),
            Task::new("test", "shell", folder("web")),
        ];
        let res = match_tasks("li", &tasks, true);
        assert_eq!(res.matches, names(&["lint (api)", "lint (web)"]));
        assert!(!res.unique);

        let res = match_tasks("t", &tasks, true);
        assert_eq!(res.matches, names(&["test (web)"]));
        assert!(res.unique);

        let res = match_tasks("t", &tasks, false);
        assert_eq!(res.matches, names(&["test"]));
    }

    #[test]
    fn strips_known_scope_suffix_only() {
        let scopes = ["api", "web"];
        assert_eq!(strip_scope("lint (api)", &scopes), ("lint", Some("api")));
        assert_eq!(strip_scope("lint", &scopes), ("lint", None));
        assert_eq!(strip_scope("run (debug)", &scopes), ("run (debug)", None));
        assert_eq!(
            strip_scope("run (debug) (web)", &scopes),
            ("run (debug)", Some("web"))
        );
    }
}
