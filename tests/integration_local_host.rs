use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use taskoutline::cmdline::launcher::{LaunchCoordinator, LaunchOutcome};
use taskoutline::host::local::{LocalTaskHost, OutputMode};
use taskoutline::host::workspace::Workspace;
use taskoutline::outline::TaskOutline;
use taskoutline::task::slot::ActiveScopeSlot;
use taskoutline::task::storage::FileStateStore;

const CONFIG_FILE: &str = ".vscode/tasks.json";

fn sh_available() -> bool {
    Command::new("sh").arg("-c").arg("true").status().is_ok()
}

fn write_tasks(folder: &Path, body: &str) {
    let dir = folder.join(".vscode");
    std::fs::create_dir_all(&dir).expect("mkdir .vscode");
    std::fs::write(dir.join("tasks.json"), body).expect("write tasks.json");
}

fn setup(folders: &[&Path], state: &Path, output: OutputMode) -> (TaskOutline, LaunchCoordinator) {
    let paths: Vec<_> = folders.iter().map(|p| p.to_path_buf()).collect();
    let workspace = Workspace::from_paths(&paths).expect("workspace");
    let ws_folders = workspace.folders().to_vec();
    let host = Arc::new(LocalTaskHost::new(workspace, CONFIG_FILE, "sh", output));
    let outline = TaskOutline::new(host.clone(), ws_folders, CONFIG_FILE, false);
    let slot = ActiveScopeSlot::new(Arc::new(FileStateStore::new(state.to_path_buf())));
    let launcher = LaunchCoordinator::new(host, slot, outline.is_multi_scope());
    (outline, launcher)
}

#[tokio::test]
async fn single_folder_lists_visible_tasks_and_reports_exit_code() {
    if !sh_available() {
        eprintln!("skipping: sh not found");
        return;
    }

    let td = tempfile::tempdir().expect("tempdir");
    let ws = td.path().join("ws");
    write_tasks(
        &ws,
        r#"{
            // build tasks
            "version": "2.0.0",
            "tasks": [
                { "label": "fail", "command": "exit 3" },
                { "label": "build", "command": "exit 0", "detail": "compile" },
                { "label": "secret", "command": "true", "hide": true },
                { "label": "legacy", "command": "true", "detail": "hide" },
            ],
        }"#,
    );

    let (outline, launcher) = setup(&[&ws], &td.path().join("state.json"), OutputMode::Inherit);
    let entries = outline.entries().await.expect("entries");
    let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["build", "fail"]);
    assert_eq!(entries[0].tooltip.as_deref(), Some("compile"));

    let tasks = outline.tasks().await.expect("tasks");
    let LaunchOutcome::Started(handle) = launcher.launch("fail", &tasks).await else {
        panic!("expected task to start");
    };
    let ended = handle.finished().await.expect("completion");
    assert_eq!(ended.exit_code, Some(3));

    let outcome = launcher.launch("nope", &tasks).await;
    assert!(matches!(outcome, LaunchOutcome::UndefinedTask));
}

#[tokio::test]
async fn multi_root_runs_in_the_chosen_folder_and_clears_scope_slot() {
    if !sh_available() {
        eprintln!("skipping: sh not found");
        return;
    }

    let td = tempfile::tempdir().expect("tempdir");
    let api = td.path().join("api");
    let web = td.path().join("web");
    for folder in [&api, &web] {
        write_tasks(
            folder,
            r#"{ "tasks": [ { "label": "lint", "command": "touch", "args": ["linted"] } ] }"#,
        );
    }

    let state = td.path().join("state.json");
    let (outline, launcher) = setup(&[&api, &web], &state, OutputMode::Inherit);
    let entries = outline.entries().await.expect("entries");
    let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["lint (api)", "lint (web)"]);

    let tasks = outline.tasks().await.expect("tasks");
    let LaunchOutcome::Started(handle) = launcher.launch("lint (web)", &tasks).await else {
        panic!("expected task to start");
    };
    let ended = handle.finished().await.expect("completion");
    assert_eq!(ended.exit_code, Some(0));

    assert!(web.join("linted").exists());
    assert!(!api.join("linted").exists());
    assert_eq!(launcher.slot().current(), None);
}

#[tokio::test]
async fn log_dir_output_captures_task_output() {
    if !sh_available() {
        eprintln!("skipping: sh not found");
        return;
    }

    let td = tempfile::tempdir().expect("tempdir");
    let ws = td.path().join("ws");
    write_tasks(
        &ws,
        r#"{ "tasks": [ { "label": "greet", "command": "echo", "args": ["hello world"] } ] }"#,
    );
    let logs = td.path().join("logs");

    let (outline, launcher) = setup(
        &[&ws],
        &td.path().join("state.json"),
        OutputMode::LogDir(logs.clone()),
    );
    let tasks = outline.tasks().await.expect("tasks");
    let LaunchOutcome::Started(handle) = launcher.launch("greet", &tasks).await else {
        panic!("expected task to start");
    };
    let log = logs.join(format!("{}.log", handle.execution.id));
    assert_eq!(handle.finished().await.and_then(|e| e.exit_code), Some(0));

    let text = std::fs::read_to_string(log).expect("read log");
    assert_eq!(text.trim(), "hello world");
}
