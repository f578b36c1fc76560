#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory as _, Parser, Subcommand};

use crate::cmdline::launcher::{LaunchCoordinator, LaunchOutcome};
use crate::cmdline::matcher;
use crate::config::{self, Config};
use crate::error::TaskOutlineError;
use crate::host::local::{LocalTaskHost, OutputMode};
use crate::host::workspace::Workspace;
use crate::logging::{self, LogTarget};
use crate::outline::TaskOutline;
use crate::outline::filter;
use crate::output::table::Table;
use crate::task::model::{DisplayEntry, Task};
use crate::task::slot::ActiveScopeSlot;
use crate::task::storage::FileStateStore;
use crate::tui;
use crate::tui::picker::{self, PickerItem};

#[derive(Debug, Parser)]
#[command(
    name = "taskoutline",
    version,
    about = "Workspace task list with command-line task entry"
)]
pub struct Cli {
    /// Workspace folder; repeat for a multi-root workspace (default: current directory)
    #[arg(short = 'f', long = "folder", global = true)]
    pub folders: Vec<PathBuf>,

    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "ls")]
    List(ListArgs),
    Run(RunArgs),
    Goto(GotoArgs),
    /// Print the scope of the task currently being launched, if any
    Source,
    Config(ConfigArgs),
    Completion(CompletionArgs),
    Version,
}

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Include tasks marked hidden
    #[arg(short = 'a', long = "all")]
    pub all: bool,
    /// Output in JSON format
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Task name or unambiguous prefix; `name (folder)` picks a folder
    pub name: String,
}

#[derive(Debug, Parser)]
pub struct GotoArgs {
    /// Exact task name
    pub name: String,
}

#[derive(Debug, Parser)]
pub struct CompletionArgs {
    pub shell: clap_complete::Shell,
}

#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub cmd: ConfigCmd,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCmd {
    List,
    Set(ConfigSetArgs),
    Get(ConfigGetArgs),
}

#[derive(Debug, Parser)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Parser)]
pub struct ConfigGetArgs {
    pub key: String,
}

pub async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.cmd {
        None => cmd_default(&cli.folders).await,
        Some(Commands::Completion(args)) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "taskoutline", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Config(args)) => match args.cmd {
            ConfigCmd::List => {
                print!("{}", config::list_resolved_toml()?);
                Ok(ExitCode::SUCCESS)
            }
            ConfigCmd::Set(set) => {
                config::set_value_string(&set.key, &set.value)?;
                println!("Set {} = {}", set.key, set.value);
                Ok(ExitCode::SUCCESS)
            }
            ConfigCmd::Get(get) => {
                let val = config::get_value_string(&get.key)?;
                match val {
                    Some(v) => {
                        println!("{v}");
                        Ok(ExitCode::SUCCESS)
                    }
                    None => anyhow::bail!(
                        "configuration key '{}' not found - use 'taskoutline config list' to see available keys",
                        get.key
                    ),
                }
            }
        },
        Some(Commands::List(args)) => cmd_list(&cli.folders, &args).await,
        Some(Commands::Run(args)) => cmd_run(&cli.folders, args).await,
        Some(Commands::Goto(args)) => cmd_goto(&cli.folders, &args).await,
        Some(Commands::Source) => cmd_source().await,
        Some(Commands::Version) => Ok(cmd_version()),
    }
}

async fn load_cfg() -> anyhow::Result<Config> {
    let cfg = tokio::task::spawn_blocking(|| -> anyhow::Result<Config> {
        let (cfg, _doc, _paths) = config::load()?;
        Ok(cfg)
    })
    .await??;
    Ok(cfg)
}

/// Everything a command needs to list and launch tasks.
struct Context {
    cfg: Config,
    host: Arc<LocalTaskHost>,
    outline: TaskOutline,
    slot: ActiveScopeSlot,
}

impl Context {
    fn new(
        cfg: Config,
        folders: &[PathBuf],
        output: OutputMode,
        unhide_all: bool,
    ) -> anyhow::Result<Self> {
        let workspace = Workspace::from_paths(folders)?;
        let ws_folders = workspace.folders().to_vec();
        let host = Arc::new(LocalTaskHost::new(
            workspace,
            cfg.tasks.config_file.clone(),
            cfg.tasks.shell.clone(),
            output,
        ));
        let outline = TaskOutline::new(
            host.clone(),
            ws_folders,
            cfg.tasks.config_file.clone(),
            unhide_all || cfg.outline.unhide_all,
        );
        let slot = state_slot(&cfg)?;
        Ok(Self {
            cfg,
            host,
            outline,
            slot,
        })
    }

    fn launcher(&self) -> LaunchCoordinator {
        LaunchCoordinator::new(
            self.host.clone(),
            self.slot.clone(),
            self.outline.is_multi_scope(),
        )
    }
}

fn state_slot(cfg: &Config) -> anyhow::Result<ActiveScopeSlot> {
    let store = FileStateStore::new(cfg.state_file()?);
    Ok(ActiveScopeSlot::new(Arc::new(store)))
}

async fn cmd_default(folders: &[PathBuf]) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg().await?;

    if tui::is_tty() {
        logging::init(LogTarget::File(&cfg.log_file()?), &cfg.log.level)?;
        let output = OutputMode::LogDir(cfg.task_log_dir()?);
        let ctx = Context::new(cfg, folders, output, false)?;
        let launcher = ctx.launcher();
        tui::app::run(ctx.cfg, ctx.host, ctx.outline, launcher).await?;
        return Ok(ExitCode::SUCCESS);
    }

    // Non-TTY fallback: print the visible list once.
    logging::init(LogTarget::Stderr, &cfg.log.level)?;
    let ctx = Context::new(cfg, folders, OutputMode::Inherit, false)?;
    let entries = ctx.outline.entries().await?;
    print_entries(&ctx.cfg, &entries)?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_list(folders: &[PathBuf], args: &ListArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg().await?;
    logging::init(LogTarget::Stderr, &cfg.log.level)?;
    let ctx = Context::new(cfg, folders, OutputMode::Inherit, args.all)?;
    let entries = ctx.outline.entries().await?;

    if args.json {
        let mut out = serde_json::to_string_pretty(&entries)?;
        out.push('\n');
        print!("{out}");
        return Ok(ExitCode::SUCCESS);
    }

    print_entries(&ctx.cfg, &entries)?;
    Ok(ExitCode::SUCCESS)
}

fn print_entries(cfg: &Config, entries: &[DisplayEntry]) -> anyhow::Result<()> {
    if entries.is_empty() {
        eprintln!("no tasks declared in this workspace");
        return Ok(());
    }

    let show_hidden_col = entries.iter().any(|e| e.hidden);
    let mut headers = vec!["NAME", "TYPE"];
    if cfg.outline.show_icons {
        headers.push("ICON");
    }
    if show_hidden_col {
        headers.push("HIDDEN");
    }
    headers.push("DETAIL");

    let mut table = Table::new(headers);
    for entry in entries {
        let mut row = vec![entry.label.clone(), entry.command.task.kind.clone()];
        if cfg.outline.show_icons {
            row.push(entry.icon.as_ref().map(|i| i.id.clone()).unwrap_or_default());
        }
        if show_hidden_col {
            row.push(if entry.hidden { "yes" } else { "" }.to_owned());
        }
        row.push(entry.tooltip.clone().unwrap_or_default());
        table.row(row);
    }
    table.print()?;
    Ok(())
}

async fn cmd_run(folders: &[PathBuf], args: RunArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg().await?;
    logging::init(LogTarget::Stderr, &cfg.log.level)?;
    let ctx = Context::new(cfg, folders, OutputMode::Inherit, false)?;
    let tasks = ctx.outline.tasks().await?;
    let launcher = ctx.launcher();

    let name = run_target(
        &launcher,
        &args.name,
        &tasks,
        ctx.outline.is_multi_scope(),
        tui::is_tty(),
    )?;

    match launcher.launch(&name, &tasks).await {
        LaunchOutcome::Started(handle) => {
            tracing::info!(task = %name, execution = %handle.execution.id, "waiting for task");
            tokio::select! {
                ended = handle.finished() => Ok(exit_code(ended.and_then(|e| e.exit_code))),
                _ = tokio::signal::ctrl_c() => {
                    launcher.slot().clear();
                    Ok(ExitCode::from(130))
                }
            }
        }
        LaunchOutcome::UndefinedTask => Err(TaskOutlineError::UndefinedTask(name).into()),
        LaunchOutcome::Rejected(msg) => anyhow::bail!(msg),
    }
}

/// Name `run` launches: a name the launcher resolves is taken as is, anything
/// else goes through prefix completion.
fn run_target(
    launcher: &LaunchCoordinator,
    name: &str,
    tasks: &[Task],
    multi_scope: bool,
    interactive: bool,
) -> anyhow::Result<String> {
    if launcher.resolve(name, tasks).is_some() {
        return Ok(name.to_owned());
    }
    complete_name(name, tasks, multi_scope, interactive)
}

/// Prefix completion for `run`: a unique hit is taken as is, several open the
/// picker when `interactive`.
fn complete_name(
    prefix: &str,
    tasks: &[Task],
    multi_scope: bool,
    interactive: bool,
) -> anyhow::Result<String> {
    let mut result = matcher::match_tasks(prefix, tasks, multi_scope);
    if result.matches.is_empty() {
        return Err(TaskOutlineError::UndefinedTask(prefix.to_owned()).into());
    }
    if result.unique {
        return Ok(result.matches.remove(0));
    }
    if !interactive {
        anyhow::bail!(
            "multiple tasks match '{prefix}': {}",
            result.matches.join(", ")
        );
    }

    let entries = filter::compute_visible(tasks, true, multi_scope);
    let items: Vec<PickerItem> = result
        .matches
        .iter()
        .map(|candidate| PickerItem {
            title: candidate.clone(),
            preview: entries
                .iter()
                .find(|e| &e.label == candidate)
                .and_then(|e| e.tooltip.clone())
                .unwrap_or_default(),
        })
        .collect();
    let idx = picker::pick_one("Select a task", items)?;
    Ok(result.matches.swap_remove(idx))
}

fn exit_code(code: Option<i32>) -> ExitCode {
    match code {
        Some(0) => ExitCode::SUCCESS,
        Some(c) => ExitCode::from(u8::try_from(c).unwrap_or(1)),
        None => ExitCode::from(1),
    }
}

async fn cmd_goto(folders: &[PathBuf], args: &GotoArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg().await?;
    logging::init(LogTarget::Stderr, &cfg.log.level)?;
    let ctx = Context::new(cfg, folders, OutputMode::Inherit, true)?;
    let tasks = ctx.outline.tasks().await?;
    let launcher = ctx.launcher();

    let task = launcher
        .resolve(&args.name, &tasks)
        .ok_or_else(|| TaskOutlineError::UndefinedTask(args.name.clone()))?;
    match ctx.outline.declaration_of(task)? {
        Some(location) => {
            println!("{}:{}", location.path.display(), location.line + 1);
            Ok(ExitCode::SUCCESS)
        }
        None => anyhow::bail!("no declaration of '{}' found", task.name),
    }
}

async fn cmd_source() -> anyhow::Result<ExitCode> {
    let cfg = load_cfg().await?;
    logging::init(LogTarget::Stderr, &cfg.log.level)?;
    if let Some(scope) = state_slot(&cfg)?.current() {
        println!("{scope}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_version() -> ExitCode {
    println!("taskoutline version {}", env!("CARGO_PKG_VERSION"));
    println!("  rust: {}", rustc_version_runtime::version());
    println!(
        "  os/arch: {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::model::{TaskScope, WorkspaceFolder};
    use crate::task::storage::MemoryStateStore;

    #[test]
    fn cli_parses_repeated_folders_after_subcommand() {
        let cli = Cli::try_parse_from(["taskoutline", "list", "--all", "-f", "a", "--folder", "b"])
            .unwrap();
        assert_eq!(cli.folders, vec![PathBuf::from("a"), PathBuf::from("b")]);
        let Some(Commands::List(args)) = cli.cmd else {
            panic!("expected list");
        };
        assert!(args.all);
        assert!(!args.json);
    }

    #[test]
    fn cli_without_subcommand_is_default_mode() {
        let cli = Cli::try_parse_from(["taskoutline"]).unwrap();
        assert!(cli.cmd.is_none());
        assert!(cli.folders.is_empty());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exit_codes_follow_the_task() {
        let dbg = |code: ExitCode| format!("{code:?}");
        assert_eq!(dbg(exit_code(Some(0))), dbg(ExitCode::SUCCESS));
        assert_eq!(dbg(exit_code(Some(3))), dbg(ExitCode::from(3)));
        assert_eq!(dbg(exit_code(Some(-1))), dbg(ExitCode::from(1)));
        assert_eq!(dbg(exit_code(None)), dbg(ExitCode::from(1)));
    }

    fn multi_root_launcher() -> (tempfile::TempDir, LaunchCoordinator) {
        let td = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::from_paths(&[td.path().to_path_buf()]).expect("workspace");
        let host = Arc::new(LocalTaskHost::new(
            workspace,
            ".vscode/tasks.json",
            "sh",
            OutputMode::Inherit,
        ));
        let slot = ActiveScopeSlot::new(Arc::new(MemoryStateStore::default()));
        (td, LaunchCoordinator::new(host, slot, true))
    }

    fn folder_task(name: &str, folder: &str) -> Task {
        Task::new(
            name,
            "shell",
            TaskScope::Folder(WorkspaceFolder {
                name: folder.to_owned(),
                path: PathBuf::from(folder),
            }),
        )
    }

    #[test]
    fn run_target_asks_when_several_folders_declare_the_name() {
        let (_td, launcher) = multi_root_launcher();
        let tasks = vec![folder_task("lint", "api"), folder_task("lint", "web")];

        let err = run_target(&launcher, "lint", &tasks, true, false).unwrap_err();
        assert!(err.to_string().contains("lint (api), lint (web)"));

        let name = run_target(&launcher, "lint (web)", &tasks, true, false).unwrap();
        assert_eq!(name, "lint (web)");
    }

    #[test]
    fn run_target_completes_a_unique_prefix() {
        let (_td, launcher) = multi_root_launcher();
        let tasks = vec![folder_task("lint", "api"), folder_task("deploy", "web")];

        assert_eq!(
            run_target(&launcher, "dep", &tasks, true, false).unwrap(),
            "deploy (web)"
        );
        assert_eq!(run_target(&launcher, "lint", &tasks, true, false).unwrap(), "lint");
        let err = run_target(&launcher, "nope", &tasks, true, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaskOutlineError>(),
            Some(TaskOutlineError::UndefinedTask(_))
        ));
    }
}
