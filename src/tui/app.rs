#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use tokio::sync::watch;

use crate::cmdline::launcher::{LaunchCoordinator, LaunchHandle, LaunchOutcome};
use crate::cmdline::session::{CommandLine, SharedStatus, SubmitOutcome, TabOutcome};
use crate::config::Config;
use crate::error::TaskOutlineError;
use crate::host::local::LocalTaskHost;
use crate::outline::TaskOutline;
use crate::task::model::{DisplayEntry, Task, TaskIcon, TaskScope};
use crate::tui::picker::{self, Picker, PickerAction, PickerItem};
use crate::tui::{self, TerminalGuard};

#[derive(Debug, Clone)]
struct Toast {
    message: String,
    until: Instant,
}

impl Toast {
    fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            until: Instant::now() + Duration::from_secs(3),
        }
    }
}

struct PendingPick {
    ticket: u64,
    picker: Picker,
}

struct Running {
    label: String,
    log: Option<PathBuf>,
    handle: LaunchHandle,
}

struct AppState {
    cfg: Config,
    host: Arc<LocalTaskHost>,
    outline: TaskOutline,
    launcher: LaunchCoordinator,
    cmdline: CommandLine,
    status: SharedStatus,
    changes: watch::Receiver<u64>,

    tasks: Vec<Task>,
    entries: Vec<DisplayEntry>,
    list_state: ListState,
    last_refresh: Instant,

    pick: Option<PendingPick>,
    running: Vec<Running>,

    toast: Option<Toast>,
    last_error: Option<String>,
    should_quit: bool,
}

impl AppState {
    fn new(
        cfg: Config,
        host: Arc<LocalTaskHost>,
        outline: TaskOutline,
        launcher: LaunchCoordinator,
    ) -> Self {
        let status = SharedStatus::default();
        let cmdline = CommandLine::new(Arc::new(status.clone()), cfg.cmdline.auto_submit_unique);
        let changes = outline.subscribe();
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self {
            cfg,
            host,
            outline,
            launcher,
            cmdline,
            status,
            changes,
            tasks: Vec::new(),
            entries: Vec::new(),
            list_state,
            last_refresh: Instant::now(),
            pick: None,
            running: Vec::new(),
            toast: None,
            last_error: None,
            should_quit: false,
        }
    }

    fn selected_index(&self) -> usize {
        self.list_state.selected().unwrap_or(0)
    }

    fn selected_entry(&self) -> Option<&DisplayEntry> {
        self.entries.get(self.selected_index())
    }

    fn clamp_selection(&mut self) {
        if self.entries.is_empty() {
            self.list_state.select(Some(0));
            return;
        }
        let idx = self.selected_index().min(self.entries.len() - 1);
        self.list_state.select(Some(idx));
    }

    fn move_selection(&mut self, delta: i64) {
        if self.entries.is_empty() {
            return;
        }
        let cur = i64::try_from(self.selected_index()).unwrap_or(0);
        let max = i64::try_from(self.entries.len().saturating_sub(1)).unwrap_or(0);
        let next = (cur + delta).clamp(0, max);
        let next = usize::try_from(next).unwrap_or(0);
        self.list_state.select(Some(next));
    }

    fn multi_scope(&self) -> bool {
        self.outline.is_multi_scope()
    }
}

pub async fn run(
    cfg: Config,
    host: Arc<LocalTaskHost>,
    outline: TaskOutline,
    launcher: LaunchCoordinator,
) -> anyhow::Result<()> {
    let terminal = tui::init_terminal()?;
    let mut guard = TerminalGuard::new(terminal);

    let mut app = AppState::new(cfg, host, outline, launcher);
    if let Err(e) = reload(&mut app).await {
        app.last_error = Some(e.to_string());
    }

    loop {
        if let Some(toast) = &app.toast
            && Instant::now() >= toast.until
        {
            app.toast = None;
        }

        reap_finished(&mut app).await;

        guard.terminal()?.draw(|f| draw(f, &mut app))?;

        if app.should_quit {
            break;
        }

        let interval = Duration::from_millis(app.cfg.outline.refresh_interval_ms.max(100));
        if app.cfg.outline.autorefresh && app.last_refresh.elapsed() >= interval {
            app.outline.refresh();
        }

        if app.changes.has_changed().unwrap_or(false) {
            let _ = app.changes.borrow_and_update();
            if let Err(e) = reload(&mut app).await {
                app.last_error = Some(e.to_string());
            }
        }

        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
        {
            handle_key(key, &mut app, &mut guard).await?;
        }
    }

    Ok(())
}

async fn reload(app: &mut AppState) -> anyhow::Result<()> {
    app.last_refresh = Instant::now();
    app.tasks = app.outline.tasks().await?;
    app.entries = app.outline.entries_for(&app.tasks);
    app.clamp_selection();
    Ok(())
}

async fn reap_finished(app: &mut AppState) {
    if !app.running.iter().any(|r| r.handle.is_finished()) {
        return;
    }
    let (done, still): (Vec<Running>, Vec<Running>) = std::mem::take(&mut app.running)
        .into_iter()
        .partition(|r| r.handle.is_finished());
    app.running = still;

    for run in done {
        let code = run.handle.finished().await.and_then(|e| e.exit_code);
        let message = match code {
            Some(0) => format!("'{}' finished", run.label),
            Some(c) => format!("'{}' exited with {c}", run.label),
            None => format!("'{}' ended", run.label),
        };
        app.toast = Some(Toast::info(message));
    }
}

fn track(app: &mut AppState, label: String, handle: LaunchHandle) {
    let log = app.host.log_path(&handle.execution.id);
    app.toast = Some(Toast::info(format!("started '{label}'")));
    app.running.push(Running { label, log, handle });
}

fn draw(f: &mut Frame<'_>, app: &mut AppState) {
    let area = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    draw_title(f, root[0], app);
    draw_body(f, root[1], app);
    draw_status_line(f, root[2], app);
    draw_footer(f, root[3], app);

    if let Some(pick) = app.pick.as_mut() {
        pick.picker.render(f, picker::centered_rect(70, 60, area));
    }
}

fn draw_title(f: &mut Frame<'_>, area: Rect, app: &AppState) {
    let folders: Vec<&str> = app
        .outline
        .folders()
        .iter()
        .map(|folder| folder.name.as_str())
        .collect();
    let mut spans = vec![
        Span::styled(
            " Task Outline ",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(folders.join(", ")),
    ];
    if app.outline.unhide_all() {
        spans.push(Span::styled(
            "  [showing hidden]",
            Style::default().fg(Color::Yellow),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_body(f: &mut Frame<'_>, area: Rect, app: &mut AppState) {
    let running_height = if app.running.is_empty() {
        0
    } else {
        u16::try_from(app.running.len().min(5)).unwrap_or(5) + 2
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(running_height)])
        .split(area);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[0]);

    draw_task_list(f, cols[0], app);
    draw_task_detail(f, cols[1], app);
    if running_height > 0 {
        draw_running(f, rows[1], app);
    }
}

fn draw_task_list(f: &mut Frame<'_>, area: Rect, app: &mut AppState) {
    let show_icons = app.cfg.outline.show_icons;
    let items: Vec<ListItem> = app
        .entries
        .iter()
        .map(|entry| ListItem::new(entry_line(entry, show_icons)))
        .collect();
    let title = format!("Tasks ({})", app.entries.len());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::LightBlue)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn entry_line(entry: &DisplayEntry, show_icons: bool) -> Line<'static> {
    let mut spans = Vec::new();
    if show_icons && let Some(icon) = &entry.icon {
        spans.push(Span::styled(
            format!("[{}] ", icon.id),
            icon_style(icon),
        ));
    }
    let style = if entry.hidden {
        Style::default().add_modifier(Modifier::DIM)
    } else {
        Style::default()
    };
    spans.push(Span::styled(entry.label.clone(), style));
    Line::from(spans)
}

fn icon_style(icon: &TaskIcon) -> Style {
    icon.color
        .as_deref()
        .and_then(theme_color)
        .map_or_else(Style::default, |c| Style::default().fg(c))
}

/// Maps `terminal.ansi*` theme color ids onto terminal colors.
fn theme_color(id: &str) -> Option<Color> {
    let name = id.strip_prefix("terminal.ansi")?;
    Some(match name {
        "Black" => Color::Black,
        "Red" => Color::Red,
        "Green" => Color::Green,
        "Yellow" => Color::Yellow,
        "Blue" => Color::Blue,
        "Magenta" => Color::Magenta,
        "Cyan" => Color::Cyan,
        "White" => Color::White,
        "BrightBlack" => Color::DarkGray,
        "BrightRed" => Color::LightRed,
        "BrightGreen" => Color::LightGreen,
        "BrightYellow" => Color::LightYellow,
        "BrightBlue" => Color::LightBlue,
        "BrightMagenta" => Color::LightMagenta,
        "BrightCyan" => Color::LightCyan,
        "BrightWhite" => Color::Gray,
        _ => return None,
    })
}

fn draw_task_detail(f: &mut Frame<'_>, area: Rect, app: &AppState) {
    let block = Block::default().borders(Borders::ALL).title("Details");
    let Some(entry) = app.selected_entry() else {
        let p = Paragraph::new("No tasks declared in this workspace.")
            .block(block)
            .wrap(Wrap { trim: false });
        f.render_widget(p, area);
        return;
    };

    let task = &entry.command.task;
    let scope = match &entry.command.scope {
        TaskScope::Global => "workspace".to_owned(),
        TaskScope::Folder(folder) => folder.name.clone(),
    };
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Name:   ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(task.name.clone()),
        ]),
        Line::from(vec![
            Span::styled("Type:   ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(task.kind.clone()),
        ]),
        Line::from(vec![
            Span::styled("Scope:  ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(scope),
        ]),
    ];
    if entry.hidden {
        lines.push(Line::from(Span::styled(
            "Hidden",
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(tooltip) = &entry.tooltip {
        lines.push(Line::from(""));
        lines.push(Line::from(tooltip.clone()));
    }

    let p = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

fn draw_running(f: &mut Frame<'_>, area: Rect, app: &AppState) {
    let lines: Vec<Line> = app
        .running
        .iter()
        .map(|run| {
            let mut spans = vec![
                Span::styled("● ", Style::default().fg(Color::Green)),
                Span::raw(run.label.clone()),
                Span::styled(
                    format!("  {}", run.handle.execution.id),
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            if let Some(log) = &run.log {
                spans.push(Span::styled(
                    format!("  {}", log.display()),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Line::from(spans)
        })
        .collect();
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Running"));
    f.render_widget(p, area);
}

fn draw_status_line(f: &mut Frame<'_>, area: Rect, app: &AppState) {
    let text = app.status.text();
    f.render_widget(Paragraph::new(text.as_str()), area);
    if app.cmdline.is_active() && app.pick.is_none() {
        let x = area.x + u16::try_from(text.chars().count()).unwrap_or(0);
        f.set_cursor_position((x, area.y));
    }
}

fn draw_footer(f: &mut Frame<'_>, area: Rect, app: &AppState) {
    let mut left = if app.pick.is_some() {
        "type to filter • ↑/↓ move • Enter pick • Esc cancel".to_owned()
    } else if app.cmdline.is_active() {
        "type a task name • Tab complete • Enter run • Backspace delete • Esc cancel".to_owned()
    } else {
        "q quit • j/k move • Enter run • / type name • l list • r refresh • u unhide • g goto"
            .to_owned()
    };

    if let Some(err) = &app.last_error {
        left = format!("Error: {err}");
    } else if let Some(toast) = &app.toast {
        left.clone_from(&toast.message);
    }

    let right = format!(
        "Refresh: {} • Hidden: {} • Running: {}",
        if app.cfg.outline.autorefresh {
            "auto"
        } else {
            "manual"
        },
        if app.outline.unhide_all() {
            "shown"
        } else {
            "filtered"
        },
        app.running.len(),
    );

    let spans = vec![
        Span::styled(left, Style::default().fg(Color::White).bg(Color::Blue)),
        Span::raw(" "),
        Span::styled(
            right,
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::DIM),
        ),
    ];

    let p = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Blue));
    f.render_widget(p, area);
}

async fn handle_key(
    key: KeyEvent,
    app: &mut AppState,
    guard: &mut TerminalGuard,
) -> anyhow::Result<()> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
        app.should_quit = true;
        return Ok(());
    }
    app.last_error = None;

    // The picker overlay takes precedence over the command line.
    if let Some(pick) = app.pick.as_mut() {
        match pick.picker.handle_key(key) {
            PickerAction::Continue => {}
            PickerAction::Accept(idx) => {
                let ticket = pick.ticket;
                let choice = pick.picker.items()[idx].title.clone();
                app.pick = None;
                app.cmdline.resolve_pick(ticket, Some(&choice));
            }
            PickerAction::Cancel => {
                let ticket = pick.ticket;
                app.pick = None;
                app.cmdline.resolve_pick(ticket, None);
            }
        }
        return Ok(());
    }

    if app.cmdline.is_active() {
        match key.code {
            KeyCode::Esc => app.cmdline.cancel(),
            KeyCode::Backspace => app.cmdline.back(),
            KeyCode::Tab => complete(app).await,
            KeyCode::Enter => {
                if app.cmdline.insert('\n') {
                    submit(app).await;
                }
            }
            KeyCode::Char(c) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                    && app.cmdline.insert(c)
                {
                    submit(app).await;
                }
            }
            _ => {}
        }
        return Ok(());
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('j') | KeyCode::Down => app.move_selection(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_selection(-1),
        KeyCode::PageDown => app.move_selection(10),
        KeyCode::PageUp => app.move_selection(-10),
        KeyCode::Enter => launch_selected(app).await,
        KeyCode::Char('r') => {
            app.outline.refresh();
            app.toast = Some(Toast::info("refreshed"));
        }
        KeyCode::Char('u') => {
            let shown = app.outline.toggle_unhide();
            app.toast = Some(Toast::info(if shown {
                "showing hidden tasks"
            } else {
                "hiding hidden tasks"
            }));
        }
        KeyCode::Char('/') => app.cmdline.open(),
        KeyCode::Char('l') => {
            let multi_scope = app.multi_scope();
            let outcome = app.cmdline.show_list(&app.entries, multi_scope);
            on_tab(app, outcome).await;
        }
        KeyCode::Char('g') => {
            if let Err(e) = goto_selected(app, guard) {
                app.last_error = Some(e.to_string());
            }
        }
        _ => {}
    }
    Ok(())
}

async fn launch_selected(app: &mut AppState) {
    let Some(entry) = app.selected_entry() else {
        return;
    };
    let label = entry.label.clone();
    let task = entry.command.task.clone();
    match app.launcher.launch_task(&task).await {
        LaunchOutcome::Started(handle) => track(app, label, handle),
        LaunchOutcome::UndefinedTask => {
            app.last_error = Some(TaskOutlineError::UndefinedTask(label).to_string());
        }
        LaunchOutcome::Rejected(msg) => app.last_error = Some(msg),
    }
}

async fn complete(app: &mut AppState) {
    let multi_scope = app.multi_scope();
    let outcome = app.cmdline.complete(&app.tasks, multi_scope);
    on_tab(app, outcome).await;
}

async fn on_tab(app: &mut AppState, outcome: TabOutcome) {
    match outcome {
        TabOutcome::Inactive | TabOutcome::Completed { auto_submit: false } => {}
        TabOutcome::NoMatch => app.toast = Some(Toast::info("no matching task")),
        TabOutcome::Completed { auto_submit: true } => submit(app).await,
        TabOutcome::Ambiguous(req) => {
            let items = req
                .candidates
                .iter()
                .map(|candidate| PickerItem {
                    title: candidate.clone(),
                    preview: candidate_preview(candidate, &app.entries),
                })
                .collect();
            app.pick = Some(PendingPick {
                ticket: req.ticket,
                picker: Picker::new("Select a task", items),
            });
        }
    }
}

fn candidate_preview(candidate: &str, entries: &[DisplayEntry]) -> String {
    entries
        .iter()
        .find(|e| e.label == candidate)
        .and_then(|e| e.tooltip.clone())
        .unwrap_or_default()
}

async fn submit(app: &mut AppState) {
    let name = app.cmdline.contents().trim_start_matches('/').to_owned();
    match app.cmdline.submit(&app.launcher, &app.tasks).await {
        SubmitOutcome::Started(handle) => track(app, name, handle),
        SubmitOutcome::Rejected(msg) => app.last_error = Some(msg),
        SubmitOutcome::Inactive | SubmitOutcome::UndefinedTask => {}
    }
}

fn goto_selected(app: &mut AppState, guard: &mut TerminalGuard) -> anyhow::Result<()> {
    let Some(entry) = app.selected_entry() else {
        return Ok(());
    };
    let task = entry.command.task.clone();
    let Some(location) = app.outline.declaration_of(&task)? else {
        app.toast = Some(Toast::info(format!(
            "no declaration of '{}' found",
            task.name
        )));
        return Ok(());
    };
    open_in_editor(&location.path, location.line, app, guard)
}

fn open_in_editor(
    path: &Path,
    line: usize,
    app: &mut AppState,
    guard: &mut TerminalGuard,
) -> anyhow::Result<()> {
    use std::process::Command;

    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_owned());

    // Suspend TUI to give full control to the editor.
    if let Some(term) = guard.terminal.take() {
        tui::restore_terminal(term)?;
    }

    let status = Command::new(&editor)
        .arg(format!("+{}", line + 1))
        .arg(path)
        .stdin(std::process::Stdio::inherit())
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .status();

    // Resume TUI
    guard.terminal = Some(tui::init_terminal()?);

    match status {
        Ok(status) if status.success() => app.last_error = None,
        Ok(status) => {
            app.last_error = Some(format!(
                "{editor} failed (exit code: {})",
                status.code().unwrap_or(1)
            ));
        }
        Err(e) => app.last_error = Some(format!("failed to start {editor}: {e}")),
    }
    app.outline.refresh();
    Ok(())
}
