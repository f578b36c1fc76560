#![forbid(unsafe_code)]

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

use crate::error::TaskOutlineError;
use crate::tui;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerItem {
    pub title: String,
    pub preview: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    Continue,
    /// Index into the original item list.
    Accept(usize),
    Cancel,
}

/// Filterable single-choice list. Drawn full screen by [`pick_one`] or as an
/// overlay by the side panel.
#[derive(Debug)]
pub struct Picker {
    title: String,
    items: Vec<PickerItem>,
    lower_titles: Vec<String>,
    query: String,
    filtered: Vec<usize>,
    selected: usize,
    list_state: ListState,
}

impl Picker {
    #[must_use]
    pub fn new(title: impl Into<String>, items: Vec<PickerItem>) -> Self {
        let lower_titles = items.iter().map(|i| i.title.to_lowercase()).collect();
        let filtered = (0..items.len()).collect();
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self {
            title: title.into(),
            items,
            lower_titles,
            query: String::new(),
            filtered,
            selected: 0,
            list_state,
        }
    }

    #[must_use]
    pub fn items(&self) -> &[PickerItem] {
        &self.items
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn current(&self) -> Option<usize> {
        self.filtered.get(self.selected).copied()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PickerAction {
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c'))
        {
            return PickerAction::Cancel;
        }

        match key.code {
            KeyCode::Esc => return PickerAction::Cancel,
            KeyCode::Enter => {
                return match self.current() {
                    Some(idx) => PickerAction::Accept(idx),
                    None => PickerAction::Continue,
                };
            }
            KeyCode::Up => self.select(self.selected.saturating_sub(1)),
            KeyCode::Down => self.select(self.selected + 1),
            KeyCode::PageUp => self.select(self.selected.saturating_sub(10)),
            KeyCode::PageDown => self.select(self.selected + 10),
            KeyCode::Backspace => {
                self.query.pop();
                self.recompute_filter();
            }
            KeyCode::Char(c) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    self.query.push(c);
                    self.recompute_filter();
                }
            }
            _ => {}
        }
        PickerAction::Continue
    }

    fn select(&mut self, idx: usize) {
        self.selected = idx.min(self.filtered.len().saturating_sub(1));
        self.list_state.select(Some(self.selected));
    }

    fn recompute_filter(&mut self) {
        let q = self.query.to_lowercase();
        self.filtered = self
            .lower_titles
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.contains(&q).then_some(i))
            .collect();
        if self.selected >= self.filtered.len() {
            self.selected = 0;
        }
        self.list_state.select(Some(self.selected));
    }

    pub fn render(&mut self, f: &mut Frame<'_>, area: Rect) {
        f.render_widget(Clear, area);
        let outer = Block::default()
            .title(self.title.as_str())
            .borders(Borders::ALL);
        let inner = outer.inner(area);
        f.render_widget(outer, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[0]);

        let list_items: Vec<ListItem> = self
            .filtered
            .iter()
            .map(|&idx| ListItem::new(Line::from(self.items[idx].title.clone())))
            .collect();
        let list = List::new(list_items)
            .block(Block::default().borders(Borders::ALL).title("Tasks"))
            .highlight_style(
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">");
        f.render_stateful_widget(list, body[0], &mut self.list_state);

        let preview = self
            .current()
            .map(|idx| self.items[idx].preview.clone())
            .unwrap_or_default();
        let preview = Paragraph::new(preview)
            .block(Block::default().borders(Borders::ALL).title("Detail"))
            .wrap(Wrap { trim: false });
        f.render_widget(preview, body[1]);

        let bottom = Paragraph::new(Line::from(vec![
            Span::styled("Filter: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(self.query.as_str()),
            Span::raw("  "),
            Span::styled(
                "↑/↓ move • Enter pick • Esc cancel",
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        f.render_widget(bottom, chunks[1]);
    }
}

/// Full-screen picker on its own terminal session.
pub fn pick_one(title: &str, items: Vec<PickerItem>) -> Result<usize, TaskOutlineError> {
    if items.is_empty() {
        return Err(TaskOutlineError::Other(
            "no items available for selection".to_owned(),
        ));
    }
    if !tui::is_tty() {
        return Err(TaskOutlineError::Other(
            "interactive selection requires a TTY".to_owned(),
        ));
    }

    let mut guard = tui::TerminalGuard::new(tui::init_terminal()?);
    let mut picker = Picker::new(title, items);

    loop {
        guard
            .terminal()?
            .draw(|f| {
                let area = f.area();
                picker.render(f, area);
            })
            .map_err(|e| TaskOutlineError::Other(format!("failed to draw picker: {e}")))?;

        if event::poll(Duration::from_millis(50))
            .map_err(|e| TaskOutlineError::Other(format!("event poll failed: {e}")))?
            && let Event::Key(key) = event::read()
                .map_err(|e| TaskOutlineError::Other(format!("event read failed: {e}")))?
        {
            match picker.handle_key(key) {
                PickerAction::Continue => {}
                PickerAction::Accept(idx) => return Ok(idx),
                PickerAction::Cancel => return Err(TaskOutlineError::Cancelled),
            }
        }
    }
}

pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
