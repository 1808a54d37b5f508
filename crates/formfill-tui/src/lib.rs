// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use formfill_app::{AppCommand, AppState, FillOutcome};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

const FULL_PAGE_ROWS: isize = 20;
const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(500);
const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);

/// What the pick-list needs from the rest of the program.
pub trait AppRuntime {
    /// Fill the web form from the row matching `entry`. Blocks until the
    /// browser work is done.
    fn fill_entry(&mut self, entry: &str) -> Result<FillOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ReportUiState {
    visible: bool,
    title: String,
    lines: Vec<String>,
    scroll: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Click {
    index: usize,
    at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    title: String,
    help_visible: bool,
    report: ReportUiState,
    status_token: u64,
    /// Entry to fill after the next frame is drawn.
    pending_fill: Option<String>,
    last_click: Option<Click>,
    frame_area: Rect,
    /// First list row on screen. Moves only when the cursor leaves the window.
    list_offset: usize,
}

/// Run the pick-list until the user quits. `title` labels the list, usually
/// the column the entries came from.
pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R, title: &str) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(error) = execute!(stdout, terminal::EnterAlternateScreen, EnableMouseCapture) {
        let _ = disable_raw_mode();
        return Err(error).context("enter alternate screen");
    }

    let mut terminal = match Terminal::new(CrosstermBackend::new(stdout)) {
        Ok(terminal) => terminal,
        Err(error) => {
            let _ = restore_terminal();
            return Err(error).context("create terminal");
        }
    };

    let mut view_data = ViewData {
        title: title.to_owned(),
        ..ViewData::default()
    };
    let (internal_tx, internal_rx) = mpsc::channel();

    let result = event_loop(
        &mut terminal,
        state,
        runtime,
        &mut view_data,
        &internal_tx,
        &internal_rx,
    );

    restore_terminal()?;
    result
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode().context("disable raw mode")?;
    execute!(
        io::stdout(),
        terminal::LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("leave alternate screen")
}

fn event_loop<R: AppRuntime>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    internal_rx: &Receiver<InternalEvent>,
) -> Result<()> {
    loop {
        process_internal_events(state, view_data, internal_rx);
        draw(terminal, state, view_data)?;

        if run_pending_fill(state, runtime, view_data, internal_tx) {
            continue;
        }

        if !event::poll(Duration::from_millis(120)).context("poll event")? {
            continue;
        }
        match event::read().context("read event")? {
            Event::Key(key) => {
                if handle_key_event(state, view_data, internal_tx, key) {
                    return Ok(());
                }
            }
            Event::Mouse(mouse) => {
                handle_mouse_event(state, view_data, internal_tx, mouse, Instant::now());
            }
            _ => {}
        }
    }
}

/// Draw one frame, remembering the area and list window that mouse clicks
/// are resolved against.
fn draw<B: Backend>(
    terminal: &mut Terminal<B>,
    state: &AppState,
    view_data: &mut ViewData,
) -> Result<()> {
    terminal
        .draw(|frame| {
            view_data.frame_area = frame.area();
            view_data.list_offset = follow_cursor(
                view_data.list_offset,
                state.picklist.cursor(),
                list_height(view_data.frame_area),
                state.picklist.visible().len(),
            );
            render(frame, state, view_data);
        })
        .context("draw frame")?;
    Ok(())
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

/// Status that stays until replaced; used while a fill is running.
fn hold_status(state: &mut AppState, view_data: &mut ViewData, message: impl Into<String>) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
}

fn request_fill(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(entry) = state.picklist.selected().map(str::to_owned) else {
        emit_status(state, view_data, internal_tx, "nothing selected");
        return;
    };
    hold_status(state, view_data, format!("filling {entry} ..."));
    view_data.pending_fill = Some(entry);
}

/// Run a requested fill, if any. Returns whether one ran.
fn run_pending_fill<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) -> bool {
    let Some(entry) = view_data.pending_fill.take() else {
        return false;
    };

    let (status, lines) = match runtime.fill_entry(&entry) {
        Ok(outcome) => (outcome.summary(), outcome.lines()),
        Err(error) => {
            log::error!("fill {entry:?} failed: {error:#}");
            let message = format!("fill failed: {error:#}");
            (message.clone(), vec![message])
        }
    };
    view_data.report = ReportUiState {
        visible: true,
        title: entry,
        lines,
        scroll: 0,
    };
    emit_status(state, view_data, internal_tx, status);
    true
}

fn handle_key_event(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if key.code == KeyCode::Char('q') && ctrl {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    if view_data.report.visible {
        handle_report_key(view_data, key);
        return false;
    }

    match key.code {
        KeyCode::Enter => request_fill(state, view_data, internal_tx),
        KeyCode::Esc => {
            if state.picklist.query().is_empty() {
                emit_status(state, view_data, internal_tx, "ctrl+q to quit");
            } else {
                state.dispatch(AppCommand::ClearQuery);
            }
        }
        KeyCode::Backspace => {
            state.dispatch(AppCommand::PopQueryChar);
        }
        KeyCode::Up => {
            state.dispatch(AppCommand::MoveCursor(-1));
        }
        KeyCode::Down => {
            state.dispatch(AppCommand::MoveCursor(1));
        }
        KeyCode::PageUp => {
            state.dispatch(AppCommand::MoveCursor(-FULL_PAGE_ROWS));
        }
        KeyCode::PageDown => {
            state.dispatch(AppCommand::MoveCursor(FULL_PAGE_ROWS));
        }
        KeyCode::Home => {
            state.dispatch(AppCommand::SelectFirst);
        }
        KeyCode::End => {
            state.dispatch(AppCommand::SelectLast);
        }
        KeyCode::Char('u') if ctrl => {
            state.dispatch(AppCommand::ClearQuery);
        }
        KeyCode::Char('p') if ctrl => {
            state.dispatch(AppCommand::MoveCursor(-1));
        }
        KeyCode::Char('n') if ctrl => {
            state.dispatch(AppCommand::MoveCursor(1));
        }
        KeyCode::Char('?') if state.picklist.query().is_empty() => {
            view_data.help_visible = true;
        }
        KeyCode::Char(ch) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
            state.dispatch(AppCommand::PushQueryChar(ch));
        }
        _ => {}
    }
    false
}

fn handle_report_key(view_data: &mut ViewData, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => view_data.report = ReportUiState::default(),
        KeyCode::Up => view_data.report.scroll = view_data.report.scroll.saturating_sub(1),
        KeyCode::Down => {
            let max = view_data.report.lines.len().saturating_sub(1) as u16;
            view_data.report.scroll = view_data.report.scroll.saturating_add(1).min(max);
        }
        _ => {}
    }
}

fn handle_mouse_event(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    mouse: MouseEvent,
    now: Instant,
) {
    if view_data.help_visible || view_data.report.visible {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            state.dispatch(AppCommand::MoveCursor(-1));
        }
        MouseEventKind::ScrollDown => {
            state.dispatch(AppCommand::MoveCursor(1));
        }
        MouseEventKind::Down(MouseButton::Left) => {
            let Some(index) = list_index_at(state, view_data, mouse.column, mouse.row) else {
                view_data.last_click = None;
                return;
            };
            state.dispatch(AppCommand::SelectIndex(index));
            let double = view_data.last_click.is_some_and(|click| {
                click.index == index
                    && now.saturating_duration_since(click.at) <= DOUBLE_CLICK_WINDOW
            });
            if double {
                view_data.last_click = None;
                request_fill(state, view_data, internal_tx);
            } else {
                view_data.last_click = Some(Click { index, at: now });
            }
        }
        _ => {}
    }
}

/// Filter box, list, status bar.
fn main_layout(area: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2]]
}

fn list_block(title: String) -> Block<'static> {
    Block::default().borders(Borders::ALL).title(title)
}

fn list_inner(frame_area: Rect) -> Rect {
    let [_, list_area, _] = main_layout(frame_area);
    list_block(String::new()).inner(list_area)
}

fn list_height(frame_area: Rect) -> usize {
    list_inner(frame_area).height as usize
}

/// Keep the window starting at `offset` unless `cursor` has left it.
fn follow_cursor(offset: usize, cursor: usize, height: usize, len: usize) -> usize {
    if height == 0 {
        return 0;
    }
    let offset = offset.min(len.saturating_sub(height));
    if cursor < offset {
        cursor
    } else if cursor >= offset + height {
        cursor + 1 - height
    } else {
        offset
    }
}

fn list_index_at(state: &AppState, view_data: &ViewData, column: u16, row: u16) -> Option<usize> {
    let inner = list_inner(view_data.frame_area);
    if column < inner.x
        || column >= inner.x.saturating_add(inner.width)
        || row < inner.y
        || row >= inner.y.saturating_add(inner.height)
    {
        return None;
    }
    let index = view_data.list_offset + (row - inner.y) as usize;
    (index < state.picklist.visible().len()).then_some(index)
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let [filter_area, list_area, status_area] = main_layout(frame.area());
    let picklist = &state.picklist;

    let filter = Paragraph::new(format!("> {}", picklist.query())).block(
        Block::default().borders(Borders::ALL).title(format!(
            "{} ({}/{})",
            view_data.title,
            picklist.visible().len(),
            picklist.entries().len()
        )),
    );
    frame.render_widget(filter, filter_area);

    let block = list_block("entries".to_owned());
    let height = block.inner(list_area).height as usize;
    let items: Vec<ListItem<'_>> = if picklist.visible().is_empty() {
        vec![ListItem::new(Line::from("(no matches)")).style(Style::default().fg(Color::DarkGray))]
    } else {
        picklist
            .visible()
            .iter()
            .enumerate()
            .skip(view_data.list_offset)
            .take(height.max(1))
            .map(|(index, entry)| {
                let style = if index == picklist.cursor() {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(entry.as_str())).style(style)
            })
            .collect()
    };
    frame.render_widget(List::new(items).block(block), list_area);

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, status_area);

    if view_data.report.visible {
        let area = centered_rect(76, 60, frame.area());
        frame.render_widget(Clear, area);
        let report = Paragraph::new(render_report_text(&view_data.report))
            .scroll((view_data.report.scroll, 0))
            .block(
                Block::default()
                    .title(format!("fill report: {}", view_data.report.title))
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Cyan)),
            );
        frame.render_widget(report, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 50, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_report_text(report: &ReportUiState) -> String {
    let mut lines = report.lines.clone();
    lines.push(String::new());
    lines.push("up/down scroll | esc close".to_owned());
    lines.join("\n")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if view_data.help_visible || view_data.report.visible {
        return String::new();
    }
    let default = "type filter | up/down pick | enter or double-click fill | ? help | ctrl+q quit";
    match &state.status_line {
        Some(status) => format!("{status} | {default}"),
        None => default.to_owned(),
    }
}

fn help_overlay_text() -> &'static str {
    "filter: type to narrow | backspace delete | ctrl+u or esc clear\n\
pick: up/down ctrl+p/ctrl+n | pgup/pgdn | home/end | click select\n\
fill: enter or double-click fills the form for the selected entry\n\
report: up/down scroll | esc close\n\
global: ? help (empty filter) | ctrl+q quit"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
