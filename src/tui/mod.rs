mod artifact;
mod export;
mod help;
mod state;

use crate::cli::Cli;
use crate::orchestrator::{self, SessionEvent, UiCommand};
use crate::session::{ActionKind, Applied, Outcome};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{Focus, UiState};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const CURSOR: char = '▏';

/// What a keystroke asks the run loop to do beyond editing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    None,
    Quit,
    Start(ActionKind),
    Copy,
}

pub async fn run(args: Cli) -> Result<()> {
    let (client, navigator) = crate::cli::build_client(&args)?;

    // Unbounded channels: the UI thread must never block on the controller.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, event_rx, cmd_tx));

    let res = orchestrator::run_controller(client, Arc::new(navigator), event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    mut event_rx: UnboundedReceiver<SessionEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::new(args.mode, args.client_config().base_url);
    if let Some(id) = args.artifact_id.as_deref() {
        state.session.artifact_id = id.trim().to_string();
        state.focus = Focus::ArtifactId;
    }
    if let Some(path) = args.input.as_deref() {
        // stdin belongs to the terminal here, so "-" is not supported.
        if path != std::path::Path::new("-") {
            state.session.raw_input = std::fs::read_to_string(path)
                .with_context(|| format!("read raw input {}", path.display()))?;
        }
    }
    state.raw_cursor = state.session.raw_input.chars().count();
    state.id_cursor = state.session.artifact_id.chars().count();
    let log_path = crate::logging::log_file_path().map(|p| p.display().to_string());

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    start(&mut state, ActionKind::Startup, &cmd_tx);

    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
            dirty = true;
        }

        // Redraw on change, throttled to the tick rate, plus an idle refresh.
        let since = last_tick.elapsed();
        if (dirty && since >= tick_rate) || since >= Duration::from_millis(500) {
            terminal
                .draw(|f| draw(f.area(), f, &state, log_path.as_deref()))
                .ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                dirty = true;
                match handle_key(&mut state, k) {
                    KeyAction::None => {}
                    KeyAction::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    KeyAction::Start(kind) => start(&mut state, kind, &cmd_tx),
                    KeyAction::Copy => export::copy_and_show(&mut state),
                }
            } else {
                dirty = true;
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn pending_message(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Startup => "Checking API…",
        ActionKind::Convert => "Converting…",
        ActionKind::Load => "Loading artifact…",
        ActionKind::Download => "Requesting export…",
    }
}

/// Begin `kind` in the session and hand it to the controller. Rejections only update the info line.
fn start(state: &mut UiState, kind: ActionKind, cmd_tx: &UnboundedSender<UiCommand>) {
    match state.session.begin(kind) {
        Ok(action) => {
            let ticket = action.ticket;
            state.info = pending_message(kind).to_string();
            if cmd_tx.send(UiCommand::Run(action)).is_err() {
                state
                    .session
                    .apply(&ticket, Outcome::Failed("request controller stopped".into()));
                state.session.finish(&ticket);
            }
        }
        Err(rejected) => {
            state.info = format!("Not started: {rejected}");
        }
    }
}

fn apply_event(state: &mut UiState, ev: SessionEvent) {
    match ev {
        SessionEvent::Outcome { ticket, outcome } => {
            let saved = match &outcome {
                Outcome::Downloaded(d) => Some(match d.path.as_ref() {
                    Some(p) => format!("Saved: {}", p.display()),
                    None => format!("Opened: {}", d.url),
                }),
                _ => None,
            };
            let fetched = matches!(outcome, Outcome::ArtifactFetched(_));
            if state.session.apply(&ticket, outcome) == Applied::Accepted {
                if fetched {
                    state.artifact_scroll = 0;
                }
                if let Some(msg) = saved {
                    state.info = msg;
                }
                state.clamp_cursors();
            }
        }
        SessionEvent::Finished { ticket } => {
            if state.session.finish(&ticket) == Applied::Stale {
                return;
            }
            if !state.session.error.is_empty() {
                state.info.clear();
                return;
            }
            match ticket.kind {
                ActionKind::Startup => {
                    if state.info == pending_message(ActionKind::Startup) {
                        state.info.clear();
                    }
                }
                ActionKind::Convert => {
                    state.info = format!("Converted: {}", state.session.artifact_id);
                    state.id_cursor = state.session.artifact_id.chars().count();
                }
                ActionKind::Load => {
                    if let Some(a) = state.session.artifact.as_ref() {
                        state.info = format!("Loaded: {}", a.id);
                    }
                }
                ActionKind::Download => {}
            }
        }
    }
}

fn handle_key(state: &mut UiState, k: KeyEvent) -> KeyAction {
    let ctrl = k.modifiers.contains(KeyModifiers::CONTROL);
    let alt = k.modifiers.contains(KeyModifiers::ALT);

    match k.code {
        KeyCode::Esc => return KeyAction::Quit,
        KeyCode::Char('c') if ctrl => return KeyAction::Quit,
        KeyCode::F(1) => {
            state.tab = if state.tab == 0 { 1 } else { 0 };
            return KeyAction::None;
        }
        _ => {}
    }
    if state.tab != 0 {
        return KeyAction::None;
    }

    match k.code {
        KeyCode::Char('s') if ctrl => return KeyAction::Start(ActionKind::Convert),
        KeyCode::Char('l') if ctrl => return KeyAction::Start(ActionKind::Load),
        KeyCode::Char('d') if ctrl => return KeyAction::Start(ActionKind::Download),
        KeyCode::Char('y') if ctrl => return KeyAction::Copy,
        KeyCode::Tab => state.focus = state.focus.next(),
        KeyCode::BackTab => state.focus = state.focus.prev(),
        KeyCode::PageUp => state.scroll_artifact(-10),
        KeyCode::PageDown => state.scroll_artifact(10),
        KeyCode::Left | KeyCode::Up if state.focus == Focus::Mode => {
            state.session.mode = state.session.mode.prev()
        }
        KeyCode::Right | KeyCode::Down | KeyCode::Char(' ') if state.focus == Focus::Mode => {
            state.session.mode = state.session.mode.next()
        }
        KeyCode::Enter => match state.focus {
            Focus::ArtifactId => return KeyAction::Start(ActionKind::Load),
            Focus::RawInput => state.insert_char('\n'),
            Focus::Mode => state.focus = state.focus.next(),
        },
        KeyCode::Left => state.cursor_left(),
        KeyCode::Right => state.cursor_right(),
        KeyCode::Home => state.cursor_home(),
        KeyCode::End => state.cursor_end(),
        KeyCode::Backspace => state.backspace(),
        KeyCode::Delete => state.delete(),
        KeyCode::Char(c) if !ctrl && !alt => state.insert_char(c),
        _ => {}
    }
    KeyAction::None
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState, log_path: Option<&str>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let conn = &state.session.connection;
    let conn_style = if conn.reachable {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    };
    let tabs = Tabs::new(vec![Line::from("Session"), Line::from("Help")])
        .select(state.tab)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Line::from(vec![
                    Span::raw("artifact-desk | API: "),
                    Span::styled(conn.label(), conn_style),
                ])),
        )
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_session(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f, log_path),
    }
}

fn focus_block(title: &'static str, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

/// Text with a cursor marker at `cursor` (a char index) when focused, or a placeholder when empty.
fn field_text(text: &str, cursor: usize, focused: bool, placeholder: &'static str) -> Vec<Line<'static>> {
    if !focused {
        if text.is_empty() {
            return vec![Line::from(Span::styled(
                placeholder,
                Style::default().fg(Color::DarkGray),
            ))];
        }
        return text.split('\n').map(|l| Line::from(l.to_string())).collect();
    }
    let mut s = String::with_capacity(text.len() + CURSOR.len_utf8());
    for (i, c) in text.chars().enumerate() {
        if i == cursor {
            s.push(CURSOR);
        }
        s.push(c);
    }
    if cursor >= text.chars().count() {
        s.push(CURSOR);
    }
    s.split('\n').map(|l| Line::from(l.to_string())).collect()
}

fn draw_session(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let session = &state.session;
    let error_height = if session.error.is_empty() { 0 } else { 3 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(11),
                Constraint::Length(1),
                Constraint::Length(error_height),
                Constraint::Length(1),
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(area);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(20), Constraint::Min(0)].as_ref())
        .split(rows[0]);

    let mode = Paragraph::new(Line::from(vec![
        Span::raw("◀ "),
        Span::styled(
            session.mode.label(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ▶"),
    ]))
    .block(focus_block("Mode", state.focus == Focus::Mode));
    f.render_widget(mode, top[0]);

    let id_focused = state.focus == Focus::ArtifactId;
    let id = Paragraph::new(field_text(
        &session.artifact_id,
        state.id_cursor,
        id_focused,
        "paste artifact id...",
    ))
    .block(focus_block("Artifact ID (Enter to load)", id_focused));
    f.render_widget(id, top[1]);

    let raw_focused = state.focus == Focus::RawInput;
    let visible = rows[1].height.saturating_sub(2);
    let cursor_line = session
        .raw_input
        .chars()
        .take(state.raw_cursor)
        .filter(|c| *c == '\n')
        .count() as u16;
    let raw_scroll = cursor_line.saturating_sub(visible.saturating_sub(1));
    let raw = Paragraph::new(field_text(
        &session.raw_input,
        state.raw_cursor,
        raw_focused,
        "paste your raw input here...",
    ))
    .wrap(Wrap { trim: false })
    .scroll((raw_scroll, 0))
    .block(focus_block("Raw input", raw_focused));
    f.render_widget(raw, rows[1]);

    f.render_widget(Paragraph::new(controls_line(state)), rows[2]);

    if !session.error.is_empty() {
        let banner = Paragraph::new(session.error.clone())
            .style(Style::default().fg(Color::LightRed))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red))
                    .title("Error"),
            );
        f.render_widget(banner, rows[3]);
    }

    let info = Paragraph::new(Line::from(vec![
        Span::styled(state.info.clone(), Style::default().fg(Color::Gray)),
        Span::raw("  "),
        Span::styled(
            state.base_url.clone(),
            Style::default().fg(Color::DarkGray),
        ),
    ]));
    f.render_widget(info, rows[4]);

    artifact::draw_artifact(rows[5], f, state);
}

fn button(key: &'static str, label: String, enabled: bool) -> Vec<Span<'static>> {
    let style = if enabled {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    vec![
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" "),
        Span::styled(label, style),
        Span::raw("   "),
    ]
}

fn controls_line(state: &UiState) -> Line<'static> {
    let session = &state.session;
    let convert_label = if session.busy {
        "Working...".to_string()
    } else {
        "Convert → Artifact".to_string()
    };
    let mut spans = button("[Ctrl-S]", convert_label, session.can_convert());
    spans.extend(button("[Ctrl-L]", "Load".to_string(), session.can_load()));
    if session.download_available() {
        spans.extend(button(
            "[Ctrl-D]",
            "Download Artifact ZIP".to_string(),
            session.can_download(),
        ));
    }
    spans.push(Span::styled("F1 help", Style::default().fg(Color::DarkGray)));
    Line::from(spans)
}
