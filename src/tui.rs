use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};

use crate::error::KiraError;
use crate::pipeline::{CancelToken, ProgressEvent, ProgressSink, Stage};

const EVENTS_MAX: usize = 200;

#[derive(Debug)]
struct TuiState {
    stage: Option<Stage>,
    status: String,
    current: Option<String>,
    processed: usize,
    total: usize,
    substituted: usize,
    events: VecDeque<String>,
    started: Instant,
    cancelling: bool,
}

pub struct Tui {
    state: Arc<Mutex<TuiState>>,
    cancel: CancelToken,
}

struct TuiProgress {
    state: Arc<Mutex<TuiState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            state.stage = Some(event.stage);
            state.processed = event.processed;
            state.total = event.total;
            state.current = event.assay.as_ref().map(|assay| assay.to_string());
            if matches!(event.stage, Stage::Substitute) {
                state.substituted = state.substituted.saturating_add(1);
            }
            state.status = event.message.clone();
            let line = match event.elapsed {
                Some(elapsed) => format!(
                    "[{}] {} ({} ms)",
                    timestamp(),
                    event.message,
                    elapsed.as_millis()
                ),
                None => format!("[{}] {}", timestamp(), event.message),
            };
            push_event(&mut state.events, line);
        }
    }
}

impl Tui {
    pub fn new(total: usize, cancel: CancelToken) -> Self {
        Self {
            state: Arc::new(Mutex::new(TuiState {
                stage: None,
                status: "ready".to_string(),
                current: None,
                processed: 0,
                total,
                substituted: 0,
                events: VecDeque::new(),
                started: Instant::now(),
                cancelling: false,
            })),
            cancel,
        }
    }

    /// Runs `f` on a worker thread while drawing its progress. `q` or `Esc`
    /// requests cancellation; the worker stops at the next assay boundary.
    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, KiraError> + Send + 'static,
        R: Send + 'static,
    {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let (tx, rx) = std::sync::mpsc::channel();
        let sink = TuiProgress {
            state: self.state.clone(),
        };
        let handle = thread::spawn(move || tx.send(f(&sink)));

        let mut tick = 0usize;
        let result = loop {
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_ui(frame, &state, tick))
                    .into_diagnostic()?;
            }

            if let Ok(result) = rx.try_recv() {
                break result;
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    self.handle_key(key);
                }
            }

            tick = tick.wrapping_add(1);
        };

        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        handle.join().ok();
        result.map_err(miette::Report::new)
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
            self.cancel.cancel();
            if let Ok(mut state) = self.state.lock() {
                state.cancelling = true;
                push_event(
                    &mut state.events,
                    format!("[{}] cancel requested; finishing current assay", timestamp()),
                );
            }
        }
    }
}

fn draw_ui(frame: &mut ratatui::Frame, state: &TuiState, tick: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(draw_header(state, tick), chunks[0]);
    frame.render_widget(draw_gauge(state), chunks[1]);
    frame.render_widget(draw_status_panel(state), chunks[2]);
    let visible = chunks[3].height.saturating_sub(2) as usize;
    frame.render_widget(draw_events(state, visible), chunks[3]);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            "q/Esc: cancel after the current assay",
            Style::default().fg(Color::Gray),
        ))),
        chunks[4],
    );
}

fn draw_header(state: &TuiState, tick: usize) -> Paragraph<'static> {
    let hb = if tick % 2 == 0 { "*" } else { " " };
    let mode = if state.cancelling {
        Span::styled("Cancelling", Style::default().fg(Color::Yellow))
    } else {
        Span::styled("Build", Style::default().fg(Color::Cyan))
    };
    Paragraph::new(Line::from(vec![
        Span::styled(
            "KIRA-TOX21",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw("   Source: Tripod   Op: "),
        mode,
        Span::raw("   "),
        Span::styled(hb, Style::default().fg(Color::Green)),
    ]))
    .alignment(Alignment::Left)
    .block(Block::default().borders(Borders::BOTTOM))
}

fn draw_gauge(state: &TuiState) -> Gauge<'static> {
    let ratio = if state.total == 0 {
        1.0
    } else {
        (state.processed as f64 / state.total as f64).clamp(0.0, 1.0)
    };
    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Assays"))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format!("{}/{} assays", state.processed, state.total))
}

fn draw_status_panel(state: &TuiState) -> Paragraph<'static> {
    let stage = state.stage.map(Stage::label).unwrap_or("Resolve");
    let stage_color = match state.stage {
        Some(Stage::Finish) => Color::Green,
        Some(Stage::Substitute) => Color::Yellow,
        _ => Color::Cyan,
    };
    let elapsed = state.started.elapsed().as_secs();
    let lines = vec![
        Line::from(vec![
            Span::styled("Stage: ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{stage:<10}"), Style::default().fg(stage_color)),
            Span::styled("Elapsed: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{:02}:{:02}", elapsed / 60, elapsed % 60)),
        ]),
        Line::from(vec![
            Span::styled("Assay: ", Style::default().fg(Color::Gray)),
            Span::raw(state.current.clone().unwrap_or_else(|| "--".to_string())),
        ]),
        Line::from(vec![
            Span::styled("Substituted: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{}", state.substituted)),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::raw(state.status.clone()),
        ]),
    ];
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::BOTTOM))
        .wrap(Wrap { trim: true })
}

fn draw_events(state: &TuiState, visible: usize) -> Paragraph<'static> {
    let skip = state.events.len().saturating_sub(visible);
    let lines = state
        .events
        .iter()
        .skip(skip)
        .map(|event| Line::from(event.clone()))
        .collect::<Vec<_>>();
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Events"))
        .wrap(Wrap { trim: true })
}

fn push_event(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > EVENTS_MAX {
        buffer.pop_front();
    }
}

fn timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs();
    let mins = (secs / 60) % 60;
    let hours = (secs / 3600) % 24;
    let seconds = secs % 60;
    format!("{hours:02}:{mins:02}:{seconds:02}")
}
