//! Terminal User Interface for sizetree
//!
//! Scans the current directory on a background thread while a progress
//! screen polls the shared monitor, then hands the finished tree to an
//! interactive navigator.
//!
//! # Architecture
//!
//! This is a thin wrapper around the core `sizetree` library. It uses
//! `ratatui` for rendering and handles all terminal-specific logic.

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph},
    Frame, Terminal,
};
use sizetree::{
    format_count, format_size, navigation::NavAction, truncate_left, truncate_right,
    NavigationState, Node, ProgressSnapshot, ScanMonitor, Scanner,
};
use std::{
    env,
    io::{self, IsTerminal, Stdout},
    path::PathBuf,
    process,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use tracing::{info, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

struct UiConfig {
    /// Input poll timeout; also the redraw period of both screens.
    tick_rate: Duration,
    /// How long the completed progress screen stays visible.
    completion_pause: Duration,
    /// How long to wait for the scanner after an early abort.
    grace_period: Duration,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate: Duration::from_millis(100),
            completion_pause: Duration::from_millis(500),
            grace_period: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressOutcome {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavInput {
    Action(NavAction),
    Quit,
}

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

fn main() {
    init_logging();

    match run() {
        Ok(()) => println!("Exited."),
        Err(err) => {
            println!("Terminal error. Your terminal might not be fully compatible.");
            println!("Error: {err:#}");
            process::exit(1);
        }
    }
}

/// Logs go to stderr only when it is redirected, so they never draw over the UI.
fn init_logging() {
    if io::stderr().is_terminal() {
        return;
    }
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .init();
}

fn run() -> Result<()> {
    let scan_path = env::current_dir().context("failed to read the current directory")?;
    let config = UiConfig::default();

    // Setup terminal
    let mut terminal = setup_terminal()?;

    let monitor = Arc::new(ScanMonitor::new());
    let res = spawn_scanner(scan_path, Arc::clone(&monitor))
        .and_then(|handle| run_session(&mut terminal, &monitor, handle, &config));

    // Restore terminal
    restore_terminal(&mut terminal)?;
    res
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e).context("failed to enter the alternate screen");
    }
    let mut terminal = match Terminal::new(CrosstermBackend::new(stdout)) {
        Ok(terminal) => terminal,
        Err(e) => {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            return Err(e).context("failed to initialise the terminal");
        }
    };
    if let Err(e) = terminal.hide_cursor() {
        let _ = restore_terminal(&mut terminal);
        return Err(e).context("failed to hide the cursor");
    }
    Ok(terminal)
}

/// Undo every setup step, even when an earlier one fails; the first error wins.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let raw = disable_raw_mode().context("failed to disable raw mode");
    let screen = execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave the alternate screen");
    let cursor = terminal.show_cursor().context("failed to show the cursor");
    first_error([raw, screen, cursor])
}

/// All steps have already run; report the earliest failure.
fn first_error<const N: usize>(steps: [Result<()>; N]) -> Result<()> {
    steps.into_iter().find(Result::is_err).unwrap_or(Ok(()))
}

fn spawn_scanner(path: PathBuf, monitor: Arc<ScanMonitor>) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("sizetree-scanner".into())
        .spawn(move || {
            info!(path = %path.display(), "starting scan");
            Scanner::new().scan_into(&path, &monitor);
        })
        .context("failed to spawn scanner thread")
}

// ============================================================================
// SESSION
// ============================================================================

fn run_session<B: Backend>(
    terminal: &mut Terminal<B>,
    monitor: &ScanMonitor,
    scan_handle: thread::JoinHandle<()>,
    config: &UiConfig,
) -> Result<()>
where
    <B as Backend>::Error: Send + Sync + 'static,
{
    let outcome = run_progress(terminal, monitor, config)?;
    if outcome == ProgressOutcome::Aborted {
        info!("scan aborted from the progress screen");
        monitor.mark_done(None);
    }
    wait_for_scanner(scan_handle, config.grace_period);

    match monitor.take_tree() {
        Some(tree) => run_navigator(terminal, NavigationState::new(tree), config),
        None => {
            info!("no finished tree, skipping navigation");
            Ok(())
        }
    }
}

/// Join the scanner if it finishes within `grace`; abandon it otherwise.
fn wait_for_scanner(handle: thread::JoinHandle<()>, grace: Duration) {
    let deadline = Instant::now() + grace;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("scanner still running after grace period, abandoning it");
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    if handle.join().is_err() {
        warn!("scanner thread panicked");
    }
}

// ============================================================================
// PROGRESS SCREEN
// ============================================================================

fn run_progress<B: Backend>(
    terminal: &mut Terminal<B>,
    monitor: &ScanMonitor,
    config: &UiConfig,
) -> Result<ProgressOutcome>
where
    <B as Backend>::Error: Send + Sync + 'static,
{
    loop {
        let snapshot = monitor.snapshot();
        terminal.draw(|f| render_progress(f, &snapshot))?;

        if snapshot.done {
            thread::sleep(config.completion_pause);
            return Ok(ProgressOutcome::Completed);
        }

        if event::poll(config.tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && is_abort_key(key) {
                    return Ok(ProgressOutcome::Aborted);
                }
            }
        }
    }
}

fn is_abort_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc) || is_ctrl_c(key)
}

fn is_ctrl_c(key: KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

fn render_progress(f: &mut Frame, snapshot: &ProgressSnapshot) {
    let area = centered_box(f.area(), 80, 10);

    let title = if snapshot.done { " Scan Complete! " } else { " Scanning... " };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_alignment(Alignment::Center)
        .padding(Padding::new(2, 2, 1, 0));
    let inner = block.inner(area);
    let width = inner.width as usize;

    let current_path = if snapshot.current_path.as_os_str().is_empty() {
        "Counting entries...".to_string()
    } else {
        snapshot.current_path.display().to_string()
    };

    let text = vec![
        Line::from(format!("Dirs : {}", format_count(snapshot.dir_count))),
        Line::from(format!("Files: {}", format_count(snapshot.file_count))),
        Line::from(format!("Size : {}", format_size(snapshot.total_size))),
        Line::from(""),
        Line::from(progress_bar(snapshot.fraction(), width.saturating_sub(9))),
        Line::from(Span::styled(
            truncate_left(&current_path, width),
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    f.render_widget(Paragraph::new(text).block(block), area);
}

/// `[█████-----] 50.0%` with `width` bar cells.
fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction * width as f64) as usize).min(width);
    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "-".repeat(width - filled),
        fraction * 100.0
    )
}

/// A box of at most `max_width` x `height`, centered, leaving a 2 column margin.
fn centered_box(area: Rect, max_width: u16, height: u16) -> Rect {
    let width = area.width.saturating_sub(4).min(max_width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

// ============================================================================
// NAVIGATOR SCREEN
// ============================================================================

fn run_navigator<B: Backend>(
    terminal: &mut Terminal<B>,
    mut nav: NavigationState,
    config: &UiConfig,
) -> Result<()>
where
    <B as Backend>::Error: Send + Sync + 'static,
{
    loop {
        terminal.draw(|f| render_navigator(f, &mut nav))?;

        if !event::poll(config.tick_rate)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            // Only process key press, not release
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match map_nav_key(key) {
                Some(NavInput::Quit) => return Ok(()),
                Some(NavInput::Action(action)) => nav.apply(action),
                None => {}
            }
        }
    }
}

fn map_nav_key(key: KeyEvent) -> Option<NavInput> {
    if is_ctrl_c(key) {
        return Some(NavInput::Quit);
    }
    let action = match key.code {
        KeyCode::Up => NavAction::Up,
        KeyCode::Down => NavAction::Down,
        KeyCode::Right | KeyCode::Enter => NavAction::DrillIn,
        KeyCode::Left | KeyCode::Char('h') => NavAction::DrillOut,
        KeyCode::Char('s') => NavAction::ToggleSort,
        KeyCode::Char('q') => return Some(NavInput::Quit),
        _ => return None,
    };
    Some(NavInput::Action(action))
}

fn render_navigator(f: &mut Frame, nav: &mut NavigationState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(1)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Length(1), // Breadcrumb
            Constraint::Min(0),    // Entries
            Constraint::Length(1), // Help
        ])
        .split(f.area());

    let visible_rows = chunks[2].height as usize;
    nav.clamp_scroll(visible_rows);

    let current = nav.current();
    let header = format!(
        "--- {} --- Total Size: {} ---",
        current.name,
        format_size(current.size)
    );
    f.render_widget(Paragraph::new(header), chunks[0]);

    let breadcrumb = nav.breadcrumb().join(" / ");
    f.render_widget(
        Paragraph::new(Span::styled(
            truncate_left(&breadcrumb, chunks[1].width as usize),
            Style::default().add_modifier(Modifier::DIM),
        )),
        chunks[1],
    );

    let width = chunks[2].width as usize;
    let lines: Vec<Line> = nav
        .visible_children(visible_rows)
        .map(|(idx, child)| entry_line(child, width, idx == nav.selection()))
        .collect();
    f.render_widget(Paragraph::new(lines), chunks[2]);

    let sort_mode = if nav.sort_descending() { "Desc" } else { "Asc" };
    let back = if nav.depth() > 1 { "h: Back | " } else { "" };
    let help = format!("Arrows: Navigate | {back}s: Toggle Sort ({sort_mode}) | q: Quit");
    f.render_widget(Paragraph::new(help), chunks[3]);
}

/// One row: drill indicator, name padded to fit, size right-aligned.
fn entry_line(node: &Node, width: usize, selected: bool) -> Line<'static> {
    let indicator = if node.is_dir() { "▸" } else { " " };
    let name_width = width.saturating_sub(15).max(4);

    let mut name = node.name.clone();
    if node.is_dir() {
        name.push('/');
    }
    let name = truncate_right(&name, name_width);

    let text = format!(
        "{indicator} {name:<name_width$} {:>12}",
        format_size(node.size)
    );

    let mut style = entry_style(node);
    if selected {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Line::from(Span::styled(text, style))
}

fn entry_style(node: &Node) -> Style {
    if node.is_dir() {
        Style::default().fg(Color::Blue)
    } else if node.is_executable() {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    }
}
