//! Live terminal view of a running scan

use crate::proxy::{AnonymityGrade, CheckKind, ProbeResult, ScanOutcome, ScanStream};
use crate::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Duration;

/// Maximum number of recent results to keep per list
const MAX_RECENT_RESULTS: usize = 100;

/// Results drained from the scan per frame
const MAX_UPDATES_PER_FRAME: usize = 64;

/// Terminal view over a validation scan
pub struct ScanApp {
    /// Running pass, `None` once it has ended
    scan: Option<ScanStream<ProbeResult>>,
    kind: CheckKind,
    total: usize,
    checked: usize,
    /// Everything delivered so far, for the final report
    results: Vec<ProbeResult>,
    recent_working: VecDeque<ProbeResult>,
    recent_failed: VecDeque<ProbeResult>,
    working_count: usize,
    failed_count: usize,
    /// Selected list (0 = working, 1 = failed)
    selected_list: usize,
    list_state: ListState,
    status_message: String,
    is_complete: bool,
    should_quit: bool,
}

impl ScanApp {
    pub fn new(scan: ScanStream<ProbeResult>, kind: CheckKind) -> Self {
        let total = scan.total();
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            scan: Some(scan),
            kind,
            total,
            checked: 0,
            results: Vec::with_capacity(total),
            recent_working: VecDeque::new(),
            recent_failed: VecDeque::new(),
            working_count: 0,
            failed_count: 0,
            selected_list: 0,
            list_state,
            status_message: "Scanning... Press 'q' to stop.".to_string(),
            is_complete: false,
            should_quit: false,
        }
    }

    /// Run the view until the user leaves, then hand back what was collected
    pub async fn run(mut self) -> Result<ScanOutcome<ProbeResult>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal).await;

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result?;
        Ok(self.into_outcome())
    }

    fn into_outcome(self) -> ScanOutcome<ProbeResult> {
        let cancelled = self.results.len() < self.total;
        ScanOutcome {
            results: self.results,
            total: self.total,
            cancelled,
        }
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                        if self.should_quit {
                            break;
                        }
                    }
                }
            }

            self.drain_updates();
            // Let the driver and workers run between frames
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    fn drain_updates(&mut self) {
        for _ in 0..MAX_UPDATES_PER_FRAME {
            let Some(scan) = self.scan.as_mut() else {
                return;
            };
            match scan.try_next_update() {
                Ok(update) => {
                    self.checked = update.completed;
                    self.record(update.result);
                    let percentage = self.checked * 100 / self.total.max(1);
                    self.status_message = format!(
                        "Checking... {}% ({}/{}) | Working: {} | Failed: {}",
                        percentage, self.checked, self.total, self.working_count, self.failed_count
                    );
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    let cancelled = scan.is_cancelled() && self.checked < self.total;
                    self.scan = None;
                    self.is_complete = true;
                    let verb = if cancelled { "Stopped" } else { "Complete" };
                    self.status_message = format!(
                        "{}! Checked: {}/{} | Working: {} | Failed: {} | Press 'q' to quit",
                        verb, self.checked, self.total, self.working_count, self.failed_count
                    );
                    return;
                }
            }
        }
    }

    fn record(&mut self, result: ProbeResult) {
        let (list, count) = if result.is_working() {
            (&mut self.recent_working, &mut self.working_count)
        } else {
            (&mut self.recent_failed, &mut self.failed_count)
        };
        *count += 1;
        list.push_back(result.clone());
        if list.len() > MAX_RECENT_RESULTS {
            list.pop_front();
        }
        self.results.push(result);
    }

    fn handle_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => match &self.scan {
                // First press stops the scan, the next one leaves
                Some(scan) if !scan.is_cancelled() => {
                    scan.cancel();
                    self.status_message = "Stopping scan...".to_string();
                }
                Some(_) => {}
                None => self.should_quit = true,
            },
            KeyCode::Tab => {
                self.selected_list = (self.selected_list + 1) % 2;
                self.list_state.select(Some(0));
            }
            KeyCode::Down => {
                let len = self.selected_len();
                let i = match self.list_state.selected() {
                    Some(i) if i < len.saturating_sub(1) => i + 1,
                    _ => 0,
                };
                self.list_state.select(Some(i));
            }
            KeyCode::Up => {
                let len = self.selected_len();
                let i = match self.list_state.selected() {
                    Some(0) | None => len.saturating_sub(1),
                    Some(i) => i - 1,
                };
                self.list_state.select(Some(i));
            }
            _ => {}
        }
    }

    fn selected_len(&self) -> usize {
        if self.selected_list == 0 {
            self.recent_working.len()
        } else {
            self.recent_failed.len()
        }
    }

    fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Progress bar
                Constraint::Min(0),    // Result lists
                Constraint::Length(3), // Status bar
            ])
            .split(f.size());

        let title = Paragraph::new(format!("Proxy Vet ({} check)", self.kind))
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        let progress = (self.checked * 100 / self.total.max(1)) as u16;
        let progress_label = format!("{}/{} ({}%)", self.checked, self.total, progress);
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
            .percent(progress.min(100))
            .label(progress_label);
        f.render_widget(gauge, chunks[1]);

        let list_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[2]);

        Self::render_result_list(
            f,
            list_chunks[0],
            "Working",
            &self.recent_working,
            self.working_count,
            self.selected_list == 0,
            if self.selected_list == 0 { Some(&mut self.list_state) } else { None },
        );

        Self::render_result_list(
            f,
            list_chunks[1],
            "Failed",
            &self.recent_failed,
            self.failed_count,
            self.selected_list == 1,
            if self.selected_list == 1 { Some(&mut self.list_state) } else { None },
        );

        let status = Paragraph::new(self.status_message.clone())
            .style(if self.is_complete {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            })
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, chunks[3]);
    }

    fn grade_color(grade: AnonymityGrade) -> Color {
        match grade {
            AnonymityGrade::Transparent => Color::Red,
            AnonymityGrade::Anonymous => Color::Yellow,
            AnonymityGrade::Elite => Color::Green,
            AnonymityGrade::Unknown => Color::DarkGray,
        }
    }

    fn render_result_list(
        f: &mut Frame,
        area: Rect,
        title: &str,
        results: &VecDeque<ProbeResult>,
        total_count: usize,
        is_selected: bool,
        list_state: Option<&mut ListState>,
    ) {
        let items: Vec<ListItem> = results
            .iter()
            .rev() // Show newest first
            .map(|result| match result.latency_ms {
                Some(ms) => ListItem::new(format!("{} ({:.0}ms, {})", result.raw, ms, result.anonymity))
                    .style(Style::default().fg(Self::grade_color(result.anonymity))),
                None => {
                    let reason = result
                        .failure
                        .as_ref()
                        .map(|f| f.to_string())
                        .unwrap_or_default();
                    ListItem::new(format!("{} - {}", result.raw, reason))
                        .style(Style::default().fg(Color::Red))
                }
            })
            .collect();

        let block_title = format!("{} ({})", title, total_count);
        let border_style = if is_selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(block_title)
                    .border_style(border_style),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ");

        if let Some(state) = list_state {
            f.render_stateful_widget(list, area, state);
        } else {
            f.render_widget(list, area);
        }
    }
}
