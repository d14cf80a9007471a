use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame, Terminal,
};
use std::error::Error;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

use crate::config::Settings;
use crate::export;
use crate::model::{AlertState, SampleWindow};
use crate::poller::{PollUpdate, PollerCommand};

type DynError = Box<dyn Error + Send + Sync>;

pub struct Dashboard {
    window: Arc<Mutex<SampleWindow>>,
    fetch_error: Arc<Mutex<Option<String>>>,
    last_update: Arc<Mutex<Option<DateTime<Local>>>>,
    status: Arc<Mutex<Option<String>>>,
    running: Arc<Mutex<bool>>,
    settings: watch::Sender<Settings>,
    commands: mpsc::Sender<PollerCommand>,
    source_label: String,
}

impl Dashboard {
    pub fn new(
        settings: watch::Sender<Settings>,
        commands: mpsc::Sender<PollerCommand>,
        source_label: String,
    ) -> Self {
        Self {
            window: Arc::new(Mutex::new(SampleWindow::default())),
            fetch_error: Arc::new(Mutex::new(None)),
            last_update: Arc::new(Mutex::new(None)),
            status: Arc::new(Mutex::new(None)),
            running: Arc::new(Mutex::new(true)),
            settings,
            commands,
            source_label,
        }
    }

    pub async fn run(&self, mut updates: mpsc::Receiver<PollUpdate>) -> Result<(), DynError> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        while *self.running.lock().unwrap() {
            if event::poll(std::time::Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key_input(key).await?;
                }
            }

            while let Ok(update) = updates.try_recv() {
                self.apply_update(update);
            }

            terminal.draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(3),
                        Constraint::Min(5),
                        Constraint::Length(3),
                    ])
                    .split(f.size());

                self.render_header(f, chunks[0]);
                self.render_main_content(f, chunks[1]);
                self.render_footer(f, chunks[2]);
            })?;
        }

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        Ok(())
    }

    fn apply_update(&self, update: PollUpdate) {
        *self.window.lock().unwrap() = update.window;
        *self.fetch_error.lock().unwrap() = update.error;
        *self.last_update.lock().unwrap() = Some(update.fetched_at);
    }

    async fn handle_key_input(&self, key: KeyEvent) -> Result<(), DynError> {
        match key.code {
            KeyCode::Char('q') => {
                *self.running.lock().unwrap() = false;
                let _ = self.commands.send(PollerCommand::Shutdown).await;
            }
            KeyCode::Char('r') => {
                if let Err(e) = self.commands.send(PollerCommand::RefreshNow).await {
                    log::error!("Refresh request failed: {}", e);
                }
            }
            KeyCode::Char('a') => {
                self.settings.send_modify(|s| s.auto_refresh = !s.auto_refresh);
            }
            KeyCode::Up => {
                self.settings.send_modify(|s| s.threshold += 1.0);
            }
            KeyCode::Down => {
                self.settings.send_modify(|s| s.threshold -= 1.0);
            }
            KeyCode::Right => {
                self.settings.send_modify(|s| s.adjust_interval(5));
            }
            KeyCode::Left => {
                self.settings.send_modify(|s| s.adjust_interval(-5));
            }
            KeyCode::Char('s') => {
                let window = self.window.lock().unwrap().clone();
                let mut status = self.status.lock().unwrap();
                match export::write_snapshot(&window) {
                    Ok(path) => {
                        log::info!("Snapshot written to {}", path.display());
                        *status = Some(format!("Saved {}", path.display()));
                    }
                    Err(e) => {
                        log::error!("Snapshot failed: {}", e);
                        *status = Some(format!("Snapshot failed: {}", e));
                    }
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn render_header(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let settings = *self.settings.borrow();

        let mode = if settings.auto_refresh {
            Span::styled(
                format!("AUTO {}s", settings.interval_secs),
                Style::default().fg(Color::Green),
            )
        } else {
            Span::styled("MANUAL", Style::default().fg(Color::Yellow))
        };

        let last_update = self
            .last_update
            .lock()
            .unwrap()
            .map(|ts| ts.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        let header = Paragraph::new(Text::from(vec![
            Line::from(vec![
                Span::styled(
                    "SENSORWATCH ",
                    Style::default()
                        .fg(Color::LightCyan)
                        .add_modifier(Modifier::BOLD),
                ),
                mode,
            ]),
            Line::from(Span::styled(
                format!(
                    "{} | Last update: {} | Threshold: {:.2}",
                    self.source_label, last_update, settings.threshold
                ),
                Style::default().fg(Color::Gray),
            )),
        ]))
        .block(Block::default().borders(Borders::BOTTOM));

        f.render_widget(header, area);
    }

    fn render_main_content(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(5)])
            .split(area);

        self.render_alert_banner(f, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(30), Constraint::Length(34)])
            .split(chunks[1]);

        self.render_chart(f, body[0]);
        self.render_table(f, body[1]);
    }

    fn render_alert_banner(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let window = self.window.lock().unwrap();
        let fetch_error = self.fetch_error.lock().unwrap();
        let threshold = self.settings.borrow().threshold;

        let line = if let Some(err) = fetch_error.as_ref() {
            Line::from(Span::styled(
                format!("Failed to fetch data: {}", err),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ))
        } else {
            match AlertState::evaluate(&window, threshold) {
                AlertState::NoData => Line::from(Span::styled(
                    "No data to display",
                    Style::default().fg(Color::Yellow),
                )),
                AlertState::Exceeded { latest, threshold } => Line::from(Span::styled(
                    format!(
                        "ALERT: sensor value ({:.2}) exceeds threshold ({:.2})",
                        latest, threshold
                    ),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                AlertState::Nominal { latest, .. } => Line::from(Span::styled(
                    format!("Sensor value ({:.2}) is within safe range", latest),
                    Style::default().fg(Color::Green),
                )),
            }
        };

        let banner = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Alert"));
        f.render_widget(banner, area);
    }

    fn render_table(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let window = self.window.lock().unwrap();

        let block = Block::default().borders(Borders::ALL).title("Recent Readings");
        let inner_area = block.inner(area);
        f.render_widget(block, area);

        if inner_area.height < 3 || inner_area.width < 20 {
            return;
        }

        if window.is_empty() {
            let message = Paragraph::new("No readings").style(Style::default().fg(Color::Gray));
            f.render_widget(message, inner_area);
            return;
        }

        let last = window.len().saturating_sub(1);
        let rows = window.readings().iter().enumerate().map(|(i, reading)| {
            let local = reading.timestamp.with_timezone(&Local);
            Row::new(vec![
                Cell::from(local.format("%m-%d %H:%M:%S").to_string()),
                Cell::from(format!("{:>10.2}", reading.value)),
            ])
            .style(if i == last {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            })
        });

        let table = Table::new(rows)
            .header(
                Row::new(vec!["Time", "Value"]).style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .widths(&[Constraint::Length(16), Constraint::Length(12)]);

        f.render_widget(table, inner_area);
    }

    fn render_chart(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let window = self.window.lock().unwrap();

        if window.len() < 2 {
            let message = Paragraph::new("Insufficient data for chart")
                .block(Block::default().borders(Borders::ALL).title("Live Sensor Data"));
            f.render_widget(message, area);
            return;
        }

        let min_value = window
            .readings()
            .iter()
            .map(|r| r.value)
            .fold(f64::INFINITY, f64::min);
        let max_value = window
            .readings()
            .iter()
            .map(|r| r.value)
            .fold(f64::NEG_INFINITY, f64::max);
        let value_range = max_value - min_value;

        if value_range <= 0.0 {
            let message = Paragraph::new("No value variation to display")
                .block(Block::default().borders(Borders::ALL).title("Live Sensor Data"));
            f.render_widget(message, area);
            return;
        }

        let chart_block = Block::default()
            .borders(Borders::ALL)
            .title("Live Sensor Data");

        let inner_area = chart_block.inner(area);
        if inner_area.height < 3 || inner_area.width < 10 {
            return;
        }
        f.render_widget(chart_block, area);

        let height = inner_area.height as f64;
        let width = inner_area.width as f64;
        let step = (window.len() as f64 / width).ceil() as usize;
        let points: Vec<(f64, f64)> = window
            .readings()
            .iter()
            .enumerate()
            .step_by(step.max(1))
            .map(|(i, r)| {
                let x = (i as f64 / step.max(1) as f64).min(width - 1.0);
                let y = height - 1.0 - ((r.value - min_value) / value_range * (height - 2.0));
                (x, y)
            })
            .collect();

        for segment in points.windows(2) {
            if let [(x1, y1), (x2, y2)] = segment {
                let start_x = inner_area.x + x1.round() as u16;
                let start_y = inner_area.y + y1.round() as u16;
                let end_x = inner_area.x + x2.round() as u16;
                let end_y = inner_area.y + y2.round() as u16;

                if start_x == end_x && start_y == end_y {
                    let dot = Paragraph::new("◉").style(Style::default().fg(Color::LightBlue));
                    f.render_widget(dot, Rect::new(start_x, start_y, 1, 1));
                } else {
                    let mut x = start_x;
                    let mut y = start_y;
                    let dx = end_x as i16 - start_x as i16;
                    let dy = end_y as i16 - start_y as i16;
                    let step = dx.abs().max(dy.abs());

                    for _ in 0..=step {
                        let dot = Paragraph::new("▪").style(Style::default().fg(Color::LightBlue));
                        f.render_widget(dot, Rect::new(x, y, 1, 1));
                        x = (x as i16 + dx / step) as u16;
                        y = (y as i16 + dy / step) as u16;
                    }
                }
            }
        }

        let top_label =
            Paragraph::new(format!("{:.2}", max_value)).style(Style::default().fg(Color::Gray));
        let bottom_label =
            Paragraph::new(format!("{:.2}", min_value)).style(Style::default().fg(Color::Gray));

        f.render_widget(
            top_label,
            Rect::new(inner_area.right() - 8, inner_area.y, 8, 1),
        );
        f.render_widget(
            bottom_label,
            Rect::new(inner_area.right() - 8, inner_area.bottom() - 1, 8, 1),
        );
    }

    fn render_footer(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let mut controls = vec![
            Span::raw("Controls: "),
            Span::styled("r", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Refresh  "),
            Span::styled("a", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Auto on/off  "),
            Span::styled("↑/↓", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Threshold  "),
            Span::styled("←/→", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Interval  "),
            Span::styled("s", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Save CSV  "),
            Span::styled("q", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Quit"),
        ];

        if let Some(status) = self.status.lock().unwrap().as_ref() {
            controls.push(Span::raw("  |  "));
            controls.push(Span::styled(
                status.clone(),
                Style::default().fg(Color::Cyan),
            ));
        }

        let footer = Paragraph::new(Line::from(controls))
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::TOP));

        f.render_widget(footer, area);
    }
}
