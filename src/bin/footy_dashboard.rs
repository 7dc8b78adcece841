use std::io;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Paragraph};
use rusqlite::Connection;

use footy_pipeline::config::AppConfig;
use footy_pipeline::dashboard::{DashboardRow, format_probability, load_dashboard_rows};
use footy_pipeline::db;
use footy_pipeline::logging::{LogSettings, init_logging};

struct App {
    conn: Connection,
    rows: Vec<DashboardRow>,
    scroll: usize,
    status: String,
    refresh: Duration,
    last_refresh: Instant,
    should_quit: bool,
}

impl App {
    fn new(conn: Connection) -> Self {
        let refresh = std::env::var("DASHBOARD_REFRESH_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(60)
            .max(5);
        let mut app = Self {
            conn,
            rows: Vec::new(),
            scroll: 0,
            status: String::new(),
            refresh: Duration::from_secs(refresh),
            last_refresh: Instant::now(),
            should_quit: false,
        };
        app.reload();
        app
    }

    fn reload(&mut self) {
        match load_dashboard_rows(&self.conn, Utc::now().date_naive()) {
            Ok(rows) => {
                self.status = format!("{} fixtures, refreshed {}", rows.len(), Utc::now().format("%H:%M:%S"));
                self.rows = rows;
                self.scroll = self.scroll.min(self.rows.len().saturating_sub(1));
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "dashboard query failed");
                self.status = format!("query failed: {err}");
            }
        }
        self.last_refresh = Instant::now();
    }

    fn maybe_reload(&mut self) {
        if self.last_refresh.elapsed() >= self.refresh {
            self.reload();
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => {
                if self.scroll + 1 < self.rows.len() {
                    self.scroll += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Char('r') => self.reload(),
            _ => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = AppConfig::from_env();
    let _guard = init_logging(&LogSettings {
        dir: config.data_dir.clone(),
        console: false,
    });
    let conn = db::open_db(&config.db_path)?;
    let mut app = App::new(conn);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    loop {
        app.maybe_reload();
        terminal.draw(|f| ui(f, app))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }
        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new("Upcoming fixtures (UTC) - Elo/Davidson 1X2")
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let widths = columns();
    render_header(frame, chunks[1], &widths);
    render_rows(frame, chunks[2], app, &widths);

    let footer = Paragraph::new(format!("{}  |  j/k scroll  r reload  q quit", app.status))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);
}

fn columns() -> [Constraint; 6] {
    [
        Constraint::Length(11),
        Constraint::Length(21),
        Constraint::Min(30),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(7),
    ]
}

fn render_header(frame: &mut Frame, area: Rect, widths: &[Constraint]) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(widths)
        .split(area);
    let style = Style::default().add_modifier(Modifier::BOLD);
    for (i, title) in ["League", "Kickoff", "Match", "1", "X", "2"].iter().enumerate() {
        render_cell_text(frame, cols[i], title, style);
    }
}

fn render_rows(frame: &mut Frame, area: Rect, app: &App, widths: &[Constraint]) {
    if app.rows.is_empty() {
        let empty = Paragraph::new("No upcoming fixtures. Run `footy run-daily --init` first.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }
    if area.height == 0 {
        return;
    }

    let visible = area.height as usize;
    let max_start = app.rows.len().saturating_sub(visible);
    let start = app.scroll.min(max_start);
    let end = (start + visible).min(app.rows.len());

    for (i, row) in app.rows[start..end].iter().enumerate() {
        let row_area = Rect {
            x: area.x,
            y: area.y + i as u16,
            width: area.width,
            height: 1,
        };
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(widths)
            .split(row_area);

        let style = if start + i == app.scroll {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        let prob_style = if row.p_home.is_some() {
            style
        } else {
            style.fg(Color::DarkGray)
        };

        render_cell_text(frame, cols[0], &row.league, style);
        render_cell_text(frame, cols[1], &row.utc_kickoff, style);
        render_cell_text(frame, cols[2], &format!("{} vs {}", row.home, row.away), style);
        render_cell_text(frame, cols[3], &format_probability(row.p_home), prob_style);
        render_cell_text(frame, cols[4], &format_probability(row.p_draw), prob_style);
        render_cell_text(frame, cols[5], &format_probability(row.p_away), prob_style);
    }
}

fn render_cell_text(frame: &mut Frame, area: Rect, text: &str, style: Style) {
    let paragraph = Paragraph::new(text.to_string()).style(style);
    frame.render_widget(paragraph, area);
}
