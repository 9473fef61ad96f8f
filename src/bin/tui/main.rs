mod app;
mod prefs;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Wrap},
    Frame, Terminal,
};

use app::{bar, format_money, format_percent, truncate, AppState, ConnectionStatus};
use spend_insights::analytics::locator::{bell_curve, normal_pdf};
use spend_insights::analytics::shares::CategoryShares;
use spend_insights::config::{
    BELL_CURVE_POINTS, DISPLAY_Z_MAX, DISPLAY_Z_MIN, SMALL_SLICE_THRESHOLD,
};
use spend_insights::types::{BudgetStatus, CategoryAmount, LeaderboardRow};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let prefs_path = prefs::default_path();
    let mut dashboard_prefs = prefs::load(&prefs_path);
    if let Ok(user) = std::env::var("USER_ID") {
        dashboard_prefs.user_id = user;
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url, dashboard_prefs, prefs_path);

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Restore the terminal before a panic message is printed.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stderr(), LeaveAlternateScreen);
        default_hook(info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &client).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(30);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app))?;

        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                if let Some(input) = app.input.as_mut() {
                    match key.code {
                        KeyCode::Enter => {
                            if app.commit_group_value_input() {
                                app.refresh(client).await;
                                last_tick = std::time::Instant::now();
                            }
                        }
                        KeyCode::Esc => app.cancel_input(),
                        KeyCode::Backspace => {
                            input.buffer.pop();
                        }
                        KeyCode::Char(c) => input.buffer.push(c),
                        _ => {}
                    }
                    continue;
                }

                let changed = match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                    KeyCode::Char('r') | KeyCode::Char('R') => true,
                    KeyCode::Char('t') => {
                        app.cycle_time();
                        true
                    }
                    KeyCode::Char('c') => {
                        app.cycle_category();
                        true
                    }
                    KeyCode::Char('g') => {
                        app.cycle_group();
                        true
                    }
                    KeyCode::Char('m') => {
                        app.toggle_advice_mode();
                        true
                    }
                    KeyCode::Char('v') => {
                        app.begin_group_value_input();
                        false
                    }
                    _ => false,
                };
                if changed {
                    app.refresh(client).await;
                    last_tick = std::time::Instant::now();
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

const SLICE_COLORS: [Color; 8] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Green,
    Color::Blue,
    Color::LightRed,
    Color::LightCyan,
    Color::LightMagenta,
];

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn render(f: &mut Frame, app: &AppState) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, chunks[1]);
    render_footer(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let mut spans = vec![
        Span::styled(
            " Spend Insights  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            if app.prefs.user_id.is_empty() { "—".to_string() } else { app.prefs.user_id.clone() },
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  │  "),
        Span::styled(app.prefs.time.to_string(), Style::default().fg(Color::White)),
    ];

    if let Some(a) = &app.analytics {
        // Money left over is a gain (green); overspend is a loss (red).
        let color = match a.budget_status {
            BudgetStatus::UnderBudget => Color::Green,
            BudgetStatus::OverBudget => Color::Red,
        };
        spans.extend([
            Span::raw("  │  "),
            Span::styled(
                format!("{} {}", a.budget_status.headline(), format_money(a.budget_delta.abs())),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  │  "),
            Span::styled(
                format!("spent {} of {}", format_money(a.total), format_money(a.budget)),
                Style::default().fg(Color::White),
            ),
        ]);
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, area: Rect) {
    if let Some(err) = &app.request_error {
        let p = Paragraph::new(Line::from(Span::styled(err.as_str(), Style::default().fg(Color::Red))))
            .wrap(Wrap { trim: true })
            .block(panel(" ERROR "));
        f.render_widget(p, area);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[0]);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[1]);

    render_shares(f, app, top[0]);
    render_advice(f, app, top[1]);
    render_bell_curve(f, app, bottom[0]);
    render_leaderboard(f, app, bottom[1]);
}

fn render_shares(f: &mut Frame, app: &AppState, area: Rect) {
    let block = panel(" SPENDING BY CATEGORY ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(a) = &app.analytics else {
        return;
    };

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(inner);

    let header_cells = ["Category", "Amount", "Share", ""]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = a
        .pie
        .iter()
        .enumerate()
        .map(|(i, slice)| {
            let color = SLICE_COLORS[i % SLICE_COLORS.len()];
            Row::new(vec![
                Cell::from(truncate(&slice.category, 16)).style(Style::default().fg(color)),
                Cell::from(format_money(slice.amount)),
                Cell::from(format_percent(slice.proportion)),
                Cell::from(bar(slice.proportion, 12)).style(Style::default().fg(color)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(12),
            Constraint::Length(11),
            Constraint::Length(7),
            Constraint::Length(12),
        ],
    )
    .header(header);
    f.render_widget(table, parts[0]);

    let shares = CategoryShares { rows: a.pie.clone(), total: a.total };
    f.render_widget(Paragraph::new(pie_strip(&shares, parts[1].width as usize)), parts[1]);
}

/// One-line stand-in for the pie chart: each slice gets a run of cells in
/// proportion to its share. Only slices above the small-slice threshold are
/// labelled.
fn pie_strip(shares: &CategoryShares, width: usize) -> Line<'static> {
    let labelled: Vec<&str> = shares
        .labelled(SMALL_SLICE_THRESHOLD)
        .map(|s| s.category.as_str())
        .collect();

    let spans: Vec<Span<'static>> = shares
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, slice): (usize, &CategoryAmount)| {
            let cells = (slice.proportion * width as f64).round() as usize;
            if cells == 0 {
                return None;
            }
            let color = SLICE_COLORS[i % SLICE_COLORS.len()];
            let text = if labelled.contains(&slice.category.as_str()) && cells >= 3 {
                format!("{:^cells$}", truncate(&slice.category, cells))
            } else {
                " ".repeat(cells)
            };
            Some(Span::styled(text, Style::default().fg(Color::Black).bg(color)))
        })
        .collect();
    Line::from(spans)
}

fn render_advice(f: &mut Frame, app: &AppState, area: Rect) {
    let title = format!(" ADVICE ({}) ", app.prefs.advice_mode);
    let text = match &app.analytics {
        Some(a) if !a.advice.is_empty() => a.advice.clone(),
        Some(_) => "No advice available for this period.".to_string(),
        None => String::new(),
    };
    let p = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(panel(&title));
    f.render_widget(p, area);
}

fn render_bell_curve(f: &mut Frame, app: &AppState, area: Rect) {
    let title = format!(" WHERE YOU STAND: {} ", app.prefs.category);
    let curve = bell_curve(BELL_CURVE_POINTS, DISPLAY_Z_MIN, DISPLAY_Z_MAX);
    let peak = normal_pdf(0.0) * 1.1;

    let placement = app.rankings.as_ref().and_then(|r| r.placement);
    let marker: Vec<(f64, f64)> = placement
        .map(|p| {
            let height = normal_pdf(p.display_z);
            (0..=10).map(|i| (p.display_z, height * i as f64 / 10.0)).collect()
        })
        .unwrap_or_default();

    let mut datasets = vec![Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&curve)];
    if let Some(p) = placement {
        datasets.push(
            Dataset::default()
                .name(format!("top {:.1}%", p.top_percent))
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
                .data(&marker),
        );
    }

    let chart = Chart::new(datasets)
        .block(panel(&title))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([DISPLAY_Z_MIN, DISPLAY_Z_MAX])
                .labels(["-4σ", "0", "+4σ"]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, peak]),
        );
    f.render_widget(chart, area);
}

fn render_leaderboard(f: &mut Frame, app: &AppState, area: Rect) {
    let title = match &app.rankings {
        Some(r) => format!(" {} · {} users ", r.metric_label.to_uppercase(), r.num_users),
        None => " LEADERBOARD ".to_string(),
    };

    let header_cells = ["#", "User", "Ratio"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .rankings
        .iter()
        .flat_map(|r| &r.rows)
        .map(|row| match row {
            LeaderboardRow::Entry(e) => {
                let style = if e.is_subject {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                Row::new(vec![
                    Cell::from(e.rank.to_string()),
                    Cell::from(truncate(&e.name, 20)),
                    Cell::from(format_percent(e.metric_value)),
                ])
                .style(style)
            }
            LeaderboardRow::Gap => Row::new(vec![Cell::from("⋮"), Cell::from("⋮"), Cell::from("")])
                .style(Style::default().fg(Color::DarkGray)),
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Length(6), Constraint::Min(10), Constraint::Length(8)],
    )
    .header(header)
    .block(panel(&title));
    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, app: &AppState, area: Rect) {
    if let Some(input) = &app.input {
        let group = app.prefs.group.map(|g| g.to_string()).unwrap_or_default();
        let line = Line::from(vec![
            Span::styled(format!(" {group} value: "), Style::default().fg(Color::Yellow)),
            Span::raw(format!("{}▏", input.buffer)),
            Span::styled("  [enter] apply  [esc] cancel", Style::default().fg(Color::DarkGray)),
        ]);
        f.render_widget(Paragraph::new(line), area);
        return;
    }

    let group = match (&app.prefs.group, &app.prefs.group_value) {
        (Some(g), Some(v)) => format!("{g}={v}"),
        (Some(g), None) => format!("{g}=all"),
        (None, _) => "everyone".to_string(),
    };

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let line = Line::from(vec![
        key(" [q] "),
        Span::raw("quit  "),
        key("[r] "),
        Span::raw("refresh  "),
        key("[t] "),
        Span::raw("time  "),
        key("[c] "),
        Span::raw("category  "),
        key("[g] "),
        Span::raw(format!("group ({group})  ")),
        key("[v] "),
        Span::raw("group value  "),
        key("[m] "),
        Span::raw("advice mode  "),
        Span::styled(
            format!("updated {}s ago", app.last_refresh.elapsed().as_secs()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
