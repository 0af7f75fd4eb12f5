//! Ratatui-based terminal UI.
//!
//! The viewer loads one profile, fits it with the configured model and lets the
//! user switch models and move the window edges while watching the fit update.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Terminal,
};

use crate::app::pipeline::{self, RunOutput};
use crate::domain::{FitConfig, Profile};
use crate::error::AppError;
use crate::io::read_profile;
use crate::plot::{PlotData, SVG_SIZE, X_LABEL, Y_LABEL, write_svg};

mod plotters_chart;

use plotters_chart::FalloffChart;

/// Dense curve resolution used while interacting.
const TUI_CURVE_POINTS: usize = 400;

/// Start the TUI on `path`.
pub fn run(path: &Path, mut config: FitConfig) -> Result<(), AppError> {
    // A bad file should fail before the terminal is taken over.
    let profile = read_profile(path)?;
    config.curve_points = TUI_CURVE_POINTS;

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(profile, config);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Which window edge a key moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    Stop,
}

struct App {
    profile: Profile,
    config: FitConfig,
    status: String,
    /// Last successful fit; kept on screen when a refit fails.
    run: Option<RunOutput>,
}

impl App {
    fn new(profile: Profile, config: FitConfig) -> Self {
        let mut app = Self {
            profile,
            config,
            status: String::new(),
            run: None,
        };
        app.refit();
        app
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('m') => {
                self.config.model = self.config.model.next();
                self.refit();
            }
            KeyCode::Char('M') => {
                self.config.model = self.config.model.prev();
                self.refit();
            }
            KeyCode::Left => self.move_edge(Edge::Start, -1.0),
            KeyCode::Right => self.move_edge(Edge::Start, 1.0),
            KeyCode::Char('[') => self.move_edge(Edge::Stop, -1.0),
            KeyCode::Char(']') => self.move_edge(Edge::Stop, 1.0),
            KeyCode::Char('a') => {
                self.config.window = None;
                self.refit();
            }
            KeyCode::Char('s') => self.save_svg(),
            _ => {}
        }
        false
    }

    fn move_edge(&mut self, edge: Edge, direction: f64) {
        let Some(current) = self.current_window() else {
            return;
        };
        match nudge_window(current, edge, direction * self.config.grid.step) {
            Some(window) => {
                self.config.window = Some(window);
                self.refit();
            }
            None => self.status = "Window start must stay below its stop.".to_string(),
        }
    }

    /// The window shown on screen, resolving the automatic one if needed.
    fn current_window(&mut self) -> Option<(f64, f64)> {
        if let Some(window) = self.config.window {
            return Some(window);
        }
        if let Some(run) = &self.run {
            let w = &run.prepared.window;
            return Some((w.start, w.stop));
        }
        match pipeline::prepare(self.profile.clone(), &self.config) {
            Ok(prepared) => Some((prepared.window.start, prepared.window.stop)),
            Err(err) => {
                self.status = format!("Window: {err}");
                None
            }
        }
    }

    fn refit(&mut self) {
        match pipeline::run_loaded(self.profile.clone(), &self.config) {
            Ok(run) => {
                let range = run.range();
                self.status = format!("{}: z = {:.4} mm", run.fit.model.display_name(), range.z);
                self.run = Some(run);
            }
            Err(err) => {
                log::debug!("refit failed: {err}");
                self.status = format!("{}: {err}", self.config.model.display_name());
            }
        }
    }

    fn save_svg(&mut self) {
        let Some(run) = &self.run else {
            self.status = "Nothing to save yet.".to_string();
            return;
        };
        let path = svg_path(&self.profile.source);
        self.status = match write_svg(&path, &PlotData::from_run(run), SVG_SIZE) {
            Ok(()) => format!("Wrote {}", path.display()),
            Err(err) => format!("SVG write failed: {err}"),
        };
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("falloff", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" {}", self.profile.source.display())),
        ]));

        let window_mode = if self.config.window.is_some() { "manual" } else { "auto" };
        match &self.run {
            Some(run) => {
                lines.push(Line::from(Span::styled(
                    format!(
                        "model: {} | phantom: {} | window: {} [{window_mode}]",
                        run.fit.model.display_name(),
                        run.prepared.phantom.display_name(),
                        crate::report::format_window(&run.prepared.window),
                    ),
                    Style::default().fg(Color::Gray),
                )));
                lines.push(Line::from(Span::styled(
                    crate::report::format_range(&run.range()),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                )));
            }
            None => {
                lines.push(Line::from(Span::styled(
                    format!("model: {} | no fit", self.config.model.display_name()),
                    Style::default().fg(Color::Gray),
                )));
            }
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(36)])
            .split(area);

        self.draw_chart(frame, chunks[0]);
        self.draw_params(frame, chunks[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Profile").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(run) = &self.run else {
            let msg = Paragraph::new("No fit to show. Try another model or window.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(msg, inner);
            return;
        };

        let plot = PlotData::from_run(run);
        let steps = step_polyline(&plot);
        let Some((x0, x1)) = plot.x_bounds() else {
            return;
        };
        let (y0, y1) = plot.y_bounds();
        let x_bounds = [x0, x1];
        let y_bounds = [y0, y1];

        let (chart_rect, insets) = chart_layout(inner);
        let widget = FalloffChart {
            steps: &steps,
            curve: &plot.curve,
            z: plot.z,
            window: Some((run.prepared.window.start, run.prepared.window.stop)),
            x_bounds,
            y_bounds,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, x_bounds, y_bounds);
        }
    }

    fn draw_params(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut items = Vec::new();
        if let Some(run) = &self.run {
            for p in &run.fit.params {
                let stderr = p
                    .stderr
                    .map(|s| format!("{s:.3e}"))
                    .unwrap_or_else(|| "n/a".to_string());
                items.push(ListItem::new(format!("{:<4} {:>11.5}  ± {stderr}", p.name, p.value)));
            }
            let q = &run.fit.quality;
            items.push(ListItem::new(""));
            items.push(ListItem::new(format!("n = {}, k = {}", q.ndata, q.nvarys)));
            items.push(ListItem::new(format!("redchi = {:.4e}", q.redchi)));
            items.push(ListItem::new(format!("aic = {:.3}", q.aic)));
            items.push(ListItem::new(format!("bic = {:.3}", q.bic)));
            items.push(ListItem::new(format!("nfev = {}", q.nfev)));
            items.push(ListItem::new(q.termination.describe()));
        }

        let list = List::new(items).block(Block::default().title("Parameters").borders(Borders::ALL));
        frame.render_widget(list, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "m/M model  ←/→ start  [/] stop  a auto  s svg  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Move one edge of `window` by `delta`; `None` if the window would collapse.
fn nudge_window(window: (f64, f64), edge: Edge, delta: f64) -> Option<(f64, f64)> {
    let (mut start, mut stop) = window;
    match edge {
        Edge::Start => start += delta,
        Edge::Stop => stop += delta,
    }
    (stop > start).then_some((start, stop))
}

/// Step segments joined into one polyline.
fn step_polyline(plot: &PlotData) -> Vec<(f64, f64)> {
    plot.step_segments()
        .into_iter()
        .flat_map(|(left, right, y)| [(left, y), (right, y)])
        .collect()
}

/// `<profile stem>.svg` in the working directory.
fn svg_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profile".to_string());
    PathBuf::from(format!("{stem}.svg"))
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 7,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = format!("{x_val:.0}");
        let label_len = label.len() as u16;
        let start = x.saturating_sub(label_len / 2);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = format!("{y_val:.2}");
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new(X_LABEL)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new(Y_LABEL).style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: chart.x,
        y: inner.y,
        width: chart.width,
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
