//! TUI rendering for GeoGuide
//!
//! This module handles all UI rendering using the `ratatui` crate: the
//! dashboard (place, weather card, attractions), the sources and raw
//! response views, the loading/idle/error screens and the location
//! permission dialog. Rendering is a pure function of [`App`].

use crate::app::{App, LookupState, ViewMode};
use crate::lookup::{LookupFailure, LookupReport};
use crate::models::{Attraction, GroundingSource, WeatherInfo};
use ratatui::{prelude::*, widgets::*};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const MISSING: &str = "—";

/// Renders one frame of the TUI based on current application state.
///
/// Draws the header and footer, then the body for [`App::view_mode`]. When
/// the permission dialog is open it is drawn on top of everything else.
///
/// # Arguments
///
/// * `f` - The ratatui frame to draw into (from `terminal.draw()`).
/// * `app` - Current application state.
pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.size());

    render_header(f, app, chunks[0]);

    match app.view_mode {
        ViewMode::Dashboard => render_dashboard_view(f, app, chunks[1]),
        ViewMode::Sources => render_sources_view(f, app, chunks[1]),
        ViewMode::Raw => render_raw_view(f, app, chunks[1]),
    }

    render_help(f, app, chunks[2]);

    if app.pending_permission.is_some() {
        render_permission_dialog(f);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let status = if app.is_loading() {
        Span::styled(
            format!("{} 更新中", spinner_frame(app.tick_count)),
            Style::default().fg(Color::Cyan),
        )
    } else {
        Span::styled("⟳ r 刷新", Style::default().fg(Color::DarkGray))
    };

    let coords = match app.coords() {
        Some(c) => Span::styled(
            format!("  {:.4}, {:.4}", c.latitude, c.longitude),
            Style::default().fg(Color::Blue),
        ),
        None => Span::raw(""),
    };

    let line = Line::from(vec![
        Span::styled(
            " ⌖ GeoGuide AI",
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ),
        coords,
        Span::raw("   "),
        status,
    ]);

    f.render_widget(
        Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        ),
        area,
    );
}

/// Dashboard: place header, weather card, attractions and sources.
///
/// Idle, loading and failure states get their own full-body screens; a
/// failure still lists whatever sources came back with the reply.
fn render_dashboard_view(f: &mut Frame, app: &App, area: Rect) {
    match &app.state {
        LookupState::Idle => render_idle_screen(f, area),
        LookupState::Loading => render_loading_screen(f, app, area),
        LookupState::Failure(failure) => render_failure(f, failure, area),
        LookupState::Success(report) => render_report(f, app, report, area),
    }
}

fn render_report(f: &mut Frame, app: &App, report: &LookupReport, area: Rect) {
    let data = &report.data;
    let sources_height = sources_panel_height(&report.sources);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(6),
            Constraint::Min(4),
            Constraint::Length(sources_height),
        ])
        .split(area);

    let place = vec![
        Line::from(Span::styled(
            or_missing(&data.location_name),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            or_missing(&data.address),
            Style::default().fg(Color::Gray),
        )),
        Line::from(Span::styled(
            format!("更新于 {}", report.completed_at.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    f.render_widget(
        Paragraph::new(place)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        chunks[0],
    );

    render_weather_card(f, &data.weather, chunks[1]);
    render_attractions(f, &data.attractions, app.selected_index, chunks[2]);

    if !report.sources.is_empty() {
        render_sources_panel(f, &report.sources, chunks[3]);
    }
}

fn render_weather_card(f: &mut Frame, weather: &WeatherInfo, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!("{} ", weather_icon(&weather.condition)),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled(
                or_missing(&weather.temperature),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(or_missing(&weather.condition), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("风速 ", label),
            Span::raw(or_missing(&weather.wind_speed)),
            Span::raw("   │   "),
            Span::styled("风向 ", label),
            Span::raw(or_missing(&weather.wind_direction)),
        ]),
    ];
    if !weather.is_complete() {
        lines.push(Line::from(Span::styled(
            "部分天气资讯缺失",
            Style::default().fg(Color::Yellow),
        )));
    }

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" 实时天气 ")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .padding(Padding::horizontal(1)),
        ),
        area,
    );
}

fn render_attractions(f: &mut Frame, attractions: &[Attraction], selected: usize, area: Rect) {
    let block = Block::default()
        .title(" 附近景点 ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);

    if attractions.is_empty() {
        f.render_widget(
            Paragraph::new("附近没有找到景点")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .block(block),
            area,
        );
        return;
    }

    let items: Vec<ListItem> = attractions
        .iter()
        .enumerate()
        .map(|(i, place)| {
            let name_style = if i == selected {
                Style::default()
                    .fg(Color::Cyan)
                    .bg(Color::Rgb(30, 30, 60))
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };

            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(format!(" {} ", or_missing(&place.name)), name_style),
                    Span::styled(
                        format!(" [{}]", or_missing(&place.kind)),
                        Style::default().fg(Color::Magenta),
                    ),
                    Span::styled(
                        format!("  ➤ {} · {}", or_missing(&place.bearing), or_missing(&place.distance)),
                        Style::default().fg(Color::Gray),
                    ),
                ]),
                Line::from(Span::styled(
                    format!("   {}", place.description),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

fn render_sources_panel(f: &mut Frame, sources: &[GroundingSource], area: Rect) {
    let lines: Vec<Line> = sources
        .iter()
        .map(|s| {
            Line::from(vec![
                Span::styled(" ↗ ", Style::default().fg(Color::DarkGray)),
                Span::styled(s.title.as_str(), Style::default().fg(Color::Blue)),
            ])
        })
        .collect();

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" 资料来源 ")
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray)),
        ),
        area,
    );
}

fn sources_panel_height(sources: &[GroundingSource]) -> u16 {
    if sources.is_empty() {
        0
    } else {
        sources.len().min(5) as u16 + 1
    }
}

fn render_failure(f: &mut Frame, failure: &LookupFailure, area: Rect) {
    let sources_height = sources_panel_height(&failure.sources);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Min(0),
            Constraint::Length(sources_height),
        ])
        .split(area);

    let banner = vec![
        Line::from(vec![
            Span::styled("✖ ", Style::default().fg(Color::Red)),
            Span::styled(
                failure.error.user_message(),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "按 r 重试",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::UNDERLINED),
        )),
    ];

    f.render_widget(
        Paragraph::new(banner).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Red)),
        ),
        chunks[0],
    );

    if !failure.sources.is_empty() {
        render_sources_panel(f, &failure.sources, chunks[2]);
    }
}

fn render_idle_screen(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("🗺", Style::default().fg(Color::DarkGray))),
        Line::from(""),
        Line::from(Span::styled(
            "按 r 获取您的当前位置资讯",
            Style::default().fg(Color::Gray),
        )),
    ];
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center),
        centered_band(area, 4),
    );
}

/// Spinner plus status line while the lookup is in flight.
fn render_loading_screen(f: &mut Frame, app: &App, area: Rect) {
    let text = vec![
        Line::from(Span::styled(
            spinner_frame(app.tick_count),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "正在分析地理资讯...",
            Style::default().fg(Color::LightBlue),
        )),
    ];
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center),
        centered_band(area, 3),
    );
}

fn render_sources_view(f: &mut Frame, app: &App, area: Rect) {
    let sources = app.sources();
    let block = Block::default()
        .title(" 资料来源 ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);

    if sources.is_empty() {
        f.render_widget(
            Paragraph::new("暂无资料来源")
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    }

    let items: Vec<ListItem> = sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(format!("{:>2}. ", i + 1), Style::default().fg(Color::DarkGray)),
                    Span::styled(
                        s.title.as_str(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                ]),
                Line::from(Span::styled(
                    format!("    {}", s.uri),
                    Style::default().fg(Color::Blue),
                )),
            ])
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

/// Last backend reply, verbatim, for diagnosing parse failures.
fn render_raw_view(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" 原始回复 ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);

    let paragraph = match app.raw_text() {
        Some(text) => Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .scroll((app.raw_scroll, 0)),
        None => Paragraph::new("暂无原始回复").style(Style::default().fg(Color::DarkGray)),
    };
    f.render_widget(paragraph.block(block), area);
}

fn render_help(f: &mut Frame, app: &App, area: Rect) {
    let text = if app.pending_permission.is_some() {
        " y 允许   n 拒绝   q 退出"
    } else {
        " r 刷新   j/k 选择   1 总览   2 来源   3 原始回复   q 退出"
    };
    f.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

fn render_permission_dialog(f: &mut Frame) {
    let area = centered_rect(f.size(), 48, 7);
    let text = vec![
        Line::from("GeoGuide AI 想要获取您的位置"),
        Line::from(""),
        Line::from(vec![
            Span::styled(
                "[y] 允许",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("    "),
            Span::styled("[n] 拒绝", Style::default().fg(Color::Red)),
        ]),
    ];

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .title(" 位置权限 ")
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .padding(Padding::vertical(1)),
        ),
        area,
    );
}

/// Maps the free-text condition to an icon. Chinese and English keywords.
pub fn weather_icon(condition: &str) -> &'static str {
    let c = condition.to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| c.contains(k));

    if has(&["雷", "thunder", "storm"]) {
        "⚡"
    } else if has(&["雪", "snow"]) {
        "❄"
    } else if has(&["雨", "rain", "drizzle", "shower"]) {
        "🌧"
    } else if has(&["云", "雲", "阴", "cloud", "overcast", "fog", "雾"]) {
        "☁"
    } else if has(&["晴", "sun", "clear"]) {
        "☀"
    } else {
        "⛅"
    }
}

fn spinner_frame(tick: usize) -> &'static str {
    SPINNER[tick % SPINNER.len()]
}

fn or_missing(s: &str) -> &str {
    if s.trim().is_empty() {
        MISSING
    } else {
        s
    }
}

fn centered_band(area: Rect, height: u16) -> Rect {
    let height = height.min(area.height);
    Rect {
        y: area.y + (area.height - height) / 2,
        height,
        ..area
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupError;
    use crate::models::{Coordinates, LocationData};
    use ratatui::backend::TestBackend;
    use tokio::sync::oneshot;

    fn draw(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| render(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut screen = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                screen.push_str(buffer.get(x, y).symbol());
            }
            screen.push('\n');
        }
        screen
    }

    fn success_app() -> App {
        let mut app = App::default();
        let generation = app.begin_lookup().unwrap();
        app.on_lookup_finished(
            generation,
            Ok(LookupReport {
                coords: Coordinates::new(37.7955, -122.3937).unwrap(),
                data: LocationData {
                    location_name: "Ferry Building".into(),
                    address: "1 Ferry Building, San Francisco".into(),
                    weather: WeatherInfo {
                        temperature: "18C".into(),
                        condition: "Fog".into(),
                        wind_speed: "20 km/h".into(),
                        wind_direction: "W".into(),
                    },
                    attractions: vec![Attraction {
                        name: "Pier 39".into(),
                        description: "Sea lions".into(),
                        bearing: "NW".into(),
                        distance: "2.5 km".into(),
                        kind: "Landmark".into(),
                    }],
                },
                sources: vec![GroundingSource {
                    title: "SF weather".into(),
                    uri: "https://weather.example/sf".into(),
                }],
                raw_text: "raw reply text".into(),
                completed_at: chrono::Local::now(),
            }),
        );
        app
    }

    #[test]
    fn dashboard_shows_place_weather_and_attractions() {
        let screen = draw(&success_app());
        assert!(screen.contains("GeoGuide AI"));
        assert!(screen.contains("37.7955, -122.3937"));
        assert!(screen.contains("Ferry Building"));
        assert!(screen.contains("18C"));
        assert!(screen.contains("Pier 39"));
        assert!(screen.contains("[Landmark]"));
        assert!(screen.contains("SF weather"));
    }

    #[test]
    fn sources_and_raw_views() {
        let mut app = success_app();
        app.view_mode = ViewMode::Sources;
        assert!(draw(&app).contains("https://weather.example/sf"));

        app.view_mode = ViewMode::Raw;
        assert!(draw(&app).contains("raw reply text"));
    }

    #[test]
    fn failure_still_lists_sources() {
        let mut app = App::default();
        let generation = app.begin_lookup().unwrap();
        app.on_lookup_finished(
            generation,
            Err(LookupFailure {
                error: LookupError::MalformedJson("eof".into()),
                coords: None,
                sources: vec![GroundingSource {
                    title: "Partial citation".into(),
                    uri: "https://example.com".into(),
                }],
                raw_text: Some("{".into()),
            }),
        );
        assert!(draw(&app).contains("Partial citation"));
    }

    #[test]
    fn permission_dialog_overlays_loading() {
        let mut app = App::default();
        app.begin_lookup();
        let (tx, _rx) = oneshot::channel();
        app.on_permission_request(tx);
        let screen = draw(&app);
        assert!(screen.contains("[y]"));
        assert!(screen.contains("[n]"));
    }

    #[test]
    fn icons_follow_condition_text() {
        assert_eq!(weather_icon("晴"), "☀");
        assert_eq!(weather_icon("多云"), "☁");
        assert_eq!(weather_icon("雷阵雨"), "⚡");
        assert_eq!(weather_icon("Light rain"), "🌧");
        assert_eq!(weather_icon(""), "⛅");
    }
}
