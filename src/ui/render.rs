use super::app::{Focus, StatusLevel, UiState, View};
use crate::audio::PlayerStatus;
use crate::drive::FileEntry;
use crate::library::{Dashboard, Explorer, LoadState, RootsState};
use crate::visualizer::SpectrumBars;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame,
};
use std::time::Duration;

const KEY_HINTS: &str =
    "q quit · v view · tab pane · / search · enter open/play · space pause · n/p next/prev · ←/→ seek · +/- vol · s speed · m more · r retry";

pub fn draw(
    f: &mut Frame,
    ui: &mut UiState,
    dashboard: &Dashboard,
    explorer: &Explorer,
    player: &PlayerStatus,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Lists
            Constraint::Length(8), // Spectrum
            Constraint::Length(3), // Player
            Constraint::Length(1), // Status line
        ])
        .split(f.area());

    render_header(f, chunks[0], ui.view);
    match ui.view {
        View::Dashboard => render_dashboard(f, chunks[1], ui, dashboard, player),
        View::Explorer => render_explorer(f, chunks[1], ui, explorer, player),
    }

    let spectrum = SpectrumBars::new(&ui.spectrum)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title("Spectrum"));
    f.render_widget(spectrum, chunks[2]);

    render_player(f, chunks[3], player);
    render_status_line(f, chunks[4], ui, player);
}

fn render_header(f: &mut Frame, area: Rect, view: View) {
    let tabs = Line::from(vec![
        Span::styled(
            " drivetunes ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        tab_span("Dashboard", view == View::Dashboard),
        Span::raw(" "),
        tab_span("Explorer", view == View::Explorer),
    ]);
    f.render_widget(
        Paragraph::new(tabs).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn tab_span(label: &str, active: bool) -> Span<'_> {
    if active {
        Span::styled(
            format!("[{}]", label),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(format!(" {} ", label), Style::default().fg(Color::DarkGray))
    }
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title)
}

fn render_dashboard(
    f: &mut Frame,
    area: Rect,
    ui: &mut UiState,
    dashboard: &Dashboard,
    player: &PlayerStatus,
) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    let folders_title = match dashboard.roots_state() {
        RootsState::Loading => "Folders · loading…".to_string(),
        RootsState::Ready => "Folders".to_string(),
        RootsState::Failed(_) => "Folders · failed (r: retry)".to_string(),
    };
    let folder_items: Vec<ListItem> = dashboard
        .roots()
        .iter()
        .map(|folder| {
            let style = if dashboard.selected_folder() == Some(folder.id.as_str()) {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(folder.name.clone()).style(style)
        })
        .collect();
    let folders = List::new(folder_items)
        .block(pane_block(folders_title, ui.focus == Focus::Folders))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("► ");
    f.render_stateful_widget(folders, chunks[0], &mut ui.folder_list);

    let mut tracks_title = String::from("Tracks");
    push_search(&mut tracks_title, dashboard.search(), ui.editing_search);
    if dashboard.selected_folder().is_some() {
        tracks_title.push_str(load_hint(dashboard.tracks().state()));
    }

    let visible = dashboard.visible_tracks();
    let track_items: Vec<ListItem> = visible
        .iter()
        .map(|track| track_item(track, player))
        .collect();
    let tracks = List::new(track_items)
        .block(pane_block(tracks_title, ui.focus == Focus::Tracks))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("► ");
    f.render_stateful_widget(tracks, chunks[1], &mut ui.track_list);
}

fn render_explorer(
    f: &mut Frame,
    area: Rect,
    ui: &mut UiState,
    explorer: &Explorer,
    player: &PlayerStatus,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let mut crumbs: Vec<Span> = Vec::new();
    for (i, name) in explorer.breadcrumbs().into_iter().enumerate() {
        if i > 0 {
            crumbs.push(Span::styled(" › ", Style::default().fg(Color::DarkGray)));
        }
        crumbs.push(Span::styled(
            format!("{}", i + 1),
            Style::default().fg(Color::DarkGray),
        ));
        crumbs.push(Span::raw(format!(" {}", name)));
    }
    let mut path_title = String::from("Path (1-9 jump, backspace up)");
    push_search(&mut path_title, explorer.search(), ui.editing_search);
    f.render_widget(
        Paragraph::new(Line::from(crumbs))
            .block(Block::default().borders(Borders::ALL).title(path_title)),
        chunks[0],
    );

    let mut items: Vec<ListItem> = explorer
        .folders()
        .into_iter()
        .map(|folder| {
            ListItem::new(format!("▸ {}/", folder.name)).style(Style::default().fg(Color::Blue))
        })
        .collect();
    items.extend(explorer.files().into_iter().map(|file| {
        if file.is_audio() {
            track_item(file, player)
        } else {
            ListItem::new(format!("  {}", file.name)).style(Style::default().fg(Color::DarkGray))
        }
    }));

    let title = format!(
        "{}{}",
        explorer.current().folder.name,
        load_hint(explorer.current().store().state())
    );
    let list = List::new(items)
        .block(pane_block(title, true))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("► ");
    f.render_stateful_widget(list, chunks[1], &mut ui.explorer_list);
}

fn track_item(track: &FileEntry, player: &PlayerStatus) -> ListItem<'static> {
    if player.track_id.as_deref() == Some(track.id.as_str()) {
        ListItem::new(format!("♪ {}", track.name))
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    } else {
        ListItem::new(format!("  {}", track.name))
    }
}

fn push_search(title: &mut String, search: &str, editing: bool) {
    if editing {
        title.push_str(&format!(" · /{}_", search));
    } else if !search.is_empty() {
        title.push_str(&format!(" · /{}", search));
    }
}

fn load_hint(state: &LoadState) -> &'static str {
    match state {
        LoadState::Idle | LoadState::Exhausted => "",
        LoadState::Loading => " · loading…",
        LoadState::Loaded => " · m: load more",
        LoadState::Error(_) => " · failed (r: retry)",
    }
}

fn render_player(f: &mut Frame, area: Rect, player: &PlayerStatus) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(45), // Track info
            Constraint::Percentage(35), // Progress
            Constraint::Percentage(20), // Volume + speed
        ])
        .split(area);

    let track_info = match (&player.title, player.loading, player.playing) {
        (None, _, _) => "Nothing playing".to_string(),
        (Some(title), true, _) => format!("Loading {}…", title),
        (Some(title), false, true) => format!("▶ {}", title),
        (Some(title), false, false) => format!("⏸ {}", title),
    };
    f.render_widget(
        Paragraph::new(track_info)
            .block(Block::default().borders(Borders::ALL).title("Now Playing")),
        chunks[0],
    );

    let progress = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(progress_ratio(player.position, player.duration))
        .label(format!(
            "{} / {}",
            format_clock(player.position),
            player.duration.map_or_else(|| "--:--".to_string(), format_clock)
        ));
    f.render_widget(progress, chunks[1]);

    let levels = Paragraph::new(format!(
        "Vol {:>3}%  {}x",
        (player.volume * 100.0).round() as u32,
        player.speed
    ))
    .block(Block::default().borders(Borders::ALL).title("Output"));
    f.render_widget(levels, chunks[2]);
}

fn render_status_line(f: &mut Frame, area: Rect, ui: &UiState, player: &PlayerStatus) {
    let line = match (&ui.status, &player.error) {
        (Some(status), _) => {
            let color = match status.level {
                StatusLevel::Info => Color::Green,
                StatusLevel::Error => Color::Red,
            };
            Line::from(Span::styled(status.text.clone(), Style::default().fg(color)))
        }
        (None, Some(error)) => Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))),
        (None, None) => Line::from(Span::styled(KEY_HINTS, Style::default().fg(Color::DarkGray))),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn progress_ratio(position: Duration, duration: Option<Duration>) -> f64 {
    match duration {
        Some(total) if !total.is_zero() => {
            (position.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

/// `m:ss`, or `h:mm:ss` past the hour.
pub fn format_clock(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::Folder;
    use ratatui::{backend::TestBackend, Terminal};

    fn idle_player() -> PlayerStatus {
        PlayerStatus {
            track_id: None,
            title: None,
            loading: false,
            playing: false,
            position: Duration::ZERO,
            duration: None,
            volume: 1.0,
            speed: 1.0,
            error: None,
        }
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(Duration::from_secs(0)), "0:00");
        assert_eq!(format_clock(Duration::from_secs(75)), "1:15");
        assert_eq!(format_clock(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn test_progress_ratio() {
        assert_eq!(progress_ratio(Duration::from_secs(5), None), 0.0);
        assert_eq!(progress_ratio(Duration::from_secs(5), Some(Duration::ZERO)), 0.0);
        assert_eq!(
            progress_ratio(Duration::from_secs(30), Some(Duration::from_secs(120))),
            0.25
        );
        assert_eq!(
            progress_ratio(Duration::from_secs(500), Some(Duration::from_secs(120))),
            1.0
        );
    }

    #[test]
    fn test_dashboard_renders_folders_and_player() {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        let mut dashboard = Dashboard::new(50);
        dashboard
            .set_roots(Ok(vec![Folder {
                id: "f1".to_string(),
                name: "Lectures".to_string(),
            }]))
            .unwrap();
        let explorer = Explorer::new(
            Folder {
                id: "root".to_string(),
                name: "Root".to_string(),
            },
            None,
        );
        let mut ui = UiState::default();
        let player = PlayerStatus {
            track_id: Some("t1".to_string()),
            title: Some("Intro".to_string()),
            playing: true,
            position: Duration::from_secs(65),
            duration: Some(Duration::from_secs(180)),
            ..idle_player()
        };

        terminal
            .draw(|f| draw(f, &mut ui, &dashboard, &explorer, &player))
            .unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Lectures"));
        assert!(text.contains("Intro"));
        assert!(text.contains("1:05 / 3:00"));
    }

    #[test]
    fn test_explorer_renders_breadcrumbs() {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        let dashboard = Dashboard::new(50);
        let mut explorer = Explorer::new(
            Folder {
                id: "root".to_string(),
                name: "Root".to_string(),
            },
            None,
        );
        explorer.enter(Folder {
            id: "m".to_string(),
            name: "Music".to_string(),
        });
        let mut ui = UiState {
            view: View::Explorer,
            ..UiState::default()
        };

        terminal
            .draw(|f| draw(f, &mut ui, &dashboard, &explorer, &idle_player()))
            .unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Root"));
        assert!(text.contains("Music"));
        assert!(text.contains("loading"));
    }
}
