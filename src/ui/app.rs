use super::events::{AppEvent, Command, EventHandler, ListingTarget};
use super::render;
use super::TerminalManager;
use crate::audio::{MediaRequest, PlaybackEngine, RodioOutput};
use crate::config::Config;
use crate::drive::{DriveClient, FileEntry, Folder};
use crate::library::{Completion, Dashboard, Explorer, PendingRequest, RootsState};
use crate::visualizer::SpectrumFrame;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const SEEK_STEP_SECS: f64 = 5.0;
const VOLUME_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Dashboard,
    Explorer,
}

/// Which dashboard pane gets the arrow keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Folders,
    Tracks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    expires_at: Instant,
}

impl StatusMessage {
    pub fn new(text: impl Into<String>, level: StatusLevel, ttl: Duration) -> Self {
        Self {
            text: text.into(),
            level,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// The one media download worth finishing. Starting another aborts the
/// previous one so skipped tracks stop downloading.
#[derive(Default)]
struct MediaFetch {
    task: Option<JoinHandle<()>>,
}

impl MediaFetch {
    fn replace(&mut self, task: JoinHandle<()>) {
        if let Some(previous) = self.task.replace(task) {
            previous.abort();
        }
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for MediaFetch {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Presentation state the renderer reads and the list widgets scroll.
#[derive(Default)]
pub struct UiState {
    pub view: View,
    pub focus: Focus,
    pub folder_list: ListState,
    pub track_list: ListState,
    pub explorer_list: ListState,
    pub editing_search: bool,
    pub spectrum: Vec<u8>,
    pub status: Option<StatusMessage>,
}

pub struct App {
    config: Config,
    terminal: TerminalManager,
    events: EventHandler,
    drive: DriveClient,
    engine: PlaybackEngine<RodioOutput>,
    media_fetch: MediaFetch,
    dashboard: Dashboard,
    explorer: Explorer,
    ui: UiState,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config, start_in_explorer: bool) -> Result<Self> {
        let drive = DriveClient::new(&config.drive)?;
        let events = EventHandler::new();

        let mut engine = PlaybackEngine::new(
            RodioOutput::new(),
            &config.playback,
            config.visualizer.clone(),
        );
        let frame_sender = events.sender();
        engine.set_frame_sink(Arc::new(move |frame: SpectrumFrame| {
            frame_sender.send(AppEvent::Frame(frame)).is_ok()
        }));

        let dashboard = Dashboard::new(config.drive.dashboard_page_size);
        let explorer = Explorer::new(
            Folder {
                id: config.drive.explorer_root_id.clone(),
                name: "Root".to_string(),
            },
            config.drive.explorer_page_size,
        );

        let ui = UiState {
            view: if start_in_explorer {
                View::Explorer
            } else {
                View::Dashboard
            },
            ..UiState::default()
        };

        // last, so a failure above leaves the terminal alone
        let terminal = TerminalManager::new()?;

        Ok(Self {
            config,
            terminal,
            events,
            drive,
            engine,
            media_fetch: MediaFetch::default(),
            dashboard,
            explorer,
            ui,
            should_quit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.events.start(self.config.ui.tick_rate());

        self.spawn_roots();
        let request = self.explorer.start();
        self.spawn_listing(ListingTarget::Explorer, request);

        while !self.should_quit {
            self.draw()?;
            match self.events.next_event().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }

        self.media_fetch.cancel();
        self.engine.shutdown();
        info!("drivetunes shutting down");
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        let player = self.engine.status();
        let ui = &mut self.ui;
        let dashboard = &self.dashboard;
        let explorer = &self.explorer;
        self.terminal
            .draw(|f| render::draw(f, ui, dashboard, explorer, &player))
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Input(key) => {
                if self.ui.editing_search {
                    self.handle_search_key(key);
                } else if let Some(command) = Command::from_key(key) {
                    self.execute(command);
                }
            }
            AppEvent::Resize => {}
            AppEvent::Tick => self.on_tick(),
            AppEvent::Frame(frame) => {
                if self.engine.accepts_frame(frame.session) {
                    self.ui.spectrum = frame.bins;
                }
            }
            AppEvent::RootsResolved(result) => match self.dashboard.set_roots(result) {
                Ok(0) => self.set_status(
                    "No dashboard folders configured - add drive.root_folder_ids to config.toml",
                    StatusLevel::Info,
                ),
                Ok(_) => {
                    if self.ui.folder_list.selected().is_none() {
                        self.ui.folder_list.select(Some(0));
                    }
                }
                Err(err) => self.set_status(err.user_message(), StatusLevel::Error),
            },
            AppEvent::ListingFinished {
                target,
                ticket,
                result,
            } => {
                let completion = match target {
                    ListingTarget::Dashboard => self.dashboard.complete(&ticket, result),
                    ListingTarget::Explorer => self.explorer.complete(&ticket, result),
                };
                match completion {
                    Completion::Appended { added } => {
                        debug!(?target, added, "Listing applied");
                        self.ensure_selection(target);
                    }
                    Completion::Failed(err) => {
                        self.set_status(err.user_message(), StatusLevel::Error)
                    }
                    Completion::Stale => {}
                }
            }
            AppEvent::MediaFetched { session, result } => {
                if let Err(err) = self.engine.media_ready(session, result) {
                    self.set_status(err.user_message(), StatusLevel::Error);
                }
            }
            AppEvent::FileDetails(result) => match result {
                Ok(file) => {
                    let link = file
                        .web_view_link
                        .or(file.web_content_link)
                        .unwrap_or_else(|| "no shareable link".to_string());
                    self.set_status(format!("{}: {}", file.name, link), StatusLevel::Info);
                }
                Err(err) => self.set_status(err.user_message(), StatusLevel::Error),
            },
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Quit => self.should_quit = true,
            Command::ToggleView => {
                self.ui.view = match self.ui.view {
                    View::Dashboard => View::Explorer,
                    View::Explorer => View::Dashboard,
                };
            }
            Command::SwitchFocus => {
                self.ui.focus = match self.ui.focus {
                    Focus::Folders => Focus::Tracks,
                    Focus::Tracks => Focus::Folders,
                };
            }
            Command::Up => self.move_selection(-1),
            Command::Down => self.move_selection(1),
            Command::Activate => self.activate(),
            Command::StartSearch => {
                self.ui.editing_search = true;
                if self.ui.view == View::Dashboard {
                    self.ui.focus = Focus::Tracks;
                }
            }
            Command::Cancel => {
                if !self.current_search().is_empty() {
                    self.apply_search(String::new());
                }
            }
            Command::TogglePlayPause => match self.engine.toggle_play_pause() {
                Ok(Some(request)) => self.start_media(request),
                Ok(None) => {}
                Err(err) => self.set_status(err.user_message(), StatusLevel::Error),
            },
            Command::NextTrack => {
                let sequence = self.displayed_tracks();
                if let Some(request) = self.engine.next(&sequence) {
                    self.start_media(request);
                }
            }
            Command::PreviousTrack => {
                let sequence = self.displayed_tracks();
                if let Some(request) = self.engine.previous(&sequence) {
                    self.start_media(request);
                }
            }
            Command::SeekBackward => self.engine.seek_by(-SEEK_STEP_SECS),
            Command::SeekForward => self.engine.seek_by(SEEK_STEP_SECS),
            Command::VolumeUp => self.engine.set_volume(self.engine.volume() + VOLUME_STEP),
            Command::VolumeDown => self.engine.set_volume(self.engine.volume() - VOLUME_STEP),
            Command::CycleSpeed => {
                let speed = self.engine.cycle_speed();
                self.set_status(format!("Speed {}x", speed), StatusLevel::Info);
            }
            Command::LoadMore => {
                let (target, request) = match self.ui.view {
                    View::Dashboard => (ListingTarget::Dashboard, self.dashboard.load_more()),
                    View::Explorer => (ListingTarget::Explorer, self.explorer.load_more()),
                };
                if let Some(request) = request {
                    self.spawn_listing(target, request);
                }
            }
            Command::Retry => self.retry(),
            Command::Back => {
                if self.ui.view == View::Explorer {
                    let request = self.explorer.back();
                    self.after_explorer_jump(request);
                }
            }
            Command::JumpTo(index) => {
                if self.ui.view == View::Explorer {
                    let request = self.explorer.jump_to(index);
                    self.after_explorer_jump(request);
                }
            }
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let mut text = self.current_search().to_string();
        match key.code {
            KeyCode::Char(c) => text.push(c),
            KeyCode::Backspace => {
                text.pop();
            }
            KeyCode::Enter => {
                self.ui.editing_search = false;
                return;
            }
            KeyCode::Esc => {
                self.ui.editing_search = false;
                text.clear();
            }
            _ => return,
        }
        if text != self.current_search() {
            self.apply_search(text);
        }
    }

    fn apply_search(&mut self, text: String) {
        match self.ui.view {
            View::Dashboard => {
                self.dashboard.set_search(&text);
                let first = (!self.dashboard.visible_tracks().is_empty()).then_some(0);
                self.ui.track_list.select(first);
            }
            View::Explorer => {
                let request = self.explorer.set_search(&text);
                self.ui.explorer_list.select(None);
                self.spawn_listing(ListingTarget::Explorer, request);
            }
        }
    }

    fn current_search(&self) -> &str {
        match self.ui.view {
            View::Dashboard => self.dashboard.search(),
            View::Explorer => self.explorer.search(),
        }
    }

    fn activate(&mut self) {
        match (self.ui.view, self.ui.focus) {
            (View::Dashboard, Focus::Folders) => {
                let Some(folder) = self
                    .ui
                    .folder_list
                    .selected()
                    .and_then(|i| self.dashboard.roots().get(i))
                    .cloned()
                else {
                    return;
                };
                info!(folder = %folder.name, "Opening dashboard folder");
                let request = self.dashboard.open_folder(&folder.id);
                self.ui.track_list.select(None);
                self.ui.focus = Focus::Tracks;
                self.spawn_listing(ListingTarget::Dashboard, request);
            }
            (View::Dashboard, Focus::Tracks) => {
                let track = self
                    .ui
                    .track_list
                    .selected()
                    .and_then(|i| self.dashboard.visible_tracks().get(i).copied().cloned());
                if let Some(track) = track {
                    let request = self.engine.select_track(&track);
                    self.start_media(request);
                }
            }
            (View::Explorer, _) => {
                let entries = self.explorer_entries();
                let Some(entry) = self.ui.explorer_list.selected().and_then(|i| entries.get(i)) else {
                    return;
                };
                if entry.is_folder() {
                    let request = self.explorer.enter(entry.as_folder());
                    self.ui.explorer_list.select(None);
                    self.spawn_listing(ListingTarget::Explorer, request);
                } else if entry.is_audio() {
                    let request = self.engine.select_track(entry);
                    self.start_media(request);
                } else {
                    self.spawn_details(entry.id.clone());
                }
            }
        }
    }

    fn retry(&mut self) {
        match self.ui.view {
            View::Dashboard => match self.dashboard.roots_state() {
                RootsState::Failed(_) => {
                    if self.dashboard.retry_roots() {
                        self.spawn_roots();
                    }
                }
                RootsState::Loading => debug!("Dashboard folders still resolving, retry ignored"),
                RootsState::Ready => {
                    if let Some(request) = self.dashboard.retry() {
                        self.spawn_listing(ListingTarget::Dashboard, request);
                    }
                }
            },
            View::Explorer => {
                if let Some(request) = self.explorer.retry() {
                    self.spawn_listing(ListingTarget::Explorer, request);
                }
            }
        }
    }

    fn after_explorer_jump(&mut self, request: Option<PendingRequest>) {
        let first = (!self.explorer_entries().is_empty()).then_some(0);
        self.ui.explorer_list.select(first);
        if let Some(request) = request {
            self.spawn_listing(ListingTarget::Explorer, request);
        }
    }

    fn on_tick(&mut self) {
        let now = Instant::now();
        if self.ui.status.as_ref().map_or(false, |s| s.is_expired(now)) {
            self.ui.status = None;
        }

        if self.engine.tick() && self.config.playback.auto_advance {
            let sequence = self.displayed_tracks();
            if let Some(request) = self.engine.next(&sequence) {
                self.start_media(request);
            }
        }
    }

    /// Tracks in the order the active view shows them; next/previous walk this.
    fn displayed_tracks(&self) -> Vec<FileEntry> {
        match self.ui.view {
            View::Dashboard => self.dashboard.visible_tracks().into_iter().cloned().collect(),
            View::Explorer => self
                .explorer
                .files()
                .into_iter()
                .filter(|entry| entry.is_audio())
                .cloned()
                .collect(),
        }
    }

    /// Folders first, then files, as rendered.
    fn explorer_entries(&self) -> Vec<FileEntry> {
        self.explorer
            .folders()
            .into_iter()
            .chain(self.explorer.files())
            .cloned()
            .collect()
    }

    fn move_selection(&mut self, delta: i32) {
        let (list, len) = match (self.ui.view, self.ui.focus) {
            (View::Dashboard, Focus::Folders) => {
                (&mut self.ui.folder_list, self.dashboard.roots().len())
            }
            (View::Dashboard, Focus::Tracks) => (
                &mut self.ui.track_list,
                self.dashboard.visible_tracks().len(),
            ),
            (View::Explorer, _) => {
                let len = self.explorer.folders().len() + self.explorer.files().len();
                (&mut self.ui.explorer_list, len)
            }
        };
        if len == 0 {
            list.select(None);
            return;
        }

        let current = list.selected().unwrap_or(0);
        let next = if delta < 0 {
            current.saturating_sub(delta.unsigned_abs() as usize)
        } else {
            (current + delta as usize).min(len - 1)
        };
        list.select(Some(next));
    }

    fn ensure_selection(&mut self, target: ListingTarget) {
        let (list, len) = match target {
            ListingTarget::Dashboard => (
                &mut self.ui.track_list,
                self.dashboard.visible_tracks().len(),
            ),
            ListingTarget::Explorer => (
                &mut self.ui.explorer_list,
                self.explorer.folders().len() + self.explorer.files().len(),
            ),
        };
        if list.selected().is_none() && len > 0 {
            list.select(Some(0));
        }
    }

    fn set_status(&mut self, text: impl Into<String>, level: StatusLevel) {
        self.ui.status = Some(StatusMessage::new(
            text,
            level,
            self.config.ui.status_duration(),
        ));
    }

    fn start_media(&mut self, request: MediaRequest) {
        self.ui.spectrum.clear();
        let client = self.drive.clone();
        let sender = self.events.sender();
        let task = tokio::spawn(async move {
            let result = client.fetch_media(&request.track_id).await;
            let _ = sender.send(AppEvent::MediaFetched {
                session: request.session,
                result,
            });
        });
        self.media_fetch.replace(task);
    }

    fn spawn_listing(&self, target: ListingTarget, request: PendingRequest) {
        let query = match target {
            ListingTarget::Dashboard => self.dashboard.listing_query(&request),
            ListingTarget::Explorer => self.explorer.listing_query(&request),
        };
        let client = self.drive.clone();
        let sender = self.events.sender();
        tokio::spawn(async move {
            let result = client.list_children(&query).await;
            let _ = sender.send(AppEvent::ListingFinished {
                target,
                ticket: request.ticket,
                result,
            });
        });
    }

    fn spawn_roots(&self) {
        let ids = self.config.drive.root_folder_ids.clone();
        let client = self.drive.clone();
        let sender = self.events.sender();
        tokio::spawn(async move {
            let result = client.resolve_folders(&ids).await;
            let _ = sender.send(AppEvent::RootsResolved(result));
        });
    }

    fn spawn_details(&self, file_id: String) {
        let client = self.drive.clone();
        let sender = self.events.sender();
        tokio::spawn(async move {
            let result = client.get(&file_id).await;
            let _ = sender.send(AppEvent::FileDetails(result));
        });
    }
}
