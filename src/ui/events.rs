use crate::drive::{DriveFile, Folder, ListingPage};
use crate::error::{ListingError, PlaybackStartError};
use crate::library::RequestTicket;
use crate::visualizer::SpectrumFrame;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Which collection a listing result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingTarget {
    Dashboard,
    Explorer,
}

/// Everything the UI task reacts to arrives through one channel.
#[derive(Debug)]
pub enum AppEvent {
    Input(KeyEvent),
    Resize,
    Tick,
    Frame(SpectrumFrame),
    RootsResolved(Result<Vec<Folder>, ListingError>),
    ListingFinished {
        target: ListingTarget,
        ticket: RequestTicket,
        result: Result<ListingPage, ListingError>,
    },
    MediaFetched {
        session: u64,
        result: Result<Vec<u8>, PlaybackStartError>,
    },
    FileDetails(Result<DriveFile, ListingError>),
}

/// Key bindings outside of search editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    ToggleView,
    SwitchFocus,
    Up,
    Down,
    Activate,
    StartSearch,
    Cancel,
    TogglePlayPause,
    NextTrack,
    PreviousTrack,
    SeekBackward,
    SeekForward,
    VolumeUp,
    VolumeDown,
    CycleSpeed,
    LoadMore,
    Retry,
    Back,
    JumpTo(usize),
}

impl Command {
    pub fn from_key(key: KeyEvent) -> Option<Self> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(Command::Quit),
                _ => None,
            };
        }

        match key.code {
            KeyCode::Char('q') => Some(Command::Quit),
            KeyCode::Char('v') => Some(Command::ToggleView),
            KeyCode::Tab => Some(Command::SwitchFocus),

            KeyCode::Up | KeyCode::Char('k') => Some(Command::Up),
            KeyCode::Down | KeyCode::Char('j') => Some(Command::Down),
            KeyCode::Enter => Some(Command::Activate),
            KeyCode::Char('/') => Some(Command::StartSearch),
            KeyCode::Esc => Some(Command::Cancel),
            KeyCode::Backspace => Some(Command::Back),
            KeyCode::Char(c @ '1'..='9') => Some(Command::JumpTo(c as usize - '1' as usize)),

            KeyCode::Char(' ') => Some(Command::TogglePlayPause),
            KeyCode::Char('n') => Some(Command::NextTrack),
            KeyCode::Char('p') => Some(Command::PreviousTrack),
            KeyCode::Left => Some(Command::SeekBackward),
            KeyCode::Right => Some(Command::SeekForward),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Command::VolumeUp),
            KeyCode::Char('-') => Some(Command::VolumeDown),
            KeyCode::Char('s') => Some(Command::CycleSpeed),

            KeyCode::Char('m') => Some(Command::LoadMore),
            KeyCode::Char('r') => Some(Command::Retry),
            _ => None,
        }
    }
}

pub struct EventHandler {
    event_sender: mpsc::UnboundedSender<AppEvent>,
    event_receiver: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        Self {
            event_sender,
            event_receiver,
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.event_sender.clone()
    }

    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.event_receiver.recv().await
    }

    /// Terminal input on a blocking thread plus a periodic tick. Both stop
    /// once the receiver is gone.
    pub fn start(&self, tick_rate: Duration) {
        let input_sender = self.sender();
        tokio::task::spawn_blocking(move || {
            while !input_sender.is_closed() {
                match event::poll(Duration::from_millis(50)) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        warn!(error = %e, "Terminal poll failed, input loop stopping");
                        break;
                    }
                }
                let app_event = match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => AppEvent::Input(key),
                    Ok(Event::Resize(_, _)) => AppEvent::Resize,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "Terminal read failed, input loop stopping");
                        break;
                    }
                };
                if input_sender.send(app_event).is_err() {
                    break;
                }
            }
            debug!("Input loop finished");
        });

        let tick_sender = self.sender();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_rate);
            loop {
                ticker.tick().await;
                if tick_sender.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
