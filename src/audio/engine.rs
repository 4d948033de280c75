use super::output::{AudioOutput, OpenedPipeline, Transport};
use super::tap::Analyser;
use crate::config::{PlaybackConfig, VisualizerConfig};
use crate::drive::FileEntry;
use crate::error::PlaybackStartError;
use crate::visualizer::{self, FrameSink, VisualizerHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SPEED_OPTIONS: [f32; 5] = [1.0, 1.25, 1.5, 1.75, 2.0];

/// Ask the caller to fetch media for a freshly selected track. The bytes are
/// handed back through [`PlaybackEngine::media_ready`] with the same session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    pub session: u64,
    pub track_id: String,
}

/// Snapshot for the player bar.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatus {
    pub track_id: Option<String>,
    pub title: Option<String>,
    pub loading: bool,
    pub playing: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub volume: f32,
    pub speed: f32,
    pub error: Option<String>,
}

struct Session {
    id: u64,
    track: FileEntry,
    transport: Option<Box<dyn Transport>>,
    visualizer: Option<VisualizerHandle>,
    position: Duration,
    duration: Option<Duration>,
    playing: bool,
    loading: bool,
    error: Option<String>,
}

/// Owns the single live playback session.
pub struct PlaybackEngine<O: AudioOutput> {
    output: O,
    session: Option<Session>,
    generation: u64,
    volume: f32,
    speed_index: usize,
    visualizer: VisualizerConfig,
    frame_sink: Option<FrameSink>,
}

impl<O: AudioOutput> PlaybackEngine<O> {
    pub fn new(output: O, playback: &PlaybackConfig, visualizer: VisualizerConfig) -> Self {
        Self {
            output,
            session: None,
            generation: 0,
            volume: playback.volume.clamp(0.0, 1.0),
            speed_index: 0,
            visualizer,
            frame_sink: None,
        }
    }

    /// Where spectrum frames go. Without a sink no visualizer is started.
    pub fn set_frame_sink(&mut self, sink: FrameSink) {
        self.frame_sink = Some(sink);
    }

    pub fn select_track(&mut self, track: &FileEntry) -> MediaRequest {
        self.teardown();
        self.generation += 1;
        info!(track = %track.name, session = self.generation, "Track selected");

        self.session = Some(Session {
            id: self.generation,
            track: track.clone(),
            transport: None,
            visualizer: None,
            position: Duration::ZERO,
            duration: None,
            playing: false,
            loading: true,
            error: None,
        });

        MediaRequest {
            session: self.generation,
            track_id: track.id.clone(),
        }
    }

    /// Media for `session` arrived (or failed). Opens the pipeline, starts
    /// the visualizer and tries to autoplay. Results for older sessions are
    /// dropped and return `Ok`.
    pub fn media_ready(
        &mut self,
        session: u64,
        media: Result<Vec<u8>, PlaybackStartError>,
    ) -> Result<(), PlaybackStartError> {
        let current = match self.session.as_mut() {
            Some(current) if current.id == session => current,
            _ => {
                debug!(session, "Discarding media for a superseded selection");
                return Ok(());
            }
        };
        current.loading = false;

        let opened = media.and_then(|bytes| {
            self.output
                .open(bytes, Some(&current.track.mime_type), self.visualizer.effective_fft_size())
        });
        let OpenedPipeline { mut transport, tap } = match opened {
            Ok(pipeline) => pipeline,
            Err(err) => {
                warn!(track = %current.track.name, error = %err, "Playback could not start");
                current.error = Some(err.user_message());
                return Err(err);
            }
        };

        transport.set_volume(self.volume);
        transport.set_speed(SPEED_OPTIONS[self.speed_index]);
        current.duration = transport.duration();

        if let Some(sink) = &self.frame_sink {
            let analyser = Analyser::new(
                tap,
                self.visualizer.effective_fft_size(),
                self.visualizer.smoothing,
            );
            current.visualizer = Some(visualizer::start(
                analyser,
                self.visualizer.frame_interval(),
                sink.clone(),
                session,
            ));
        }

        let started = transport.play();
        current.transport = Some(transport);
        match started {
            Ok(()) => {
                current.playing = true;
                Ok(())
            }
            Err(err) => {
                warn!(track = %current.track.name, error = %err, "Autoplay refused");
                current.playing = false;
                current.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Play or pause the current session. A session whose media never opened
    /// asks for the media again instead.
    pub fn toggle_play_pause(&mut self) -> Result<Option<MediaRequest>, PlaybackStartError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        let Some(transport) = session.transport.as_mut() else {
            if session.loading {
                return Ok(None);
            }
            self.generation += 1;
            session.id = self.generation;
            session.loading = true;
            session.error = None;
            info!(track = %session.track.name, session = session.id, "Retrying media fetch");
            return Ok(Some(MediaRequest {
                session: session.id,
                track_id: session.track.id.clone(),
            }));
        };

        if session.playing {
            transport.pause();
            session.playing = false;
            return Ok(None);
        }

        match transport.play() {
            Ok(()) => {
                session.playing = true;
                session.error = None;
                Ok(None)
            }
            Err(err) => {
                session.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(transport) = session.transport.as_mut() else {
            return;
        };

        let target = Duration::from_secs_f64(seconds.max(0.0));
        session.position = target;
        if let Err(e) = transport.seek(target) {
            warn!(error = %e, "Seek failed");
        }
    }

    /// Relative seek from the last known position.
    pub fn seek_by(&mut self, delta_seconds: f64) {
        let current = self.status().position.as_secs_f64();
        self.seek(current + delta_seconds);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        let volume = self.volume;
        if let Some(transport) = self.transport_mut() {
            transport.set_volume(volume);
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn cycle_speed(&mut self) -> f32 {
        self.speed_index = (self.speed_index + 1) % SPEED_OPTIONS.len();
        let speed = SPEED_OPTIONS[self.speed_index];
        if let Some(transport) = self.transport_mut() {
            transport.set_speed(speed);
        }
        debug!(speed, "Playback speed changed");
        speed
    }

    pub fn speed(&self) -> f32 {
        SPEED_OPTIONS[self.speed_index]
    }

    pub fn next(&mut self, sequence: &[FileEntry]) -> Option<MediaRequest> {
        let index = adjacent_index(self.current_index(sequence), sequence.len(), true)?;
        Some(self.select_track(&sequence[index]))
    }

    pub fn previous(&mut self, sequence: &[FileEntry]) -> Option<MediaRequest> {
        let index = adjacent_index(self.current_index(sequence), sequence.len(), false)?;
        Some(self.select_track(&sequence[index]))
    }

    /// Refresh position and duration from the transport. Returns `true` once
    /// when a playing track runs out.
    pub fn tick(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(transport) = session.transport.as_ref() else {
            return false;
        };

        session.position = transport.position();
        if let Some(total) = transport.duration() {
            session.duration = Some(total);
            session.position = session.position.min(total);
        }

        if session.playing && transport.is_finished() {
            info!(track = %session.track.name, "Track finished");
            session.playing = false;
            return true;
        }
        false
    }

    /// Frames from older sessions should not be drawn.
    pub fn accepts_frame(&self, session: u64) -> bool {
        self.session
            .as_ref()
            .map_or(false, |s| s.id == session && s.visualizer.is_some())
    }

    pub fn current_track_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.track.id.as_str())
    }

    pub fn status(&self) -> PlayerStatus {
        let session = self.session.as_ref();
        PlayerStatus {
            track_id: session.map(|s| s.track.id.clone()),
            title: session.map(|s| s.track.name.clone()),
            loading: session.map_or(false, |s| s.loading),
            playing: session.map_or(false, |s| s.playing),
            position: session.map_or(Duration::ZERO, |s| s.position),
            duration: session.and_then(|s| s.duration),
            volume: self.volume,
            speed: self.speed(),
            error: session.and_then(|s| s.error.clone()),
        }
    }

    pub fn shutdown(&mut self) {
        self.teardown();
    }

    fn current_index(&self, sequence: &[FileEntry]) -> Option<usize> {
        let id = self.current_track_id()?;
        sequence.iter().position(|entry| entry.id == id)
    }

    fn transport_mut(&mut self) -> Option<&mut Box<dyn Transport>> {
        self.session.as_mut().and_then(|s| s.transport.as_mut())
    }

    fn teardown(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if let Some(handle) = session.visualizer.take() {
            handle.cancel();
        }
        if let Some(transport) = session.transport.take() {
            if let Err(e) = transport.close() {
                debug!(session = session.id, error = %e, "Transport teardown failed");
            }
        }
        debug!(session = session.id, "Session torn down");
    }
}

impl<O: AudioOutput> Drop for PlaybackEngine<O> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Circular neighbour of `current` in a sequence of `len` items. Without a
/// current position, forward starts at the first item and backward at the last.
pub fn adjacent_index(current: Option<usize>, len: usize, forward: bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match (current, forward) {
        (Some(i), true) => (i + 1) % len,
        (Some(i), false) => (i + len - 1) % len,
        (None, true) => 0,
        (None, false) => len - 1,
    })
}
