use super::tap::{AnalysisTap, TapSource};
use crate::error::{PlaybackStartError, TeardownError};
use anyhow::Result;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A decoded track ready to be driven.
pub trait Transport {
    fn play(&mut self) -> Result<(), PlaybackStartError>;
    fn pause(&mut self);
    /// Implementations clamp to `[0, duration]`.
    fn seek(&mut self, position: Duration) -> Result<()>;
    fn set_volume(&mut self, volume: f32);
    fn set_speed(&mut self, speed: f32);
    fn position(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;
    fn is_finished(&self) -> bool;
    fn close(self: Box<Self>) -> Result<(), TeardownError>;
}

pub struct OpenedPipeline {
    pub transport: Box<dyn Transport>,
    pub tap: AnalysisTap,
}

/// Turns downloaded media into a transport with an analysis tap spliced in.
pub trait AudioOutput {
    fn open(
        &mut self,
        media: Vec<u8>,
        mime_type: Option<&str>,
        tap_frames: usize,
    ) -> Result<OpenedPipeline, PlaybackStartError>;
}

/// The system output device. Opened on first use so browsing works on
/// machines without audio.
#[derive(Default)]
pub struct RodioOutput {
    device: Option<(OutputStream, OutputStreamHandle)>,
}

impl RodioOutput {
    pub fn new() -> Self {
        Self { device: None }
    }

    fn handle(&mut self) -> Result<&OutputStreamHandle, PlaybackStartError> {
        if self.device.is_none() {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| PlaybackStartError::Output(e.to_string()))?;
            info!("Audio output device opened");
            self.device = Some((stream, handle));
        }
        match &self.device {
            Some((_, handle)) => Ok(handle),
            None => Err(PlaybackStartError::Output("no output device".to_string())),
        }
    }
}

impl AudioOutput for RodioOutput {
    fn open(
        &mut self,
        media: Vec<u8>,
        mime_type: Option<&str>,
        tap_frames: usize,
    ) -> Result<OpenedPipeline, PlaybackStartError> {
        let media: Arc<[u8]> = Arc::from(media);
        let decoder = Decoder::new(Cursor::new(Arc::clone(&media)))
            .map_err(|e| PlaybackStartError::Decode(e.to_string()))?;

        let duration = decoder
            .total_duration()
            .or_else(|| probe_fallback(Arc::clone(&media), mime_type));

        let tap = AnalysisTap::new(decoder.channels(), tap_frames);
        let source = TapSource::new(decoder.convert_samples::<f32>(), tap.clone());

        let sink = Sink::try_new(self.handle()?)
            .map_err(|e| PlaybackStartError::Output(e.to_string()))?;
        // held until the engine has applied volume and speed
        sink.pause();
        sink.append(source);

        debug!(size = media.len(), ?duration, "Pipeline opened");
        Ok(OpenedPipeline {
            transport: Box::new(RodioTransport { sink, duration }),
            tap,
        })
    }
}

#[cfg(feature = "probe")]
fn probe_fallback(media: Arc<[u8]>, mime_type: Option<&str>) -> Option<Duration> {
    match super::probe::probe_duration(media, mime_type) {
        Ok(duration) => Some(duration),
        Err(e) => {
            debug!(error = %e, "Duration probe failed");
            None
        }
    }
}

#[cfg(not(feature = "probe"))]
fn probe_fallback(_media: Arc<[u8]>, _mime_type: Option<&str>) -> Option<Duration> {
    None
}

pub struct RodioTransport {
    sink: Sink,
    duration: Option<Duration>,
}

impl Transport for RodioTransport {
    fn play(&mut self) -> Result<(), PlaybackStartError> {
        if self.sink.empty() {
            return Err(PlaybackStartError::Rejected(
                "nothing left to play".to_string(),
            ));
        }
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let target = match self.duration {
            Some(total) => position.min(total),
            None => position,
        };
        self.sink
            .try_seek(target)
            .map_err(|e| anyhow::anyhow!("Seek to {:?} failed: {}", target, e))
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }

    fn set_speed(&mut self, speed: f32) {
        self.sink.set_speed(speed);
    }

    fn position(&self) -> Duration {
        self.sink.get_pos()
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }

    fn close(self: Box<Self>) -> Result<(), TeardownError> {
        self.sink.stop();
        Ok(())
    }
}
