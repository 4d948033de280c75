pub mod bars;

pub use bars::{layout_bars, BarRect, SpectrumBars};

use crate::audio::Analyser;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// One sample of byte frequency data, tagged with the playback session that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumFrame {
    pub session: u64,
    pub bins: Vec<u8>,
}

/// Receives each frame; returning `false` stops the loop (receiver gone).
pub type FrameSink = Arc<dyn Fn(SpectrumFrame) -> bool + Send + Sync>;

/// Owns the sampling task. Dropping it cancels the loop.
pub struct VisualizerHandle {
    session: u64,
    task: JoinHandle<()>,
}

impl VisualizerHandle {
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn cancel(self) {
        // Drop does the work
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for VisualizerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start sampling `analyser` every `interval`. Must be called from within a
/// tokio runtime.
pub fn start(
    mut analyser: Analyser,
    interval: Duration,
    sink: FrameSink,
    session: u64,
) -> VisualizerHandle {
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let bins = analyser.byte_frequency_data();
            if !sink(SpectrumFrame { session, bins }) {
                debug!(session, "Frame receiver closed, stopping visualizer");
                break;
            }
        }
    });

    VisualizerHandle { session, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AnalysisTap;
    use tokio::sync::mpsc;

    fn channel_sink() -> (FrameSink, mpsc::UnboundedReceiver<SpectrumFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: FrameSink = Arc::new(move |frame: SpectrumFrame| tx.send(frame).is_ok());
        (sink, rx)
    }

    #[tokio::test]
    async fn test_frames_carry_session_and_bins() {
        let (sink, mut rx) = channel_sink();
        let analyser = Analyser::new(AnalysisTap::new(2, 64), 64, 0.0);
        let handle = start(analyser, Duration::from_millis(5), sink, 7);

        let frame = rx.recv().await.expect("first frame");
        assert_eq!(frame.session, 7);
        assert_eq!(frame.bins.len(), 32);
        assert_eq!(handle.session(), 7);
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_the_loop() {
        let (sink, mut rx) = channel_sink();
        let tap = AnalysisTap::new(1, 64);
        let weak = tap.downgrade();
        let handle = start(Analyser::new(tap, 64, 0.0), Duration::from_millis(5), sink, 1);

        rx.recv().await.expect("loop is running");
        handle.cancel();

        // the task owned the only sender and the only tap reference
        while rx.recv().await.is_some() {}
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_loop_ends_when_receiver_is_gone() {
        let (sink, rx) = channel_sink();
        drop(rx);
        let handle = start(
            Analyser::new(AnalysisTap::new(1, 64), 64, 0.0),
            Duration::from_millis(1),
            sink,
            1,
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }
}
