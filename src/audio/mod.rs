// Playback side: the engine that owns the live session, the rodio pipeline
// behind it, and the tap the visualizer reads from.

pub mod engine;
pub mod output;
#[cfg(feature = "probe")]
pub mod probe;
pub mod tap;

pub use engine::{adjacent_index, MediaRequest, PlaybackEngine, PlayerStatus, SPEED_OPTIONS};
pub use output::{AudioOutput, OpenedPipeline, RodioOutput, Transport};
pub use tap::{AnalysisTap, Analyser, TapSource};
