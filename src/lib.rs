// drivetunes library - everything the binary wires together
// Listing and playback logic stays free of the terminal so it can be tested headless

pub mod audio;      // playback engine, rodio pipeline, analysis tap
pub mod config;     // settings and preferences
pub mod drive;      // Google Drive listing client
pub mod error;      // listing/playback error taxonomy
pub mod library;    // paged collections, dashboard and explorer state
pub mod logging;    // tracing setup
pub mod ui;         // terminal interface
pub mod visualizer; // spectrum sampling loop and bar layout

// Export the stuff other modules actually use
pub use audio::{PlaybackEngine, RodioOutput};
pub use config::Config;
pub use drive::DriveClient;
pub use error::{ListingError, PermissionError, PlaybackStartError, TeardownError};
