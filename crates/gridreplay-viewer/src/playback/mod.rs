pub mod controller;
pub mod dates;
pub mod machine;
pub mod store;

pub use controller::{spawn_controller, ControllerHandle};
pub use store::{LiveMetrics, PlaybackSession, PlaybackStore};

/// Pushed from the controller task to the UI thread.
#[derive(Debug, Clone)]
pub enum PlaybackUpdate {
    Session(PlaybackSession),
    Closed,
}
