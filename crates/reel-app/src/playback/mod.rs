pub mod controller;
pub mod sync;

pub use controller::PlaybackController;
pub use sync::{AudioTransport, NoAudio, SampleClock, SyncEngine, Tick};
