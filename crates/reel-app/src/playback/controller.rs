//! User-facing playback control.
//!
//! Pause and resume must hit playback state and the audio device together:
//! stopping the device (not merely ignoring its callback) freezes the
//! consumed-sample clock, so no time elapses while paused and resuming
//! causes no catch-up burst.

use std::io::Read;

use super::sync::{AudioTransport, SyncEngine, Tick};

pub struct PlaybackController<R> {
    engine: SyncEngine<R>,
    audio: Box<dyn AudioTransport>,
}

impl<R: Read> PlaybackController<R> {
    pub fn new(engine: SyncEngine<R>, audio: Box<dyn AudioTransport>) -> Self {
        Self { engine, audio }
    }

    /// Run one presentation tick.
    pub fn tick(&mut self) -> Tick {
        self.engine.tick(self.audio.as_mut())
    }

    /// Flip between playing and paused. A no-op once the stream has ended.
    pub fn toggle_pause(&mut self) {
        if self.engine.is_ended() {
            return;
        }
        if self.engine.is_playing() {
            self.engine.set_playing(false);
            self.audio.pause();
            log::debug!("Paused at frame {}", self.engine.frame_number());
        } else {
            self.engine.set_playing(true);
            self.audio.resume();
            log::debug!("Resumed at frame {}", self.engine.frame_number());
        }
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    pub fn is_ended(&self) -> bool {
        self.engine.is_ended()
    }

    pub fn frame(&self) -> &[u8] {
        self.engine.frame()
    }

    pub fn frame_number(&self) -> u64 {
        self.engine.frame_number()
    }

    pub fn video_time(&self) -> f64 {
        self.engine.video_time()
    }
}
