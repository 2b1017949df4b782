//! Frame pacing against the audio clock.
//!
//! Audio is the master clock: the consumed-sample counter, advanced only by
//! the audio callback, tells the engine how much time has actually been
//! heard. Each tick compares video position against it and renders, holds, or
//! skips. Without an audio track the engine is self-clocked by frame count
//! and simply renders once per tick.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::media::{FrameRead, FrameReader};

/// Consumed-sample-frame counter shared between the audio callback (the
/// single writer) and the main loop (reader). The main loop only needs a
/// recent value each tick, so relaxed loads are fine.
#[derive(Clone)]
pub struct SampleClock {
    consumed: Arc<AtomicU64>,
    sample_rate: u32,
}

impl SampleClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            consumed: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// Advance by sample-frames actually delivered to the device. Silence
    /// fills must not be counted: the clock means "time actually heard".
    pub fn advance(&self, sample_frames: u64) {
        self.consumed.fetch_add(sample_frames, Ordering::Relaxed);
    }

    pub fn consumed_frames(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    pub fn seconds(&self) -> f64 {
        self.consumed_frames() as f64 / f64::from(self.sample_rate)
    }
}

/// Narrow control surface of the audio output device used by the engine.
pub trait AudioTransport {
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
}

/// Transport for files with no audio track.
pub struct NoAudio;

impl AudioTransport for NoAudio {
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    fn stop(&mut self) {}
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// One frame was read into the buffer; the caller should present it.
    Presented,
    /// Audio is behind video; nothing was read, the prior image stays up.
    Held,
    /// Video was behind audio; `discarded` frames were read and dropped
    /// without being presented.
    Skipped { discarded: u64 },
    /// Paused or already ended; nothing happened.
    Idle,
    /// The video stream ended on this tick. The last frame stays presented.
    Finished,
}

pub struct SyncEngine<R> {
    reader: FrameReader<R>,
    /// Reused frame buffer of exactly `width * height * 4` bytes, mutated in
    /// place on every successful read, never resized.
    frame: Vec<u8>,
    frame_rate: f64,
    clock: Option<SampleClock>,
    frame_number: u64,
    playing: bool,
    ended: bool,
}

impl<R: Read> SyncEngine<R> {
    pub fn new(stream: R, frame_size: usize, frame_rate: f64, clock: Option<SampleClock>) -> Self {
        Self {
            reader: FrameReader::new(stream),
            frame: vec![0; frame_size],
            frame_rate,
            clock,
            frame_number: 0,
            playing: true,
            ended: false,
        }
    }

    /// The current frame buffer. Valid image data only after a `Presented`
    /// tick; catch-up ticks leave it holding the last discarded frame.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn video_time(&self) -> f64 {
        self.frame_number as f64 / self.frame_rate
    }

    /// Run one presentation tick.
    ///
    /// `diff = video_time - target_time`, `threshold = 1 / frame_rate`:
    /// below `-threshold` video is behind the audio clock and skips forward,
    /// within the band it renders one frame, above `threshold` audio is
    /// behind and the tick holds without reading. The hold branch is
    /// unreachable when self-clocked, since then `diff` is identically zero.
    pub fn tick(&mut self, audio: &mut dyn AudioTransport) -> Tick {
        if self.ended || !self.playing {
            return Tick::Idle;
        }

        let Some(target) = self.clock.as_ref().map(SampleClock::seconds) else {
            return self.read_and_present(audio);
        };

        let diff = self.video_time() - target;
        let threshold = 1.0 / self.frame_rate;
        if diff < -threshold {
            self.catch_up(target, audio)
        } else if diff <= threshold {
            self.read_and_present(audio)
        } else {
            Tick::Held
        }
    }

    /// Skip forward to the frame the audio clock expects, reading and
    /// discarding the backlog without presenting any of it. Audio is paused
    /// around the discard loop so the clock cannot run further ahead while
    /// we drain.
    fn catch_up(&mut self, target: f64, audio: &mut dyn AudioTransport) -> Tick {
        let expected = (target * self.frame_rate).round() as u64;
        audio.pause();

        let mut discarded = 0;
        for _ in self.frame_number..expected {
            match self.reader.read_frame(&mut self.frame) {
                FrameRead::Complete => discarded += 1,
                FrameRead::EndOfStream => {
                    // Stop early at the last good frame.
                    self.frame_number += discarded;
                    return self.finish(audio);
                }
            }
        }

        self.frame_number = expected;
        audio.resume();
        Tick::Skipped { discarded }
    }

    fn read_and_present(&mut self, audio: &mut dyn AudioTransport) -> Tick {
        match self.reader.read_frame(&mut self.frame) {
            FrameRead::Complete => {
                self.frame_number += 1;
                Tick::Presented
            }
            FrameRead::EndOfStream => self.finish(audio),
        }
    }

    fn finish(&mut self, audio: &mut dyn AudioTransport) -> Tick {
        self.ended = true;
        audio.stop();
        Tick::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Cursor;
    use std::rc::Rc;

    const FRAME_SIZE: usize = 8;
    const FRAME_RATE: f64 = 10.0;
    const SAMPLE_RATE: u32 = 1000;

    #[derive(Default)]
    struct Recording {
        events: Vec<&'static str>,
    }

    impl AudioTransport for Recording {
        fn pause(&mut self) {
            self.events.push("pause");
        }
        fn resume(&mut self) {
            self.events.push("resume");
        }
        fn stop(&mut self) {
            self.events.push("stop");
        }
    }

    /// Counts read calls so tests can assert that ended/paused ticks issue
    /// no further reads.
    struct Counted<R> {
        inner: R,
        reads: Rc<Cell<usize>>,
    }

    impl<R: Read> Read for Counted<R> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read(buf)
        }
    }

    /// A stream of `n` frames where frame `i` is filled with byte `i`.
    fn frames(n: u8) -> Cursor<Vec<u8>> {
        let mut data = Vec::new();
        for i in 0..n {
            data.extend(vec![i; FRAME_SIZE]);
        }
        Cursor::new(data)
    }

    fn engine_with_audio(n: u8) -> (SyncEngine<Cursor<Vec<u8>>>, SampleClock) {
        let clock = SampleClock::new(SAMPLE_RATE);
        let engine = SyncEngine::new(frames(n), FRAME_SIZE, FRAME_RATE, Some(clock.clone()));
        (engine, clock)
    }

    #[test]
    fn self_clocked_presents_once_per_tick_until_eof() {
        let reads = Rc::new(Cell::new(0));
        let stream = Counted {
            inner: frames(3),
            reads: reads.clone(),
        };
        let mut engine = SyncEngine::new(stream, FRAME_SIZE, FRAME_RATE, None);
        let mut audio = NoAudio;

        for i in 0..3u64 {
            assert_eq!(engine.tick(&mut audio), Tick::Presented);
            assert_eq!(engine.frame_number(), i + 1);
            assert_eq!(engine.frame(), vec![i as u8; FRAME_SIZE]);
        }

        // EOF is discovered by the next read; frame_number stays put.
        assert_eq!(engine.tick(&mut audio), Tick::Finished);
        assert!(engine.is_ended());
        assert_eq!(engine.frame_number(), 3);

        // Once ended, ticks are inert and issue no reads.
        let reads_at_end = reads.get();
        assert_eq!(engine.tick(&mut audio), Tick::Idle);
        assert_eq!(engine.frame_number(), 3);
        assert_eq!(reads.get(), reads_at_end);
    }

    #[test]
    fn in_sync_tick_keeps_video_within_one_frame_period() {
        let (mut engine, clock) = engine_with_audio(20);
        let mut audio = Recording::default();

        // Audio delivers exactly one frame period per tick.
        for _ in 0..5 {
            clock.advance(100);
            assert_eq!(engine.tick(&mut audio), Tick::Presented);
            let diff = (engine.video_time() - clock.seconds()).abs();
            assert!(diff <= 1.0 / FRAME_RATE + 1e-9);
        }
        assert!(audio.events.is_empty());
    }

    #[test]
    fn catch_up_discards_backlog_without_presenting() {
        let (mut engine, clock) = engine_with_audio(10);
        let mut audio = Recording::default();

        // target_time = 0.25s → expected_frame = round(2.5) = 3
        clock.advance(250);
        assert_eq!(engine.tick(&mut audio), Tick::Skipped { discarded: 3 });
        assert_eq!(engine.frame_number(), 3);
        // Buffer holds the last discarded frame (index 2), not a presented one.
        assert_eq!(engine.frame(), vec![2u8; FRAME_SIZE]);
        // Audio was paused for the drain and resumed after.
        assert_eq!(audio.events, vec!["pause", "resume"]);

        // Next tick is back in the in-sync band and presents frame 3.
        assert_eq!(engine.tick(&mut audio), Tick::Presented);
        assert_eq!(engine.frame(), vec![3u8; FRAME_SIZE]);
        assert_eq!(engine.frame_number(), 4);
    }

    #[test]
    fn catch_up_hitting_eof_ends_at_last_good_frame() {
        let (mut engine, clock) = engine_with_audio(2);
        let mut audio = Recording::default();

        clock.advance(250); // expected_frame = 3, only 2 frames exist
        assert_eq!(engine.tick(&mut audio), Tick::Finished);
        assert!(engine.is_ended());
        assert_eq!(engine.frame_number(), 2);
        assert_eq!(audio.events, vec!["pause", "stop"]);
    }

    #[test]
    fn holds_when_audio_is_behind() {
        let reads = Rc::new(Cell::new(0));
        let stream = Counted {
            inner: frames(10),
            reads: reads.clone(),
        };
        let clock = SampleClock::new(SAMPLE_RATE);
        let mut engine = SyncEngine::new(stream, FRAME_SIZE, FRAME_RATE, Some(clock.clone()));
        let mut audio = Recording::default();

        // Two presents with a stalled audio clock put video one frame period
        // ahead (diff = 0.2 > threshold = 0.1).
        assert_eq!(engine.tick(&mut audio), Tick::Presented);
        assert_eq!(engine.tick(&mut audio), Tick::Presented);
        let reads_before = reads.get();

        assert_eq!(engine.tick(&mut audio), Tick::Held);
        assert_eq!(engine.frame_number(), 2);
        assert_eq!(reads.get(), reads_before);
        assert!(audio.events.is_empty());
    }

    #[test]
    fn paused_engine_ticks_are_inert() {
        let reads = Rc::new(Cell::new(0));
        let stream = Counted {
            inner: frames(3),
            reads: reads.clone(),
        };
        let mut engine = SyncEngine::new(stream, FRAME_SIZE, FRAME_RATE, None);
        let mut audio = NoAudio;

        engine.set_playing(false);
        assert_eq!(engine.tick(&mut audio), Tick::Idle);
        assert_eq!(engine.frame_number(), 0);
        assert_eq!(reads.get(), 0);

        engine.set_playing(true);
        assert_eq!(engine.tick(&mut audio), Tick::Presented);
    }

    #[test]
    fn frame_number_never_decreases() {
        let (mut engine, clock) = engine_with_audio(30);
        let mut audio = Recording::default();

        let mut last = 0;
        for i in 0..12 {
            // Irregular audio delivery: stalls and bursts.
            clock.advance(match i % 4 {
                0 => 0,
                1 => 50,
                2 => 400,
                _ => 100,
            });
            engine.tick(&mut audio);
            assert!(engine.frame_number() >= last);
            last = engine.frame_number();
        }
    }

    #[test]
    fn sample_clock_tracks_seconds() {
        let clock = SampleClock::new(48000);
        assert_eq!(clock.consumed_frames(), 0);
        clock.advance(24000);
        assert!((clock.seconds() - 0.5).abs() < 1e-12);
        let reader = clock.clone();
        clock.advance(24000);
        assert!((reader.seconds() - 1.0).abs() < 1e-12);
    }
}
