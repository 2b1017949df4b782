//! cpal audio output fed from the raw PCM pipe.
//!
//! The device schedules the callback on its own cadence; every invocation
//! pulls the requested sample-frames from the stream. A short or failed read
//! substitutes silence rather than blocking the audio context, and silence
//! never advances the sample clock: the clock means "time actually heard".
//! Audio-stream EOF is therefore not terminal: the supplier simply emits
//! silence forever.

use std::io::{ErrorKind, Read};

use anyhow::Result;
use cpal::Stream;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::playback::sync::{AudioTransport, SampleClock};

/// Fixed output gain.
const VOLUME: f32 = 0.5;

const BYTES_PER_SAMPLE: usize = 2; // s16le

pub struct AudioOutput {
    stream: Stream,
    clock: SampleClock,
}

impl AudioOutput {
    /// Open the default output device at the file's native rate and channel
    /// count and start pulling from `pcm`.
    pub fn new(pcm: impl Read + Send + 'static, sample_rate: u32, channels: u16) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("No audio output device found"))?;

        let config = cpal::StreamConfig {
            channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let clock = SampleClock::new(sample_rate);
        let callback_clock = clock.clone();
        let mut source = PcmSource::new(pcm, channels as usize);

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let delivered = source.fill(data);
                callback_clock.advance(delivered);
            },
            |err| log::error!("Audio stream error: {err}"),
            None,
        )?;
        stream.play()?;
        log::info!("Audio output started: {sample_rate}Hz, {channels}ch");

        Ok(Self { stream, clock })
    }

    /// Handle to the consumed-sample clock for the sync engine.
    pub fn clock(&self) -> SampleClock {
        self.clock.clone()
    }
}

impl AudioTransport for AudioOutput {
    fn pause(&mut self) {
        if let Err(e) = self.stream.pause() {
            log::error!("Failed to pause audio stream: {e}");
        }
    }

    fn resume(&mut self) {
        if let Err(e) = self.stream.play() {
            log::error!("Failed to resume audio stream: {e}");
        }
    }

    fn stop(&mut self) {
        // cpal has no stop; a paused stream no longer invokes the callback,
        // which freezes the sample clock just the same.
        self.pause();
    }
}

/// Pull-based PCM16 supplier behind the device callback.
struct PcmSource<R> {
    pcm: R,
    scratch: Vec<u8>,
    channels: usize,
}

impl<R: Read> PcmSource<R> {
    fn new(pcm: R, channels: usize) -> Self {
        Self {
            pcm,
            scratch: Vec::new(),
            channels,
        }
    }

    /// Fill `out` from the PCM stream, converting s16le to f32. Returns the
    /// number of whole sample-frames delivered; the rest of `out` is silence.
    fn fill(&mut self, out: &mut [f32]) -> u64 {
        let wanted = out.len() * BYTES_PER_SAMPLE;
        self.scratch.resize(wanted, 0);

        let mut total = 0;
        while total < wanted {
            match self.pcm.read(&mut self.scratch[total..wanted]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }

        let bytes_per_frame = self.channels * BYTES_PER_SAMPLE;
        let whole_frames = total / bytes_per_frame;
        let samples = whole_frames * self.channels;

        let pcm_bytes = &self.scratch[..samples * BYTES_PER_SAMPLE];
        for (dst, src) in out.iter_mut().zip(pcm_bytes.chunks_exact(BYTES_PER_SAMPLE)) {
            let sample = i16::from_le_bytes([src[0], src[1]]);
            *dst = f32::from(sample) / 32768.0 * VOLUME;
        }
        out[samples..].fill(0.0);

        whole_frames as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn s16le(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn full_read_delivers_all_frames() {
        let data = s16le(&[16384, -16384, 32767, 0]);
        let mut source = PcmSource::new(Cursor::new(data), 2);
        let mut out = [1.0f32; 4];

        assert_eq!(source.fill(&mut out), 2);
        assert!((out[0] - 0.25).abs() < 1e-6); // 16384/32768 * 0.5
        assert!((out[1] + 0.25).abs() < 1e-6);
        assert!(out[2] > 0.49);
        assert_eq!(out[3], 0.0);
    }

    #[test]
    fn short_read_pads_with_silence_and_counts_only_delivered() {
        // One whole stereo frame plus a dangling sample.
        let data = s16le(&[1000, -1000, 500]);
        let mut source = PcmSource::new(Cursor::new(data), 2);
        let mut out = [1.0f32; 8];

        assert_eq!(source.fill(&mut out), 1);
        assert!(out[0] > 0.0 && out[1] < 0.0);
        assert!(out[2..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn exhausted_stream_emits_silence_forever() {
        let mut source = PcmSource::new(Cursor::new(Vec::new()), 2);
        let mut out = [1.0f32; 4];

        assert_eq!(source.fill(&mut out), 0);
        assert_eq!(out, [0.0; 4]);
        // Subsequent pulls keep yielding silence without advancing.
        assert_eq!(source.fill(&mut out), 0);
    }
}
