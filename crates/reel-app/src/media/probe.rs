//! Startup metadata probe via an `ffprobe` subprocess.
//!
//! Probing happens exactly once, before any playback state exists. A
//! malformed or missing probe record is a fatal startup error, not something
//! playback recovers from.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run ffprobe: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("ffprobe returned non-zero exit code for '{0}'")]
    Failed(String),
    #[error("no video stream found")]
    NoVideoStream,
    #[error("malformed probe record '{record}': {reason}")]
    Malformed {
        record: String,
        reason: &'static str,
    },
}

/// Reduced frame-rate rational as reported by the probe (`num/den`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

impl std::fmt::Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Parameters of the audio track, when one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Immutable media metadata, created once at startup.
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub duration_secs: f64,
    pub audio: Option<AudioParams>,
}

impl MediaDescriptor {
    /// Bytes per packed RGBA8 frame.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn fps(&self) -> f64 {
        self.frame_rate.as_f64()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

/// Check if ffmpeg/ffprobe are available on the system. Cached per process.
pub fn ffmpeg_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        Command::new("ffprobe")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

/// Probe a media file, producing its descriptor.
///
/// The video probe yields one comma-separated record
/// `width,height,frame_rate_num/den,duration_seconds`. The audio probe yields
/// `sample_rate,channels`; an empty audio record means the file simply has no
/// audio track and is not an error.
pub fn probe(path: &Path) -> Result<MediaDescriptor, ProbeError> {
    let video = run_ffprobe(
        path,
        &[
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate:format=duration",
        ],
    )?;
    let record = normalize_record(&video);
    if record.is_empty() {
        return Err(ProbeError::NoVideoStream);
    }
    let (width, height, frame_rate, duration_secs) = parse_video_record(&record)?;

    let audio = run_ffprobe(
        path,
        &[
            "-select_streams",
            "a:0",
            "-show_entries",
            "stream=sample_rate,channels",
        ],
    )?;
    let audio_record = normalize_record(&audio);
    let audio = if audio_record.is_empty() {
        None
    } else {
        Some(parse_audio_record(&audio_record)?)
    };

    Ok(MediaDescriptor {
        width,
        height,
        frame_rate,
        duration_secs,
        audio,
    })
}

fn run_ffprobe(path: &Path, entries: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(entries)
        .args(["-of", "csv=p=0"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()?;

    if !output.status.success() {
        return Err(ProbeError::Failed(path.display().to_string()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// ffprobe prints stream and format sections on separate lines; fold them
/// into the single comma-separated record the parsers expect.
fn normalize_record(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_video_record(record: &str) -> Result<(u32, u32, FrameRate, f64), ProbeError> {
    let malformed = |reason| ProbeError::Malformed {
        record: record.to_string(),
        reason,
    };

    let mut fields = record.split(',');
    let width = fields
        .next()
        .and_then(|f| f.parse::<u32>().ok())
        .filter(|&w| w > 0)
        .ok_or_else(|| malformed("bad width"))?;
    let height = fields
        .next()
        .and_then(|f| f.parse::<u32>().ok())
        .filter(|&h| h > 0)
        .ok_or_else(|| malformed("bad height"))?;
    let frame_rate = fields
        .next()
        .and_then(parse_frame_rate)
        .ok_or_else(|| malformed("bad frame rate"))?;
    let duration_secs = fields
        .next()
        .and_then(|f| f.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| malformed("bad duration"))?;
    if fields.next().is_some() {
        return Err(malformed("trailing fields"));
    }

    Ok((width, height, frame_rate, duration_secs))
}

fn parse_frame_rate(field: &str) -> Option<FrameRate> {
    let (num, den) = field.split_once('/')?;
    let num = num.parse::<u32>().ok()?;
    let den = den.parse::<u32>().ok()?;
    if num == 0 || den == 0 {
        return None;
    }
    Some(FrameRate { num, den })
}

fn parse_audio_record(record: &str) -> Result<AudioParams, ProbeError> {
    let malformed = |reason| ProbeError::Malformed {
        record: record.to_string(),
        reason,
    };

    let mut fields = record.split(',');
    let sample_rate = fields
        .next()
        .and_then(|f| f.parse::<u32>().ok())
        .filter(|&r| r > 0)
        .ok_or_else(|| malformed("bad sample rate"))?;
    let channels = fields
        .next()
        .and_then(|f| f.parse::<u16>().ok())
        .filter(|&c| c > 0)
        .ok_or_else(|| malformed("bad channel count"))?;

    Ok(AudioParams {
        sample_rate,
        channels,
    })
}
