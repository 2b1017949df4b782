//! External decode pipeline: one ffmpeg child per stream.
//!
//! Each child writes a headerless byte stream to stdout: packed RGBA8 for
//! video, interleaved s16le PCM for audio. Closing the pipes is the only
//! shutdown mechanism; pending reads then surface EOF naturally.

use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use thiserror::Error;

use super::probe::MediaDescriptor;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn ffmpeg: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("ffmpeg child has no stdout pipe")]
    NoStdout,
}

pub struct DecodePipeline {
    children: Vec<Child>,
    video: Option<ChildStdout>,
    audio: Option<ChildStdout>,
}

impl DecodePipeline {
    /// Spawn the video decoder and, when the descriptor has an audio track,
    /// the audio decoder.
    pub fn spawn(path: &Path, desc: &MediaDescriptor) -> Result<Self, SpawnError> {
        let mut children = Vec::new();

        let (child, video) = spawn_piped(&video_args(path, desc))?;
        children.push(child);

        let audio = if desc.has_audio() {
            let (child, out) = spawn_piped(&audio_args(path))?;
            children.push(child);
            Some(out)
        } else {
            None
        };

        log::info!(
            "Decode pipeline started: {}x{} @ {} fps{}",
            desc.width,
            desc.height,
            desc.frame_rate,
            if desc.has_audio() { " + audio" } else { "" }
        );

        Ok(Self {
            children,
            video: Some(video),
            audio,
        })
    }

    /// The raw video byte stream. Yields `Some` once.
    pub fn take_video(&mut self) -> Option<ChildStdout> {
        self.video.take()
    }

    /// The raw PCM byte stream, if the file has audio. Yields `Some` once.
    pub fn take_audio(&mut self) -> Option<ChildStdout> {
        self.audio.take()
    }
}

impl Drop for DecodePipeline {
    fn drop(&mut self) {
        // Closing stdout is not enough for a decoder mid-file; kill and reap.
        for child in &mut self.children {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn spawn_piped(args: &[String]) -> Result<(Child, ChildStdout), SpawnError> {
    let mut child = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    let stdout = child.stdout.take().ok_or(SpawnError::NoStdout)?;
    Ok((child, stdout))
}

fn video_args(path: &Path, desc: &MediaDescriptor) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-i".into(),
        path.display().to_string(),
        "-vf".into(),
        video_filter(desc),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-fflags".into(),
        "+nobuffer".into(),
        "pipe:1".into(),
    ]
}

/// Conform the decoded stream to the probed cadence and dimensions, so frame
/// boundaries stay a pure byte-count convention.
fn video_filter(desc: &MediaDescriptor) -> String {
    format!(
        "fps={},scale={}:{}",
        desc.frame_rate, desc.width, desc.height
    )
}

fn audio_args(path: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-i".into(),
        path.display().to_string(),
        "-vn".into(),
        "-f".into(),
        "s16le".into(),
        "-acodec".into(),
        "pcm_s16le".into(),
        "-fflags".into(),
        "+nobuffer".into(),
        "pipe:1".into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::probe::FrameRate;

    fn desc() -> MediaDescriptor {
        MediaDescriptor {
            width: 1280,
            height: 720,
            frame_rate: FrameRate { num: 24000, den: 1001 },
            duration_secs: 60.0,
            audio: None,
        }
    }

    #[test]
    fn video_filter_conforms_rate_and_size() {
        assert_eq!(video_filter(&desc()), "fps=24000/1001,scale=1280:720");
    }

    #[test]
    fn video_args_request_raw_rgba() {
        let args = video_args(Path::new("clip.mkv"), &desc());
        assert!(args.windows(2).any(|w| w == ["-f", "rawvideo"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "rgba"]));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn audio_args_request_s16le_without_video() {
        let args = audio_args(Path::new("clip.mkv"));
        assert!(args.contains(&"-vn".to_string()));
        assert!(args.windows(2).any(|w| w == ["-f", "s16le"]));
    }
}
