use std::path::Path;
use std::process::ChildStdout;
use std::sync::Arc;

use anyhow::{Context, Result};
use winit::window::Window;

use crate::audio::AudioOutput;
use crate::gpu::{FrameBlit, GpuContext};
use crate::media::MediaDescriptor;
use crate::media::source::DecodePipeline;
use crate::playback::{AudioTransport, NoAudio, PlaybackController, SampleClock, SyncEngine, Tick};
use crate::ui::EguiOverlay;

pub struct App {
    pub gpu: GpuContext,
    pub egui_overlay: EguiOverlay,
    pub window: Arc<Window>,
    blit: FrameBlit,
    player: PlaybackController<ChildStdout>,
    descriptor: MediaDescriptor,
    // Keeps the ffmpeg children alive; dropping it closes both streams.
    _pipeline: DecodePipeline,
}

impl App {
    pub fn new(window: Arc<Window>, path: &Path, descriptor: MediaDescriptor) -> Result<Self> {
        let gpu = GpuContext::new(window.clone())?;

        let mut pipeline = DecodePipeline::spawn(path, &descriptor)?;
        let video = pipeline
            .take_video()
            .context("decode pipeline has no video stream")?;

        // Audio output is optional: when absent, the engine self-clocks.
        let (audio, clock): (Box<dyn AudioTransport>, Option<SampleClock>) =
            match (descriptor.audio, pipeline.take_audio()) {
                (Some(params), Some(pcm)) => {
                    let output = AudioOutput::new(pcm, params.sample_rate, params.channels)?;
                    let clock = output.clock();
                    (Box::new(output), Some(clock))
                }
                _ => (Box::new(NoAudio), None),
            };

        let engine = SyncEngine::new(video, descriptor.frame_size(), descriptor.fps(), clock);
        let player = PlaybackController::new(engine, audio);

        let blit = FrameBlit::new(
            &gpu.device,
            &gpu.queue,
            gpu.format,
            descriptor.width,
            descriptor.height,
            gpu.surface_config.width,
            gpu.surface_config.height,
        );
        let egui_overlay = EguiOverlay::new(&gpu.device, gpu.format, &window);

        Ok(Self {
            gpu,
            egui_overlay,
            window,
            blit,
            player,
            descriptor,
            _pipeline: pipeline,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        self.blit.resize(&self.gpu.queue, width, height);
        self.egui_overlay
            .resize(width, height, self.window.scale_factor() as f32);
    }

    pub fn toggle_pause(&mut self) {
        self.player.toggle_pause();
    }

    /// Run one engine tick, uploading the frame only when it was presented.
    pub fn update(&mut self) {
        match self.player.tick() {
            Tick::Presented => self.blit.upload(&self.gpu.queue, self.player.frame()),
            Tick::Skipped { discarded } => {
                log::debug!(
                    "Skipped {discarded} frame(s) to catch up, now at {}",
                    self.player.frame_number()
                );
            }
            Tick::Finished => {
                log::info!("End of stream at frame {}", self.player.frame_number());
            }
            Tick::Held | Tick::Idle => {}
        }
    }

    pub fn position_secs(&self) -> f64 {
        self.player.video_time().min(self.descriptor.duration_secs)
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.gpu.surface.get_current_texture()?;
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("reel-encoder"),
            });

        self.blit.render(&mut encoder, &surface_view);

        self.egui_overlay.begin_frame(&self.window);
        crate::ui::hud::draw_hud(
            &self.egui_overlay.context(),
            self.position_secs(),
            self.descriptor.duration_secs,
            !self.player.is_playing() && !self.player.is_ended(),
        );
        self.egui_overlay.end_frame(&self.window);
        self.egui_overlay
            .render(&self.gpu.device, &self.gpu.queue, &mut encoder, &surface_view);

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
