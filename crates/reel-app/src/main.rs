mod app;
mod audio;
mod gpu;
mod media;
mod playback;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use app::App;
use media::MediaDescriptor;

/// Window size never exceeds this, whatever the video dimensions.
const MAX_WINDOW_WIDTH: u32 = 1920;
const MAX_WINDOW_HEIGHT: u32 = 1200;

/// Presentation tick cap. Higher-rate files still tick at most this often.
const MAX_TICK_HZ: f64 = 60.0;

struct ReelApp {
    app: Option<App>,
    window: Option<Arc<Window>>,
    path: PathBuf,
    descriptor: MediaDescriptor,
    tick_interval: Duration,
    next_tick: Instant,
}

impl ReelApp {
    fn new(path: PathBuf, descriptor: MediaDescriptor) -> Self {
        let tick_hz = descriptor.fps().min(MAX_TICK_HZ);
        Self {
            app: None,
            window: None,
            path,
            descriptor,
            tick_interval: Duration::from_secs_f64(1.0 / tick_hz),
            next_tick: Instant::now(),
        }
    }

    fn window_size(&self) -> winit::dpi::LogicalSize<u32> {
        let (mut w, mut h) = (self.descriptor.width, self.descriptor.height);
        if w > MAX_WINDOW_WIDTH {
            h = h * MAX_WINDOW_WIDTH / w;
            w = MAX_WINDOW_WIDTH;
        }
        if h > MAX_WINDOW_HEIGHT {
            w = w * MAX_WINDOW_HEIGHT / h;
            h = MAX_WINDOW_HEIGHT;
        }
        winit::dpi::LogicalSize::new(w.max(1), h.max(1))
    }
}

impl ApplicationHandler for ReelApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let title = self
            .path
            .file_name()
            .map_or_else(|| "reel".to_string(), |n| n.to_string_lossy().into_owned());
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(self.window_size());

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .expect("Failed to create window"),
        );
        self.window = Some(window.clone());

        match App::new(window, &self.path, self.descriptor.clone()) {
            Ok(app) => {
                self.app = Some(app);
                self.next_tick = Instant::now();
                log::info!("Playback started");
            }
            Err(e) => {
                log::error!("Failed to initialize playback: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(app) = self.app.as_mut() else {
            return;
        };

        // Let egui handle events first
        let egui_consumed = app.egui_overlay.handle_event(&app.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                app.resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } if !egui_consumed => match key {
                KeyCode::Escape => {
                    event_loop.exit();
                }
                KeyCode::Space => {
                    app.toggle_pause();
                }
                KeyCode::KeyF => {
                    let window = &app.window;
                    if window.fullscreen().is_some() {
                        window.set_fullscreen(None);
                    } else {
                        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                    }
                }
                _ => {}
            },
            WindowEvent::RedrawRequested => {
                app.update();

                match app.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let w = app.gpu.surface_config.width;
                        let h = app.gpu.surface_config.height;
                        app.resize(w, h);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory");
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::warn!("Surface error: {e}");
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_none() {
            return;
        }

        let now = Instant::now();
        if now >= self.next_tick {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            // Schedule from now rather than the missed deadline; a stall
            // should not trigger a redraw burst.
            self.next_tick = now + self.tick_interval;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_tick));
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("Usage: reel-app FILE");
    };
    if !path.is_file() {
        bail!("No such file: {}", path.display());
    }
    if !media::probe::ffmpeg_available() {
        bail!("ffmpeg and ffprobe are required but were not found in PATH");
    }

    let descriptor = media::probe::probe(&path)?;
    log::info!(
        "{}: {}x{} @ {} fps, {:.1}s{}",
        path.display(),
        descriptor.width,
        descriptor.height,
        descriptor.frame_rate,
        descriptor.duration_secs,
        if descriptor.has_audio() {
            " with audio"
        } else {
            ", no audio"
        }
    );

    let event_loop = EventLoop::new()?;
    let mut app = ReelApp::new(path, descriptor);
    event_loop.run_app(&mut app)?;

    Ok(())
}
