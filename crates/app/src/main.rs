//! Hello Triangle - Main Entry Point
//!
//! Opens a window and draws a spinning, vertex-colored quad with Vulkan
//! dynamic rendering until the window is closed.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use triangle_core::AppConfig;
use triangle_platform::Window;
use triangle_renderer::{FrameOutcome, FrameScheduler, ResizeSignal, VulkanBackend};

struct App {
    config: AppConfig,
    scheduler: Option<FrameScheduler<VulkanBackend>>,
    resize: Option<ResizeSignal>,
    /// Set while the last frame was deferred (minimized window). The loop
    /// then sleeps until the next window event instead of polling.
    idle: bool,
    /// First unrecovered error; ends the event loop.
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            scheduler: None,
            resize: None,
            idle: false,
            fatal: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(
            event_loop,
            self.config.width,
            self.config.height,
            &self.config.title,
        )
        .context("failed to create window")?;

        let backend = VulkanBackend::new(window, &self.config)
            .context("failed to initialize Vulkan")?;
        let scheduler = FrameScheduler::new(backend, self.config.slot_wait_timeout_ns());

        self.resize = Some(scheduler.resize_signal());
        self.scheduler = Some(scheduler);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.fatal.get_or_insert(err);
        event_loop.exit();
    }

    /// Waits for the GPU and releases all renderer resources.
    fn shutdown(&mut self) -> Result<()> {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.drain().context("failed to drain the device")?;
            let (frames, fps) = scheduler.backend().frame_stats();
            info!("Rendered {} frames, {:.1} fps average", frames, fps);
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.scheduler.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(()) => info!("Initialization complete, entering main loop"),
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                if let Err(e) = self.shutdown() {
                    self.fail(event_loop, e);
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                info!("Window resized to {}x{}", size.width, size.height);
                if let Some(resize) = &self.resize {
                    resize.raise();
                }
                if self.idle {
                    self.idle = false;
                    event_loop.set_control_flow(ControlFlow::Poll);
                    if let Some(scheduler) = &self.scheduler {
                        scheduler.backend().window().request_redraw();
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if self.fatal.is_some() {
                    return;
                }
                let Some(scheduler) = self.scheduler.as_mut() else {
                    return;
                };
                match scheduler.draw_frame() {
                    Ok(FrameOutcome::Deferred) => {
                        if !self.idle {
                            debug!("Framebuffer is empty, waiting for a resize");
                            self.idle = true;
                            event_loop.set_control_flow(ControlFlow::Wait);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let err = anyhow::Error::new(e).context("frame failed");
                        self.fail(event_loop, err);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.idle {
            return;
        }
        if let Some(scheduler) = &self.scheduler {
            scheduler.backend().window().request_redraw();
        }
    }
}

fn run() -> Result<()> {
    // Parsing also validates.
    let config = AppConfig::from_env().context("invalid configuration")?;

    info!(
        "Starting {} ({}x{}, {} frames in flight, shader {})",
        config.title,
        config.width,
        config.height,
        config.frames_in_flight,
        config.shader_path.display()
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // Loop ended without a close request (e.g. after a fatal error).
    let cleanup = app.shutdown();
    if let Some(err) = app.fatal.take() {
        return Err(err);
    }
    cleanup
}

fn main() -> ExitCode {
    triangle_core::init_logging();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
