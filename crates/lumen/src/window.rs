//! Windowed runner via winit.
//!
//! [`run`] opens a window, brings up wgpu, builds an
//! [`Engine<WgpuDevice>`](crate::engine::Engine), hands it to the caller's
//! setup closure once, then drives frames on every redraw. Cursor input is
//! forwarded as pointer down/move/up with the window's scale factor folded
//! into the view metrics.

use std::fmt;
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::GraphicsError;
use crate::event::ViewMetrics;
use crate::math::{Size, Vec2};
use crate::render::WgpuDevice;
use crate::render::gpu::GpuContext;

#[derive(Debug)]
pub enum RunError {
    EventLoop(winit::error::EventLoopError),
    Window(winit::error::OsError),
    Graphics(GraphicsError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::EventLoop(e) => write!(f, "event loop error: {e}"),
            RunError::Window(e) => write!(f, "window creation failed: {e}"),
            RunError::Graphics(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunError {}

type Setup = Box<dyn FnOnce(&mut Engine<WgpuDevice>)>;

struct WinitApp {
    config: EngineConfig,
    setup: Option<Setup>,
    window: Option<Arc<Window>>,
    engine: Option<Engine<WgpuDevice>>,
    cursor: Vec2,
    pressed: bool,
    failure: Option<RunError>,
}

impl WinitApp {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), RunError> {
        let size = self.config.view_size;
        let attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(size.width, size.height));
        let window = Arc::new(event_loop.create_window(attrs).map_err(RunError::Window)?);

        let gpu = GpuContext::new(window.clone()).map_err(RunError::Graphics)?;
        let (width, height) = gpu.surface_size();
        let device = WgpuDevice::new(gpu).map_err(RunError::Graphics)?;
        let mut engine = Engine::new(device, self.config.clone()).map_err(RunError::Graphics)?;
        engine.set_view_size(width, height);
        engine.set_view_metrics(metrics(&window));

        if let Some(setup) = self.setup.take() {
            setup(&mut engine);
        }
        engine.run();

        window.request_redraw();
        self.window = Some(window);
        self.engine = Some(engine);
        Ok(())
    }
}

/// Backing size in physical pixels, display size in logical pixels.
fn metrics(window: &Window) -> ViewMetrics {
    let physical = window.inner_size();
    let logical: LogicalSize<f32> = physical.to_logical(window.scale_factor());
    ViewMetrics::new(
        Size::new(physical.width, physical.height),
        Vec2::new(logical.width, logical.height),
    )
}

impl ApplicationHandler for WinitApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            log::error!("{e}");
            self.failure = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let (Some(window), Some(engine)) = (&self.window, &mut self.engine) else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                log::info!("window close requested, exiting");
                engine.shutdown();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    engine.renderer_mut().device_mut().resize(size.width, size.height);
                    engine.set_view_size(size.width, size.height);
                    engine.set_view_metrics(metrics(window));
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                engine.set_view_metrics(metrics(window));
            }

            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f32>(window.scale_factor());
                self.cursor = Vec2::new(logical.x, logical.y);
                if self.pressed {
                    engine.pointer_move(self.cursor);
                }
            }

            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    self.pressed = true;
                    engine.pointer_down(self.cursor);
                }
                ElementState::Released => {
                    self.pressed = false;
                    engine.pointer_up(self.cursor);
                }
            },

            WindowEvent::RedrawRequested => {
                if let Err(e) = engine.tick() {
                    log::error!("stopping: {e}");
                    event_loop.exit();
                    return;
                }
                window.request_redraw();
            }

            _ => {}
        }
    }
}

/// Open a window and run `setup` once against the engine, then render
/// until the window closes. Blocks.
pub fn run(
    config: EngineConfig,
    setup: impl FnOnce(&mut Engine<WgpuDevice>) + 'static,
) -> Result<(), RunError> {
    let event_loop = EventLoop::new().map_err(RunError::EventLoop)?;
    let mut app = WinitApp {
        config,
        setup: Some(Box::new(setup)),
        window: None,
        engine: None,
        cursor: Vec2::ZERO,
        pressed: false,
        failure: None,
    };
    event_loop.run_app(&mut app).map_err(RunError::EventLoop)?;
    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
