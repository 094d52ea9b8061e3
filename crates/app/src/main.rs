//! Tome Engine - Main Entry Point
//!
//! Hosts the engine inside a winit event loop: the window and engine are
//! created on resume, one frame is drawn per redraw request, and the engine
//! is torn down before the window on close.

use anyhow::Result;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use tome_engine::Engine;
use tome_platform::Window;

struct App {
    // Declared before the window so the engine drops first.
    engine: Option<Engine>,
    window: Option<Window>,
}

impl App {
    fn new() -> Self {
        Self {
            engine: None,
            window: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            match Window::new(event_loop, 1700, 900, "Tome Engine") {
                Ok(window) => match Engine::new(&window) {
                    Ok(engine) => {
                        info!("Initialization complete, entering main loop");
                        self.engine = Some(engine);
                        self.window = Some(window);
                    }
                    Err(e) => {
                        error!("Failed to initialize engine: {e}");
                        event_loop.exit();
                    }
                },
                Err(e) => {
                    error!("Failed to create window: {e}");
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                // Tear the engine down while the window still exists.
                self.engine.take();
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Some(ref mut engine) = self.engine
                    && let Err(e) = engine.draw()
                {
                    error!("Render error: {e}");
                    self.engine.take();
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    tome_core::init_logging();
    info!("Starting Tome Engine");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;

    Ok(())
}
