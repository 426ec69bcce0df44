use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "ember".to_string(),
            initial_size: LogicalSize::new(800.0, 800.0),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window and runs `setup` against it once it is shown.
    ///
    /// Whatever `setup` returns is kept alive until the window is closed and
    /// dropped before the window itself. A setup failure closes the loop and is
    /// returned from here.
    pub fn run<S, T>(config: RuntimeConfig, setup: S) -> Result<()>
    where
        S: FnMut(Arc<Window>) -> Result<T> + 'static,
        T: 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, setup);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct AppState<S, T> {
    config: RuntimeConfig,
    setup: S,

    // Field order matters: `context` is dropped before `window`.
    context: Option<T>,
    window: Option<Arc<Window>>,
    failure: Option<anyhow::Error>,
}

impl<S, T> AppState<S, T>
where
    S: FnMut(Arc<Window>) -> Result<T>,
{
    fn new(config: RuntimeConfig, setup: S) -> Self {
        Self {
            config,
            setup,
            context: None,
            window: None,
            failure: None,
        }
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );
        self.window = Some(window.clone());

        let context = (self.setup)(window).context("window setup failed")?;
        self.context = Some(context);
        Ok(())
    }

    fn close(&mut self, event_loop: &ActiveEventLoop) {
        self.context = None;
        self.window = None;
        event_loop.exit();
    }
}

impl<S, T> ApplicationHandler for AppState<S, T>
where
    S: FnMut(Arc<Window>) -> Result<T>,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.open(event_loop) {
            log::error!("{e:#}");
            self.failure = Some(e);
            self.close(event_loop);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("window closed; releasing device context");
                self.close(event_loop);
            }
            WindowEvent::Resized(size) => {
                log::debug!("window resized to {}x{}", size.width, size.height);
            }
            _ => {}
        }
    }
}
