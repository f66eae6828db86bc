// ============================================================================
// app.rs — Shapemorph
// Window shell: winit event-loop handler that forwards resizes to the render
// state, turns input into toggle requests and ticks once per redraw.
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, TouchPhase, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes},
};

use crate::config::MorphConfig;
use crate::driver::{FrameOutcome, RenderState, ToggleHandle};
use crate::error::SetupError;
use crate::gpu::WgpuBackend;

const FPS_LOG_INTERVAL: u64 = 300;

// ======================== Application ========================

pub struct App {
    config: MorphConfig,
    state: Option<AppState>,
    setup_error: Option<SetupError>,
}

struct AppState {
    window: Arc<Window>,
    backend: WgpuBackend,
    render: RenderState<WgpuBackend>,
    toggles: ToggleHandle,

    // Timing (diagnostic only; the uniform clock uses the fixed step)
    last_redraw: Instant,
    fps: f32,
}

impl App {
    pub fn new(config: MorphConfig) -> Self {
        Self {
            config,
            state: None,
            setup_error: None,
        }
    }

    /// Setup failure recorded while the event loop was running, if any.
    pub fn finish(self) -> Result<(), SetupError> {
        match self.setup_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn init(&self, event_loop: &ActiveEventLoop) -> Result<AppState, SetupError> {
        let size = self.config.window_size;
        let window_attrs = WindowAttributes::default()
            .with_title("Shapemorph")
            .with_inner_size(winit::dpi::PhysicalSize::new(size.width, size.height));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(|e| SetupError::CreateWindow(e.to_string()))?,
        );

        let mut backend = WgpuBackend::for_window(window.clone(), self.config.vsync)?;
        let mut render = RenderState::new(&mut backend, &self.config)?;
        let inner = window.inner_size();
        render.resize(&mut backend, inner.width, inner.height);
        let toggles = render.toggle_handle();

        log::info!(
            "Shapemorph initialized: {}x{}, starting on {}, {:.2}s crossfade",
            inner.width,
            inner.height,
            render.committed_shape(),
            self.config.transition_duration
        );

        Ok(AppState {
            window,
            backend,
            render,
            toggles,
            last_redraw: Instant::now(),
            fps: 0.0,
        })
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.init(event_loop) {
            Ok(state) => {
                // Initial redraw; macOS needs it with winit 0.30
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => {
                log::error!("Setup failed: {}", err);
                self.setup_error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && !event.repeat {
                    match &event.logical_key {
                        Key::Named(NamedKey::Escape) => event_loop.exit(),
                        Key::Named(NamedKey::Space | NamedKey::Enter) => state.toggles.request(),
                        _ => {}
                    }
                }
            }

            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => state.toggles.request(),

            WindowEvent::Touch(touch) if touch.phase == TouchPhase::Started => {
                state.toggles.request();
            }

            WindowEvent::Resized(new_size) => {
                state
                    .render
                    .resize(&mut state.backend, new_size.width, new_size.height);
            }

            WindowEvent::RedrawRequested => redraw(state),

            _ => {}
        }
    }
}

// ======================== Frame Rendering ========================

fn redraw(state: &mut AppState) {
    // FPS (exponential moving average)
    let now = Instant::now();
    let dt = now.duration_since(state.last_redraw).as_secs_f32().max(0.0001);
    state.last_redraw = now;
    state.fps = state.fps * 0.95 + (1.0 / dt) * 0.05;

    if let FrameOutcome::Skipped(err) = state.render.tick(&mut state.backend) {
        log::warn!("Frame {} skipped: {}", state.render.frame(), err);
    }

    if state.render.frame() % FPS_LOG_INTERVAL == 0 {
        let weights = state.render.uniforms().weights();
        log::debug!(
            "Frame {} | {:.0} fps | t={:.2} | circle {:.2} fire {:.2}{}",
            state.render.frame(),
            state.fps,
            state.render.clock(),
            weights.circle,
            weights.fire,
            if state.render.is_transitioning() { " [morphing]" } else { "" },
        );
    }

    state.window.request_redraw();
}
