// ============================================================================
// driver.rs — Shapemorph
// Per-refresh entry point. Owns all render-thread state: the uniform block,
// the morph animation, the compute programs and the backing surface.
// ============================================================================

use std::sync::mpsc::{self, Receiver, Sender};

use crate::animation::{MorphAnimation, Phase, Shape};
use crate::backend::{ComputeBackend, Extent};
use crate::backing::BackingSurfaceManager;
use crate::config::MorphConfig;
use crate::error::{FrameError, SetupError};
use crate::pipeline::{render_frame, Pipelines};
use crate::uniforms::ShapeUniforms;

// ======================== Toggle Queue ========================

/// Cloneable sender for shape toggles. Requests are queued and applied at
/// the start of the next frame on the render thread.
#[derive(Clone)]
pub struct ToggleHandle {
    sender: Sender<()>,
}

impl ToggleHandle {
    pub fn request(&self) {
        if let Err(e) = self.sender.send(()) {
            log::error!("Toggle request dropped: {e}");
        }
    }
}

// ======================== Frame Outcome ========================

#[derive(Debug)]
pub enum FrameOutcome {
    Presented,
    /// Nothing was presented; time and animation still advanced.
    Skipped(FrameError),
}

impl FrameOutcome {
    #[cfg(test)]
    pub fn presented(&self) -> bool {
        matches!(self, FrameOutcome::Presented)
    }
}

// ======================== RenderState ========================

/// Everything mutated by the frame tick. Lives on the render thread only.
pub struct RenderState<B: ComputeBackend> {
    uniforms: ShapeUniforms,
    animation: MorphAnimation,
    pipelines: Pipelines<B>,
    backing: BackingSurfaceManager<B::Surface>,
    clock: f64,
    frame_step: f64,
    radius: f32,
    toggles: Receiver<()>,
    toggle_sender: Sender<()>,
    frame: u64,
}

impl<B: ComputeBackend> RenderState<B> {
    /// Compile the programs and set the animation at rest. Fails fast if any
    /// program is rejected.
    pub fn new(backend: &mut B, config: &MorphConfig) -> Result<Self, SetupError> {
        let pipelines = Pipelines::create(backend)?;
        let animation = MorphAnimation::new(
            config.initial_shape,
            f64::from(config.transition_duration),
        );
        let uniforms = ShapeUniforms::new(config.radius, animation.weights_at(0.0));
        let (toggle_sender, toggles) = mpsc::channel();

        Ok(Self {
            uniforms,
            animation,
            pipelines,
            backing: BackingSurfaceManager::default(),
            clock: 0.0,
            frame_step: config.frame_step(),
            radius: config.radius,
            toggles,
            toggle_sender,
            frame: 0,
        })
    }

    pub fn toggle_handle(&self) -> ToggleHandle {
        ToggleHandle {
            sender: self.toggle_sender.clone(),
        }
    }

    pub fn uniforms(&self) -> &ShapeUniforms {
        &self.uniforms
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Frame clock: `frame_step` per tick, never wall time.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Viewport changed: recompute aspect/radius, resize the drawable and
    /// recreate the backing surface. Zero-sized viewports are ignored.
    pub fn resize(&mut self, backend: &mut B, width: u32, height: u32) {
        let extent = Extent::new(width, height);
        if extent.is_empty() {
            log::debug!("Ignoring zero-sized viewport {}", extent);
            return;
        }

        self.uniforms.apply_viewport(extent, self.radius);
        backend.configure_drawable(extent);
        let format = backend.drawable_format();
        if let Err(e) = self.backing.resize(backend, extent, format) {
            log::error!("Backing surface recreation at {} failed: {}", extent, e);
        }
    }

    /// One display refresh: apply queued toggles, advance the clock, update
    /// the blend weights and render. Time advances even when the frame is
    /// skipped; the caller decides how to report the skip.
    pub fn tick(&mut self, backend: &mut B) -> FrameOutcome {
        for () in self.toggles.try_iter() {
            self.animation.toggle(self.clock);
            log::info!("Morphing to {} at t={:.3}", self.animation.committed(), self.clock);
        }

        self.clock += self.frame_step;
        self.uniforms.set_clock(self.clock);
        self.uniforms.set_weights(self.animation.weights_at(self.clock));
        self.frame += 1;

        match self.render(backend) {
            Ok(()) => FrameOutcome::Presented,
            Err(e) => FrameOutcome::Skipped(e),
        }
    }

    fn render(&mut self, backend: &mut B) -> Result<(), FrameError> {
        self.backing.ensure(backend)?;
        let backing = self.backing.ready().ok_or(FrameError::BackingNotReady)?;
        render_frame(backend, &self.pipelines, &self.uniforms, backing).map(|_| ())
    }

    /// Whether a crossfade is in flight at the current uniform time.
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self.animation.phase(self.clock),
            Phase::Transitioning { .. }
        )
    }

    pub fn committed_shape(&self) -> Shape {
        self.animation.committed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{Call, RecordingBackend};
    use crate::animation::Weights;
    use crate::backend::PassProgram;

    fn config(fps: f32) -> MorphConfig {
        MorphConfig {
            target_fps: fps,
            transition_duration: 1.0,
            ..MorphConfig::default()
        }
    }

    fn state(extent: Extent, fps: f32) -> (RecordingBackend, RenderState<RecordingBackend>) {
        let mut backend = RecordingBackend::new(extent);
        let mut state = RenderState::new(&mut backend, &config(fps)).expect("state");
        state.resize(&mut backend, extent.width, extent.height);
        (backend, state)
    }

    #[test]
    fn setup_fails_when_a_program_is_rejected() {
        let mut backend = RecordingBackend::new(Extent::new(4, 4));
        backend.reject = Some(PassProgram::Aberration);
        let result = RenderState::new(&mut backend, &config(60.0));
        assert!(matches!(result, Err(SetupError::ProgramRejected { .. })));
    }

    #[test]
    fn resize_updates_aspect_and_backing_extent() {
        let (backend, state) = state(Extent::new(800, 400), 60.0);
        assert_eq!(state.uniforms().aspect, 2.0);
        assert_eq!(state.uniforms().radius, MorphConfig::default().radius);
        assert_eq!(backend.surfaces_created(), vec![Extent::new(800, 400)]);
        assert!(backend.calls.contains(&Call::Configure(Extent::new(800, 400))));
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let (mut backend, mut state) = state(Extent::new(800, 400), 60.0);
        state.resize(&mut backend, 0, 400);
        assert_eq!(state.uniforms().aspect, 2.0);
        assert_eq!(backend.surfaces_created().len(), 1);
    }

    #[test]
    fn tick_advances_fixed_step_and_presents() {
        let (mut backend, mut state) = state(Extent::new(16, 16), 4.0);
        for _ in 0..4 {
            assert!(state.tick(&mut backend).presented());
        }
        assert_eq!(state.uniforms().time, 1.0);
        assert_eq!(state.frame(), 4);
        assert_eq!(backend.presented, 4);
    }

    #[test]
    fn queued_toggle_applies_at_next_frame_boundary() {
        let (mut backend, mut state) = state(Extent::new(16, 16), 4.0);
        let handle = state.toggle_handle();

        handle.request();
        // Nothing changes until the render thread ticks.
        assert_eq!(state.committed_shape(), Shape::Circle);

        state.tick(&mut backend);
        assert_eq!(state.committed_shape(), Shape::Fire);
        assert_eq!(state.animation.transition_start(), Some(0.0));
        assert!(state.is_transitioning());
        assert_eq!(state.uniforms().fire_weight, 0.25);
        assert_eq!(state.uniforms().circle_weight, 0.75);

        for _ in 0..3 {
            state.tick(&mut backend);
        }
        assert_eq!(state.uniforms().time, 1.0);
        assert_eq!(state.uniforms().fire_weight, 1.0);
        assert_eq!(state.uniforms().circle_weight, 0.0);

        state.tick(&mut backend);
        assert!(!state.is_transitioning());
        assert_eq!(state.uniforms().fire_weight, 1.0);
    }

    #[test]
    fn toggles_from_another_thread_are_marshaled() {
        let (mut backend, mut state) = state(Extent::new(8, 8), 60.0);
        let handle = state.toggle_handle();
        std::thread::spawn(move || handle.request())
            .join()
            .expect("toggle thread");

        state.tick(&mut backend);
        assert_eq!(state.committed_shape(), Shape::Fire);
    }

    #[test]
    fn transient_failure_skips_present_but_keeps_time() {
        let (mut backend, mut state) = state(Extent::new(8, 8), 4.0);
        backend.fail_acquires = 1;

        let outcome = state.tick(&mut backend);
        assert!(matches!(outcome, FrameOutcome::Skipped(FrameError::SurfaceTimeout)));
        assert_eq!(state.uniforms().time, 0.25);
        assert_eq!(backend.presented, 0);

        assert!(state.tick(&mut backend).presented());
        assert_eq!(state.uniforms().time, 0.5);
    }

    #[test]
    fn clock_keeps_advancing_after_days_of_uptime() {
        let (mut backend, mut state) = state(Extent::new(8, 8), 60.0);
        // 2^19 s: an f32 accumulator no longer moves by 1/60 here.
        state.clock = 524_288.0;
        state.toggle_handle().request();

        state.tick(&mut backend);
        assert_eq!(state.committed_shape(), Shape::Fire);
        assert_eq!(state.animation.transition_start(), Some(524_288.0));
        assert!(state.is_transitioning());

        for _ in 0..60 {
            let before = state.clock();
            state.tick(&mut backend);
            assert!(state.clock() > before);
        }
        assert!(!state.is_transitioning());
        assert_eq!(state.uniforms().weights(), Weights::resting(Shape::Fire));
        assert!(state.uniforms().time >= 524_289.0);
    }

    #[test]
    fn missing_backing_skips_until_recreated() {
        let mut backend = RecordingBackend::new(Extent::new(32, 32));
        let mut state = RenderState::new(&mut backend, &config(4.0)).expect("state");

        // No resize yet: there is nothing to blur into.
        let outcome = state.tick(&mut backend);
        assert!(matches!(outcome, FrameOutcome::Skipped(FrameError::BackingNotReady)));
        assert_eq!(backend.submissions(), 0);

        backend.fail_surfaces = 1;
        state.resize(&mut backend, 32, 32);
        // Recreation is retried at the frame boundary.
        assert!(state.tick(&mut backend).presented());
        assert_eq!(backend.surfaces_created(), vec![Extent::new(32, 32)]);
    }

    #[test]
    fn drawable_racing_ahead_of_resize_is_skipped() {
        let (mut backend, mut state) = state(Extent::new(800, 400), 60.0);
        backend.drawable = Extent::new(1024, 512);

        let outcome = state.tick(&mut backend);
        assert!(matches!(outcome, FrameOutcome::Skipped(FrameError::BackingMismatch { .. })));

        state.resize(&mut backend, 1024, 512);
        assert!(state.tick(&mut backend).presented());
    }
}
