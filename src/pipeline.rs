// ============================================================================
// pipeline.rs — Shapemorph
// Frame orchestration: the three compute programs (shape → blur → aberration)
// and the per-frame command sequence that wires them to the drawable and the
// backing surface.
// ============================================================================

use crate::backend::{CommandSequence, ComputeBackend, Dispatch, DispatchGrid, Extent, PassProgram};
use crate::backing::BackingSurface;
use crate::error::{FrameError, SetupError};
use crate::uniforms::ShapeUniforms;

// ======================== Pipelines ========================

/// The three compiled compute programs, in dispatch order.
pub struct Pipelines<B: ComputeBackend> {
    pub shape: B::Pipeline,
    pub blur: B::Pipeline,
    pub aberration: B::Pipeline,
}

impl<B: ComputeBackend> Pipelines<B> {
    /// Compile all three programs. Any rejection aborts setup.
    pub fn create(backend: &mut B) -> Result<Self, SetupError> {
        let shape = backend.create_pipeline(PassProgram::Shape)?;
        let blur = backend.create_pipeline(PassProgram::Blur)?;
        let aberration = backend.create_pipeline(PassProgram::Aberration)?;
        log::info!("Compute programs ready: shape, blur, aberration");
        Ok(Self {
            shape,
            blur,
            aberration,
        })
    }

    pub fn get(&self, program: PassProgram) -> &B::Pipeline {
        match program {
            PassProgram::Shape => &self.shape,
            PassProgram::Blur => &self.blur,
            PassProgram::Aberration => &self.aberration,
        }
    }
}

// ======================== Frame Encoding ========================

/// Acquire a drawable, dispatch the three passes over it in one command
/// sequence and present. Returns the extent that was rendered.
///
/// Refuses to run when the backing surface does not match the drawable, so
/// the blur and aberration passes never see a stale target.
pub fn render_frame<B: ComputeBackend>(
    backend: &mut B,
    pipelines: &Pipelines<B>,
    uniforms: &ShapeUniforms,
    backing: &BackingSurface<B::Surface>,
) -> Result<Extent, FrameError> {
    let drawable = backend.acquire_drawable()?;
    let extent = backend.drawable_extent(&drawable);
    if extent != backing.extent {
        return Err(FrameError::BackingMismatch {
            drawable: extent,
            backing: backing.extent,
        });
    }

    let dispatches = PassProgram::FRAME_ORDER.map(|program| {
        let pipeline = pipelines.get(program);
        Dispatch {
            program,
            pipeline,
            grid: DispatchGrid::covering(extent, backend.preferred_tile(pipeline)),
        }
    });

    backend.submit_sequence(CommandSequence {
        uniforms: *uniforms,
        drawable,
        backing: &backing.surface,
        dispatches,
    })?;
    Ok(extent)
}
