// ============================================================================
// backend.rs — Shapemorph
// Capability interface between the frame orchestration and the GPU: program
// creation, surface allocation, drawable acquisition and sequence submission.
// ============================================================================

use std::fmt;

use crate::error::{FrameError, SetupError};
use crate::uniforms::ShapeUniforms;

// ======================== Geometry ========================

/// Pixel dimensions of a drawable or backing surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Threads per workgroup along x and y.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileSize {
    pub x: u32,
    pub y: u32,
}

impl TileSize {
    /// Matches `@workgroup_size(16, 16)` in every kernel.
    pub const DEFAULT: TileSize = TileSize { x: 16, y: 16 };
}

/// Full-image dispatch: one invocation per pixel, rounded up to whole tiles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DispatchGrid {
    pub extent: Extent,
    pub tile: TileSize,
    pub groups_x: u32,
    pub groups_y: u32,
}

impl DispatchGrid {
    pub fn covering(extent: Extent, tile: TileSize) -> Self {
        Self {
            extent,
            tile,
            groups_x: extent.width.div_ceil(tile.x),
            groups_y: extent.height.div_ceil(tile.y),
        }
    }
}

// ======================== Programs ========================

/// Resources a compute program can be bound to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    Uniforms,
    Drawable,
    Backing,
}

/// The three kernels that make up a frame, in dispatch order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PassProgram {
    Shape,
    Blur,
    Aberration,
}

impl PassProgram {
    pub const FRAME_ORDER: [PassProgram; 3] =
        [PassProgram::Shape, PassProgram::Blur, PassProgram::Aberration];

    pub fn name(self) -> &'static str {
        match self {
            PassProgram::Shape => "shape",
            PassProgram::Blur => "blur",
            PassProgram::Aberration => "aberration",
        }
    }

    pub fn reads(self) -> &'static [Binding] {
        match self {
            PassProgram::Shape => &[Binding::Uniforms],
            PassProgram::Blur => &[Binding::Drawable],
            PassProgram::Aberration => &[Binding::Drawable, Binding::Backing],
        }
    }

    pub fn writes(self) -> Binding {
        match self {
            PassProgram::Shape => Binding::Drawable,
            PassProgram::Blur => Binding::Backing,
            PassProgram::Aberration => Binding::Drawable,
        }
    }

    /// Bindings in shader slot order: plain inputs first, the written
    /// target last. A target that is also read is bound read-write.
    pub fn slots(self) -> Vec<Slot> {
        let target = self.writes();
        let mut slots: Vec<Slot> = self
            .reads()
            .iter()
            .filter(|binding| **binding != target)
            .map(|&binding| Slot {
                binding,
                access: Access::Read,
            })
            .collect();
        slots.push(Slot {
            binding: target,
            access: if self.reads().contains(&target) {
                Access::ReadWrite
            } else {
                Access::Write
            },
        });
        slots
    }
}

impl fmt::Display for PassProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub binding: Binding,
    pub access: Access,
}

// ======================== Command Sequences ========================

pub struct Dispatch<'a, P> {
    pub program: PassProgram,
    pub pipeline: &'a P,
    pub grid: DispatchGrid,
}

/// Everything one frame submits: the three dispatches in order, followed by
/// presentation of the drawable.
pub struct CommandSequence<'a, B: ComputeBackend + ?Sized> {
    pub uniforms: ShapeUniforms,
    pub drawable: B::Drawable,
    pub backing: &'a B::Surface,
    pub dispatches: [Dispatch<'a, B::Pipeline>; 3],
}

// ======================== Backend Trait ========================

pub trait ComputeBackend {
    type Pipeline;
    type Surface;
    type Drawable;
    type Format: Copy + PartialEq + fmt::Debug;

    /// Compile and link one kernel. Called once per program at startup.
    fn create_pipeline(&mut self, program: PassProgram) -> Result<Self::Pipeline, SetupError>;

    /// Allocate a GPU-only read/write texture.
    fn create_surface(
        &mut self,
        extent: Extent,
        format: Self::Format,
    ) -> Result<Self::Surface, FrameError>;

    /// Resize whatever the drawables are acquired from.
    fn configure_drawable(&mut self, extent: Extent);

    fn drawable_format(&self) -> Self::Format;

    fn acquire_drawable(&mut self) -> Result<Self::Drawable, FrameError>;

    fn drawable_extent(&self, drawable: &Self::Drawable) -> Extent;

    fn preferred_tile(&self, _pipeline: &Self::Pipeline) -> TileSize {
        TileSize::DEFAULT
    }

    /// Encode all dispatches into one command sequence, submit it and present
    /// the drawable. Nothing is presented when this returns an error.
    fn submit_sequence(&mut self, sequence: CommandSequence<'_, Self>) -> Result<(), FrameError>;
}

// ======================== Test Backend ========================

#[cfg(test)]
pub mod testing {
    //! A backend that records every call and runs small CPU stand-ins for the
    //! kernels, so ordering and wiring can be checked without a GPU.

    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum FakeFormat {
        Rgba8,
        Bgra8,
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        CreatePipeline(PassProgram),
        CreateSurface { id: usize, extent: Extent, format: FakeFormat },
        Configure(Extent),
        Acquire(Extent),
        Submit { programs: Vec<PassProgram>, backing: usize, time: f32 },
    }

    #[derive(Debug)]
    pub struct FakeSurface {
        pub id: usize,
        pub extent: Extent,
        pub format: FakeFormat,
    }

    pub struct RecordingBackend {
        pub calls: Vec<Call>,
        pub drawable: Extent,
        pub format: FakeFormat,
        pub tile: TileSize,
        pub reject: Option<PassProgram>,
        pub fail_surfaces: usize,
        pub fail_acquires: usize,
        pub fail_submits: usize,
        pub grids: Vec<DispatchGrid>,
        pub presented: usize,
        /// CPU images: the drawable and the backing contents of the last frame.
        pub image: Vec<f32>,
        pub backing_image: Vec<f32>,
        next_surface: usize,
    }

    impl RecordingBackend {
        pub fn new(drawable: Extent) -> Self {
            Self {
                calls: Vec::new(),
                drawable,
                format: FakeFormat::Bgra8,
                tile: TileSize::DEFAULT,
                reject: None,
                fail_surfaces: 0,
                fail_acquires: 0,
                fail_submits: 0,
                grids: Vec::new(),
                presented: 0,
                image: Vec::new(),
                backing_image: Vec::new(),
                next_surface: 0,
            }
        }

        pub fn surfaces_created(&self) -> Vec<Extent> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::CreateSurface { extent, .. } => Some(*extent),
                    _ => None,
                })
                .collect()
        }

        pub fn submissions(&self) -> usize {
            self.calls
                .iter()
                .filter(|call| matches!(call, Call::Submit { .. }))
                .count()
        }
    }

    /// Stand-in kernels: each output pixel depends on the uniform clock and,
    /// for blur and aberration, on neighbouring pixels of earlier outputs.
    pub fn shape_px(time: f32, x: u32, y: u32, extent: Extent) -> f32 {
        time + (x + y * extent.width) as f32
    }

    pub fn blur_px(src: &[f32], x: u32, y: u32, extent: Extent) -> f32 {
        let left = x.saturating_sub(1);
        let right = (x + 1).min(extent.width - 1);
        let row = (y * extent.width) as usize;
        (src[row + left as usize] + src[row + x as usize] + src[row + right as usize]) / 3.0
    }

    pub fn aberration_px(sharp: &[f32], blurred: &[f32], x: u32, y: u32, extent: Extent) -> f32 {
        let idx = (x + y * extent.width) as usize;
        sharp[idx] * 2.0 - blurred[idx]
    }

    fn run_pass(
        program: PassProgram,
        time: f32,
        extent: Extent,
        drawable: &mut Vec<f32>,
        backing: &mut Vec<f32>,
    ) {
        let n = (extent.width * extent.height) as usize;
        let mut out = vec![0.0; n];
        for y in 0..extent.height {
            for x in 0..extent.width {
                let idx = (x + y * extent.width) as usize;
                out[idx] = match program {
                    PassProgram::Shape => shape_px(time, x, y, extent),
                    PassProgram::Blur => blur_px(drawable, x, y, extent),
                    PassProgram::Aberration => aberration_px(drawable, backing, x, y, extent),
                };
            }
        }
        match program.writes() {
            Binding::Drawable => *drawable = out,
            Binding::Backing => *backing = out,
            Binding::Uniforms => unreachable!("uniforms are never written"),
        }
    }

    impl ComputeBackend for RecordingBackend {
        type Pipeline = PassProgram;
        type Surface = FakeSurface;
        type Drawable = Extent;
        type Format = FakeFormat;

        fn create_pipeline(&mut self, program: PassProgram) -> Result<PassProgram, SetupError> {
            self.calls.push(Call::CreatePipeline(program));
            if self.reject == Some(program) {
                return Err(SetupError::rejected(program, "rejected by test"));
            }
            Ok(program)
        }

        fn create_surface(
            &mut self,
            extent: Extent,
            format: FakeFormat,
        ) -> Result<FakeSurface, FrameError> {
            if self.fail_surfaces > 0 {
                self.fail_surfaces -= 1;
                return Err(FrameError::SurfaceAllocation("test allocation failure".into()));
            }
            let id = self.next_surface;
            self.next_surface += 1;
            self.calls.push(Call::CreateSurface { id, extent, format });
            Ok(FakeSurface { id, extent, format })
        }

        fn configure_drawable(&mut self, extent: Extent) {
            self.calls.push(Call::Configure(extent));
            self.drawable = extent;
        }

        fn drawable_format(&self) -> FakeFormat {
            self.format
        }

        fn acquire_drawable(&mut self) -> Result<Extent, FrameError> {
            if self.fail_acquires > 0 {
                self.fail_acquires -= 1;
                return Err(FrameError::SurfaceTimeout);
            }
            self.calls.push(Call::Acquire(self.drawable));
            Ok(self.drawable)
        }

        fn drawable_extent(&self, drawable: &Extent) -> Extent {
            *drawable
        }

        fn preferred_tile(&self, _pipeline: &PassProgram) -> TileSize {
            self.tile
        }

        fn submit_sequence(
            &mut self,
            sequence: CommandSequence<'_, Self>,
        ) -> Result<(), FrameError> {
            self.calls.push(Call::Submit {
                programs: sequence.dispatches.iter().map(|d| d.program).collect(),
                backing: sequence.backing.id,
                time: sequence.uniforms.time,
            });
            if self.fail_submits > 0 {
                self.fail_submits -= 1;
                return Err(FrameError::Dispatch("device lost".into()));
            }

            let extent = sequence.drawable;
            let mut drawable = vec![0.0; (extent.width * extent.height) as usize];
            let mut backing = drawable.clone();
            for dispatch in &sequence.dispatches {
                assert_eq!(*dispatch.pipeline, dispatch.program);
                self.grids.push(dispatch.grid);
                run_pass(
                    dispatch.program,
                    sequence.uniforms.time,
                    extent,
                    &mut drawable,
                    &mut backing,
                );
            }
            self.image = drawable;
            self.backing_image = backing;
            self.presented += 1;
            Ok(())
        }
    }
}
