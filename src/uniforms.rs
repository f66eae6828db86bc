// ============================================================================
// uniforms.rs — Shapemorph
// Per-frame scalar state shared read-only by all three compute passes.
// ============================================================================

use bytemuck::{Pod, Zeroable};

use crate::animation::Weights;
use crate::backend::Extent;

/// GPU-side parameter block uploaded once per frame. Layout mirrors the
/// `Uniforms` struct declared in every kernel.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ShapeUniforms {
    pub aspect: f32,
    pub time: f32,
    pub radius: f32,
    pub circle_weight: f32,
    pub fire_weight: f32,
    pub _pad: [f32; 3],
}

impl ShapeUniforms {
    pub fn new(radius: f32, weights: Weights) -> Self {
        Self {
            aspect: 1.0,
            time: 0.0,
            radius,
            circle_weight: weights.circle,
            fire_weight: weights.fire,
            _pad: [0.0; 3],
        }
    }

    /// Narrow the frame clock for the shaders. The clock itself is kept in
    /// `f64` by the caller; accumulating in `f32` stalls after ~2^19 s.
    pub fn set_clock(&mut self, clock: f64) {
        self.time = clock as f32;
    }

    /// Recompute viewport-derived fields after a resize.
    pub fn apply_viewport(&mut self, extent: Extent, radius: f32) {
        self.aspect = extent.aspect();
        self.radius = radius;
    }

    pub fn set_weights(&mut self, weights: Weights) {
        self.circle_weight = weights.circle;
        self.fire_weight = weights.fire;
    }

    pub fn weights(&self) -> Weights {
        Weights {
            circle: self.circle_weight,
            fire: self.fire_weight,
        }
    }
}
