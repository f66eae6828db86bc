// ============================================================================
// animation.rs — Shapemorph
// Morph state machine: committed shape, restartable linear crossfade, and the
// blend weights it produces for the uniform block each frame.
// ============================================================================

use std::fmt;

/// The two visual states the procedural shape can settle into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Shape {
    Circle,
    Fire,
}

impl Shape {
    pub fn other(self) -> Self {
        match self {
            Shape::Circle => Shape::Fire,
            Shape::Fire => Shape::Circle,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Circle => f.write_str("circle"),
            Shape::Fire => f.write_str("fire"),
        }
    }
}

pub fn lerp(a: f32, b: f32, k: f32) -> f32 {
    a + k * (b - a)
}

/// Blend weights written into the uniform block.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Weights {
    pub circle: f32,
    pub fire: f32,
}

impl Weights {
    /// The fixed 0/1 pair shown when `shape` is fully displayed.
    pub fn resting(shape: Shape) -> Self {
        match shape {
            Shape::Circle => Self { circle: 1.0, fire: 0.0 },
            Shape::Fire => Self { circle: 0.0, fire: 1.0 },
        }
    }

    fn ramp(target: Shape, progress: f32) -> Self {
        let to = lerp(0.0, 1.0, progress);
        let from = lerp(1.0, 0.0, progress);
        match target {
            Shape::Circle => Self { circle: to, fire: from },
            Shape::Fire => Self { circle: from, fire: to },
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Phase {
    Idle,
    Transitioning { progress: f32 },
}

/// Restartable crossfade between the two shapes.
///
/// Times are on the frame clock in `f64`; only the uniform block narrows to
/// `f32`, so transitions still complete after days of uptime.
///
/// A toggle always wins: it flips the committed shape and restarts the ramp
/// from progress 0, even in the middle of a running transition. The jump in
/// the weight trajectory that causes is intended.
#[derive(Clone, Debug)]
pub struct MorphAnimation {
    committed: Shape,
    transition_start: Option<f64>,
    duration: f64,
}

impl MorphAnimation {
    /// Starts at rest on `initial`; no transition is in flight.
    pub fn new(initial: Shape, duration: f64) -> Self {
        Self {
            committed: initial,
            transition_start: None,
            duration,
        }
    }

    pub fn committed(&self) -> Shape {
        self.committed
    }

    pub fn transition_start(&self) -> Option<f64> {
        self.transition_start
    }

    /// Flip the committed shape and (re)start the ramp at `now`.
    pub fn toggle(&mut self, now: f64) {
        self.committed = self.committed.other();
        self.transition_start = Some(now);
    }

    pub fn phase(&self, now: f64) -> Phase {
        let Some(start) = self.transition_start else {
            return Phase::Idle;
        };
        let progress = (now - start) / self.duration;
        if progress > 1.0 {
            Phase::Idle
        } else {
            Phase::Transitioning {
                progress: progress as f32,
            }
        }
    }

    pub fn weights_at(&self, now: f64) -> Weights {
        match self.phase(now) {
            Phase::Idle => Weights::resting(self.committed),
            Phase::Transitioning { progress } => Weights::ramp(self.committed, progress),
        }
    }
}
