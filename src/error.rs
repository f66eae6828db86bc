// ============================================================================
// error.rs — Shapemorph
// Error taxonomy: fatal setup failures vs. per-frame transient failures.
// ============================================================================

use crate::backend::{Extent, PassProgram};

/// Failures while bringing up the device, window or compute programs.
/// None of these are recoverable: no frame can render without all of them.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("no suitable GPU adapter found (Vulkan, Metal, DX12 or GL required)")]
    NoAdapter,

    #[error("failed to create GPU device: {0}")]
    RequestDevice(String),

    #[error("failed to create presentation surface: {0}")]
    CreateSurface(String),

    #[error("failed to create window: {0}")]
    CreateWindow(String),

    #[error("adapter is missing required features: {0}")]
    MissingFeature(String),

    #[error("canvas format {0} does not support read-write storage on this adapter")]
    UnsupportedCanvasFormat(String),

    #[error("compute program `{program}` was rejected: {message}")]
    ProgramRejected {
        program: &'static str,
        message: String,
    },
}

impl SetupError {
    pub fn rejected(program: PassProgram, message: impl Into<String>) -> Self {
        Self::ProgramRejected {
            program: program.name(),
            message: message.into(),
        }
    }
}

/// Failures scoped to a single frame. The frame is dropped, time keeps going.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("surface lost or outdated; reconfigured")]
    SurfaceLost,

    #[error("timed out acquiring the next drawable")]
    SurfaceTimeout,

    #[error("out of GPU memory")]
    OutOfMemory,

    #[error("surface error: {0}")]
    Surface(String),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("backing surface not ready")]
    BackingNotReady,

    #[error("backing surface is {backing} but drawable is {drawable}")]
    BackingMismatch { drawable: Extent, backing: Extent },

    #[error("backing surface allocation failed: {0}")]
    SurfaceAllocation(String),
}

/// Invalid command-line or programmatic configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("target frame rate must be positive, got {0}")]
    FrameRate(f32),

    #[error("transition duration must be positive, got {0}")]
    Duration(f32),

    #[error("window size must be non-zero, got {width}x{height}")]
    WindowSize { width: u32, height: u32 },
}

/// Headless-mode failures that happen after rendering: readback and export.
#[derive(Debug, thiserror::Error)]
pub enum HeadlessError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("frame readback failed: {0}")]
    Readback(String),

    #[error("failed to write {path}: {source}")]
    Export {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_program_names_the_kernel() {
        let err = SetupError::rejected(PassProgram::Blur, "bad binding");
        let text = err.to_string();
        assert!(text.contains("blur"));
        assert!(text.contains("bad binding"));
    }

    #[test]
    fn mismatch_reports_both_extents() {
        let err = FrameError::BackingMismatch {
            drawable: Extent::new(800, 400),
            backing: Extent::new(640, 480),
        };
        assert_eq!(
            err.to_string(),
            "backing surface is 640x480 but drawable is 800x400"
        );
    }
}
