// ============================================================================
// config.rs — Shapemorph
// Runtime configuration and the command-line surface that builds it.
// ============================================================================

use std::path::PathBuf;

use clap::Parser;

use crate::animation::Shape;
use crate::backend::Extent;
use crate::error::ConfigError;

/// Parameters that shape the render loop. Fixed for the lifetime of a run.
#[derive(Clone, Debug)]
pub struct MorphConfig {
    pub window_size: Extent,
    pub target_fps: f32,
    pub transition_duration: f32,
    pub radius: f32,
    pub initial_shape: Shape,
    pub vsync: bool,
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self {
            window_size: Extent::new(1280, 800),
            target_fps: 60.0,
            transition_duration: 1.0,
            radius: 0.35,
            initial_shape: Shape::Circle,
            vsync: true,
        }
    }
}

impl MorphConfig {
    /// Uniform clock increment per frame. Fixed, never measured.
    pub fn frame_step(&self) -> f64 {
        1.0 / f64::from(self.target_fps)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.target_fps > 0.0) {
            return Err(ConfigError::FrameRate(self.target_fps));
        }
        if !(self.transition_duration > 0.0) {
            return Err(ConfigError::Duration(self.transition_duration));
        }
        if self.window_size.is_empty() {
            return Err(ConfigError::WindowSize {
                width: self.window_size.width,
                height: self.window_size.height,
            });
        }
        Ok(())
    }
}

/// Options for the offscreen runner.
#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    pub frames: u32,
    pub toggle_every: u32,
    pub output: Option<PathBuf>,
    pub progress_interval: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            frames: 240,
            toggle_every: 0,
            output: None,
            progress_interval: 60,
        }
    }
}

// ======================== CLI ========================

#[derive(Parser, Debug)]
#[command(
    name = "shapemorph",
    version,
    about = "Full-screen procedural shape that morphs between a circle and fire"
)]
pub struct Cli {
    /// Initial window width in physical pixels.
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Initial window height in physical pixels.
    #[arg(long, default_value_t = 800)]
    pub height: u32,

    /// Target frame rate; the uniform clock advances 1/FPS per frame.
    #[arg(long, value_name = "FPS", default_value_t = 60.0)]
    pub fps: f32,

    /// Crossfade duration in clock units.
    #[arg(long, value_name = "SECONDS", default_value_t = 1.0)]
    pub duration: f32,

    /// Base shape radius in normalized viewport units.
    #[arg(long, default_value_t = 0.35)]
    pub radius: f32,

    /// Shape shown at startup.
    #[arg(long, value_enum, default_value_t = Shape::Circle)]
    pub shape: Shape,

    /// Present in the lowest-latency mode available instead of vsync. The
    /// clock still steps 1/FPS per frame, so the morph runs faster.
    #[arg(long)]
    pub no_vsync: bool,

    /// Render offscreen without a window.
    #[arg(long)]
    pub headless: bool,

    /// Headless: number of frames to render.
    #[arg(long, default_value_t = 240, requires = "headless")]
    pub frames: u32,

    /// Headless: toggle the shape every N frames (0 = never).
    #[arg(long, value_name = "N", default_value_t = 0, requires = "headless")]
    pub toggle_every: u32,

    /// Headless: write the last frame to this PNG file.
    #[arg(long, value_name = "PATH", requires = "headless")]
    pub output: Option<PathBuf>,
}

impl Cli {
    pub fn morph_config(&self) -> Result<MorphConfig, ConfigError> {
        let config = MorphConfig {
            window_size: Extent::new(self.width, self.height),
            target_fps: self.fps,
            transition_duration: self.duration,
            radius: self.radius,
            initial_shape: self.shape,
            vsync: !self.no_vsync,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn headless_config(&self) -> HeadlessConfig {
        HeadlessConfig {
            frames: self.frames,
            toggle_every: self.toggle_every,
            output: self.output.clone(),
            ..HeadlessConfig::default()
        }
    }
}
