// ============================================================================
// headless.rs — Shapemorph
// Offscreen runner: drives the same frame loop without a window, optionally
// toggling on a fixed cadence, and exports the last frame as PNG.
// ============================================================================

use std::time::Instant;

use crate::backend::ComputeBackend;
use crate::config::{HeadlessConfig, MorphConfig};
use crate::driver::{FrameOutcome, RenderState};
use crate::error::HeadlessError;
use crate::gpu::WgpuBackend;

/// Totals reported at the end of a run.
#[derive(Debug, Default, PartialEq)]
pub struct RunSummary {
    pub presented: u32,
    pub skipped: u32,
    pub toggles: u32,
}

pub fn run_headless(config: &MorphConfig, headless: &HeadlessConfig) -> Result<(), HeadlessError> {
    let extent = config.window_size;
    let mut backend = WgpuBackend::offscreen(extent)?;
    let mut state = RenderState::new(&mut backend, config)?;
    state.resize(&mut backend, extent.width, extent.height);

    log::info!(
        "Headless run started: {} frames at {} ({} fps clock)",
        headless.frames,
        extent,
        config.target_fps
    );

    let started = Instant::now();
    let summary = drive_frames(&mut backend, &mut state, headless);
    let elapsed = started.elapsed().as_secs_f64().max(1e-6);
    log::info!(
        "Headless run finished: {} presented, {} skipped, {} toggles | {:.0} fps",
        summary.presented,
        summary.skipped,
        summary.toggles,
        f64::from(summary.presented + summary.skipped) / elapsed,
    );

    if let Some(path) = &headless.output {
        let image = backend.read_canvas()?;
        image.save(path).map_err(|source| HeadlessError::Export {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Saved final frame to {}", path.display());
    }

    Ok(())
}

/// Tick `headless.frames` times, requesting a toggle before every
/// `toggle_every`-th frame.
pub fn drive_frames<B: ComputeBackend>(
    backend: &mut B,
    state: &mut RenderState<B>,
    headless: &HeadlessConfig,
) -> RunSummary {
    let toggles = state.toggle_handle();
    let mut summary = RunSummary::default();

    for step in 0..headless.frames {
        if headless.toggle_every > 0 && step > 0 && step % headless.toggle_every == 0 {
            toggles.request();
            summary.toggles += 1;
        }

        match state.tick(backend) {
            FrameOutcome::Presented => summary.presented += 1,
            FrameOutcome::Skipped(err) => {
                log::warn!("Frame {} skipped: {}", step + 1, err);
                summary.skipped += 1;
            }
        }

        let done = step + 1;
        if headless.progress_interval > 0 && done % headless.progress_interval == 0 {
            let weights = state.uniforms().weights();
            log::info!(
                "Headless progress: {}/{} | t={:.3} | {} (circle {:.2}, fire {:.2})",
                done,
                headless.frames,
                state.clock(),
                state.committed_shape(),
                weights.circle,
                weights.fire,
            );
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Shape;
    use crate::backend::testing::RecordingBackend;
    use crate::backend::Extent;

    #[test]
    fn toggles_on_cadence_and_counts_frames() {
        let config = MorphConfig {
            window_size: Extent::new(8, 8),
            target_fps: 10.0,
            ..MorphConfig::default()
        };
        let mut backend = RecordingBackend::new(config.window_size);
        let mut state = RenderState::new(&mut backend, &config).expect("state");
        state.resize(&mut backend, 8, 8);

        let headless = HeadlessConfig {
            frames: 30,
            toggle_every: 10,
            output: None,
            progress_interval: 0,
        };
        backend.fail_acquires = 2;
        let summary = drive_frames(&mut backend, &mut state, &headless);

        assert_eq!(
            summary,
            RunSummary {
                presented: 28,
                skipped: 2,
                toggles: 2,
            }
        );
        // Two toggles: back on the starting shape.
        assert_eq!(state.committed_shape(), Shape::Circle);
        assert_eq!(state.frame(), 30);
    }
}
