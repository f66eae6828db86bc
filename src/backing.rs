// ============================================================================
// backing.rs — Shapemorph
// Off-screen intermediate texture holding the blurred image between the blur
// and aberration passes. Recreated whole whenever the drawable is resized.
// ============================================================================

use crate::backend::{ComputeBackend, Extent};
use crate::error::FrameError;

pub struct BackingSurface<S> {
    pub surface: S,
    pub extent: Extent,
}

/// Tracks the requested size and the surface currently allocated for it.
pub struct BackingSurfaceManager<S> {
    current: Option<BackingSurface<S>>,
    requested: Option<Extent>,
}

impl<S> Default for BackingSurfaceManager<S> {
    fn default() -> Self {
        Self {
            current: None,
            requested: None,
        }
    }
}

impl<S> BackingSurfaceManager<S> {
    /// Replace the backing surface with a fresh one of `extent`.
    ///
    /// The previous surface is dropped here; the backend keeps the underlying
    /// memory alive until command sequences that reference it have retired.
    pub fn resize<B>(
        &mut self,
        backend: &mut B,
        extent: Extent,
        format: B::Format,
    ) -> Result<&S, FrameError>
    where
        B: ComputeBackend<Surface = S>,
    {
        self.requested = Some(extent);
        self.current = None;

        let surface = backend.create_surface(extent, format)?;
        log::debug!("Backing surface recreated at {}", extent);
        let backing = self.current.insert(BackingSurface { surface, extent });
        Ok(&backing.surface)
    }

    /// Retry a recreation that failed earlier. No-op when already current.
    pub fn ensure<B>(&mut self, backend: &mut B) -> Result<(), FrameError>
    where
        B: ComputeBackend<Surface = S>,
    {
        let Some(extent) = self.requested else {
            return Ok(());
        };
        if self.ready().is_some() {
            return Ok(());
        }
        let format = backend.drawable_format();
        self.resize(backend, extent, format).map(|_| ())
    }

    /// The backing surface, only if it matches the most recent resize.
    pub fn ready(&self) -> Option<&BackingSurface<S>> {
        let current = self.current.as_ref()?;
        (Some(current.extent) == self.requested).then_some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{FakeFormat, RecordingBackend};

    #[test]
    fn resize_allocates_exact_extent_in_requested_format() {
        let mut backend = RecordingBackend::new(Extent::new(800, 400));
        let mut manager = BackingSurfaceManager::default();

        let surface = manager
            .resize(&mut backend, Extent::new(800, 400), FakeFormat::Rgba8)
            .expect("surface");
        assert_eq!(surface.extent, Extent::new(800, 400));
        assert_eq!(surface.format, FakeFormat::Rgba8);
        assert_eq!(manager.ready().map(|b| b.extent), Some(Extent::new(800, 400)));
    }

    #[test]
    fn every_resize_recreates_the_surface_whole() {
        let mut backend = RecordingBackend::new(Extent::new(10, 10));
        let mut manager = BackingSurfaceManager::default();

        manager
            .resize(&mut backend, Extent::new(10, 10), FakeFormat::Bgra8)
            .expect("first");
        manager
            .resize(&mut backend, Extent::new(10, 10), FakeFormat::Bgra8)
            .expect("second");
        let id = manager.ready().map(|b| b.surface.id);

        assert_eq!(backend.surfaces_created().len(), 2);
        assert_eq!(id, Some(1));
    }

    #[test]
    fn failed_allocation_leaves_manager_not_ready_until_retry() {
        let mut backend = RecordingBackend::new(Extent::new(64, 32));
        backend.fail_surfaces = 1;
        let mut manager = BackingSurfaceManager::default();

        assert!(manager
            .resize(&mut backend, Extent::new(64, 32), FakeFormat::Bgra8)
            .is_err());
        assert!(manager.ready().is_none());
        assert_eq!(manager.requested, Some(Extent::new(64, 32)));

        manager.ensure(&mut backend).expect("retry succeeds");
        assert_eq!(manager.ready().map(|b| b.extent), Some(Extent::new(64, 32)));

        // Already current: nothing new is allocated.
        manager.ensure(&mut backend).expect("no-op");
        assert_eq!(backend.surfaces_created().len(), 1);
    }

    #[test]
    fn ensure_without_any_resize_does_nothing() {
        let mut backend = RecordingBackend::new(Extent::new(1, 1));
        let mut manager: BackingSurfaceManager<_> = BackingSurfaceManager::default();
        manager.ensure(&mut backend).expect("no-op");
        assert!(backend.surfaces_created().is_empty());
    }
}
