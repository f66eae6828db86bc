// ============================================================================
// gpu/context.rs — Shapemorph
// Adapter and device bring-up, plus surface configuration for windowed runs.
// ============================================================================

use crate::backend::Extent;
use crate::error::SetupError;
use crate::gpu::layout::CANVAS_FORMAT;

/// Read-write storage on `rgba8unorm` is an adapter-specific format feature.
const REQUIRED_FEATURES: wgpu::Features = wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;

pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

pub async fn init_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), SetupError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(SetupError::NoAdapter)?;

    let info = adapter.get_info();
    log::info!("GPU: {} ({:?})", info.name, info.backend);

    if !adapter.features().contains(REQUIRED_FEATURES) {
        return Err(SetupError::MissingFeature(format!("{REQUIRED_FEATURES:?}")));
    }
    let format_features = adapter.get_texture_format_features(CANVAS_FORMAT);
    if !format_features
        .flags
        .contains(wgpu::TextureFormatFeatureFlags::STORAGE_READ_WRITE)
    {
        return Err(SetupError::UnsupportedCanvasFormat(format!("{CANVAS_FORMAT:?}")));
    }

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("shapemorph_device"),
                required_features: REQUIRED_FEATURES,
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .map_err(|e| SetupError::RequestDevice(e.to_string()))?;

    Ok((adapter, device, queue))
}

/// Pick an sRGB format and the present mode matching the vsync preference.
pub fn surface_config(
    surface: &wgpu::Surface<'_>,
    adapter: &wgpu::Adapter,
    extent: Extent,
    vsync: bool,
) -> Result<wgpu::SurfaceConfiguration, SetupError> {
    let surface_caps = surface.get_capabilities(adapter);
    let surface_format = surface_caps
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .or_else(|| surface_caps.formats.first())
        .copied()
        .ok_or_else(|| {
            SetupError::CreateSurface("surface is not supported by the adapter".into())
        })?;

    let present_mode = if vsync {
        log::info!("Present mode: Fifo (VSync ON)");
        wgpu::PresentMode::Fifo
    } else if surface_caps.present_modes.contains(&wgpu::PresentMode::Mailbox) {
        log::info!("Present mode: Mailbox (uncapped FPS)");
        wgpu::PresentMode::Mailbox
    } else if surface_caps.present_modes.contains(&wgpu::PresentMode::Immediate) {
        log::info!("Present mode: Immediate (uncapped FPS)");
        wgpu::PresentMode::Immediate
    } else {
        log::info!("Present mode: Fifo (VSync ON)");
        wgpu::PresentMode::Fifo
    };

    Ok(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: extent.width.max(1),
        height: extent.height.max(1),
        present_mode,
        alpha_mode: surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    })
}
