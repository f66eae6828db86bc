// ============================================================================
// gpu/layout.rs — Shapemorph
// Shader loading, compute pipeline creation and bind-group-layout helpers.
// Layouts are derived from each program's declared reads and writes.
// ============================================================================

use crate::backend::{Access, Binding, PassProgram, Slot};
use crate::error::SetupError;

/// Storage format of the drawable canvas and the backing surface.
pub const CANVAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A compiled kernel plus the layout its bind groups are built against.
pub struct ComputeProgram {
    pub program: PassProgram,
    pub pipeline: wgpu::ComputePipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

fn shader_source(program: PassProgram) -> &'static str {
    match program {
        PassProgram::Shape => include_str!("../shaders/shape.wgsl"),
        PassProgram::Blur => include_str!("../shaders/blur.wgsl"),
        PassProgram::Aberration => include_str!("../shaders/aberration.wgsl"),
    }
}

/// Compile `program` under a validation error scope so a bad kernel is
/// reported as a setup error instead of reaching the uncaptured handler.
pub fn create_program(
    device: &wgpu::Device,
    program: PassProgram,
) -> Result<ComputeProgram, SetupError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let name = program.name();
    let module = load_shader(device, name, shader_source(program));
    let entries: Vec<wgpu::BindGroupLayoutEntry> = program
        .slots()
        .iter()
        .enumerate()
        .map(|(index, slot)| layout_entry(index as u32, *slot))
        .collect();
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{name}_bgl")),
        entries: &entries,
    });
    let pipeline = create_compute_pipeline(device, name, &bind_group_layout, &module, "main");

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(SetupError::rejected(program, err.to_string()));
    }
    log::debug!("Compiled compute program `{}`", name);

    Ok(ComputeProgram {
        program,
        pipeline,
        bind_group_layout,
    })
}

fn layout_entry(binding: u32, slot: Slot) -> wgpu::BindGroupLayoutEntry {
    match (slot.binding, slot.access) {
        (Binding::Uniforms, _) => bgl_uniform(binding),
        (_, Access::Read) => bgl_texture(binding),
        (_, Access::Write) => bgl_storage_texture(binding, wgpu::StorageTextureAccess::WriteOnly),
        (_, Access::ReadWrite) => {
            bgl_storage_texture(binding, wgpu::StorageTextureAccess::ReadWrite)
        }
    }
}

// ======================== Helpers ========================

fn load_shader(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn create_compute_pipeline(
    device: &wgpu::Device,
    name: &str,
    bgl: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name}_pipeline_layout")),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{name}_pipeline")),
        layout: Some(&layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}

fn bgl_uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(super) fn bgl_texture(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn bgl_storage_texture(
    binding: u32,
    access: wgpu::StorageTextureAccess,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access,
            format: CANVAS_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

/// Texture usable as both compute input and compute output, never mapped.
pub fn create_storage_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    extra_usage: wgpu::TextureUsages,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: CANVAS_FORMAT,
        usage: wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::TEXTURE_BINDING
            | extra_usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
