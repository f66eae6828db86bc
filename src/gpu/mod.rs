// ============================================================================
// gpu/mod.rs — Shapemorph
// wgpu implementation of the compute backend: canvas and backing textures,
// per-dispatch bind groups, single-encoder submission and presentation.
// ============================================================================

mod context;
mod layout;
mod present;
mod readback;

use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::{Binding, CommandSequence, ComputeBackend, Extent, PassProgram, TileSize};
use crate::error::{FrameError, SetupError};
use crate::uniforms::ShapeUniforms;

pub use layout::ComputeProgram;
use layout::{create_program, create_storage_texture, CANVAS_FORMAT};
use present::PresentBlit;

// ======================== Resources ========================

/// The image the compute passes draw into. Recreated with the drawable size.
struct Canvas {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    extent: Extent,
}

impl Canvas {
    fn new(device: &wgpu::Device, extent: Extent) -> Self {
        let (texture, view) = create_storage_texture(
            device,
            "canvas",
            extent.width,
            extent.height,
            wgpu::TextureUsages::COPY_SRC,
        );
        Self {
            texture,
            view,
            extent,
        }
    }
}

/// Backing texture handed out to the backing-surface manager.
pub struct GpuSurface {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub enum Drawable {
    Window {
        frame: wgpu::SurfaceTexture,
        extent: Extent,
    },
    Offscreen {
        extent: Extent,
    },
}

enum Target {
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        blit: PresentBlit,
    },
    Offscreen,
}

// ======================== Backend ========================

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: Target,
    canvas: Canvas,
    uniform_buffer: wgpu::Buffer,
}

impl WgpuBackend {
    /// Bring up a device that presents into `window`.
    pub fn for_window(window: Arc<Window>, vsync: bool) -> Result<Self, SetupError> {
        let size = window.inner_size();
        let extent = Extent::new(size.width.max(1), size.height.max(1));

        let instance = context::create_instance();
        let surface = instance
            .create_surface(window)
            .map_err(|e| SetupError::CreateSurface(e.to_string()))?;
        let (adapter, device, queue) =
            pollster::block_on(context::init_device(&instance, Some(&surface)))?;

        let config = context::surface_config(&surface, &adapter, extent, vsync)?;
        surface.configure(&device, &config);

        let canvas = Canvas::new(&device, extent);
        let mut blit = PresentBlit::new(&device, config.format);
        blit.rebind(&device, &canvas.view);

        Ok(Self::assemble(
            device,
            queue,
            Target::Window {
                surface,
                config,
                blit,
            },
            canvas,
        ))
    }

    /// Bring up a device with no presentation surface.
    pub fn offscreen(extent: Extent) -> Result<Self, SetupError> {
        let instance = context::create_instance();
        let (_adapter, device, queue) = pollster::block_on(context::init_device(&instance, None))?;
        let canvas = Canvas::new(&device, extent);
        Ok(Self::assemble(device, queue, Target::Offscreen, canvas))
    }

    fn assemble(device: wgpu::Device, queue: wgpu::Queue, target: Target, canvas: Canvas) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("shape_uniforms"),
            contents: bytemuck::bytes_of(&<ShapeUniforms as bytemuck::Zeroable>::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            device,
            queue,
            target,
            canvas,
            uniform_buffer,
        }
    }

    fn reconfigure_surface(&self) {
        if let Target::Window {
            surface, config, ..
        } = &self.target
        {
            surface.configure(&self.device, config);
        }
    }

    fn bind_group(&self, program: &ComputeProgram, backing: &GpuSurface) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = program
            .program
            .slots()
            .iter()
            .enumerate()
            .map(|(index, slot)| wgpu::BindGroupEntry {
                binding: index as u32,
                resource: match slot.binding {
                    Binding::Uniforms => self.uniform_buffer.as_entire_binding(),
                    Binding::Drawable => wgpu::BindingResource::TextureView(&self.canvas.view),
                    Binding::Backing => wgpu::BindingResource::TextureView(&backing.view),
                },
            })
            .collect();
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_bg", program.program.name())),
            layout: &program.bind_group_layout,
            entries: &entries,
        })
    }
}

impl ComputeBackend for WgpuBackend {
    type Pipeline = ComputeProgram;
    type Surface = GpuSurface;
    type Drawable = Drawable;
    type Format = wgpu::TextureFormat;

    fn create_pipeline(&mut self, program: PassProgram) -> Result<ComputeProgram, SetupError> {
        create_program(&self.device, program)
    }

    fn create_surface(
        &mut self,
        extent: Extent,
        format: wgpu::TextureFormat,
    ) -> Result<GpuSurface, FrameError> {
        if format != CANVAS_FORMAT {
            return Err(FrameError::SurfaceAllocation(format!(
                "{format:?} is not a storage format"
            )));
        }
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let (texture, view) = create_storage_texture(
            &self.device,
            "backing",
            extent.width,
            extent.height,
            wgpu::TextureUsages::empty(),
        );
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(FrameError::SurfaceAllocation(err.to_string()));
        }
        Ok(GpuSurface {
            _texture: texture,
            view,
        })
    }

    fn configure_drawable(&mut self, extent: Extent) {
        // Canvas and surface configuration are always resized together.
        if extent == self.canvas.extent {
            return;
        }
        self.canvas = Canvas::new(&self.device, extent);
        if let Target::Window {
            surface,
            config,
            blit,
        } = &mut self.target
        {
            config.width = extent.width;
            config.height = extent.height;
            surface.configure(&self.device, config);
            blit.rebind(&self.device, &self.canvas.view);
        }
    }

    fn drawable_format(&self) -> wgpu::TextureFormat {
        CANVAS_FORMAT
    }

    fn acquire_drawable(&mut self) -> Result<Drawable, FrameError> {
        let extent = self.canvas.extent;
        let Target::Window { surface, .. } = &self.target else {
            return Ok(Drawable::Offscreen { extent });
        };
        match surface.get_current_texture() {
            Ok(frame) => Ok(Drawable::Window { frame, extent }),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.reconfigure_surface();
                Err(FrameError::SurfaceLost)
            }
            Err(wgpu::SurfaceError::Timeout) => Err(FrameError::SurfaceTimeout),
            Err(wgpu::SurfaceError::OutOfMemory) => Err(FrameError::OutOfMemory),
            Err(e) => Err(FrameError::Surface(format!("{e:?}"))),
        }
    }

    fn drawable_extent(&self, drawable: &Drawable) -> Extent {
        match drawable {
            Drawable::Window { extent, .. } | Drawable::Offscreen { extent } => *extent,
        }
    }

    fn submit_sequence(&mut self, sequence: CommandSequence<'_, Self>) -> Result<(), FrameError> {
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&sequence.uniforms),
        );

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        for dispatch in &sequence.dispatches {
            debug_assert_eq!(dispatch.grid.extent, self.canvas.extent);
            debug_assert_eq!(dispatch.grid.tile, TileSize::DEFAULT, "kernels use 16x16 workgroups");
            let bind_group = self.bind_group(dispatch.pipeline, sequence.backing);
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(dispatch.program.name()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&dispatch.pipeline.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(dispatch.grid.groups_x, dispatch.grid.groups_y, 1);
        }

        let frame = match (sequence.drawable, &self.target) {
            (Drawable::Window { frame, .. }, Target::Window { blit, .. }) => {
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                blit.encode(&mut encoder, &view);
                Some(frame)
            }
            _ => None,
        };

        self.queue.submit(std::iter::once(encoder.finish()));

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            // The swapchain image is dropped unpresented.
            return Err(FrameError::Dispatch(err.to_string()));
        }
        if let Some(frame) = frame {
            frame.present();
        }
        Ok(())
    }
}
