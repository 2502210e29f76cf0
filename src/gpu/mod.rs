//! Surface, device and the per-frame GPU work.
//!
//! The CPU strategies upload positions into a single vertex buffer each
//! frame. The GPU strategy keeps its particles in a [`FeedbackKernel`] and
//! records the integration dispatch into the same encoder as the draw, so
//! one submission advances and presents a frame.

mod camera;
mod feedback;
#[cfg(feature = "egui")]
mod panel;
mod render;

use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

pub use camera::{Camera, FAR_CPU, FAR_GPU};
pub use feedback::{FeedbackKernel, KernelParams, KERNEL_SOURCE, WORKGROUP_SIZE};
#[cfg(feature = "egui")]
pub use panel::ParameterPanel;
pub use render::{ParticleRenderer, RenderUniforms, RENDER_SOURCE};

use crate::error::GpuError;
use crate::params::{Parameters, Strategy};
use crate::particles::ParticleSet;
use crate::simulation::FrameInput;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.02,
    a: 1.0,
};

/// Something drawn on top of the particles in the same frame.
pub trait Overlay {
    /// Upload textures and vertex data. Returned command buffers are
    /// submitted ahead of the frame encoder.
    fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        size: [u32; 2],
    ) -> Vec<wgpu::CommandBuffer>;

    fn paint(&self, pass: &mut wgpu::RenderPass<'static>);

    /// Called after the frame has been submitted.
    fn finish(&mut self);
}

/// Where the renderer finds positions.
enum ParticleSource {
    /// Written from the CPU every frame.
    Uploaded { buffer: wgpu::Buffer, count: u32 },
    /// Advanced in place by the compute kernel.
    Kernel(FeedbackKernel),
}

pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    renderer: ParticleRenderer,
    source: ParticleSource,
    pub camera: Camera,
}

impl GpuState {
    pub async fn new(
        window: Arc<Window>,
        strategy: Strategy,
        initial: &ParticleSet,
    ) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| {
                GpuError::SurfaceConfiguration(format!(
                    "adapter {:?} reports no formats for this surface",
                    adapter.get_info().name
                ))
            })?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = ParticleRenderer::new(&device, config.format).await?;

        let (source, camera) = match strategy {
            Strategy::Gpu => (
                ParticleSource::Kernel(FeedbackKernel::new(&device, initial).await?),
                Camera::new(FAR_GPU),
            ),
            _ => (
                ParticleSource::Uploaded {
                    buffer: particle_buffer(&device, "Particle Buffer", initial.positions()),
                    count: initial.len() as u32,
                },
                Camera::new(FAR_CPU),
            ),
        };

        Ok(Self {
            surface,
            device,
            queue,
            config,
            renderer,
            source,
            camera,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Number of particles currently drawn.
    pub fn count(&self) -> u32 {
        match &self.source {
            ParticleSource::Uploaded { count, .. } => *count,
            ParticleSource::Kernel(kernel) => kernel.count(),
        }
    }

    /// Replace the GPU-side particles with `set`.
    ///
    /// For the kernel this releases both slots and starts over from `set`.
    pub fn reset(&mut self, set: &ParticleSet) {
        if let ParticleSource::Kernel(kernel) = &mut self.source {
            kernel.reset(&self.device, set);
        } else {
            self.upload(set);
        }
    }

    /// Copy CPU positions into the vertex buffer, growing it when needed.
    ///
    /// Does nothing for the kernel, whose positions never leave the GPU.
    pub fn upload(&mut self, set: &ParticleSet) {
        let ParticleSource::Uploaded { buffer, count } = &mut self.source else {
            return;
        };
        let bytes: &[u8] = bytemuck::cast_slice(set.positions());
        if set.len() as u32 != *count || bytes.len() as u64 > buffer.size() {
            buffer.destroy();
            *buffer = particle_buffer(&self.device, "Particle Buffer", set.positions());
            *count = set.len() as u32;
        } else if !bytes.is_empty() {
            self.queue.write_buffer(buffer, 0, bytes);
        }
    }

    /// Record and present one frame.
    ///
    /// With `frame` set and the kernel strategy active, the integration
    /// dispatch is recorded first, so the draw sees the slot it just wrote.
    pub fn render(
        &mut self,
        frame: Option<&FrameInput>,
        params: &Parameters,
        overlay: Option<&mut dyn Overlay>,
    ) -> Result<(), wgpu::SurfaceError> {
        let viewport = [self.config.width, self.config.height];
        let aspect = viewport[0] as f32 / viewport[1] as f32;
        self.renderer.update(
            &self.queue,
            &RenderUniforms::new(self.camera.view_proj(aspect), params, viewport),
        );

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        if let (Some(frame), ParticleSource::Kernel(kernel)) = (frame, &mut self.source) {
            kernel.dispatch(&self.queue, &mut encoder, frame);
        }

        let (positions, count) = match &self.source {
            ParticleSource::Uploaded { buffer, count } => (buffer, *count),
            ParticleSource::Kernel(kernel) => (kernel.current_positions(), kernel.count()),
        };

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Particle Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer.draw(&mut render_pass, positions, count);
        }

        let mut command_buffers = Vec::new();
        let mut overlay = overlay;
        if let Some(overlay) = overlay.as_deref_mut() {
            command_buffers = overlay.prepare(&self.device, &self.queue, &mut encoder, viewport);

            let mut overlay_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Overlay Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();
            overlay.paint(&mut overlay_pass);
        }

        command_buffers.push(encoder.finish());
        self.queue.submit(command_buffers);
        output.present();

        if let Some(overlay) = overlay {
            overlay.finish();
        }

        Ok(())
    }
}

/// Run `build` inside a validation error scope.
///
/// Shader modules and pipelines created by `build` that fail validation come
/// back as [`GpuError::ShaderCompilation`] instead of reaching the device's
/// uncaptured error handler.
pub(crate) async fn compile_shader<T>(
    device: &wgpu::Device,
    build: impl FnOnce() -> T,
) -> Result<T, GpuError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let built = build();
    match device.pop_error_scope().await {
        Some(error) => Err(GpuError::ShaderCompilation(error.to_string())),
        None => Ok(built),
    }
}

/// Flat `f32` particle storage usable as vertex input, compute storage and
/// a copy source for read-back.
pub(crate) fn particle_buffer(device: &wgpu::Device, label: &str, data: &[f32]) -> wgpu::Buffer {
    let usage = wgpu::BufferUsages::VERTEX
        | wgpu::BufferUsages::STORAGE
        | wgpu::BufferUsages::COPY_DST
        | wgpu::BufferUsages::COPY_SRC;

    if data.is_empty() {
        // Zero-sized storage bindings are invalid.
        return device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: 3 * std::mem::size_of::<f32>() as wgpu::BufferAddress,
            usage,
            mapped_at_creation: false,
        });
    }

    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage,
    })
}
