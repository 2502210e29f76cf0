//! The single-step kernel on the GPU, ping-ponging two buffer pairs.
//!
//! Each slot holds a position and a velocity storage buffer laid out exactly
//! like [`ParticleSet`] (flat `f32`, three per particle). Bind group `i` reads
//! slot `i` and writes the other one, so a dispatch followed by
//! [`DoubleBuffer::swap`] leaves the freshly written slot current. Nothing is
//! copied between frames.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::{compile_shader, particle_buffer};
use crate::error::GpuError;
use crate::particles::{DoubleBuffer, ParticleSet, Slot};
use crate::simulation::FrameInput;

pub const KERNEL_SOURCE: &str = include_str!("integrate.wgsl");
pub const WORKGROUP_SIZE: u32 = 256;

/// Uniform block of `integrate.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct KernelParams {
    pub sigma: f32,
    pub rho: f32,
    pub beta: f32,
    pub dt: f32,
    pub mouse: [f32; 2],
    pub mouse_force: f32,
    /// World units, already scaled by the half-extent.
    pub mouse_radius: f32,
    pub damping: f32,
    pub bounds: f32,
    pub reseed_extent: f32,
    pub frame: u32,
    pub count: u32,
    pub _padding: [u32; 3],
}

impl KernelParams {
    pub fn new(frame: &FrameInput, count: u32) -> Self {
        let params = &frame.params;
        Self {
            sigma: params.sigma,
            rho: params.rho,
            beta: params.beta,
            dt: params.dt,
            mouse: frame.mouse.to_array(),
            mouse_force: params.mouse_force,
            mouse_radius: frame.mouse_radius(),
            damping: params.damping,
            bounds: frame.bounds.half_extent,
            reseed_extent: frame.bounds.reseed_extent,
            frame: frame.frame as u32,
            count,
            _padding: [0; 3],
        }
    }
}

/// Position and velocity storage for one slot.
pub struct GpuParticleBuffers {
    pub position: wgpu::Buffer,
    pub velocity: wgpu::Buffer,
}

impl GpuParticleBuffers {
    fn new(device: &wgpu::Device, set: &ParticleSet, slot: Slot) -> Self {
        let name = match slot {
            Slot::A => "A",
            Slot::B => "B",
        };
        Self {
            position: particle_buffer(device, &format!("Position Buffer {name}"), set.positions()),
            velocity: particle_buffer(device, &format!("Velocity Buffer {name}"), set.velocities()),
        }
    }

    fn destroy(&self) {
        self.position.destroy();
        self.velocity.destroy();
    }
}

pub struct FeedbackKernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    buffers: DoubleBuffer<GpuParticleBuffers>,
    /// Indexed by the slot being read.
    bind_groups: [wgpu::BindGroup; 2],
    count: u32,
}

impl FeedbackKernel {
    pub async fn new(device: &wgpu::Device, initial: &ParticleSet) -> Result<Self, GpuError> {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Kernel Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, false),
                storage_entry(3, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Kernel Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = compile_shader(device, || {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Kernel Shader"),
                source: wgpu::ShaderSource::Wgsl(KERNEL_SOURCE.into()),
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Kernel Pipeline"),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        })
        .await?;

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Kernel Params"),
            contents: bytemuck::bytes_of(&KernelParams::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let buffers = DoubleBuffer::new(
            GpuParticleBuffers::new(device, initial, Slot::A),
            GpuParticleBuffers::new(device, initial, Slot::B),
        );
        let bind_groups = create_bind_groups(device, &layout, &params_buffer, &buffers);

        Ok(Self {
            pipeline,
            layout,
            params_buffer,
            buffers,
            bind_groups,
            count: initial.len() as u32,
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn current_slot(&self) -> Slot {
        self.buffers.current_slot()
    }

    /// Positions written by the last dispatch (or the initial state).
    pub fn current_positions(&self) -> &wgpu::Buffer {
        &self.buffers.current().position
    }

    /// Release both slots and allocate new ones holding `initial`.
    ///
    /// Must not be called between `dispatch` and the submit that carries it.
    pub fn reset(&mut self, device: &wgpu::Device, initial: &ParticleSet) {
        for slot in self.buffers.slots_mut() {
            slot.destroy();
        }
        self.buffers.replace(
            GpuParticleBuffers::new(device, initial, Slot::A),
            GpuParticleBuffers::new(device, initial, Slot::B),
        );
        self.bind_groups =
            create_bind_groups(device, &self.layout, &self.params_buffer, &self.buffers);
        self.count = initial.len() as u32;
    }

    /// Record one integration pass into `encoder`, then swap.
    pub fn dispatch(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        frame: &FrameInput,
    ) {
        if self.count == 0 {
            return;
        }
        let params = KernelParams::new(frame, self.count);
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Kernel Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_groups[self.buffers.current_slot().index()], &[]);
            pass.dispatch_workgroups(self.count.div_ceil(WORKGROUP_SIZE), 1, 1);
        }

        self.buffers.swap();
    }

    /// Copy the current slot back to the CPU. Blocks until the GPU is idle.
    pub fn read_current(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<ParticleSet, GpuError> {
        let current = self.buffers.current();
        let len = self.count as usize * 3;
        let positions = read_buffer(device, queue, &current.position, len)?;
        let velocities = read_buffer(device, queue, &current.velocity, len)?;

        let mut set = ParticleSet::zeroed(self.count as usize);
        let (pos, vel) = set.arrays_mut();
        pos.copy_from_slice(&positions);
        vel.copy_from_slice(&velocities);
        Ok(set)
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
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

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_bind_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    params: &wgpu::Buffer,
    buffers: &DoubleBuffer<GpuParticleBuffers>,
) -> [wgpu::BindGroup; 2] {
    [Slot::A, Slot::B].map(|read| {
        let src = buffers.slot(read);
        let dst = buffers.slot(read.other());
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(match read {
                Slot::A => "Kernel Bind Group A->B",
                Slot::B => "Kernel Bind Group B->A",
            }),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: src.position.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: dst.position.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: dst.velocity.as_entire_binding(),
                },
            ],
        })
    })
}

fn read_buffer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &wgpu::Buffer,
    len: usize,
) -> Result<Vec<f32>, GpuError> {
    let size = (len * std::mem::size_of::<f32>()) as wgpu::BufferAddress;
    if size == 0 {
        return Ok(Vec::new());
    }

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    rx.recv()
        .map_err(|e| GpuError::BufferMapping(e.to_string()))?
        .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

    let data = {
        let view = slice.get_mapped_range();
        bytemuck::cast_slice::<u8, f32>(&view[..]).to_vec()
    };
    staging.unmap();
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::Bounds;
    use crate::params::Parameters;
    use glam::Vec2;

    #[test]
    fn test_params_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<KernelParams>(), 64);
        assert_eq!(std::mem::offset_of!(KernelParams, mouse), 16);
        assert_eq!(std::mem::offset_of!(KernelParams, mouse_force), 24);
        assert_eq!(std::mem::offset_of!(KernelParams, bounds), 36);
        assert_eq!(std::mem::offset_of!(KernelParams, frame), 44);
        assert_eq!(std::mem::offset_of!(KernelParams, count), 48);
    }

    #[test]
    fn test_params_scale_radius_to_world() {
        let frame = FrameInput {
            params: Parameters {
                mouse_radius: 0.5,
                ..Parameters::default()
            },
            mouse: Vec2::new(3.0, -4.0),
            bounds: Bounds::default(),
            frame: 7,
        };
        let params = KernelParams::new(&frame, 100);
        assert_eq!(params.mouse_radius, 25.0);
        assert_eq!(params.mouse, [3.0, -4.0]);
        assert_eq!(params.bounds, 50.0);
        assert_eq!(params.frame, 7);
        assert_eq!(params.count, 100);
    }
}
