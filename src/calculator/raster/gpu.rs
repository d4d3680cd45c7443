//! wgpu fragment counter.
//!
//! Each pass renders into an `Rgba8Unorm` target with a `Depth32Float`
//! buffer and copies the pixels to a mappable buffer. Channels:
//!
//! - red: target coverage (depth-writing pass);
//! - blue: an opaque blocker in front of the target;
//! - green: `1/255` per terrain wall in front of the target, summed by
//!   additive blending.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::{ClipTriangle, PixelCounts, RasterFrame};
use crate::{error::SightlineError, options::clamp_resolution};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const TARGET_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const OPAQUE_COLOR: [f32; 4] = [0.0, 0.0, 1.0, 0.0];
const TERRAIN_COLOR: [f32; 4] = [0.0, 1.0 / 255.0, 0.0, 0.0];

/// Errors from GPU context initialization.
#[derive(Debug)]
pub enum GpuContextError {
    /// No suitable GPU adapter found.
    AdapterRequest(wgpu::RequestAdapterError),
    /// Failed to create the logical device.
    DeviceRequest(wgpu::RequestDeviceError),
}

impl fmt::Display for GpuContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdapterRequest(e) => write!(f, "adapter request failed: {e}"),
            Self::DeviceRequest(e) => write!(f, "device request failed: {e}"),
        }
    }
}

impl std::error::Error for GpuContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AdapterRequest(e) => Some(e),
            Self::DeviceRequest(e) => Some(e),
        }
    }
}

/// A device and queue shared by every GPU rasterizer.
pub struct GpuContext {
    /// Logical device.
    pub device: wgpu::Device,
    /// Submission queue.
    pub queue: wgpu::Queue,
}

impl fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuContext").finish_non_exhaustive()
    }
}

impl GpuContext {
    /// Headless context on the default adapter.
    ///
    /// # Errors
    ///
    /// [`GpuContextError`] if no adapter or device is available.
    pub async fn new() -> Result<Self, GpuContextError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                ..Default::default()
            })
            .await
            .map_err(GpuContextError::AdapterRequest)?;
        log::info!("sightline GPU adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Sightline Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(GpuContextError::DeviceRequest)?;
        Ok(Self { device, queue })
    }

    /// Wrap a device the host application already owns.
    #[must_use]
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CountVertex {
    position: [f32; 4],
    color: [f32; 4],
}

impl CountVertex {
    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x4,
                    offset: 0,
                    shader_location: 0,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x4,
                    offset: 16,
                    shader_location: 1,
                },
            ],
        }
    }
}

fn push_triangles(out: &mut Vec<CountVertex>, triangles: &[ClipTriangle], color: [f32; 4]) {
    for tri in triangles {
        for p in tri.positions {
            out.push(CountVertex {
                position: p.as_vec4().to_array(),
                color,
            });
        }
    }
}

/// Render targets and readback buffers at one resolution.
struct Targets {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    /// Reference, cell and main readbacks.
    readback: [wgpu::Buffer; 3],
}

#[derive(Clone, Copy)]
enum Pass {
    Reference = 0,
    Cell = 1,
    Main = 2,
}

/// Counts target fragments on the GPU.
pub struct GpuRasterizer {
    context: Arc<GpuContext>,
    size: u32,
    target_pipeline: wgpu::RenderPipeline,
    blocker_pipeline: wgpu::RenderPipeline,
    targets: Option<Targets>,
}

impl fmt::Debug for GpuRasterizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuRasterizer")
            .field("size", &self.size)
            .field("allocated", &self.targets.is_some())
            .finish_non_exhaustive()
    }
}

impl GpuRasterizer {
    /// Rasterizer with a `size`² target on `context`'s device, clamped to the
    /// accepted resolution range.
    #[must_use]
    pub fn new(context: Arc<GpuContext>, size: u32) -> Self {
        let device = &context.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Occlusion Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("occlusion.wgsl").into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Occlusion Pipeline Layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });
        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };
        let target_pipeline =
            create_pipeline(device, &layout, &shader, "Target Pipeline", true, None);
        let blocker_pipeline = create_pipeline(
            device,
            &layout,
            &shader,
            "Blocker Pipeline",
            false,
            Some(wgpu::BlendState {
                color: additive,
                alpha: additive,
            }),
        );
        Self {
            context,
            size: clamp_resolution(size),
            target_pipeline,
            blocker_pipeline,
            targets: None,
        }
    }

    /// Target size along each axis.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Drop the render targets.
    pub fn release(&mut self) {
        self.targets = None;
    }

    /// Render and count, blocking on the readback.
    ///
    /// # Errors
    ///
    /// [`SightlineError::Readback`] if a buffer cannot be mapped.
    pub fn count(&mut self, frame: &RasterFrame<'_>) -> Result<PixelCounts, SightlineError> {
        let pending = self.submit(frame);
        let device = &self.context.device;
        while !pending.settled() {
            let _ = device
                .poll(wgpu::PollType::Wait {
                    submission_index: None,
                    timeout: None,
                })
                .map_err(|e| SightlineError::Readback(e.to_string()))?;
        }
        self.finish(frame, &pending)
    }

    /// Render and count, yielding to the executor between device polls.
    ///
    /// # Errors
    ///
    /// See [`Self::count`].
    pub async fn count_async(
        &mut self,
        frame: &RasterFrame<'_>,
    ) -> Result<PixelCounts, SightlineError> {
        let pending = self.submit(frame);
        while !pending.settled() {
            let _ = self
                .context
                .device
                .poll(wgpu::PollType::Poll)
                .map_err(|e| SightlineError::Readback(e.to_string()))?;
            if !pending.settled() {
                YieldNow(false).await;
            }
        }
        self.finish(frame, &pending)
    }

    /// Encode all passes, submit, and request the buffer maps.
    fn submit(&mut self, frame: &RasterFrame<'_>) -> PendingReadback {
        let size = self.size;
        let device = &self.context.device;
        if self.targets.is_none() {
            self.targets = Some(create_targets(device, size));
        }
        let Some(targets) = self.targets.as_ref() else {
            return PendingReadback::default();
        };
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Occlusion Encoder"),
        });

        let mut target_vertices = Vec::new();
        push_triangles(&mut target_vertices, &frame.reference, TARGET_COLOR);
        self.encode_pass(&mut encoder, targets, &target_vertices, &[]);
        copy_to_readback(&mut encoder, targets, Pass::Reference, size);

        if let Some(cell) = &frame.cell {
            target_vertices.clear();
            push_triangles(&mut target_vertices, cell, TARGET_COLOR);
            self.encode_pass(&mut encoder, targets, &target_vertices, &[]);
            copy_to_readback(&mut encoder, targets, Pass::Cell, size);
        }

        target_vertices.clear();
        push_triangles(&mut target_vertices, &frame.target, TARGET_COLOR);
        let mut blocker_vertices = Vec::new();
        for layer in &frame.opaque {
            push_triangles(&mut blocker_vertices, &layer.triangles, OPAQUE_COLOR);
        }
        for wall in &frame.terrain {
            push_triangles(&mut blocker_vertices, wall, TERRAIN_COLOR);
        }
        self.encode_pass(&mut encoder, targets, &target_vertices, &blocker_vertices);
        copy_to_readback(&mut encoder, targets, Pass::Main, size);

        let _ = self.context.queue.submit(std::iter::once(encoder.finish()));

        let pending = PendingReadback::default();
        let passes: &[Pass] = if frame.cell.is_some() {
            &[Pass::Reference, Pass::Cell, Pass::Main]
        } else {
            &[Pass::Reference, Pass::Main]
        };
        pending.expected.store(passes.len() as u8, Ordering::SeqCst);
        for &pass in passes {
            let done = Arc::clone(&pending.done);
            let failed = Arc::clone(&pending.failed);
            targets.readback[pass as usize]
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |result| {
                    if result.is_err() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    let _ = done.fetch_add(1, Ordering::SeqCst);
                });
        }
        pending
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &Targets,
        target: &[CountVertex],
        blockers: &[CountVertex],
    ) {
        let device = &self.context.device;
        let target_buffer = vertex_buffer(device, "Target Vertices", target);
        let blocker_buffer = vertex_buffer(device, "Blocker Vertices", blockers);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Occlusion Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &targets.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.0,
                        g: 0.0,
                        b: 0.0,
                        a: 0.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &targets.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        if let Some(buffer) = &target_buffer {
            pass.set_pipeline(&self.target_pipeline);
            pass.set_vertex_buffer(0, buffer.slice(..));
            pass.draw(0..target.len() as u32, 0..1);
        }
        if let Some(buffer) = &blocker_buffer {
            pass.set_pipeline(&self.blocker_pipeline);
            pass.set_vertex_buffer(0, buffer.slice(..));
            pass.draw(0..blockers.len() as u32, 0..1);
        }
    }

    /// Count pixels from the mapped buffers and unmap them.
    fn finish(
        &self,
        frame: &RasterFrame<'_>,
        pending: &PendingReadback,
    ) -> Result<PixelCounts, SightlineError> {
        let Some(targets) = self.targets.as_ref() else {
            return Err(SightlineError::Readback("render targets were released".to_owned()));
        };
        let mapped: &[Pass] = if frame.cell.is_some() {
            &[Pass::Reference, Pass::Cell, Pass::Main]
        } else {
            &[Pass::Reference, Pass::Main]
        };
        if pending.failed.load(Ordering::SeqCst) {
            for &pass in mapped {
                targets.readback[pass as usize].unmap();
            }
            return Err(SightlineError::Readback("buffer map failed".to_owned()));
        }

        let row = padded_row_bytes(self.size) as usize;
        let width = self.size as usize;
        let read = |pass: Pass, keep: fn([u8; 4]) -> bool| -> u32 {
            let buffer = &targets.readback[pass as usize];
            let data = buffer.slice(..).get_mapped_range();
            let count = data
                .chunks_exact(row)
                .flat_map(|line| line[..width * 4].chunks_exact(4))
                .filter(|px| keep([px[0], px[1], px[2], px[3]]))
                .count();
            drop(data);
            buffer.unmap();
            u32::try_from(count).unwrap_or(u32::MAX)
        };
        let covered = |px: [u8; 4]| px[0] > 127;
        let unblocked = |px: [u8; 4]| px[0] > 127 && px[2] == 0 && px[1] < 2;

        let reference = read(Pass::Reference, covered);
        let cell = frame.cell.is_some().then(|| read(Pass::Cell, covered));
        let visible = read(Pass::Main, unblocked);
        Ok(PixelCounts {
            reference,
            cell,
            visible,
        })
    }
}

/// Map requests in flight.
#[derive(Default)]
struct PendingReadback {
    expected: AtomicU8,
    done: Arc<AtomicU8>,
    failed: Arc<AtomicBool>,
}

impl PendingReadback {
    fn settled(&self) -> bool {
        self.done.load(Ordering::SeqCst) >= self.expected.load(Ordering::SeqCst)
    }
}

/// Returns `Pending` once, waking itself.
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    label: &str,
    depth_write: bool,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[CountVertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_targets(device: &wgpu::Device, size: u32) -> Targets {
    let extent = wgpu::Extent3d {
        width: size,
        height: size,
        depth_or_array_layers: 1,
    };
    let texture = |label, format, usage| {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        })
    };
    let color = texture(
        "Occlusion Color",
        COLOR_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
    );
    let depth = texture("Occlusion Depth", DEPTH_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT);
    let buffer_size = u64::from(padded_row_bytes(size)) * u64::from(size);
    let readback = ["Reference Readback", "Cell Readback", "Main Readback"].map(|label| {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        })
    });
    Targets {
        color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
        depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
        color,
        readback,
    }
}

fn vertex_buffer(
    device: &wgpu::Device,
    label: &str,
    vertices: &[CountVertex],
) -> Option<wgpu::Buffer> {
    (!vertices.is_empty()).then(|| {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        })
    })
}

fn copy_to_readback(encoder: &mut wgpu::CommandEncoder, targets: &Targets, pass: Pass, size: u32) {
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &targets.color,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &targets.readback[pass as usize],
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row_bytes(size)),
                rows_per_image: Some(size),
            },
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
    );
}

/// Row stride rounded up to the copy alignment.
fn padded_row_bytes(size: u32) -> u32 {
    let unpadded = size.saturating_mul(4);
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_pad_to_copy_alignment() {
        assert_eq!(padded_row_bytes(1), 256);
        assert_eq!(padded_row_bytes(64), 256);
        assert_eq!(padded_row_bytes(65), 512);
    }

    #[test]
    fn yield_now_completes_on_second_poll() {
        pollster::block_on(YieldNow(false));
    }
}
