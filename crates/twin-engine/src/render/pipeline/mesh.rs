use std::num::NonZeroU64;

use crate::render::{DrawUniforms, FrameUniforms};
use crate::scene::SkinnedVertex;

/// Color format of eye targets.
pub(crate) const EYE_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// Depth format of eye targets.
pub(crate) const EYE_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// One draw with every handle resolved to its wgpu object.
pub(crate) struct MeshDraw<'a> {
    pub vertex: &'a wgpu::Buffer,
    pub index: &'a wgpu::Buffer,
    pub texture: &'a wgpu::BindGroup,
    pub base_index: u32,
    pub index_count: u32,
    pub base_vertex: i32,
    pub uniforms: &'a DrawUniforms,
}

/// Forward Phong pipeline for [`SkinnedVertex`] geometry.
///
/// Bind groups:
/// - 0: [`FrameUniforms`], written once per eye pass;
/// - 1: [`DrawUniforms`], one 256-aligned slot per draw, dynamic offset;
/// - 2: base texture + sampler, owned by the texture.
pub(crate) struct MeshPipeline {
    frame_layout: wgpu::BindGroupLayout,
    draw_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,

    pipeline: Option<wgpu::RenderPipeline>,

    frame_ubo: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,

    draw_ubo: Option<wgpu::Buffer>,
    draw_bind_group: Option<wgpu::BindGroup>,
    draw_capacity: usize,
    draw_stride: u64,

    staging: Vec<u8>,
}

impl MeshPipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("twin mesh frame bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(size_of::<FrameUniforms>() as u64),
                },
                count: None,
            }],
        });

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("twin mesh draw bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(size_of::<DrawUniforms>() as u64),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("twin mesh texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let frame_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("twin mesh frame ubo"),
            size: size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("twin mesh frame bind group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_ubo.as_entire_binding(),
            }],
        });

        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment).max(1);
        let draw_stride = (size_of::<DrawUniforms>() as u64).div_ceil(alignment) * alignment;

        Self {
            frame_layout,
            draw_layout,
            texture_layout,
            pipeline: None,
            frame_ubo,
            frame_bind_group,
            draw_ubo: None,
            draw_bind_group: None,
            draw_capacity: 0,
            draw_stride,
            staging: Vec::new(),
        }
    }

    /// Builds the group 2 bind group of a texture.
    pub fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        label: &str,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    /// Clears the eye target and draws `draws` into it.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear: [f32; 4],
        frame: &FrameUniforms,
        draws: &[MeshDraw<'_>],
    ) {
        self.ensure_pipeline(device);
        self.ensure_draw_capacity(device, draws.len());

        queue.write_buffer(&self.frame_ubo, 0, bytemuck::bytes_of(frame));

        let stride = self.draw_stride as usize;
        self.staging.clear();
        self.staging.resize(stride * draws.len(), 0);
        for (i, draw) in draws.iter().enumerate() {
            let bytes = bytemuck::bytes_of(draw.uniforms);
            self.staging[i * stride..i * stride + bytes.len()].copy_from_slice(bytes);
        }
        if let Some(ubo) = self.draw_ubo.as_ref() {
            if !self.staging.is_empty() {
                queue.write_buffer(ubo, 0, &self.staging);
            }
        }

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("twin eye pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(clear[0]),
                        g: f64::from(clear[1]),
                        b: f64::from(clear[2]),
                        a: f64::from(clear[3]),
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        if draws.is_empty() {
            return;
        }
        let Some(pipeline) = self.pipeline.as_ref() else { return };
        let Some(draw_bind_group) = self.draw_bind_group.as_ref() else { return };

        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &self.frame_bind_group, &[]);

        for (i, draw) in draws.iter().enumerate() {
            let offset = (i as u64 * self.draw_stride) as u32;
            rpass.set_bind_group(1, draw_bind_group, &[offset]);
            rpass.set_bind_group(2, draw.texture, &[]);
            rpass.set_vertex_buffer(0, draw.vertex.slice(..));
            rpass.set_index_buffer(draw.index.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(
                draw.base_index..draw.base_index + draw.index_count,
                draw.base_vertex,
                0..1,
            );
        }
    }

    // ── private helpers ────────────────────────────────────────────────────

    fn ensure_pipeline(&mut self, device: &wgpu::Device) {
        if self.pipeline.is_some() {
            return;
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("twin mesh shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/mesh.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("twin mesh pipeline layout"),
            bind_group_layouts: &[&self.frame_layout, &self.draw_layout, &self.texture_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("twin mesh pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: EYE_COLOR_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: EYE_DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("mesh pipeline created");
        self.pipeline = Some(pipeline);
    }

    fn ensure_draw_capacity(&mut self, device: &wgpu::Device, required: usize) {
        if required <= self.draw_capacity && self.draw_ubo.is_some() {
            return;
        }
        let new_cap = required.next_power_of_two().max(16);
        let ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("twin mesh draw ubo"),
            size: new_cap as u64 * self.draw_stride,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("twin mesh draw bind group"),
            layout: &self.draw_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &ubo,
                    offset: 0,
                    size: NonZeroU64::new(size_of::<DrawUniforms>() as u64),
                }),
            }],
        });
        log::trace!("mesh draw ubo grown to {new_cap} slots");
        self.draw_ubo = Some(ubo);
        self.draw_bind_group = Some(bind_group);
        self.draw_capacity = new_cap;
    }
}

// ── GPU types ─────────────────────────────────────────────────────────────

/// Vertex layout of [`SkinnedVertex`] (64 bytes):
///
///  offset  0  position  [f32; 3]  loc 0
///  offset 12  uv        [f32; 2]  loc 1
///  offset 20  normal    [f32; 3]  loc 2
///  offset 32  bone_ids  [u32; 4]  loc 3
///  offset 48  weights   [f32; 4]  loc 4
const VERTEX_ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x2,
    2 => Float32x3,
    3 => Uint32x4,
    4 => Float32x4,
];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: size_of::<SkinnedVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRS,
    }
}
