use std::collections::HashMap;

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::render::pipeline::{MeshDraw, MeshPipeline, MirrorPipeline, EYE_COLOR_FORMAT, EYE_DEPTH_FORMAT};
use crate::render::{DrawUniforms, EyeDrawList, FrameUniforms};
use crate::resource::{Bitmap, BufferTarget, BufferUsage, PixelFormat, TextureFilter, TextureWrap};

use super::surface::{self, SurfaceErrorAction};
use super::{AdapterId, BufferSpec, DrawIndexed, EyePass, GpuBackend, GpuError, GpuInit, ResourceHandle, SamplerSpec};

/// Result of [`WgpuBackend::present_mirror`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MirrorOutcome {
    Presented,
    /// No eye image has been committed yet; the window was only cleared.
    Blank,
    Surface(SurfaceErrorAction),
}

struct GpuBuffer {
    label: String,
    target: Option<BufferTarget>,
    buffer: Option<wgpu::Buffer>,
}

struct GpuTexture {
    label: String,
    image: Option<(wgpu::Texture, wgpu::TextureView)>,
    sampler: wgpu::Sampler,
    bind_group: Option<wgpu::BindGroup>,
}

struct EyeTarget {
    color: wgpu::TextureView,
    depth: wgpu::TextureView,
}

struct ActivePass {
    target: ResourceHandle,
    clear: [f32; 4],
    frame: FrameUniforms,
}

/// [`GpuBackend`] on wgpu, bound to the mirror window.
///
/// Handles map to wgpu objects in per-kind tables. Draws recorded during an
/// eye pass are sorted by texture and encoded in one render pass at
/// `end_eye_pass`.
pub struct WgpuBackend<'w> {
    surface: wgpu::Surface<'w>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,

    clamp_to_border: bool,
    next_handle: u64,
    buffers: HashMap<ResourceHandle, GpuBuffer>,
    textures: HashMap<ResourceHandle, GpuTexture>,
    targets: HashMap<ResourceHandle, EyeTarget>,

    bound_vertex: Option<ResourceHandle>,
    bound_index: Option<ResourceHandle>,
    bound_texture: Option<ResourceHandle>,

    pass: Option<ActivePass>,
    list: EyeDrawList,
    mesh: MeshPipeline,
    mirror: MirrorPipeline,
    white: wgpu::BindGroup,
    warned_stray_draw: bool,
}

impl<'w> WgpuBackend<'w> {
    /// Creates the device and the mirror surface for `window`.
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let mirror = &init.mirror;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let features = init.device_features(adapter.features());
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("twin-engine device"),
                required_features: features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&surface_caps, mirror.prefer_srgb)
            .context("no supported surface formats")?;
        let alpha_mode = surface::choose_alpha_mode(&surface_caps, mirror.alpha_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: mirror.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: mirror.frame_latency,
        };
        surface.configure(&device, &config);

        let info = adapter.get_info();
        log::info!(
            "GPU: {} ({:?}, vendor {:04x}, device {:04x}), mirror format {format:?}",
            info.name,
            info.backend,
            info.vendor,
            info.device
        );

        let mesh = MeshPipeline::new(&device);
        let mirror = MirrorPipeline::new(&device);
        let white = white_bind_group(&device, &queue, &mesh);

        Ok(Self {
            surface,
            adapter,
            device,
            queue,
            config,
            size,
            clamp_to_border: features.contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER),
            next_handle: 0,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            targets: HashMap::new(),
            bound_vertex: None,
            bound_index: None,
            bound_texture: None,
            pass: None,
            list: EyeDrawList::new(),
            mesh,
            mirror,
            white,
            warned_stray_draw: false,
        })
    }

    /// Returns the mirror surface format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Returns the current mirror size (physical pixels).
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Reconfigures the mirror surface after a window resize.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        surface::apply_resize(&self.surface, &self.device, &mut self.config, &mut self.size, new_size);
    }

    /// Shows `eyes` (left, right) side by side in the window.
    pub fn present_mirror(&mut self, eyes: Option<[ResourceHandle; 2]>) -> MirrorOutcome {
        if self.size.width == 0 || self.size.height == 0 {
            return MirrorOutcome::Surface(SurfaceErrorAction::SkipFrame);
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err) => {
                let action = surface::classify_surface_error(&err);
                if action == SurfaceErrorAction::Reconfigured {
                    self.surface.configure(&self.device, &self.config);
                }
                log::debug!("mirror surface error: {err} ({action:?})");
                return MirrorOutcome::Surface(action);
            }
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("twin mirror encoder"),
            });

        let images = eyes.and_then(|[left, right]| {
            Some([&self.targets.get(&left)?.color, &self.targets.get(&right)?.color])
        });
        let outcome = match images {
            Some(images) => {
                self.mirror
                    .encode(&self.device, &mut encoder, &view, self.config.format, images);
                MirrorOutcome::Presented
            }
            None => {
                clear_view(&mut encoder, &view);
                MirrorOutcome::Blank
            }
        };

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        outcome
    }

    fn allocate(&mut self) -> ResourceHandle {
        loop {
            self.next_handle = self.next_handle.wrapping_add(1);
            if let Some(handle) = ResourceHandle::from_raw(self.next_handle) {
                return handle;
            }
        }
    }

    fn sampler(&self, label: &str, spec: &SamplerSpec) -> wgpu::Sampler {
        let (filter, mipmap_filter, anisotropy_clamp) = match spec.filter {
            TextureFilter::Nearest => (wgpu::FilterMode::Nearest, wgpu::MipmapFilterMode::Nearest, 1),
            TextureFilter::Linear => (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Nearest, 1),
            TextureFilter::Anisotropic => (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Linear, 16),
        };
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: self.address_mode(spec.wrap_s),
            address_mode_v: self.address_mode(spec.wrap_t),
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter,
            anisotropy_clamp,
            border_color: (self.clamp_to_border && [spec.wrap_s, spec.wrap_t].contains(&TextureWrap::ClampToBorder))
                .then_some(wgpu::SamplerBorderColor::TransparentBlack),
            ..Default::default()
        })
    }

    fn address_mode(&self, wrap: TextureWrap) -> wgpu::AddressMode {
        match wrap {
            TextureWrap::Repeat => wgpu::AddressMode::Repeat,
            TextureWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            TextureWrap::ClampToBorder if self.clamp_to_border => wgpu::AddressMode::ClampToBorder,
            TextureWrap::ClampToBorder => wgpu::AddressMode::ClampToEdge,
        }
    }

    fn rebuild_bind_group(&mut self, handle: ResourceHandle) {
        let Some(texture) = self.textures.get_mut(&handle) else { return };
        texture.bind_group = texture.image.as_ref().map(|(_, view)| {
            self.mesh
                .texture_bind_group(&self.device, &texture.label, view, &texture.sampler)
        });
    }
}

impl GpuBackend for WgpuBackend<'_> {
    fn adapter(&self) -> AdapterId {
        let info = self.adapter.get_info();
        AdapterId {
            vendor: info.vendor,
            device: info.device,
        }
    }

    fn create_buffer(&mut self, label: &str) -> Result<ResourceHandle, GpuError> {
        let handle = self.allocate();
        self.buffers.insert(
            handle,
            GpuBuffer {
                label: label.to_owned(),
                target: None,
                buffer: None,
            },
        );
        Ok(handle)
    }

    fn specify_buffer(&mut self, handle: ResourceHandle, spec: &BufferSpec<'_>) -> Result<(), GpuError> {
        let slot = self
            .buffers
            .get_mut(&handle)
            .ok_or(GpuError::UnknownHandle(handle))?;

        // Copies must be a multiple of four bytes.
        let size = spec.data.len().max(4).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize);
        let mut padded = spec.data.to_vec();
        padded.resize(size, 0);

        let reuse = slot.target == Some(spec.target)
            && spec.usage != BufferUsage::Static
            && slot.buffer.as_ref().is_some_and(|b| b.size() == size as u64);

        if reuse {
            if let Some(buffer) = slot.buffer.as_ref() {
                self.queue.write_buffer(buffer, 0, &padded);
            }
        } else {
            let usage = match spec.target {
                BufferTarget::Vertex => wgpu::BufferUsages::VERTEX,
                BufferTarget::Index => wgpu::BufferUsages::INDEX,
                BufferTarget::Uniform => wgpu::BufferUsages::UNIFORM,
            } | wgpu::BufferUsages::COPY_DST;

            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&slot.label),
                size: size as u64,
                usage,
                mapped_at_creation: false,
            });
            self.queue.write_buffer(&buffer, 0, &padded);
            slot.buffer = Some(buffer);
            slot.target = Some(spec.target);
        }

        log::trace!(
            "buffer '{}' specified: {} bytes, {:?}/{:?}",
            slot.label,
            spec.data.len(),
            spec.target,
            spec.usage
        );
        Ok(())
    }

    fn bind_buffer(&mut self, handle: ResourceHandle, target: BufferTarget) {
        match target {
            BufferTarget::Vertex => self.bound_vertex = Some(handle),
            BufferTarget::Index => self.bound_index = Some(handle),
            BufferTarget::Uniform => {}
        }
    }

    fn destroy_buffer(&mut self, handle: ResourceHandle) {
        if let Some(slot) = self.buffers.remove(&handle) {
            if let Some(buffer) = slot.buffer {
                buffer.destroy();
            }
        }
        if self.bound_vertex == Some(handle) {
            self.bound_vertex = None;
        }
        if self.bound_index == Some(handle) {
            self.bound_index = None;
        }
    }

    fn create_texture(&mut self, label: &str) -> Result<ResourceHandle, GpuError> {
        let handle = self.allocate();
        let sampler = self.sampler(label, &SamplerSpec::default());
        self.textures.insert(
            handle,
            GpuTexture {
                label: label.to_owned(),
                image: None,
                sampler,
                bind_group: None,
            },
        );
        Ok(handle)
    }

    fn upload_texture(&mut self, handle: ResourceHandle, bitmap: &Bitmap) -> Result<(), GpuError> {
        if !self.textures.contains_key(&handle) {
            return Err(GpuError::UnknownHandle(handle));
        }
        if bitmap.width == 0 || bitmap.height == 0 {
            return Err(GpuError::ZeroSize("texture"));
        }
        if bitmap.pixels.len() != bitmap.expected_len() {
            return Err(GpuError::InvalidBitmap {
                width: bitmap.width,
                height: bitmap.height,
                len: bitmap.pixels.len(),
                expected: bitmap.expected_len(),
            });
        }

        let format = match bitmap.format {
            PixelFormat::R8 => wgpu::TextureFormat::R8Unorm,
            PixelFormat::Rg8 => wgpu::TextureFormat::Rg8Unorm,
            PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8UnormSrgb,
        };
        let extent = wgpu::Extent3d {
            width: bitmap.width,
            height: bitmap.height,
            depth_or_array_layers: 1,
        };

        let label = self.textures.get(&handle).map(|t| t.label.clone()).unwrap_or_default();
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bitmap.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bitmap.width * bitmap.format.channels() as u32),
                rows_per_image: Some(bitmap.height),
            },
            extent,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(slot) = self.textures.get_mut(&handle) {
            if let Some((old, _)) = slot.image.replace((texture, view)) {
                old.destroy();
            }
        }
        self.rebuild_bind_group(handle);
        log::trace!("texture '{label}' uploaded: {}x{} {:?}", bitmap.width, bitmap.height, bitmap.format);
        Ok(())
    }

    fn configure_sampler(&mut self, handle: ResourceHandle, sampler: &SamplerSpec) -> Result<(), GpuError> {
        let label = self
            .textures
            .get(&handle)
            .map(|t| t.label.clone())
            .ok_or(GpuError::UnknownHandle(handle))?;
        let sampler = self.sampler(&label, sampler);
        if let Some(slot) = self.textures.get_mut(&handle) {
            slot.sampler = sampler;
        }
        self.rebuild_bind_group(handle);
        Ok(())
    }

    fn bind_texture(&mut self, handle: ResourceHandle, slot: u32) {
        if slot == 0 {
            self.bound_texture = Some(handle);
        }
    }

    fn unbind_texture(&mut self, slot: u32) {
        if slot == 0 {
            self.bound_texture = None;
        }
    }

    fn destroy_texture(&mut self, handle: ResourceHandle) {
        if let Some(slot) = self.textures.remove(&handle) {
            if let Some((texture, _)) = slot.image {
                texture.destroy();
            }
        }
        if self.bound_texture == Some(handle) {
            self.bound_texture = None;
        }
    }

    fn create_render_target(&mut self, label: &str, width: u32, height: u32) -> Result<ResourceHandle, GpuError> {
        if width == 0 || height == 0 {
            return Err(GpuError::ZeroSize("render target"));
        }
        let limit = self.device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(GpuError::Backend(format!(
                "render target {width}x{height} exceeds the {limit} texel limit"
            )));
        }

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: EYE_COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: EYE_DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let handle = self.allocate();
        self.targets.insert(
            handle,
            EyeTarget {
                color: color.create_view(&wgpu::TextureViewDescriptor::default()),
                depth: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            },
        );
        log::debug!("render target '{label}' created: {width}x{height}");
        Ok(handle)
    }

    fn destroy_render_target(&mut self, handle: ResourceHandle) {
        self.targets.remove(&handle);
    }

    fn begin_eye_pass(&mut self, target: ResourceHandle, pass: &EyePass) -> Result<(), GpuError> {
        if self.pass.is_some() {
            return Err(GpuError::PassActive);
        }
        if !self.targets.contains_key(&target) {
            return Err(GpuError::UnknownHandle(target));
        }
        self.list.clear();
        self.pass = Some(ActivePass {
            target,
            clear: pass.clear,
            frame: FrameUniforms::from_eye(&pass.uniforms),
        });
        Ok(())
    }

    fn draw_indexed(&mut self, draw: &DrawIndexed<'_>) {
        let (Some(_), Some(vertex), Some(index)) = (self.pass.as_ref(), self.bound_vertex, self.bound_index) else {
            if !self.warned_stray_draw {
                self.warned_stray_draw = true;
                log::warn!("draw ignored: no eye pass or no vertex/index buffer bound");
            }
            return;
        };
        self.list.push(
            self.bound_texture,
            vertex,
            index,
            draw.base_index,
            draw.index_count,
            draw.base_vertex,
            DrawUniforms::new(draw.model, &draw.material, draw.bones),
        );
    }

    fn end_eye_pass(&mut self) -> Result<(), GpuError> {
        let pass = self.pass.take().ok_or(GpuError::NoActivePass)?;
        let target = self
            .targets
            .get(&pass.target)
            .ok_or(GpuError::UnknownHandle(pass.target))?;

        let order = self.list.indices_in_submit_order().to_vec();
        let items = self.list.items();
        let buffers = &self.buffers;
        let resolve = |h: ResourceHandle| buffers.get(&h).and_then(|b| b.buffer.as_ref());
        let mut draws = Vec::with_capacity(order.len());
        for i in order {
            let item = &items[i];
            let (Some(vertex), Some(index)) = (resolve(item.vertex_buffer), resolve(item.index_buffer)) else {
                log::trace!("draw skipped: buffer destroyed during the pass");
                continue;
            };
            let texture = item
                .key
                .texture
                .and_then(|h| self.textures.get(&h))
                .and_then(|t| t.bind_group.as_ref())
                .unwrap_or(&self.white);
            draws.push(MeshDraw {
                vertex,
                index,
                texture,
                base_index: item.base_index,
                index_count: item.index_count,
                base_vertex: item.base_vertex,
                uniforms: &item.uniforms,
            });
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("twin eye encoder"),
            });
        self.mesh.encode(
            &self.device,
            &self.queue,
            &mut encoder,
            &target.color,
            &target.depth,
            pass.clear,
            &pass.frame,
            &draws,
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

fn white_bind_group(device: &wgpu::Device, queue: &wgpu::Queue, mesh: &MeshPipeline) -> wgpu::BindGroup {
    let extent = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("twin white texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255, 255, 255, 255],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        extent,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor::default());
    mesh.texture_bind_group(device, "twin white bind group", &view, &sampler)
}

fn clear_view(encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
    let _ = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("twin mirror clear"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });
}
