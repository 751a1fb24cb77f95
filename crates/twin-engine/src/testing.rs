//! Test doubles shared by the in-crate test modules.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use glam::Mat4;

use crate::gpu::{AdapterId, BufferSpec, DrawIndexed, EyePass, GpuBackend, GpuError, ResourceHandle, SamplerSpec};
use crate::hmd::{Eye, EyeLayer, EyeRenderDesc, HmdInfo, HmdSession, SessionStatus, SubmitError};
use crate::math::{FovPort, Pose};
use crate::render::MaterialParams;
use crate::resource::{Bitmap, BufferTarget, BufferUsage, PixelFormat};

/// One backend call as observed by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateBuffer(ResourceHandle),
    SpecifyBuffer {
        handle: ResourceHandle,
        target: BufferTarget,
        usage: BufferUsage,
        data: Vec<u8>,
    },
    BindBuffer(ResourceHandle, BufferTarget),
    DestroyBuffer(ResourceHandle),

    CreateTexture(ResourceHandle),
    UploadTexture {
        handle: ResourceHandle,
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    ConfigureSampler(ResourceHandle, SamplerSpec),
    BindTexture(ResourceHandle, u32),
    UnbindTexture(u32),
    DestroyTexture(ResourceHandle),

    CreateRenderTarget {
        handle: ResourceHandle,
        width: u32,
        height: u32,
    },
    DestroyRenderTarget(ResourceHandle),

    BeginEyePass {
        target: ResourceHandle,
        eye_position: glam::Vec3,
        point_lights: usize,
        spot_lights: usize,
    },
    Draw {
        index_count: u32,
        base_index: u32,
        base_vertex: i32,
        model: Mat4,
        bones: usize,
        material: MaterialParams,
    },
    EndEyePass,
}

/// Backend that records every call and hands out sequential handles.
#[derive(Debug)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    pub adapter: AdapterId,
    pub fail_create: bool,
    pub fail_specify: bool,
    pub fail_upload: bool,
    pub fail_render_target: bool,
    /// Render targets that may still be created before creation fails.
    pub render_target_budget: Option<usize>,
    next_handle: u64,
    in_pass: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            adapter: AdapterId { vendor: 0x10de, device: 1 },
            fail_create: false,
            fail_specify: false,
            fail_upload: false,
            fail_render_target: false,
            render_target_budget: None,
            next_handle: 0,
            in_pass: false,
        }
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().position(pred)
    }

    pub fn draws(&self) -> usize {
        self.count(|c| matches!(c, Call::Draw { .. }))
    }

    fn allocate(&mut self, fail: bool, what: &'static str) -> Result<ResourceHandle, GpuError> {
        if fail {
            return Err(GpuError::Backend(format!("{what} creation refused")));
        }
        self.next_handle += 1;
        ResourceHandle::from_raw(self.next_handle).ok_or(GpuError::ZeroSize(what))
    }
}

impl GpuBackend for RecordingBackend {
    fn adapter(&self) -> AdapterId {
        self.adapter
    }

    fn create_buffer(&mut self, _label: &str) -> Result<ResourceHandle, GpuError> {
        let handle = self.allocate(self.fail_create, "buffer")?;
        self.calls.push(Call::CreateBuffer(handle));
        Ok(handle)
    }

    fn specify_buffer(&mut self, handle: ResourceHandle, spec: &BufferSpec<'_>) -> Result<(), GpuError> {
        if self.fail_specify {
            return Err(GpuError::Backend("out of memory".into()));
        }
        self.calls.push(Call::SpecifyBuffer {
            handle,
            target: spec.target,
            usage: spec.usage,
            data: spec.data.to_vec(),
        });
        Ok(())
    }

    fn bind_buffer(&mut self, handle: ResourceHandle, target: BufferTarget) {
        self.calls.push(Call::BindBuffer(handle, target));
    }

    fn destroy_buffer(&mut self, handle: ResourceHandle) {
        self.calls.push(Call::DestroyBuffer(handle));
    }

    fn create_texture(&mut self, _label: &str) -> Result<ResourceHandle, GpuError> {
        let handle = self.allocate(self.fail_create, "texture")?;
        self.calls.push(Call::CreateTexture(handle));
        Ok(handle)
    }

    fn upload_texture(&mut self, handle: ResourceHandle, bitmap: &Bitmap) -> Result<(), GpuError> {
        if self.fail_upload {
            return Err(GpuError::Backend("upload refused".into()));
        }
        self.calls.push(Call::UploadTexture {
            handle,
            width: bitmap.width,
            height: bitmap.height,
            format: bitmap.format,
        });
        Ok(())
    }

    fn configure_sampler(&mut self, handle: ResourceHandle, sampler: &SamplerSpec) -> Result<(), GpuError> {
        self.calls.push(Call::ConfigureSampler(handle, *sampler));
        Ok(())
    }

    fn bind_texture(&mut self, handle: ResourceHandle, slot: u32) {
        self.calls.push(Call::BindTexture(handle, slot));
    }

    fn unbind_texture(&mut self, slot: u32) {
        self.calls.push(Call::UnbindTexture(slot));
    }

    fn destroy_texture(&mut self, handle: ResourceHandle) {
        self.calls.push(Call::DestroyTexture(handle));
    }

    fn create_render_target(&mut self, _label: &str, width: u32, height: u32) -> Result<ResourceHandle, GpuError> {
        if width == 0 || height == 0 {
            return Err(GpuError::ZeroSize("render target"));
        }
        let exhausted = self.render_target_budget == Some(0);
        let handle = self.allocate(self.fail_render_target || exhausted, "render target")?;
        if let Some(left) = self.render_target_budget.as_mut() {
            *left -= 1;
        }
        self.calls.push(Call::CreateRenderTarget { handle, width, height });
        Ok(handle)
    }

    fn destroy_render_target(&mut self, handle: ResourceHandle) {
        self.calls.push(Call::DestroyRenderTarget(handle));
    }

    fn begin_eye_pass(&mut self, target: ResourceHandle, pass: &EyePass) -> Result<(), GpuError> {
        if self.in_pass {
            return Err(GpuError::PassActive);
        }
        self.in_pass = true;
        self.calls.push(Call::BeginEyePass {
            target,
            eye_position: pass.uniforms.eye_position,
            point_lights: pass.uniforms.lights.points().len(),
            spot_lights: pass.uniforms.lights.spots().len(),
        });
        Ok(())
    }

    fn draw_indexed(&mut self, draw: &DrawIndexed<'_>) {
        self.calls.push(Call::Draw {
            index_count: draw.index_count,
            base_index: draw.base_index,
            base_vertex: draw.base_vertex,
            model: draw.model,
            bones: draw.bones.len(),
            material: draw.material,
        });
    }

    fn end_eye_pass(&mut self) -> Result<(), GpuError> {
        if !self.in_pass {
            return Err(GpuError::NoActivePass);
        }
        self.in_pass = false;
        self.calls.push(Call::EndEyePass);
        Ok(())
    }
}

/// What a [`FakeSession`] observed, shared with the test after the session
/// has been boxed into a driver.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub submitted: Vec<u64>,
    pub pose_requests: Vec<u64>,
    pub recenters: usize,
    pub ends: usize,
}

/// Scripted [`HmdSession`]. Statuses and submit results are consumed one per
/// frame; once a script runs dry the session is visible and accepts frames.
#[derive(Debug)]
pub struct FakeSession {
    pub adapter: Option<AdapterId>,
    pub target_size: (u32, u32),
    pub statuses: VecDeque<SessionStatus>,
    pub submits: VecDeque<Result<(), SubmitError>>,
    log: Rc<RefCell<SessionLog>>,
}

impl FakeSession {
    pub fn new() -> (Self, Rc<RefCell<SessionLog>>) {
        let log = Rc::new(RefCell::new(SessionLog::default()));
        let session = Self {
            adapter: None,
            target_size: (16, 8),
            statuses: VecDeque::new(),
            submits: VecDeque::new(),
            log: Rc::clone(&log),
        };
        (session, log)
    }
}

impl HmdSession for FakeSession {
    fn info(&self) -> HmdInfo {
        HmdInfo {
            product_name: "Fake HMD".into(),
            manufacturer: "tests".into(),
            resolution: (self.target_size.0 * 2, self.target_size.1),
            refresh_rate: 90.0,
        }
    }

    fn adapter(&self) -> Option<AdapterId> {
        self.adapter
    }

    fn recommended_target_size(&self, _eye: Eye) -> (u32, u32) {
        self.target_size
    }

    fn eye_render_desc(&self, eye: Eye) -> EyeRenderDesc {
        let x = if eye == Eye::Left { -0.03 } else { 0.03 };
        EyeRenderDesc {
            fov: FovPort::symmetric(90.0, 2.0),
            hmd_to_eye: Pose::from_position(glam::Vec3::new(x, 0.0, 0.0)),
        }
    }

    fn eye_poses(&mut self, frame_index: u64, hmd_to_eye: [Pose; 2]) -> [Pose; 2] {
        self.log.borrow_mut().pose_requests.push(frame_index);
        hmd_to_eye
    }

    fn status(&mut self) -> SessionStatus {
        self.statuses.pop_front().unwrap_or_default()
    }

    fn recenter(&mut self) {
        self.log.borrow_mut().recenters += 1;
    }

    fn submit_frame(&mut self, frame_index: u64, _layer: &EyeLayer) -> Result<(), SubmitError> {
        self.log.borrow_mut().submitted.push(frame_index);
        self.submits.pop_front().unwrap_or(Ok(()))
    }

    fn end(&mut self) {
        self.log.borrow_mut().ends += 1;
    }
}
