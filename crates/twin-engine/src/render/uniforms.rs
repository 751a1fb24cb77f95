use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::scene::{LightSet, ResolvedLight, MAX_POINT_LIGHTS, MAX_SPOT_LIGHTS};

/// Size of the bone palette uploaded per draw.
pub const MAX_BONES: usize = 100;

/// Surface parameters of one draw.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MaterialParams {
    /// Multiplied with the bound texture.
    pub base_color: Vec4,
    pub specular_intensity: f32,
    pub specular_power: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            specular_intensity: 0.5,
            specular_power: 32.0,
        }
    }
}

/// Per-eye constants: camera and the frame's lights.
#[derive(Debug, Clone, Default)]
pub struct EyeUniforms {
    pub view: Mat4,
    pub proj: Mat4,
    pub eye_position: Vec3,
    pub lights: LightSet,
}

// ── GPU types ─────────────────────────────────────────────────────────────

/// Uniform layout of one light (64 bytes):
///
///  offset  0  color_ambient      rgb = color, a = ambient intensity
///  offset 16  position_diffuse   xyz = position, w = diffuse intensity
///  offset 32  direction_cutoff   xyz = direction, w = cos(cutoff)
///  offset 48  attenuation        constant, linear, exp, enabled
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub color_ambient: [f32; 4],
    pub position_diffuse: [f32; 4],
    pub direction_cutoff: [f32; 4],
    pub attenuation: [f32; 4],
}

impl GpuLight {
    fn from_resolved(light: &ResolvedLight) -> Self {
        Self {
            color_ambient: light.color.extend(light.ambient_intensity).to_array(),
            position_diffuse: light.position.extend(light.diffuse_intensity).to_array(),
            direction_cutoff: light.direction.extend(light.cutoff_cos).to_array(),
            attenuation: [
                light.attenuation.constant,
                light.attenuation.linear,
                light.attenuation.exp,
                1.0,
            ],
        }
    }
}

/// Group 0 uniform block (736 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub eye_position: [f32; 4],
    pub directional: GpuLight,
    /// x = point count, y = spot count.
    pub counts: [u32; 4],
    pub points: [GpuLight; MAX_POINT_LIGHTS],
    pub spots: [GpuLight; MAX_SPOT_LIGHTS],
}

impl FrameUniforms {
    pub fn from_eye(eye: &EyeUniforms) -> Self {
        let mut points = [GpuLight::default(); MAX_POINT_LIGHTS];
        for (slot, light) in points.iter_mut().zip(eye.lights.points()) {
            *slot = GpuLight::from_resolved(light);
        }
        let mut spots = [GpuLight::default(); MAX_SPOT_LIGHTS];
        for (slot, light) in spots.iter_mut().zip(eye.lights.spots()) {
            *slot = GpuLight::from_resolved(light);
        }

        Self {
            view: eye.view.to_cols_array_2d(),
            proj: eye.proj.to_cols_array_2d(),
            eye_position: eye.eye_position.extend(1.0).to_array(),
            directional: eye
                .lights
                .directional()
                .map(GpuLight::from_resolved)
                .unwrap_or_default(),
            counts: [eye.lights.points().len() as u32, eye.lights.spots().len() as u32, 0, 0],
            points,
            spots,
        }
    }
}

/// Group 1 per-draw block, bound with a dynamic offset.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct DrawUniforms {
    pub model: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    /// x = specular intensity, y = specular power, z = 1 when skinned.
    pub material: [f32; 4],
    pub bones: [[[f32; 4]; 4]; MAX_BONES],
}

impl DrawUniforms {
    /// Bones beyond [`MAX_BONES`] are ignored.
    pub fn new(model: Mat4, material: &MaterialParams, bones: &[Mat4]) -> Self {
        let mut palette = [Mat4::IDENTITY.to_cols_array_2d(); MAX_BONES];
        for (slot, bone) in palette.iter_mut().zip(bones) {
            *slot = bone.to_cols_array_2d();
        }
        Self {
            model: model.to_cols_array_2d(),
            base_color: material.base_color.to_array(),
            material: [
                material.specular_intensity,
                material.specular_power,
                if bones.is_empty() { 0.0 } else { 1.0 },
                0.0,
            ],
            bones: palette,
        }
    }
}
