use glam::{Quat, Vec3};

/// Rigid transform: orientation followed by translation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    pub orientation: Quat,
    pub position: Vec3,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    pub fn new(orientation: Quat, position: Vec3) -> Self {
        Self {
            orientation,
            position,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            orientation: Quat::IDENTITY,
            position,
        }
    }

    /// Applies `local` in this pose's frame (`self ∘ local`).
    pub fn then(&self, local: &Pose) -> Pose {
        Pose {
            orientation: (self.orientation * local.orientation).normalize(),
            position: self.position + self.orientation * local.position,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Field of view expressed as tangents of the half-angles from the view axis.
///
/// Asymmetric ports are the norm on HMD lenses.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FovPort {
    pub up_tan: f32,
    pub down_tan: f32,
    pub left_tan: f32,
    pub right_tan: f32,
}

impl FovPort {
    /// Symmetric port with vertical field of view `vfov_deg` and `aspect` = width / height.
    pub fn symmetric(vfov_deg: f32, aspect: f32) -> Self {
        let v = (vfov_deg.to_radians() * 0.5).tan();
        let h = v * aspect;
        Self {
            up_tan: v,
            down_tan: v,
            left_tan: h,
            right_tan: h,
        }
    }
}

/// Rotation of `degrees` about +Y.
pub fn yaw_quat(degrees: f32) -> Quat {
    Quat::from_rotation_y(degrees.to_radians())
}
