use glam::{Mat4, Quat, Vec3};

use crate::math::{yaw_quat, Pose};

/// Kinematic state of a scene node.
///
/// Rotation is a single angle in degrees about +Y; angular velocity is
/// stored as a vector but only its Y component is integrated.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    pub position: Vec3,
    pub rotation: f32,
    pub scale: f32,
    pub angular_velocity: Vec3,
    pub linear_velocity: Vec3,
    world: Mat4,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: 0.0,
            scale: 1.0,
            angular_velocity: Vec3::ZERO,
            linear_velocity: Vec3::ZERO,
            world: Mat4::IDENTITY,
        }
    }
}

impl NodeState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Advances the node by `dt` seconds.
    ///
    /// The rotation is updated first and the linear velocity, expressed in
    /// the node's frame, is rotated by the *updated* rotation.
    pub fn integrate(&mut self, dt: f32) {
        self.rotation += self.angular_velocity.y * dt;
        self.position += self.orientation() * self.linear_velocity * dt;
    }

    pub fn orientation(&self) -> Quat {
        yaw_quat(self.rotation)
    }

    /// `T(position) × R_y(rotation) × S(scale)`.
    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.orientation(), self.position)
    }

    /// World transform computed during the last update broadcast.
    pub fn world_transform(&self) -> Mat4 {
        self.world
    }

    pub fn world_position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    /// World pose without scale.
    pub fn world_pose(&self) -> Pose {
        let (_, rotation, translation) = self.world.to_scale_rotation_translation();
        Pose::new(rotation, translation)
    }

    pub(crate) fn refresh_world(&mut self, parent: Mat4) {
        self.world = parent * self.local_transform();
    }
}
