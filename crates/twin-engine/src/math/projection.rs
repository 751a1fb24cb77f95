use glam::{Mat4, Vec3, Vec4};

use super::{FovPort, Pose};

/// View matrix and world-space eye position for one eye.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EyeViewMatrix {
    pub view: Mat4,
    pub position: Vec3,
}

/// Builds the view matrix for an eye.
///
/// `head` is the virtual head (rig) pose in world space, `eye` the tracked
/// eye pose relative to it. The combined orientation `head × eye` supplies the
/// up (+Y) and forward (−Z) vectors; the eye position is the head position
/// plus the eye offset rotated by the head orientation only.
pub fn eye_view(head: &Pose, eye: &Pose) -> EyeViewMatrix {
    let rotation = head.orientation * eye.orientation;
    let up = rotation * Vec3::Y;
    let forward = rotation * Vec3::NEG_Z;
    let position = head.position + head.orientation * eye.position;

    EyeViewMatrix {
        view: Mat4::look_at_rh(position, position + forward, up),
        position,
    }
}

/// Right-handed projection for an (asymmetric) field-of-view port.
///
/// Depth maps `near → 0` and `far → 1`.
pub fn fov_projection(fov: &FovPort, near: f32, far: f32) -> Mat4 {
    let x_scale = 2.0 / (fov.left_tan + fov.right_tan);
    let x_offset = (fov.right_tan - fov.left_tan) / (fov.left_tan + fov.right_tan);
    let y_scale = 2.0 / (fov.up_tan + fov.down_tan);
    let y_offset = (fov.up_tan - fov.down_tan) / (fov.up_tan + fov.down_tan);
    let depth = far / (near - far);

    Mat4::from_cols(
        Vec4::new(x_scale, 0.0, 0.0, 0.0),
        Vec4::new(0.0, y_scale, 0.0, 0.0),
        Vec4::new(x_offset, y_offset, depth, -1.0),
        Vec4::new(0.0, 0.0, depth * near, 0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::yaw_quat;
    use glam::Quat;

    fn approx_mat(a: Mat4, b: Mat4) -> bool {
        a.to_cols_array()
            .iter()
            .zip(b.to_cols_array().iter())
            .all(|(x, y)| (x - y).abs() < 1e-5)
    }

    fn approx_vec(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    // ── projection ──────────────────────────────────────────────────────

    #[test]
    fn symmetric_port_matches_perspective() {
        let fov = FovPort::symmetric(45.0, 16.0 / 9.0);
        let ours = fov_projection(&fov, 0.2, 1000.0);
        let reference = Mat4::perspective_rh(45f32.to_radians(), 16.0 / 9.0, 0.2, 1000.0);
        assert!(approx_mat(ours, reference));
    }

    #[test]
    fn near_and_far_map_to_depth_range() {
        let fov = FovPort::symmetric(90.0, 1.0);
        let proj = fov_projection(&fov, 0.2, 1000.0);

        let near = proj * Vec4::new(0.0, 0.0, -0.2, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, -1000.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn asymmetric_port_edges_map_to_ndc_edges() {
        let fov = FovPort {
            up_tan: 1.0,
            down_tan: 0.5,
            left_tan: 0.8,
            right_tan: 1.2,
        };
        let proj = fov_projection(&fov, 0.1, 100.0);

        let right = proj * Vec4::new(1.2, 0.0, -1.0, 1.0);
        let left = proj * Vec4::new(-0.8, 0.0, -1.0, 1.0);
        let top = proj * Vec4::new(0.0, 1.0, -1.0, 1.0);
        let bottom = proj * Vec4::new(0.0, -0.5, -1.0, 1.0);
        assert!((right.x / right.w - 1.0).abs() < 1e-5);
        assert!((left.x / left.w + 1.0).abs() < 1e-5);
        assert!((top.y / top.w - 1.0).abs() < 1e-5);
        assert!((bottom.y / bottom.w + 1.0).abs() < 1e-5);
    }

    // ── eye view ────────────────────────────────────────────────────────

    #[test]
    fn identity_poses_look_down_negative_z() {
        let v = eye_view(&Pose::IDENTITY, &Pose::IDENTITY);
        assert!(approx_mat(v.view, Mat4::IDENTITY));
        assert_eq!(v.position, Vec3::ZERO);
    }

    #[test]
    fn eye_offset_is_rotated_by_head_orientation() {
        let head = Pose::new(yaw_quat(90.0), Vec3::new(1.0, 1.6, 0.0));
        let eye = Pose::from_position(Vec3::new(0.032, 0.0, 0.0));

        let v = eye_view(&head, &eye);
        // +X rotated 90° about +Y points along −Z.
        assert!(approx_vec(v.position, Vec3::new(1.0, 1.6, -0.032)));
    }

    #[test]
    fn view_moves_forward_point_onto_negative_z() {
        let head = Pose::new(yaw_quat(90.0), Vec3::ZERO);
        let v = eye_view(&head, &Pose::IDENTITY);

        // Facing −X after a +90° yaw.
        let p = v.view.transform_point3(Vec3::new(-5.0, 0.0, 0.0));
        assert!(approx_vec(p, Vec3::new(0.0, 0.0, -5.0)));
    }

    #[test]
    fn eye_orientation_composes_after_head() {
        let head = Pose::new(yaw_quat(90.0), Vec3::ZERO);
        let eye = Pose::new(Quat::from_rotation_x(0.3), Vec3::ZERO);

        let composed = eye_view(&head, &eye);
        let direct = eye_view(&Pose::new(head.orientation * eye.orientation, Vec3::ZERO), &Pose::IDENTITY);
        assert!(approx_mat(composed.view, direct.view));
    }
}
