use glam::{EulerRot, Quat, Vec3};

use crate::gpu::AdapterId;
use crate::math::{FovPort, Pose};

use super::{Eye, EyeLayer, EyeRenderDesc, HmdInfo, HmdSession, SessionStatus, SubmitError};

/// Parameters of the headset-less session.
#[derive(Debug, Clone)]
pub struct DesktopSessionConfig {
    /// Size of each eye target.
    pub eye_size: (u32, u32),
    /// Vertical field of view in degrees.
    pub vfov_degrees: f32,
    /// Interpupillary distance in meters.
    pub ipd: f32,
    /// Simulated head pose relative to the tracking origin.
    pub head_pose: Pose,
    /// Adapter to require; `None` accepts whatever the renderer picked.
    pub adapter: Option<AdapterId>,
}

impl Default for DesktopSessionConfig {
    fn default() -> Self {
        Self {
            eye_size: (960, 1080),
            vfov_degrees: 45.0,
            ipd: 0.064,
            head_pose: Pose::IDENTITY,
            adapter: None,
        }
    }
}

/// [`HmdSession`] without hardware.
///
/// Always visible, never asks to quit, and accepts every frame. Eye images
/// are only consumed by the mirror view.
#[derive(Debug)]
pub struct DesktopSession {
    config: DesktopSessionConfig,
    fov: FovPort,
    /// Yaw removed from the head pose by the last recenter.
    origin: Quat,
    submitted: u64,
    ended: bool,
}

impl DesktopSession {
    pub fn new(config: DesktopSessionConfig) -> Self {
        let (w, h) = config.eye_size;
        let aspect = w.max(1) as f32 / h.max(1) as f32;
        let fov = FovPort::symmetric(config.vfov_degrees, aspect);
        log::info!(
            "desktop session: {w}x{h} per eye, {:.1} deg vertical fov, ipd {:.3} m",
            config.vfov_degrees,
            config.ipd
        );
        Self {
            config,
            fov,
            origin: Quat::IDENTITY,
            submitted: 0,
            ended: false,
        }
    }

    /// Number of frames accepted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    fn tracked_head(&self) -> Pose {
        let head = self.config.head_pose;
        Pose {
            orientation: (self.origin * head.orientation).normalize(),
            position: self.origin * head.position,
        }
    }
}

impl HmdSession for DesktopSession {
    fn info(&self) -> HmdInfo {
        let (w, h) = self.config.eye_size;
        HmdInfo {
            product_name: "Desktop Mirror".to_owned(),
            manufacturer: "twin".to_owned(),
            resolution: (w * 2, h),
            refresh_rate: 60.0,
        }
    }

    fn adapter(&self) -> Option<AdapterId> {
        self.config.adapter
    }

    fn recommended_target_size(&self, _eye: Eye) -> (u32, u32) {
        self.config.eye_size
    }

    fn eye_render_desc(&self, eye: Eye) -> EyeRenderDesc {
        let half = self.config.ipd * 0.5;
        let x = match eye {
            Eye::Left => -half,
            Eye::Right => half,
        };
        EyeRenderDesc {
            fov: self.fov,
            hmd_to_eye: Pose::from_position(Vec3::new(x, 0.0, 0.0)),
        }
    }

    fn eye_poses(&mut self, _frame_index: u64, hmd_to_eye: [Pose; 2]) -> [Pose; 2] {
        let head = self.tracked_head();
        hmd_to_eye.map(|eye| head.then(&eye))
    }

    fn status(&mut self) -> SessionStatus {
        SessionStatus::default()
    }

    fn recenter(&mut self) {
        let (yaw, _, _) = self.config.head_pose.orientation.to_euler(EulerRot::YXZ);
        self.origin = Quat::from_rotation_y(-yaw);
        log::info!("tracking origin recentered ({:.1} deg yaw removed)", yaw.to_degrees());
    }

    fn submit_frame(&mut self, frame_index: u64, _layer: &EyeLayer) -> Result<(), SubmitError> {
        if self.ended {
            return Err(SubmitError::Fatal("session already ended".to_owned()));
        }
        log::trace!("desktop frame {frame_index} submitted");
        self.submitted += 1;
        Ok(())
    }

    fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            log::info!("desktop session ended after {} frame(s)", self.submitted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::ResourceHandle;
    use crate::hmd::EyeLayerImage;
    use crate::math::yaw_quat;

    fn layer(fov: FovPort) -> EyeLayer {
        let image = EyeLayerImage {
            target: ResourceHandle::from_raw(1).unwrap(),
            size: (4, 4),
            fov,
            render_pose: Pose::IDENTITY,
        };
        EyeLayer { eyes: [image, image] }
    }

    // ── description ─────────────────────────────────────────────────────

    #[test]
    fn eyes_are_offset_by_half_the_ipd() {
        let session = DesktopSession::new(DesktopSessionConfig::default());
        let left = session.eye_render_desc(Eye::Left).hmd_to_eye.position;
        let right = session.eye_render_desc(Eye::Right).hmd_to_eye.position;
        assert!((left.x + 0.032).abs() < 1e-6);
        assert!((right.x - 0.032).abs() < 1e-6);
        assert!(((right - left).length() - 0.064).abs() < 1e-6);
    }

    #[test]
    fn fov_matches_eye_aspect() {
        let session = DesktopSession::new(DesktopSessionConfig {
            eye_size: (200, 100),
            ..Default::default()
        });
        let fov = session.eye_render_desc(Eye::Left).fov;
        assert!((fov.left_tan - 2.0 * fov.up_tan).abs() < 1e-6);
        assert_eq!(session.recommended_target_size(Eye::Right), (200, 100));
        assert_eq!(session.info().resolution, (400, 100));
    }

    // ── tracking ────────────────────────────────────────────────────────

    #[test]
    fn identity_head_yields_the_eye_offsets() {
        let mut session = DesktopSession::new(DesktopSessionConfig::default());
        let offsets = Eye::BOTH.map(|eye| session.eye_render_desc(eye).hmd_to_eye);
        let poses = session.eye_poses(0, offsets);
        assert_eq!(poses, offsets);
    }

    #[test]
    fn recenter_removes_head_yaw() {
        let mut session = DesktopSession::new(DesktopSessionConfig {
            head_pose: Pose::new(yaw_quat(30.0), Vec3::ZERO),
            ..Default::default()
        });
        let before = session.eye_poses(0, [Pose::IDENTITY; 2]);
        assert!(!before[0].orientation.abs_diff_eq(Quat::IDENTITY, 1e-4));

        session.recenter();
        let after = session.eye_poses(1, [Pose::IDENTITY; 2]);
        assert!(after[0].orientation.abs_diff_eq(Quat::IDENTITY, 1e-4));
    }

    // ── frames ──────────────────────────────────────────────────────────

    #[test]
    fn always_visible_and_accepts_frames_until_ended() {
        let mut session = DesktopSession::new(DesktopSessionConfig::default());
        let status = session.status();
        assert!(status.is_visible && !status.should_quit && !status.should_recenter);

        let fov = session.eye_render_desc(Eye::Left).fov;
        assert!(session.submit_frame(0, &layer(fov)).is_ok());
        assert!(session.submit_frame(1, &layer(fov)).is_ok());
        assert_eq!(session.submitted(), 2);

        session.end();
        assert!(matches!(session.submit_frame(2, &layer(fov)), Err(SubmitError::Fatal(_))));
    }
}
