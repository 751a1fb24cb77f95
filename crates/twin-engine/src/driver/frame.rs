use std::time::{Duration, Instant};

use crate::gpu::{EyePass, GpuBackend, ResourceHandle};
use crate::hmd::{Eye, EyeLayer, EyeLayerImage, EyeSwapChain, HmdSession, SubmitError};
use crate::loader::LoaderHandle;
use crate::math::{eye_view, fov_projection, Pose};
use crate::render::{EyeUniforms, EyeView, RenderCtx};
use crate::scene::{LightSet, NodeCtx, NodeId, SceneTree};
use crate::time::{FrameTime, SimClock};

use super::DriverError;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DriverState {
    Uninitialized,
    Running,
    ShuttingDown,
    Terminated,
}

/// Frame loop parameters.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub near: f32,
    pub far: f32,
    /// Eye target clear color (linear RGBA).
    pub clear: [f32; 4],
    /// Upper bound of the simulated time step; `None` disables the clamp.
    pub max_dt: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            near: 0.2,
            far: 1000.0,
            clear: [0.0, 0.0, 0.0, 1.0],
            max_dt: Some(Duration::from_millis(250)),
        }
    }
}

/// Result of one [`FrameDriver::frame`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameOutcome {
    /// Both eyes rendered and accepted by the compositor.
    Presented,
    /// The session is not visible; nothing rendered or submitted.
    NotVisible,
    /// Both eyes rendered, the compositor dropped the frame.
    Skipped,
    /// The session asked to quit. Call [`FrameDriver::shutdown`].
    Quit,
}

/// Running totals, for diagnostics.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub updates: u64,
    pub renders: u64,
    pub presented: u64,
    pub skipped: u64,
    pub not_visible: u64,
}

/// Drives the node tree through stereo frames for one HMD session.
///
/// All methods run on the render thread. The tree and the GPU backend are
/// borrowed per call; the driver owns the session, the eye swap chains and
/// the frame counter.
pub struct FrameDriver {
    session: Box<dyn HmdSession>,
    config: DriverConfig,
    state: DriverState,
    clock: SimClock,
    chains: Option<[EyeSwapChain; 2]>,
    lights: LightSet,
    headset: Option<NodeId>,
    recenter_requested: bool,
    frame_index: u64,
    stats: FrameStats,
}

impl FrameDriver {
    pub fn new(session: Box<dyn HmdSession>, config: DriverConfig) -> Self {
        let clock = match config.max_dt {
            Some(max) => SimClock::with_max_step(max),
            None => SimClock::new(),
        };
        Self {
            session,
            config,
            state: DriverState::Uninitialized,
            clock,
            chains: None,
            lights: LightSet::default(),
            headset: None,
            recenter_requested: false,
            frame_index: 0,
            stats: FrameStats::default(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Index of the next frame to submit. Advances only on accepted frames.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Node whose yaw and position place the virtual head. Without one the
    /// head sits at the world origin.
    pub fn set_headset(&mut self, node: Option<NodeId>) {
        self.headset = node;
    }

    /// Recenters the session at the next visible or hidden frame, as if the
    /// session status had asked for it.
    pub fn request_recenter(&mut self) {
        self.recenter_requested = true;
    }

    /// Last committed image of each eye, for mirroring.
    pub fn presented_images(&self) -> Option<[ResourceHandle; 2]> {
        let [left, right] = self.chains.as_ref()?;
        Some([left.committed()?, right.committed()?])
    }

    /// Checks the adapter, allocates the eye targets and initializes the
    /// live nodes.
    pub fn start(
        &mut self,
        gpu: &mut dyn GpuBackend,
        tree: &mut SceneTree,
        loader: &LoaderHandle,
    ) -> Result<(), DriverError> {
        self.expect_state(DriverState::Uninitialized)?;

        if let Some(hmd) = self.session.adapter() {
            let render = gpu.adapter();
            if hmd != render {
                log::error!("HMD adapter {hmd:x?} differs from render adapter {render:x?}");
                return Err(DriverError::AdapterMismatch { hmd, render });
            }
        }

        let info = self.session.info();
        log::info!(
            "HMD: {} ({}), {}x{} @ {} Hz",
            info.product_name,
            info.manufacturer,
            info.resolution.0,
            info.resolution.1,
            info.refresh_rate
        );

        let (lw, lh) = self.session.recommended_target_size(Eye::Left);
        let left = EyeSwapChain::create(gpu, "left eye", lw, lh)?;
        let (rw, rh) = self.session.recommended_target_size(Eye::Right);
        let right = match EyeSwapChain::create(gpu, "right eye", rw, rh) {
            Ok(chain) => chain,
            Err(err) => {
                left.destroy(gpu);
                return Err(err.into());
            }
        };
        self.chains = Some([left, right]);

        // The first frame defines t = 0 and sees dt = 0.
        self.clock.reset();

        let mut ctx = NodeCtx {
            gpu,
            time: FrameTime::zero(Instant::now()),
            loader,
            lights: &mut self.lights,
        };
        let initialized = tree.init_pending(&mut ctx);

        self.state = DriverState::Running;
        log::info!("frame driver running ({initialized} node(s) initialized)");
        Ok(())
    }

    pub fn frame(
        &mut self,
        gpu: &mut dyn GpuBackend,
        tree: &mut SceneTree,
        loader: &LoaderHandle,
    ) -> Result<FrameOutcome, DriverError> {
        self.frame_at(gpu, tree, loader, Instant::now())
    }

    /// Runs one frame with `now` as the frame timestamp.
    pub fn frame_at(
        &mut self,
        gpu: &mut dyn GpuBackend,
        tree: &mut SceneTree,
        loader: &LoaderHandle,
        now: Instant,
    ) -> Result<FrameOutcome, DriverError> {
        self.expect_state(DriverState::Running)?;
        let time = self.clock.tick_at(now);

        self.lights.clear();
        {
            let mut ctx = NodeCtx {
                gpu: &mut *gpu,
                time,
                loader,
                lights: &mut self.lights,
            };
            tree.flush_removed(&mut ctx);
            tree.init_pending(&mut ctx);
            tree.update(&mut ctx);
        }
        self.stats.updates += 1;

        let status = self.session.status();
        if status.should_quit {
            log::info!("HMD session requested quit");
            return Ok(FrameOutcome::Quit);
        }
        if status.should_recenter || std::mem::take(&mut self.recenter_requested) {
            self.session.recenter();
        }
        if !status.is_visible {
            self.stats.not_visible += 1;
            return Ok(FrameOutcome::NotVisible);
        }

        let layer = self.render_eyes(gpu, tree, time)?;

        match self.session.submit_frame(self.frame_index, &layer) {
            Ok(()) => {
                self.frame_index += 1;
                self.stats.presented += 1;
                Ok(FrameOutcome::Presented)
            }
            Err(SubmitError::Transient(reason)) => {
                log::warn!("frame {} dropped: {reason}", self.frame_index);
                self.stats.skipped += 1;
                Ok(FrameOutcome::Skipped)
            }
            Err(SubmitError::Fatal(reason)) => {
                log::error!("frame {} submission failed: {reason}", self.frame_index);
                Err(DriverError::Submit(reason))
            }
        }
    }

    fn render_eyes(
        &mut self,
        gpu: &mut dyn GpuBackend,
        tree: &mut SceneTree,
        time: FrameTime,
    ) -> Result<EyeLayer, DriverError> {
        let descs = Eye::BOTH.map(|eye| self.session.eye_render_desc(eye));
        let poses = self
            .session
            .eye_poses(self.frame_index, descs.map(|desc| desc.hmd_to_eye));
        let head = self.head_pose(tree);

        let (near, far) = (self.config.near, self.config.far);
        let views = Eye::BOTH.map(|eye| {
            let i = eye.index();
            let matrix = eye_view(&head, &poses[i]);
            EyeView {
                eye,
                view: matrix.view,
                proj: fov_projection(&descs[i].fov, near, far),
                position: matrix.position,
            }
        });

        let Some(chains) = self.chains.as_mut() else {
            return Err(DriverError::InvalidState {
                expected: DriverState::Running,
                actual: self.state,
            });
        };
        let targets = chains.each_ref().map(|chain| chain.current());
        let sizes = chains.each_ref().map(|chain| chain.size());

        for (chain, view) in chains.iter_mut().zip(&views) {
            let pass = EyePass {
                clear: self.config.clear,
                uniforms: EyeUniforms {
                    view: view.view,
                    proj: view.proj,
                    eye_position: view.position,
                    lights: self.lights.clone(),
                },
            };

            gpu.begin_eye_pass(chain.current(), &pass)?;
            let mut ctx = RenderCtx {
                gpu: &mut *gpu,
                eye: view,
                time,
            };
            tree.render(&mut ctx);
            gpu.end_eye_pass()?;
            chain.commit();
            self.stats.renders += 1;
        }

        Ok(EyeLayer {
            eyes: Eye::BOTH.map(|eye| {
                let i = eye.index();
                EyeLayerImage {
                    target: targets[i],
                    size: sizes[i],
                    fov: descs[i].fov,
                    render_pose: poses[i],
                }
            }),
        })
    }

    fn head_pose(&self, tree: &SceneTree) -> Pose {
        self.headset
            .and_then(|id| tree.node(id))
            .map_or(Pose::IDENTITY, |node| node.world_pose())
    }

    /// Shuts the live nodes down, releases the eye targets and ends the
    /// session. Repeated calls do nothing.
    pub fn shutdown(&mut self, gpu: &mut dyn GpuBackend, tree: &mut SceneTree, loader: &LoaderHandle) {
        if matches!(self.state, DriverState::ShuttingDown | DriverState::Terminated) {
            return;
        }
        self.state = DriverState::ShuttingDown;

        let mut ctx = NodeCtx {
            gpu: &mut *gpu,
            time: FrameTime::zero(Instant::now()),
            loader,
            lights: &mut self.lights,
        };
        tree.flush_removed(&mut ctx);
        let count = tree.shutdown(&mut ctx);

        if let Some(chains) = self.chains.take() {
            for chain in chains {
                chain.destroy(gpu);
            }
        }
        self.session.end();

        self.state = DriverState::Terminated;
        log::info!(
            "frame driver terminated: {count} node(s) shut down, {} frame(s) presented",
            self.stats.presented
        );
    }

    fn expect_state(&self, expected: DriverState) -> Result<(), DriverError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DriverError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec3;

    use super::*;
    use crate::gpu::AdapterId;
    use crate::hmd::SessionStatus;
    use crate::loader::detached_handle;
    use crate::scene::{Light, LightNode, NodeBehavior, NodeState};
    use crate::testing::{Call, FakeSession, RecordingBackend, SessionLog};

    #[derive(Debug, Default)]
    struct Seen {
        updates: usize,
        renders: Vec<Eye>,
        positions: Vec<Vec3>,
        shutdowns: usize,
    }

    struct Watcher(Rc<RefCell<Seen>>);

    impl NodeBehavior for Watcher {
        fn on_update(&mut self, _node: &NodeState, _ctx: &mut NodeCtx<'_>) {
            self.0.borrow_mut().updates += 1;
        }

        fn on_render(&mut self, _node: &NodeState, ctx: &mut RenderCtx<'_>) {
            let mut seen = self.0.borrow_mut();
            seen.renders.push(ctx.eye.eye);
            seen.positions.push(ctx.eye.position);
        }

        fn on_shutdown(&mut self, _ctx: &mut NodeCtx<'_>) {
            self.0.borrow_mut().shutdowns += 1;
        }
    }

    struct Rig {
        gpu: RecordingBackend,
        tree: SceneTree,
        loader: LoaderHandle,
        driver: FrameDriver,
        log: Rc<RefCell<SessionLog>>,
        seen: Rc<RefCell<Seen>>,
        watched: NodeId,
    }

    fn rig(configure: impl FnOnce(&mut FakeSession)) -> Rig {
        let (mut session, log) = FakeSession::new();
        configure(&mut session);
        let mut tree = SceneTree::new();
        let seen = Rc::new(RefCell::new(Seen::default()));
        let root = tree.root();
        let watched = tree
            .spawn(root, "watched", NodeState::default(), Some(Box::new(Watcher(Rc::clone(&seen)))))
            .unwrap();
        let (loader, _jobs) = detached_handle();
        Rig {
            gpu: RecordingBackend::new(),
            tree,
            loader,
            driver: FrameDriver::new(Box::new(session), DriverConfig::default()),
            log,
            seen,
            watched,
        }
    }

    impl Rig {
        fn start(&mut self) -> Result<(), DriverError> {
            self.driver.start(&mut self.gpu, &mut self.tree, &self.loader)
        }

        fn frame_at(&mut self, now: Instant) -> Result<FrameOutcome, DriverError> {
            self.driver.frame_at(&mut self.gpu, &mut self.tree, &self.loader, now)
        }

        fn shutdown(&mut self) {
            self.driver.shutdown(&mut self.gpu, &mut self.tree, &self.loader);
        }
    }

    fn hidden() -> SessionStatus {
        SessionStatus {
            is_visible: false,
            ..SessionStatus::default()
        }
    }

    // ── startup ─────────────────────────────────────────────────────────

    #[test]
    fn start_allocates_two_chains_and_initializes() {
        let mut rig = rig(|_| {});
        rig.start().unwrap();
        assert_eq!(rig.driver.state(), DriverState::Running);
        assert_eq!(rig.gpu.count(|c| matches!(c, Call::CreateRenderTarget { width: 16, height: 8, .. })), 4);
        assert!(rig.driver.presented_images().is_none());
    }

    #[test]
    fn adapter_mismatch_is_fatal() {
        let mut rig = rig(|s| s.adapter = Some(AdapterId { vendor: 0x1002, device: 7 }));
        let err = rig.start().unwrap_err();
        assert!(matches!(err, DriverError::AdapterMismatch { .. }));
        assert_eq!(rig.driver.state(), DriverState::Uninitialized);
        assert_eq!(rig.gpu.count(|c| matches!(c, Call::CreateRenderTarget { .. })), 0);
    }

    #[test]
    fn matching_adapter_is_accepted() {
        let mut rig = rig(|s| s.adapter = Some(AdapterId { vendor: 0x10de, device: 1 }));
        assert!(rig.start().is_ok());
    }

    #[test]
    fn failed_eye_target_is_fatal_and_releases_partial_chains() {
        let mut rig = rig(|_| {});
        rig.gpu.render_target_budget = Some(3);
        assert!(matches!(rig.start(), Err(DriverError::Gpu(_))));
        assert_eq!(rig.gpu.count(|c| matches!(c, Call::DestroyRenderTarget(_))), 3);
    }

    #[test]
    fn frame_before_start_is_rejected() {
        let mut rig = rig(|_| {});
        let err = rig.frame_at(Instant::now()).unwrap_err();
        assert!(matches!(
            err,
            DriverError::InvalidState {
                expected: DriverState::Running,
                actual: DriverState::Uninitialized
            }
        ));
    }

    // ── frames ──────────────────────────────────────────────────────────

    #[test]
    fn visible_frame_updates_once_and_renders_each_eye() {
        let mut rig = rig(|_| {});
        rig.start().unwrap();

        let outcome = rig.frame_at(Instant::now()).unwrap();
        assert_eq!(outcome, FrameOutcome::Presented);
        {
            let seen = rig.seen.borrow();
            assert_eq!(seen.updates, 1);
            assert_eq!(seen.renders, vec![Eye::Left, Eye::Right]);
        }
        assert_eq!(rig.driver.frame_index(), 1);
        assert_eq!(rig.log.borrow().submitted, vec![0]);
        assert_eq!(rig.gpu.count(|c| matches!(c, Call::BeginEyePass { .. })), 2);
        assert_eq!(rig.gpu.count(|c| matches!(c, Call::EndEyePass)), 2);

        let stats = rig.driver.stats();
        assert_eq!((stats.updates, stats.renders, stats.presented), (1, 2, 1));
        assert!(rig.driver.presented_images().is_some());
    }

    #[test]
    fn eye_images_alternate_between_frames() {
        let mut rig = rig(|_| {});
        rig.start().unwrap();
        let base = Instant::now();
        rig.frame_at(base).unwrap();
        let first = rig.driver.presented_images().unwrap();
        rig.frame_at(base + Duration::from_millis(11)).unwrap();
        let second = rig.driver.presented_images().unwrap();
        assert_ne!(first[0], second[0]);
        assert_ne!(first[1], second[1]);
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn transient_submit_failure_keeps_the_frame_index() {
        let mut rig = rig(|s| {
            s.submits.push_back(Err(SubmitError::Transient("display lost".into())));
        });
        rig.start().unwrap();
        let base = Instant::now();

        assert_eq!(rig.frame_at(base).unwrap(), FrameOutcome::Skipped);
        assert_eq!(rig.driver.frame_index(), 0);
        assert_eq!(rig.frame_at(base + Duration::from_millis(11)).unwrap(), FrameOutcome::Presented);
        assert_eq!(rig.driver.frame_index(), 1);
        assert_eq!(rig.log.borrow().submitted, vec![0, 0]);
        assert_eq!(rig.seen.borrow().renders.len(), 4);
    }

    #[test]
    fn fatal_submit_failure_stops_the_loop() {
        let mut rig = rig(|s| s.submits.push_back(Err(SubmitError::Fatal("runtime gone".into()))));
        rig.start().unwrap();
        assert!(matches!(rig.frame_at(Instant::now()), Err(DriverError::Submit(_))));
        assert_eq!(rig.driver.frame_index(), 0);
    }

    #[test]
    fn quit_returns_without_rendering() {
        let mut rig = rig(|s| {
            s.statuses.push_back(SessionStatus {
                should_quit: true,
                ..SessionStatus::default()
            });
        });
        rig.start().unwrap();

        assert_eq!(rig.frame_at(Instant::now()).unwrap(), FrameOutcome::Quit);
        assert!(rig.seen.borrow().renders.is_empty());
        assert_eq!(rig.gpu.count(|c| matches!(c, Call::BeginEyePass { .. })), 0);
        assert!(rig.log.borrow().submitted.is_empty());
    }

    #[test]
    fn hidden_session_updates_but_does_not_render_or_submit() {
        let mut rig = rig(|s| s.statuses.push_back(hidden()));
        rig.start().unwrap();

        assert_eq!(rig.frame_at(Instant::now()).unwrap(), FrameOutcome::NotVisible);
        assert_eq!(rig.seen.borrow().updates, 1);
        assert!(rig.seen.borrow().renders.is_empty());
        assert!(rig.log.borrow().submitted.is_empty());
        assert_eq!(rig.driver.stats().not_visible, 1);
    }

    #[test]
    fn recenter_happens_before_pose_sampling() {
        let mut rig = rig(|s| {
            s.statuses.push_back(SessionStatus {
                should_recenter: true,
                ..SessionStatus::default()
            });
        });
        rig.start().unwrap();
        rig.frame_at(Instant::now()).unwrap();
        let log = rig.log.borrow();
        assert_eq!(log.recenters, 1);
        assert_eq!(log.pose_requests, vec![0]);
    }

    #[test]
    fn requested_recenter_applies_once() {
        let mut rig = rig(|_| {});
        rig.start().unwrap();
        rig.driver.request_recenter();
        let t0 = Instant::now();
        rig.frame_at(t0).unwrap();
        rig.frame_at(t0 + Duration::from_millis(10)).unwrap();
        assert_eq!(rig.log.borrow().recenters, 1);
    }

    // ── timing and kinematics ───────────────────────────────────────────

    #[test]
    fn first_frame_has_zero_dt_then_velocities_integrate() {
        let mut rig = rig(|_| {});
        rig.tree.node_mut(rig.watched).unwrap().linear_velocity = Vec3::new(0.0, 0.0, -2.0);
        rig.start().unwrap();

        let base = Instant::now();
        rig.frame_at(base).unwrap();
        assert_eq!(rig.tree.node(rig.watched).unwrap().position, Vec3::ZERO);

        rig.frame_at(base + Duration::from_millis(100)).unwrap();
        let z = rig.tree.node(rig.watched).unwrap().position.z;
        assert!((z + 0.2).abs() < 1e-5);
    }

    #[test]
    fn long_pauses_are_clamped() {
        let mut rig = rig(|_| {});
        rig.tree.node_mut(rig.watched).unwrap().linear_velocity = Vec3::X;
        rig.start().unwrap();

        let base = Instant::now();
        rig.frame_at(base).unwrap();
        rig.frame_at(base + Duration::from_secs(5)).unwrap();
        let x = rig.tree.node(rig.watched).unwrap().position.x;
        assert!((x - 0.25).abs() < 1e-5);
    }

    // ── eye views ───────────────────────────────────────────────────────

    #[test]
    fn headset_node_places_the_eyes() {
        let mut rig = rig(|_| {});
        let root = rig.tree.root();
        let head = rig
            .tree
            .spawn(root, "headset", NodeState::at(Vec3::new(0.0, 1.6, 0.0)), None)
            .unwrap();
        rig.tree.node_mut(head).unwrap().rotation = 90.0;
        rig.driver.set_headset(Some(head));
        rig.start().unwrap();
        rig.frame_at(Instant::now()).unwrap();

        let seen = rig.seen.borrow();
        // A quarter turn about +Y carries the left eye offset (-X) onto +Z.
        let left = seen.positions[0];
        let right = seen.positions[1];
        assert!(left.abs_diff_eq(Vec3::new(0.0, 1.6, 0.03), 1e-5), "{left}");
        assert!(right.abs_diff_eq(Vec3::new(0.0, 1.6, -0.03), 1e-5), "{right}");
    }

    #[test]
    fn lights_published_in_update_reach_both_eye_passes() {
        let mut rig = rig(|_| {});
        let root = rig.tree.root();
        rig.tree
            .spawn(
                root,
                "lamp",
                NodeState::at(Vec3::Y),
                Some(Box::new(LightNode::new(Light::point(Default::default())))),
            )
            .unwrap();
        rig.start().unwrap();
        rig.frame_at(Instant::now()).unwrap();
        rig.frame_at(Instant::now()).unwrap();

        let lit = rig
            .gpu
            .count(|c| matches!(c, Call::BeginEyePass { point_lights: 1, .. }));
        assert_eq!(lit, 4);
    }

    // ── shutdown ────────────────────────────────────────────────────────

    #[test]
    fn shutdown_reaches_live_nodes_once_and_ends_the_session() {
        let mut rig = rig(|_| {});
        rig.start().unwrap();
        rig.frame_at(Instant::now()).unwrap();

        rig.shutdown();
        rig.shutdown();

        assert_eq!(rig.seen.borrow().shutdowns, 1);
        assert_eq!(rig.log.borrow().ends, 1);
        assert_eq!(rig.driver.state(), DriverState::Terminated);
        assert_eq!(rig.gpu.count(|c| matches!(c, Call::DestroyRenderTarget(_))), 4);

        let shutdown_at = rig.gpu.position(|c| matches!(c, Call::DestroyRenderTarget(_))).unwrap();
        assert!(shutdown_at > rig.gpu.position(|c| matches!(c, Call::EndEyePass)).unwrap());
        assert!(rig.driver.presented_images().is_none());
        assert!(matches!(rig.frame_at(Instant::now()), Err(DriverError::InvalidState { .. })));
    }

    #[test]
    fn shutdown_before_start_still_ends_the_session() {
        let mut rig = rig(|_| {});
        rig.shutdown();
        assert_eq!(rig.seen.borrow().shutdowns, 0);
        assert_eq!(rig.log.borrow().ends, 1);
    }
}
