use std::collections::HashSet;

use anyhow::Result;
use crossbeam_channel::Receiver;
use glam::{Vec3, Vec4};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use twin_engine::core::{App, AppControl, FrameCtx, SetupCtx};
use twin_engine::gpu::SamplerSpec;
use twin_engine::resource::{Bitmap, Texture, TextureFilter, TextureWrap};
use twin_engine::scene::{
    cube, plane, Attenuation, Light, LightNode, MeshEvent, NodeId, NodeState, SkinnedMesh, StaticMesh,
};

/// Head height of the rig above the floor, in meters.
const EYE_HEIGHT: f32 = 1.6;
/// Walking speed in m/s and turning speed in degrees/s.
const WALK_SPEED: f32 = 1.5;
const TURN_SPEED: f32 = 60.0;

#[derive(Debug, Default)]
pub struct RoomOptions {
    pub model: Option<String>,
    pub texture: Option<String>,
}

pub struct Room {
    options: RoomOptions,
    headset: Option<NodeId>,
    held: HashSet<KeyCode>,
    recenter: bool,
    model_events: Option<Receiver<MeshEvent>>,
}

impl Room {
    pub fn new(options: RoomOptions) -> Self {
        Self {
            options,
            headset: None,
            held: HashSet::new(),
            recenter: false,
            model_events: None,
        }
    }

    fn on_key(&mut self, event: &KeyEvent) -> AppControl {
        let PhysicalKey::Code(code) = event.physical_key else {
            return AppControl::Continue;
        };
        match event.state {
            ElementState::Pressed => {
                match code {
                    KeyCode::Escape => return AppControl::Exit,
                    KeyCode::KeyR if !event.repeat => self.recenter = true,
                    _ => {}
                }
                self.held.insert(code);
            }
            ElementState::Released => {
                self.held.remove(&code);
            }
        }
        AppControl::Continue
    }

    fn axis(&self, negative: KeyCode, positive: KeyCode) -> f32 {
        let mut value = 0.0;
        if self.held.contains(&negative) {
            value -= 1.0;
        }
        if self.held.contains(&positive) {
            value += 1.0;
        }
        value
    }
}

impl App for Room {
    fn setup(&mut self, ctx: &mut SetupCtx<'_>) -> Result<()> {
        let root = ctx.tree.root();
        let loader = ctx.loader;

        // ── static geometry ──
        let floor_texture = Texture::from_bitmap(
            "floor",
            loader.clone(),
            Bitmap::checker(256, 8, [200, 200, 200, 255], [90, 90, 100, 255]),
            SamplerSpec {
                filter: TextureFilter::Anisotropic,
                wrap_s: TextureWrap::Repeat,
                wrap_t: TextureWrap::Repeat,
            },
        );
        let floor = StaticMesh::new("floor", &plane(20.0, 10.0))
            .with_texture(floor_texture)
            .with_specular(0.1, 8.0);
        ctx.tree.spawn(root, "floor", NodeState::default(), Some(Box::new(floor)))?;

        let cube_texture = match &self.options.texture {
            Some(source) => {
                let texture = Texture::new("cube", loader.clone());
                texture.props().set_source(source);
                texture
            }
            None => Texture::from_bitmap(
                "cube",
                loader.clone(),
                Bitmap::checker(64, 4, [230, 120, 40, 255], [250, 240, 220, 255]),
                SamplerSpec::default(),
            ),
        };
        let crate_mesh = StaticMesh::new("cube", &cube(0.6))
            .with_texture(cube_texture)
            .with_specular(0.6, 32.0);
        let mut spinning = NodeState::at(Vec3::new(0.0, 0.8, -2.0));
        spinning.angular_velocity = Vec3::new(0.0, 30.0, 0.0);
        ctx.tree.spawn(root, "cube", spinning, Some(Box::new(crate_mesh)))?;

        let block = StaticMesh::new("block", &cube(0.4)).with_color(Vec4::new(0.3, 0.5, 0.9, 1.0));
        let mut block_state = NodeState::at(Vec3::new(-2.5, 0.4, -3.5));
        block_state.scale = 2.0;
        ctx.tree.spawn(root, "block", block_state, Some(Box::new(block)))?;

        if let Some(source) = &self.options.model {
            let model = SkinnedMesh::new("model", loader.clone());
            let props = model.props();
            self.model_events = Some(props.subscribe());
            props.set_source(source);
            ctx.tree
                .spawn(root, "model", NodeState::at(Vec3::new(1.8, 0.0, -2.5)), Some(Box::new(model)))?;
        }

        // ── lights ──
        let sun = Light::directional(Vec3::new(-0.4, -1.0, -0.3)).with_intensity(0.25, 0.6);
        ctx.tree
            .spawn(root, "sun", NodeState::default(), Some(Box::new(LightNode::new(sun))))?;

        // A point light circling the cube on a rotating pivot.
        let mut pivot = NodeState::at(Vec3::new(0.0, 0.0, -2.0));
        pivot.angular_velocity = Vec3::new(0.0, -45.0, 0.0);
        let pivot = ctx.tree.spawn(root, "lamp pivot", pivot, None)?;
        let lamp = Light::point(Attenuation {
            constant: 1.0,
            linear: 0.2,
            exp: 0.1,
        })
        .with_color(Vec3::new(1.0, 0.8, 0.5))
        .with_intensity(0.0, 1.2);
        ctx.tree.spawn(
            pivot,
            "lamp",
            NodeState::at(Vec3::new(1.5, 1.8, 0.0)),
            Some(Box::new(LightNode::new(lamp))),
        )?;

        // ── headset rig, with a flashlight looking where the head looks ──
        let headset = ctx
            .tree
            .spawn(root, "headset", NodeState::at(Vec3::new(0.0, EYE_HEIGHT, 1.5)), None)?;
        let flashlight = Light::spot(
            Vec3::NEG_Z,
            20.0,
            Attenuation {
                constant: 1.0,
                linear: 0.05,
                exp: 0.01,
            },
        )
        .with_intensity(0.0, 0.8);
        ctx.tree.spawn(
            headset,
            "flashlight",
            NodeState::at(Vec3::new(0.0, -0.2, 0.0)),
            Some(Box::new(LightNode::new(flashlight))),
        )?;

        ctx.driver.set_headset(Some(headset));
        self.headset = Some(headset);

        log::info!("room ready: {} node(s)", ctx.tree.len());
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. } => self.on_key(event),
            WindowEvent::Focused(false) => {
                self.held.clear();
                AppControl::Continue
            }
            _ => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl {
        if std::mem::take(&mut self.recenter) {
            ctx.recenter();
        }

        let walk = Vec3::new(
            self.axis(KeyCode::KeyA, KeyCode::KeyD),
            0.0,
            self.axis(KeyCode::KeyW, KeyCode::KeyS),
        );
        let turn = self.axis(KeyCode::KeyE, KeyCode::KeyQ);
        if let Some(head) = self.headset.and_then(|id| ctx.node_mut(id)) {
            head.linear_velocity = walk.normalize_or_zero() * WALK_SPEED;
            head.angular_velocity = Vec3::new(0.0, turn * TURN_SPEED, 0.0);
        }

        if let Some(events) = &self.model_events {
            for event in events.try_iter() {
                if let MeshEvent::StatusChanged(status) = event {
                    log::info!("model status: {status:?}");
                }
            }
        }

        let stats = ctx.stats();
        if stats.presented > 0 && stats.presented % 900 == 0 {
            log::debug!(
                "{} frame(s) presented, {} skipped, {} hidden",
                stats.presented,
                stats.skipped,
                stats.not_visible
            );
        }

        AppControl::Continue
    }
}
