use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::Vec3;

use super::{NodeBehavior, NodeCtx, NodeState};

pub const MAX_POINT_LIGHTS: usize = 4;
pub const MAX_SPOT_LIGHTS: usize = 4;

/// Distance falloff `1 / (constant + linear·d + exp·d²)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub exp: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.0,
            exp: 0.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LightKind {
    Directional {
        direction: Vec3,
    },
    Point {
        attenuation: Attenuation,
    },
    Spot {
        attenuation: Attenuation,
        direction: Vec3,
        /// Half-angle of the cone in degrees.
        cutoff_degrees: f32,
    },
}

/// Light description. Directions are in the owning node's frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    pub color: Vec3,
    pub ambient_intensity: f32,
    pub diffuse_intensity: f32,
    pub kind: LightKind,
}

impl Light {
    pub fn directional(direction: Vec3) -> Self {
        Self {
            color: Vec3::ONE,
            ambient_intensity: 0.1,
            diffuse_intensity: 0.8,
            kind: LightKind::Directional { direction },
        }
    }

    pub fn point(attenuation: Attenuation) -> Self {
        Self {
            color: Vec3::ONE,
            ambient_intensity: 0.0,
            diffuse_intensity: 1.0,
            kind: LightKind::Point { attenuation },
        }
    }

    pub fn spot(direction: Vec3, cutoff_degrees: f32, attenuation: Attenuation) -> Self {
        Self {
            color: Vec3::ONE,
            ambient_intensity: 0.0,
            diffuse_intensity: 1.0,
            kind: LightKind::Spot {
                attenuation,
                direction,
                cutoff_degrees,
            },
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_intensity(mut self, ambient: f32, diffuse: f32) -> Self {
        self.ambient_intensity = ambient;
        self.diffuse_intensity = diffuse;
        self
    }
}

/// A light in world space, as consumed by the shaders.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ResolvedLight {
    pub color: Vec3,
    pub ambient_intensity: f32,
    pub diffuse_intensity: f32,
    pub position: Vec3,
    /// Unit length; zero for point lights.
    pub direction: Vec3,
    pub attenuation: Attenuation,
    /// `cos` of the spot half-angle; zero for other kinds.
    pub cutoff_cos: f32,
}

/// Lights published for one frame.
#[derive(Debug, Default, Clone)]
pub struct LightSet {
    directional: Option<ResolvedLight>,
    points: Vec<ResolvedLight>,
    spots: Vec<ResolvedLight>,
    overflow_warned: bool,
}

impl LightSet {
    /// Forgets the previous frame's lights.
    pub fn clear(&mut self) {
        self.directional = None;
        self.points.clear();
        self.spots.clear();
    }

    /// Publishes `light` placed at `position` with its directions rotated by
    /// `orientation`. Returns `false` when the slot for its kind is full.
    pub fn publish(&mut self, light: &Light, position: Vec3, orientation: glam::Quat) -> bool {
        let mut resolved = ResolvedLight {
            color: light.color,
            ambient_intensity: light.ambient_intensity,
            diffuse_intensity: light.diffuse_intensity,
            position,
            direction: Vec3::ZERO,
            attenuation: Attenuation::default(),
            cutoff_cos: 0.0,
        };

        let accepted = match light.kind {
            LightKind::Directional { direction } => {
                resolved.direction = (orientation * direction).normalize_or_zero();
                if self.directional.is_some() {
                    false
                } else {
                    self.directional = Some(resolved);
                    true
                }
            }
            LightKind::Point { attenuation } => {
                resolved.attenuation = attenuation;
                push_bounded(&mut self.points, resolved, MAX_POINT_LIGHTS)
            }
            LightKind::Spot {
                attenuation,
                direction,
                cutoff_degrees,
            } => {
                resolved.attenuation = attenuation;
                resolved.direction = (orientation * direction).normalize_or_zero();
                resolved.cutoff_cos = cutoff_degrees.to_radians().cos();
                push_bounded(&mut self.spots, resolved, MAX_SPOT_LIGHTS)
            }
        };

        if !accepted && !self.overflow_warned {
            self.overflow_warned = true;
            log::warn!(
                "light limit reached (1 directional, {MAX_POINT_LIGHTS} point, {MAX_SPOT_LIGHTS} spot); extra lights are ignored"
            );
        }
        accepted
    }

    pub fn directional(&self) -> Option<&ResolvedLight> {
        self.directional.as_ref()
    }

    pub fn points(&self) -> &[ResolvedLight] {
        &self.points
    }

    pub fn spots(&self) -> &[ResolvedLight] {
        &self.spots
    }
}

fn push_bounded(list: &mut Vec<ResolvedLight>, light: ResolvedLight, max: usize) -> bool {
    if list.len() >= max {
        return false;
    }
    list.push(light);
    true
}

/// Thread-safe property handle of a [`LightNode`].
#[derive(Debug, Clone)]
pub struct LightProps {
    light: Arc<Mutex<Light>>,
}

impl LightProps {
    fn lock(&self) -> MutexGuard<'_, Light> {
        self.light.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Light {
        *self.lock()
    }

    pub fn set(&self, light: Light) {
        *self.lock() = light;
    }

    pub fn set_color(&self, color: Vec3) {
        self.lock().color = color;
    }

    pub fn set_intensity(&self, ambient: f32, diffuse: f32) {
        let mut light = self.lock();
        light.ambient_intensity = ambient;
        light.diffuse_intensity = diffuse;
    }
}

/// Behavior publishing a light at its node's world position every frame.
#[derive(Debug)]
pub struct LightNode {
    props: LightProps,
}

impl LightNode {
    pub fn new(light: Light) -> Self {
        Self {
            props: LightProps {
                light: Arc::new(Mutex::new(light)),
            },
        }
    }

    pub fn props(&self) -> LightProps {
        self.props.clone()
    }
}

impl NodeBehavior for LightNode {
    fn on_update(&mut self, node: &NodeState, ctx: &mut NodeCtx<'_>) {
        let pose = node.world_pose();
        ctx.lights.publish(&self.props.get(), pose.position, pose.orientation);
    }
}
