use glam::{Quat, Vec3};

/// Position or scale key. `time` is in ticks.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VectorKey {
    pub time: f32,
    pub value: Vec3,
}

/// Rotation key. `time` is in ticks.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuatKey {
    pub time: f32,
    pub value: Quat,
}

/// Keyframes animating one named node. Keys are time-ordered and every
/// attribute holds at least one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub node_name: String,
    pub positions: Vec<VectorKey>,
    pub rotations: Vec<QuatKey>,
    pub scales: Vec<VectorKey>,
}

/// A named animation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Zero means "unspecified"; the animator substitutes a default.
    pub ticks_per_second: f32,
    /// Length in ticks.
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl Channel {
    /// True if every attribute has at least one key.
    pub fn is_well_formed(&self) -> bool {
        !self.positions.is_empty() && !self.rotations.is_empty() && !self.scales.is_empty()
    }

    pub fn position_at(&self, ticks: f32) -> Vec3 {
        match self.positions.as_slice() {
            [] => Vec3::ZERO,
            [only] => only.value,
            keys => {
                let (i, f) = segment(keys.len(), |k| keys[k].time, ticks);
                keys[i].value.lerp(keys[i + 1].value, f)
            }
        }
    }

    pub fn rotation_at(&self, ticks: f32) -> Quat {
        match self.rotations.as_slice() {
            [] => Quat::IDENTITY,
            [only] => only.value,
            keys => {
                let (i, f) = segment(keys.len(), |k| keys[k].time, ticks);
                keys[i].value.slerp(keys[i + 1].value, f).normalize()
            }
        }
    }

    pub fn scale_at(&self, ticks: f32) -> Vec3 {
        match self.scales.as_slice() {
            [] => Vec3::ONE,
            [only] => only.value,
            keys => {
                let (i, f) = segment(keys.len(), |k| keys[k].time, ticks);
                keys[i].value.lerp(keys[i + 1].value, f)
            }
        }
    }
}

/// Finds the key segment containing `ticks` and the blend factor within it.
///
/// Linear search for the first `i` with `ticks < time(i + 1)`; times past the
/// last key use the final segment. The factor is clamped to `[0, 1]` and is
/// zero for zero-length segments. Requires `len >= 2`.
fn segment(len: usize, time: impl Fn(usize) -> f32, ticks: f32) -> (usize, f32) {
    let i = (0..len - 1)
        .find(|&i| ticks < time(i + 1))
        .unwrap_or(len - 2);

    let (t0, t1) = (time(i), time(i + 1));
    let span = t1 - t0;
    let factor = if span > 0.0 {
        ((ticks - t0) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (i, factor)
}
