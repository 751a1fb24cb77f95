use std::collections::HashMap;

use glam::Mat4;

use super::{AnimationClip, Channel, ImportNode};

/// Substituted when a clip leaves its tick rate unspecified.
pub const DEFAULT_TICKS_PER_SECOND: f32 = 25.0;

/// Offset and last sampled final transform of one bone.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoneInfo {
    pub offset: Mat4,
    pub final_transform: Mat4,
}

/// Samples a node hierarchy into final bone matrices.
///
/// Bone indices are assigned in registration order and never change, so
/// vertex bone ids baked at import time stay valid for the animator's
/// lifetime.
#[derive(Debug, Clone)]
pub struct SkeletalAnimator {
    root: ImportNode,
    global_inverse: Mat4,
    bone_map: HashMap<String, usize>,
    bones: Vec<BoneInfo>,
    palette: Vec<Mat4>,
    clips: Vec<AnimationClip>,
    /// Per clip: node name → channel index.
    channel_maps: Vec<HashMap<String, usize>>,
    active: Option<usize>,
}

impl SkeletalAnimator {
    pub fn new(root: ImportNode) -> Self {
        let global_inverse = root.transform.inverse();
        Self {
            root,
            global_inverse,
            bone_map: HashMap::new(),
            bones: Vec::new(),
            palette: Vec::new(),
            clips: Vec::new(),
            channel_maps: Vec::new(),
            active: None,
        }
    }

    /// Returns the index of `name`, registering it with `offset` if new.
    ///
    /// The offset of an already registered bone is kept.
    pub fn register_bone(&mut self, name: &str, offset: Mat4) -> usize {
        if let Some(&index) = self.bone_map.get(name) {
            return index;
        }
        let index = self.bones.len();
        self.bone_map.insert(name.to_owned(), index);
        self.bones.push(BoneInfo {
            offset,
            final_transform: Mat4::IDENTITY,
        });
        self.palette.push(Mat4::IDENTITY);
        index
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bone_map.get(name).copied()
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bones(&self) -> &[BoneInfo] {
        &self.bones
    }

    /// Last sampled final transform of bone `index`; identity when out of range.
    pub fn bone_transform(&self, index: usize) -> Mat4 {
        match self.palette.get(index) {
            Some(m) => *m,
            None => {
                log::warn!(
                    "bone index {index} out of range ({} bones); using identity",
                    self.palette.len()
                );
                Mat4::IDENTITY
            }
        }
    }

    /// Last sampled palette, one matrix per registered bone.
    pub fn palette(&self) -> &[Mat4] {
        &self.palette
    }

    /// Adds a clip. The first clip added becomes active.
    pub fn add_clip(&mut self, clip: AnimationClip) {
        let mut map = HashMap::with_capacity(clip.channels.len());
        for (i, ch) in clip.channels.iter().enumerate() {
            if !ch.is_well_formed() {
                log::warn!(
                    "clip '{}': channel for '{}' lacks keys; node keeps its static transform",
                    clip.name,
                    ch.node_name
                );
                continue;
            }
            map.entry(ch.node_name.clone()).or_insert(i);
        }
        self.clips.push(clip);
        self.channel_maps.push(map);
        if self.active.is_none() {
            self.active = Some(0);
        }
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    pub fn active_clip(&self) -> Option<usize> {
        self.active
    }

    /// Selects the clip sampled by [`sample`](Self::sample). Out-of-range
    /// indices are ignored.
    pub fn set_active_clip(&mut self, index: usize) {
        if index < self.clips.len() {
            self.active = Some(index);
        } else {
            log::warn!("clip index {index} out of range ({} clips)", self.clips.len());
        }
    }

    /// Samples the active clip at `seconds` and returns the bone palette.
    ///
    /// Time wraps at the clip duration. Without an active clip the static
    /// hierarchy is evaluated. Bones not reached by the walk are identity.
    pub fn sample(&mut self, seconds: f32) -> &[Mat4] {
        let (clip, channels) = match self.active {
            Some(i) => (self.clips.get(i), self.channel_maps.get(i)),
            None => (None, None),
        };
        let ticks = clip.map_or(0.0, |c| clip_ticks(c, seconds));

        for bone in &mut self.bones {
            bone.final_transform = Mat4::IDENTITY;
        }

        let walk = Walk {
            ticks,
            clip,
            channels,
            bone_map: &self.bone_map,
            global_inverse: self.global_inverse,
        };
        walk.node(&self.root, Mat4::IDENTITY, &mut self.bones);

        for (slot, bone) in self.palette.iter_mut().zip(&self.bones) {
            *slot = bone.final_transform;
        }
        &self.palette
    }
}

/// Converts wall seconds to clip ticks wrapped into `[0, duration)`.
fn clip_ticks(clip: &AnimationClip, seconds: f32) -> f32 {
    let tps = if clip.ticks_per_second != 0.0 {
        clip.ticks_per_second
    } else {
        DEFAULT_TICKS_PER_SECOND
    };
    if clip.duration <= 0.0 {
        return 0.0;
    }
    (seconds * tps).rem_euclid(clip.duration)
}

struct Walk<'a> {
    ticks: f32,
    clip: Option<&'a AnimationClip>,
    channels: Option<&'a HashMap<String, usize>>,
    bone_map: &'a HashMap<String, usize>,
    global_inverse: Mat4,
}

impl Walk<'_> {
    fn channel(&self, name: &str) -> Option<&Channel> {
        let index = *self.channels?.get(name)?;
        self.clip?.channels.get(index)
    }

    fn node(&self, node: &ImportNode, parent: Mat4, bones: &mut [BoneInfo]) {
        let local = match self.channel(&node.name) {
            Some(ch) => Mat4::from_scale_rotation_translation(
                ch.scale_at(self.ticks),
                ch.rotation_at(self.ticks),
                ch.position_at(self.ticks),
            ),
            None => node.transform,
        };
        let global = parent * local;

        if let Some(&index) = self.bone_map.get(&node.name) {
            if let Some(bone) = bones.get_mut(index) {
                bone.final_transform = self.global_inverse * global * bone.offset;
            }
        }

        for child in &node.children {
            self.node(child, global, bones);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::{QuatKey, VectorKey};
    use glam::{Quat, Vec3};

    fn key(time: f32, v: Vec3) -> VectorKey {
        VectorKey { time, value: v }
    }

    fn rot(time: f32, q: Quat) -> QuatKey {
        QuatKey { time, value: q }
    }

    fn approx(a: Mat4, b: Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    /// root → hip → knee, with hip translated and knee animated.
    fn rig() -> SkeletalAnimator {
        let root = ImportNode::new("root", Mat4::IDENTITY).with_child(
            ImportNode::new("hip", Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)))
                .with_child(ImportNode::new("knee", Mat4::from_translation(Vec3::new(0.0, -0.5, 0.0)))),
        );
        let mut anim = SkeletalAnimator::new(root);
        anim.register_bone("hip", Mat4::IDENTITY);
        anim.register_bone("knee", Mat4::IDENTITY);
        anim
    }

    fn knee_clip(ticks_per_second: f32, duration: f32) -> AnimationClip {
        AnimationClip {
            name: "walk".into(),
            ticks_per_second,
            duration,
            channels: vec![Channel {
                node_name: "knee".into(),
                positions: vec![key(0.0, Vec3::ZERO), key(duration, Vec3::new(0.0, 0.0, 2.0))],
                rotations: vec![
                    rot(0.0, Quat::IDENTITY),
                    rot(duration, Quat::from_rotation_x(1.0)),
                ],
                scales: vec![key(0.0, Vec3::ONE)],
            }],
        }
    }

    // ── bone registry ───────────────────────────────────────────────────

    #[test]
    fn bones_are_indexed_in_registration_order() {
        let mut anim = rig();
        assert_eq!(anim.bone_index("hip"), Some(0));
        assert_eq!(anim.bone_index("knee"), Some(1));
        assert_eq!(anim.register_bone("hip", Mat4::from_scale(Vec3::splat(2.0))), 0);
        assert_eq!(anim.bones()[0].offset, Mat4::IDENTITY);
        assert_eq!(anim.register_bone("toe", Mat4::IDENTITY), 2);
    }

    #[test]
    fn out_of_range_bone_is_identity() {
        let anim = rig();
        assert_eq!(anim.bone_transform(99), Mat4::IDENTITY);
    }

    // ── static pose ─────────────────────────────────────────────────────

    #[test]
    fn without_clip_static_hierarchy_is_used() {
        let mut anim = rig();
        let palette = anim.sample(3.0).to_vec();
        assert!(approx(palette[0], Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0))));
        assert!(approx(palette[1], Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0))));
    }

    #[test]
    fn unreached_bone_is_identity() {
        let mut anim = rig();
        anim.register_bone("floating", Mat4::from_translation(Vec3::X));
        let palette = anim.sample(0.0).to_vec();
        assert_eq!(palette[2], Mat4::IDENTITY);
    }

    #[test]
    fn root_transform_is_factored_out() {
        let root = ImportNode::new("root", Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)))
            .with_child(ImportNode::new("b", Mat4::IDENTITY));
        let mut anim = SkeletalAnimator::new(root);
        anim.register_bone("b", Mat4::IDENTITY);
        assert!(approx(anim.sample(0.0)[0], Mat4::IDENTITY));
    }

    #[test]
    fn offset_is_applied_last() {
        let root = ImportNode::new("root", Mat4::IDENTITY)
            .with_child(ImportNode::new("b", Mat4::from_translation(Vec3::Y)));
        let mut anim = SkeletalAnimator::new(root);
        anim.register_bone("b", Mat4::from_translation(-Vec3::Y));
        // Bind pose: the inverse bind cancels the bone transform.
        assert!(approx(anim.sample(0.0)[0], Mat4::IDENTITY));
    }

    // ── sampling ────────────────────────────────────────────────────────

    #[test]
    fn channel_overrides_static_transform() {
        let mut anim = rig();
        anim.add_clip(knee_clip(1.0, 4.0));

        let palette = anim.sample(2.0).to_vec();
        // hip static at y = 1, knee animated to z = 1 halfway.
        let knee_origin = palette[1].transform_point3(Vec3::ZERO);
        assert!((knee_origin - Vec3::new(0.0, 1.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn animation_loops_at_duration() {
        let mut anim = rig();
        // 50 ticks at 25 tps: a 2 s loop.
        anim.add_clip(knee_clip(25.0, 50.0));

        let a = anim.sample(0.5).to_vec();
        let b = anim.sample(2.5).to_vec();
        assert_eq!(a, b);
    }

    #[test]
    fn unspecified_tick_rate_defaults_to_25() {
        let clip = knee_clip(0.0, 100.0);
        assert_eq!(clip_ticks(&clip, 2.0), 50.0);
    }

    #[test]
    fn zero_duration_samples_first_frame() {
        let clip = knee_clip(1.0, 0.0);
        assert_eq!(clip_ticks(&clip, 7.3), 0.0);
    }

    #[test]
    fn clip_without_channels_uses_static_pose() {
        let mut anim = rig();
        anim.add_clip(AnimationClip {
            name: "empty".into(),
            ticks_per_second: 30.0,
            duration: 10.0,
            channels: Vec::new(),
        });
        let palette = anim.sample(0.2).to_vec();
        assert!(approx(palette[1], Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0))));
    }

    #[test]
    fn malformed_channel_is_ignored() {
        let mut anim = rig();
        let mut clip = knee_clip(1.0, 4.0);
        clip.channels[0].scales.clear();
        anim.add_clip(clip);

        let palette = anim.sample(2.0).to_vec();
        assert!(approx(palette[1], Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0))));
    }

    #[test]
    fn active_clip_selection() {
        let mut anim = rig();
        anim.add_clip(knee_clip(1.0, 4.0));
        anim.add_clip(knee_clip(1.0, 8.0));
        assert_eq!(anim.active_clip(), Some(0));

        anim.set_active_clip(1);
        assert_eq!(anim.active_clip(), Some(1));
        anim.set_active_clip(5);
        assert_eq!(anim.active_clip(), Some(1));
    }
}
