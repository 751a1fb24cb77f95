//! Skeletal animation.
//!
//! Imported skeletons are sampled on the render thread once per frame into a
//! palette of final bone matrices consumed by the skinning shader.

mod animator;
mod clip;
mod skeleton;

pub use animator::{BoneInfo, SkeletalAnimator, DEFAULT_TICKS_PER_SECOND};
pub use clip::{AnimationClip, Channel, QuatKey, VectorKey};
pub use skeleton::{ImportBone, ImportNode, VertexWeight};
