//! GPU resources with dirty-flag staging.
//!
//! Every resource is split in two halves:
//! - a cloneable, `Send + Sync` props handle (`BufferProps`, `TextureProps`)
//!   that any thread may use to change properties;
//! - a render-thread owner (`Buffer`, `Texture`) that holds the native handle
//!   and realizes staged changes in `apply`.
//!
//! Setters never touch the GPU. They record the new value under the
//! resource lock and mark an aspect dirty; `apply` consumes exactly the
//! aspects it realized.

mod bitmap;
mod buffer;
mod dirty;
mod observe;
mod source;
mod status;
mod texture;

pub use bitmap::{Bitmap, PixelFormat};
pub use buffer::{Buffer, BufferEvent, BufferProps, BufferTarget, BufferUsage};
pub use dirty::{Aspects, DirtyMask};
pub use observe::ChangeFeed;
pub use source::SourceState;
pub use status::ResourceStatus;
pub use texture::{Texture, TextureEvent, TextureFilter, TextureProps, TextureWrap};
