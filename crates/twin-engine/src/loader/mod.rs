//! Asynchronous resource loading.
//!
//! A small pool of worker threads resolves URIs, reads bytes and decodes
//! images or imports models. Workers never touch GPU state: every job ends by
//! sending a generation-tagged [`Completion`] to the requesting resource's
//! completion queue, which the render thread drains once per frame.

mod assets;
mod error;
mod decode;
mod model;
mod pool;
mod uri;

pub use assets::EmbeddedAssets;
pub use error::LoadError;
pub use decode::decode_image;
pub use model::{import_model, ModelMaterial, PreparedModel};
pub use pool::{AsyncLoader, Completion, LoaderConfig, LoaderHandle};
pub use uri::ResourceUri;

#[cfg(test)]
pub(crate) use decode::encode_png;
#[cfg(test)]
pub(crate) use pool::{detached_handle, Job};
