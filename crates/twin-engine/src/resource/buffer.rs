use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Receiver;

use crate::gpu::{BufferSpec, GpuBackend, GpuError, ResourceHandle};

use super::{Aspects, ChangeFeed, DirtyMask, ResourceStatus};

/// Binding point of a buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum BufferTarget {
    #[default]
    Vertex,
    Index,
    Uniform,
}

/// Update-frequency hint.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum BufferUsage {
    #[default]
    Static,
    Dynamic,
    Stream,
}

/// Property change notifications of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferEvent {
    TargetChanged(BufferTarget),
    UsageChanged(BufferUsage),
    /// New data was staged; carries its length in bytes.
    DataChanged(usize),
    StatusChanged(ResourceStatus),
}

#[derive(Debug, Default)]
struct Pending {
    target: BufferTarget,
    usage: BufferUsage,
    data: Vec<u8>,
    status: ResourceStatus,
}

#[derive(Debug, Default)]
struct Shared {
    pending: Mutex<Pending>,
    dirty: DirtyMask,
    feed: ChangeFeed<BufferEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Thread-safe property handle of a [`Buffer`].
#[derive(Debug, Clone)]
pub struct BufferProps {
    shared: Arc<Shared>,
}

impl BufferProps {
    pub fn set_target(&self, target: BufferTarget) {
        self.stage(|p| {
            (p.target != target).then(|| {
                p.target = target;
                (Aspects::TARGET, BufferEvent::TargetChanged(target))
            })
        });
    }

    pub fn set_usage(&self, usage: BufferUsage) {
        self.stage(|p| {
            (p.usage != usage).then(|| {
                p.usage = usage;
                (Aspects::USAGE, BufferEvent::UsageChanged(usage))
            })
        });
    }

    pub fn set_data(&self, data: impl Into<Vec<u8>>) {
        let data = data.into();
        self.stage(|p| {
            (p.data != data).then(|| {
                let len = data.len();
                p.data = data;
                (Aspects::DATA, BufferEvent::DataChanged(len))
            })
        });
    }

    pub fn target(&self) -> BufferTarget {
        self.shared.lock().target
    }

    pub fn usage(&self) -> BufferUsage {
        self.shared.lock().usage
    }

    pub fn data_len(&self) -> usize {
        self.shared.lock().data.len()
    }

    pub fn status(&self) -> ResourceStatus {
        self.shared.lock().status
    }

    pub fn is_dirty(&self) -> bool {
        !self.shared.dirty.is_clean()
    }

    pub fn revision(&self) -> u64 {
        self.shared.feed.revision()
    }

    pub fn subscribe(&self) -> Receiver<BufferEvent> {
        self.shared.feed.subscribe()
    }

    fn stage(&self, f: impl FnOnce(&mut Pending) -> Option<(Aspects, BufferEvent)>) {
        let event = {
            let mut pending = self.shared.lock();
            let change = f(&mut pending);
            if let Some((aspect, _)) = &change {
                self.shared.dirty.mark(*aspect);
            }
            change.map(|(_, event)| event)
        };
        if let Some(event) = event {
            self.shared.feed.publish(&[event]);
        }
    }
}

/// Render-thread owner of a GPU buffer.
///
/// The native buffer is allocated on the first `apply` and re-specified in
/// place afterwards. `release` must be called before drop to free it.
#[derive(Debug)]
pub struct Buffer {
    label: String,
    shared: Arc<Shared>,
    handle: Option<ResourceHandle>,
    bound_target: BufferTarget,
}

impl Buffer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            shared: Arc::default(),
            handle: None,
            bound_target: BufferTarget::default(),
        }
    }

    pub fn with_target(label: impl Into<String>, target: BufferTarget) -> Self {
        let buffer = Self::new(label);
        buffer.props().set_target(target);
        buffer
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn props(&self) -> BufferProps {
        BufferProps {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn handle(&self) -> Option<ResourceHandle> {
        self.handle
    }

    pub fn status(&self) -> ResourceStatus {
        self.shared.lock().status
    }

    pub fn is_dirty(&self) -> bool {
        !self.shared.dirty.is_clean()
    }

    /// Realizes staged changes. Returns `false` when nothing was dirty.
    ///
    /// Target, usage and data are realized together in one
    /// re-specification, so the binding point is always settled before the
    /// data lands in it.
    pub fn apply(&mut self, gpu: &mut dyn GpuBackend) -> bool {
        if self.shared.dirty.is_clean() {
            return false;
        }

        let shared = Arc::clone(&self.shared);
        let status_event = {
            let mut pending = shared.lock();
            let bits = shared.dirty.get();

            let outcome = self.ensure_handle(gpu).and_then(|handle| {
                gpu.specify_buffer(
                    handle,
                    &BufferSpec {
                        target: pending.target,
                        usage: pending.usage,
                        data: &pending.data,
                    },
                )
            });
            shared.dirty.clear(bits);

            let status = match outcome {
                Ok(()) => {
                    self.bound_target = pending.target;
                    log::trace!(
                        "buffer '{}': applied {:?} ({} bytes)",
                        self.label,
                        bits,
                        pending.data.len()
                    );
                    ResourceStatus::Ready
                }
                Err(err) => {
                    log::error!("buffer '{}': {err}", self.label);
                    ResourceStatus::Error
                }
            };

            (pending.status != status).then(|| {
                pending.status = status;
                BufferEvent::StatusChanged(status)
            })
        };

        if let Some(event) = status_event {
            shared.feed.publish(&[event]);
        }
        true
    }

    /// Binds the buffer at the target it was last realized with.
    /// No-op while unallocated.
    pub fn bind(&self, gpu: &mut dyn GpuBackend) {
        if let Some(handle) = self.handle {
            gpu.bind_buffer(handle, self.bound_target);
        }
    }

    /// Destroys the native buffer. Subsequent calls are no-ops.
    pub fn release(&mut self, gpu: &mut dyn GpuBackend) {
        if let Some(handle) = self.handle.take() {
            gpu.destroy_buffer(handle);
            log::debug!("buffer '{}': released", self.label);
        }
    }

    fn ensure_handle(&mut self, gpu: &mut dyn GpuBackend) -> Result<ResourceHandle, GpuError> {
        if let Some(handle) = self.handle {
            return Ok(handle);
        }
        let handle = gpu.create_buffer(&self.label)?;
        log::debug!("buffer '{}': allocated {:?}", self.label, handle);
        self.handle = Some(handle);
        Ok(handle)
    }
}
