use crate::gpu::{GpuBackend, GpuError, ResourceHandle};

/// Double-buffered render target of one eye.
///
/// Rendering goes into [`current`](Self::current); [`commit`](Self::commit)
/// hands that image over and advances to the other one.
#[derive(Debug)]
pub struct EyeSwapChain {
    images: [ResourceHandle; 2],
    size: (u32, u32),
    current: usize,
    committed: Option<ResourceHandle>,
}

impl EyeSwapChain {
    pub fn create(gpu: &mut dyn GpuBackend, label: &str, width: u32, height: u32) -> Result<Self, GpuError> {
        let first = gpu.create_render_target(&format!("{label} 0"), width, height)?;
        let second = match gpu.create_render_target(&format!("{label} 1"), width, height) {
            Ok(handle) => handle,
            Err(err) => {
                gpu.destroy_render_target(first);
                return Err(err);
            }
        };
        log::debug!("eye swap chain '{label}': {width}x{height}");
        Ok(Self {
            images: [first, second],
            size: (width, height),
            current: 0,
            committed: None,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn current(&self) -> ResourceHandle {
        self.images[self.current]
    }

    /// Most recently committed image.
    pub fn committed(&self) -> Option<ResourceHandle> {
        self.committed
    }

    /// Commits the current image and returns it.
    pub fn commit(&mut self) -> ResourceHandle {
        let image = self.images[self.current];
        self.committed = Some(image);
        self.current = 1 - self.current;
        image
    }

    pub fn destroy(self, gpu: &mut dyn GpuBackend) {
        for image in self.images {
            gpu.destroy_render_target(image);
        }
    }
}
