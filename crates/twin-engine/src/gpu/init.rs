/// Device settings read once by [`WgpuBackend::new`](super::WgpuBackend::new).
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Headsets are normally wired to the discrete GPU.
    pub power_preference: wgpu::PowerPreference,

    /// Device creation fails if the adapter lacks any of these.
    pub required_features: wgpu::Features,

    /// Enabled when the adapter offers them, skipped otherwise.
    ///
    /// Defaults to `ADDRESS_MODE_CLAMP_TO_BORDER`; without it border wrap
    /// degrades to edge clamping.
    pub optional_features: wgpu::Features,

    pub required_limits: wgpu::Limits,

    pub mirror: MirrorSurface,
}

/// Presentation of the desktop window showing both eye images.
#[derive(Debug, Clone)]
pub struct MirrorSurface {
    pub prefer_srgb: bool,

    /// The headset paces the frame loop, so the mirror must not block on vsync.
    pub present_mode: wgpu::PresentMode,

    /// Unsupported modes fall back to the first one the surface reports.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// One queued frame keeps the mirror showing the newest eye images.
    pub frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            optional_features: wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER,
            required_limits: wgpu::Limits::default(),
            mirror: MirrorSurface::default(),
        }
    }
}

impl Default for MirrorSurface {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode: None,
            frame_latency: 1,
        }
    }
}

impl GpuInit {
    /// Features to request from an adapter that offers `offered`.
    pub fn device_features(&self, offered: wgpu::Features) -> wgpu::Features {
        self.required_features | (self.optional_features & offered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_clamp_is_requested_only_when_offered() {
        let init = GpuInit::default();
        assert_eq!(init.device_features(wgpu::Features::empty()), wgpu::Features::empty());
        assert_eq!(
            init.device_features(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER | wgpu::Features::DEPTH_CLIP_CONTROL),
            wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER
        );
    }

    #[test]
    fn required_features_are_always_requested() {
        let init = GpuInit {
            required_features: wgpu::Features::DEPTH_CLIP_CONTROL,
            optional_features: wgpu::Features::empty(),
            ..GpuInit::default()
        };
        assert_eq!(
            init.device_features(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER),
            wgpu::Features::DEPTH_CLIP_CONTROL
        );
    }

    #[test]
    fn mirror_does_not_wait_for_vsync() {
        let mirror = MirrorSurface::default();
        assert_eq!(mirror.present_mode, wgpu::PresentMode::AutoNoVsync);
        assert_eq!(mirror.frame_latency, 1);
    }
}
