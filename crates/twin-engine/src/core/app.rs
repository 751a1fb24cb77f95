use anyhow::Result;
use winit::event::WindowEvent;

use crate::hmd::{DesktopSession, DesktopSessionConfig, HmdSession};

use super::ctx::{FrameCtx, SetupCtx};

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract run by [`Runtime`](crate::window::Runtime).
pub trait App {
    /// Opens the HMD session the frame driver renders for.
    ///
    /// Defaults to a [`DesktopSession`] so applications run without a headset.
    fn session(&mut self) -> Result<Box<dyn HmdSession>> {
        Ok(Box::new(DesktopSession::new(DesktopSessionConfig::default())))
    }

    /// Builds the scene. Called once, before the driver starts; nodes spawned
    /// here are initialized by the driver's start.
    fn setup(&mut self, ctx: &mut SetupCtx<'_>) -> Result<()>;

    /// Called for window events before the runtime handles them.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called once per frame, before the driver's update/render/submit.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl;
}
