//! Head-mounted display sessions.
//!
//! [`HmdSession`] is the boundary to a headset runtime: tracking, per-eye
//! lens description, frame submission. [`DesktopSession`] stands in when no
//! headset is attached.

mod desktop;
mod session;
mod swap_chain;

pub use desktop::{DesktopSession, DesktopSessionConfig};
pub use session::{Eye, EyeLayer, EyeLayerImage, EyeRenderDesc, HmdInfo, HmdSession, SessionStatus, SubmitError};
pub use swap_chain::EyeSwapChain;
