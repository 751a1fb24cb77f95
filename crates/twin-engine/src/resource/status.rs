/// Load/realization status of an asynchronously sourced resource.
///
/// `None → Loading → {Processing → Ready | Error}`. `Error` is terminal until
/// a new load request is issued.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ResourceStatus {
    #[default]
    None,
    Loading,
    Processing,
    Ready,
    Error,
}

impl ResourceStatus {
    /// True while a load is outstanding or its payload awaits upload.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Loading | Self::Processing)
    }
}
