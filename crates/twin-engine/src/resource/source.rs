use super::ResourceStatus;

/// Source/generation bookkeeping for asynchronously loaded resources.
///
/// Every load request bumps the generation; completions carry the generation
/// they were issued under and are accepted only while it is still current.
#[derive(Debug, Clone, Default)]
pub struct SourceState {
    source: String,
    generation: u64,
    status: ResourceStatus,
}

impl SourceState {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> ResourceStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ResourceStatus) -> bool {
        let changed = self.status != status;
        self.status = status;
        changed
    }

    /// Records a new source string.
    ///
    /// Returns the generation to load under, or `None` when nothing must be
    /// loaded (unchanged or empty source). An empty source resets the
    /// status to `None` and invalidates in-flight loads.
    pub fn set_source(&mut self, source: &str) -> Option<u64> {
        if self.source == source {
            return None;
        }
        self.source = source.to_owned();
        self.generation += 1;

        if self.source.is_empty() {
            self.status = ResourceStatus::None;
            None
        } else {
            self.status = ResourceStatus::Loading;
            Some(self.generation)
        }
    }

    /// Re-requests the current source (e.g. after an error).
    pub fn reload(&mut self) -> Option<u64> {
        if self.source.is_empty() {
            return None;
        }
        self.generation += 1;
        self.status = ResourceStatus::Loading;
        Some(self.generation)
    }

    /// Invalidates in-flight loads because a payload was supplied directly.
    pub fn supersede(&mut self) -> u64 {
        self.generation += 1;
        self.status = ResourceStatus::Processing;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}
