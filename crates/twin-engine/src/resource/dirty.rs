use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;

bitflags! {
    /// Resource aspects that can be staged independently.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct Aspects: u32 {
        const TARGET = 1 << 0;
        const USAGE  = 1 << 1;
        const DATA   = 1 << 2;
        const FILTER = 1 << 3;
        const WRAP_S = 1 << 4;
        const WRAP_T = 1 << 5;

        const SAMPLER = Self::FILTER.bits() | Self::WRAP_S.bits() | Self::WRAP_T.bits();
    }
}

/// Lock-free set of pending aspects.
///
/// Writers OR bits in while holding the resource lock; the render thread reads
/// it without the lock for the clean fast path and clears consumed bits.
#[derive(Debug, Default)]
pub struct DirtyMask(AtomicU32);

impl DirtyMask {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mark(&self, aspects: Aspects) {
        self.0.fetch_or(aspects.bits(), Ordering::AcqRel);
    }

    #[inline]
    pub fn get(&self) -> Aspects {
        Aspects::from_bits_truncate(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.0.load(Ordering::Acquire) == 0
    }

    /// Clears `aspects` and returns the bits that were set among them.
    #[inline]
    pub fn clear(&self, aspects: Aspects) -> Aspects {
        let prev = self.0.fetch_and(!aspects.bits(), Ordering::AcqRel);
        Aspects::from_bits_truncate(prev) & aspects
    }
}
