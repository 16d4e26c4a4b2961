//! Fixed-capacity device id allocator
//!
//! Ids double as the minor number of the per-instance I/O node, so the id
//! space is small and fixed. Allocation always hands out the lowest free id.

use crate::error::{Result, VInputError};

/// Number of virtual devices that may be live at the same time.
pub const CAPACITY: usize = 32;

/// Identifier of a virtual device instance, always `< CAPACITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(u8);

impl DeviceId {
    /// Create an id, returning `None` if it is outside the id space.
    pub fn new(raw: usize) -> Option<Self> {
        if raw < CAPACITY {
            Some(DeviceId(raw as u8))
        } else {
            None
        }
    }

    /// The raw integer value
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitmap of reserved ids.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    bits: u32,
}

impl IdAllocator {
    /// Create an allocator with every id free
    pub fn new() -> Self {
        Self { bits: 0 }
    }

    /// Reserve the lowest free id.
    pub fn reserve(&mut self) -> Result<DeviceId> {
        let free = !self.bits;
        if free == 0 {
            return Err(VInputError::Exhausted { capacity: CAPACITY });
        }
        let slot = free.trailing_zeros() as usize;
        self.bits |= 1 << slot;
        Ok(DeviceId(slot as u8))
    }

    /// Return an id to the pool.
    ///
    /// Each reservation must be released exactly once. A release of an id
    /// that is not reserved is a caller bug; it is reported and ignored.
    pub fn release(&mut self, id: DeviceId) {
        let mask = 1u32 << id.get();
        if self.bits & mask == 0 {
            debug_assert!(false, "release of unreserved device id {}", id);
            log::warn!("vinput: release of unreserved device id {}", id);
            return;
        }
        self.bits &= !mask;
    }

    /// Whether `id` is currently reserved
    pub fn is_reserved(&self, id: DeviceId) -> bool {
        self.bits & (1 << id.get()) != 0
    }

    /// Number of reserved ids
    pub fn count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Reserved ids in ascending order
    pub fn reserved(&self) -> Vec<DeviceId> {
        (0..CAPACITY)
            .filter(|slot| self.bits & (1 << slot) != 0)
            .map(|slot| DeviceId(slot as u8))
            .collect()
    }
}
