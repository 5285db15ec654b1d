//! Validation of queue family ownership transfers.
//!
//! Moving an exclusively owned resource between queue families takes two
//! barriers: a release recorded on the source queue and an acquire recorded
//! on the destination queue, both naming the same family pair. Forgetting
//! either half is undefined behavior on the GPU, so every release and acquire
//! goes through the ledger, which panics on a mismatch. The render graph only
//! ever emits matched pairs; the ledger catches hand-recorded ones.

use std::collections::HashMap;

use super::QueueTransfer;
use crate::resources::ResourceHandle;

/// Identity of one in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferKey {
    /// Resource being transferred.
    pub resource: ResourceHandle,
    /// Family pair.
    pub transfer: QueueTransfer,
}

/// Tracks releases that still await their acquire.
#[derive(Debug, Default)]
pub struct OwnershipLedger {
    pending: HashMap<ResourceHandle, QueueTransfer>,
    completed: usize,
}

impl OwnershipLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a release of `resource` from `transfer.src_family`.
    ///
    /// # Panics
    ///
    /// Panics if the resource already has a release waiting for its acquire,
    /// or if the source and destination families are equal.
    pub fn release(&mut self, resource: ResourceHandle, transfer: QueueTransfer) {
        assert_ne!(
            transfer.src_family, transfer.dst_family,
            "ownership transfer of {:?} within one queue family",
            resource
        );
        if let Some(previous) = self.pending.insert(resource, transfer) {
            panic!(
                "{:?} released to family {} while a release to family {} is unacquired",
                resource, transfer.dst_family, previous.dst_family
            );
        }
    }

    /// Record the acquire matching an earlier release.
    ///
    /// # Panics
    ///
    /// Panics if no release of `resource` is pending or the families differ.
    pub fn acquire(&mut self, resource: ResourceHandle, transfer: QueueTransfer) {
        match self.pending.remove(&resource) {
            Some(released) if released == transfer => self.completed += 1,
            Some(released) => panic!(
                "acquire of {:?} for families {}->{} does not match release {}->{}",
                resource,
                transfer.src_family,
                transfer.dst_family,
                released.src_family,
                released.dst_family
            ),
            None => panic!(
                "acquire of {:?} on family {} without a matching release",
                resource, transfer.dst_family
            ),
        }
    }

    /// Releases still waiting for their acquire.
    pub fn pending(&self) -> impl Iterator<Item = TransferKey> + '_ {
        self.pending
            .iter()
            .map(|(resource, transfer)| TransferKey {
                resource: *resource,
                transfer: *transfer,
            })
    }

    /// Number of completed release/acquire pairs since the last [`settle`](Self::settle).
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Close the frame.
    ///
    /// # Panics
    ///
    /// Panics if any release was never acquired.
    pub fn settle(&mut self) {
        if let Some(key) = self.pending().next() {
            panic!(
                "{} ownership release(s) never acquired, e.g. {:?} {}->{}",
                self.pending.len(),
                key.resource,
                key.transfer.src_family,
                key.transfer.dst_family
            );
        }
        self.completed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceKind;
    use ringframe_core::HandleAllocator;

    fn texture() -> ResourceHandle {
        let mut allocator = HandleAllocator::new(2);
        allocator.allocate(ResourceKind::Texture)
    }

    const COMPUTE_TO_GRAPHICS: QueueTransfer = QueueTransfer {
        src_family: 1,
        dst_family: 0,
    };

    #[test]
    fn test_matched_pair_settles() {
        let mut ledger = OwnershipLedger::new();
        let tex = texture();
        ledger.release(tex, COMPUTE_TO_GRAPHICS);
        ledger.acquire(tex, COMPUTE_TO_GRAPHICS);
        assert_eq!(ledger.completed(), 1);
        ledger.settle();
        assert_eq!(ledger.completed(), 0);
    }

    #[test]
    #[should_panic(expected = "without a matching release")]
    fn test_acquire_without_release_panics() {
        let mut ledger = OwnershipLedger::new();
        ledger.acquire(texture(), COMPUTE_TO_GRAPHICS);
    }

    #[test]
    #[should_panic(expected = "does not match release")]
    fn test_mismatched_families_panic() {
        let mut ledger = OwnershipLedger::new();
        let tex = texture();
        ledger.release(tex, COMPUTE_TO_GRAPHICS);
        ledger.acquire(
            tex,
            QueueTransfer {
                src_family: 2,
                dst_family: 0,
            },
        );
    }

    #[test]
    #[should_panic(expected = "never acquired")]
    fn test_unacquired_release_panics_on_settle() {
        let mut ledger = OwnershipLedger::new();
        ledger.release(texture(), COMPUTE_TO_GRAPHICS);
        ledger.settle();
    }
}
