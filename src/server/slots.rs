//! Connection slots: the admission controller.
//!
//! A fixed number of slots bounds how many connections are handled at
//! once. Slots are handed out as [`SlotPermit`]s which give the slot back
//! when released or dropped, so a release without a matching acquire
//! cannot happen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

/// Bounded pool of connection slots
#[derive(Debug)]
pub struct ConnectionSlots {
    ceiling: usize,
    semaphore: Arc<Semaphore>,
    /// Highest number of slots ever held at once
    peak: AtomicUsize,
}

/// One held slot
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}

impl SlotPermit {
    /// Give the slot back.
    pub fn release(self) {}
}

impl ConnectionSlots {
    /// Ceilings above [`Semaphore::MAX_PERMITS`] are clamped to it.
    pub fn new(ceiling: usize) -> Arc<Self> {
        let ceiling = ceiling.min(Semaphore::MAX_PERMITS);
        Arc::new(Self {
            ceiling,
            semaphore: Arc::new(Semaphore::new(ceiling)),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn in_use(&self) -> usize {
        self.ceiling
            .saturating_sub(self.semaphore.available_permits())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Take a slot if one is free, without waiting.
    #[cfg(test)]
    pub fn try_acquire(&self) -> Option<SlotPermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        Some(self.granted(permit))
    }

    /// Wait until a slot is free and take it.
    ///
    /// Returns `None` only with a ceiling of zero, where no slot will
    /// ever become free.
    pub async fn acquire(&self) -> Option<SlotPermit> {
        if self.ceiling == 0 {
            return None;
        }
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;
        Some(self.granted(permit))
    }

    fn granted(&self, permit: OwnedSemaphorePermit) -> SlotPermit {
        let in_use = self.in_use();
        self.peak.fetch_max(in_use, Ordering::Relaxed);
        trace!(in_use, ceiling = self.ceiling, "Slot acquired");
        SlotPermit { _permit: permit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_try_acquire_until_full() {
        let slots = ConnectionSlots::new(2);
        let a = slots.try_acquire().unwrap();
        let _b = slots.try_acquire().unwrap();
        assert!(slots.try_acquire().is_none());
        assert_eq!(slots.in_use(), 2);

        a.release();
        assert_eq!(slots.in_use(), 1);
        assert!(slots.try_acquire().is_some());
    }

    #[test]
    fn test_zero_ceiling_never_grants() {
        let slots = ConnectionSlots::new(0);
        assert!(slots.try_acquire().is_none());
        assert_eq!(slots.in_use(), 0);
    }

    #[test]
    fn test_oversized_ceiling_is_clamped() {
        let slots = ConnectionSlots::new(usize::MAX);
        assert_eq!(slots.ceiling(), Semaphore::MAX_PERMITS);
        assert_eq!(slots.in_use(), 0);

        let permit = slots.try_acquire().unwrap();
        assert_eq!(slots.in_use(), 1);
        permit.release();
    }

    #[tokio::test]
    async fn test_acquire_zero_ceiling_returns_none() {
        let slots = ConnectionSlots::new(0);
        assert!(slots.acquire().await.is_none());
    }

    #[test]
    fn test_drop_releases() {
        let slots = ConnectionSlots::new(1);
        {
            let _permit = slots.try_acquire().unwrap();
            assert_eq!(slots.in_use(), 1);
        }
        assert_eq!(slots.in_use(), 0);
    }

    #[test]
    fn test_acquire_waits_for_release() {
        let slots = ConnectionSlots::new(1);
        let held = slots.try_acquire().unwrap();

        let mut acquire = task::spawn(slots.acquire());
        assert_pending!(acquire.poll());

        held.release();
        assert!(acquire.is_woken());
        let permit = assert_ready!(acquire.poll());
        assert!(permit.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_ceiling_holds_under_contention() {
        let slots = ConnectionSlots::new(16);
        let mut handles = Vec::new();

        for _ in 0..2000 {
            let slots = Arc::clone(&slots);
            handles.push(tokio::spawn(async move {
                let permit = slots.acquire().await.unwrap();
                assert!(slots.in_use() <= slots.ceiling());
                tokio::task::yield_now().await;
                permit.release();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(slots.peak() <= 16);
        assert!(slots.peak() > 0);
        assert_eq!(slots.in_use(), 0);
    }
}
