//! Gid generators
//!
//! One generator per record kind (vertices, edges). Ids are handed out from
//! an atomic local counter and packed with the worker id; recovery bumps the
//! counter past every id it replays so fresh ids never collide with
//! recovered ones. Freed local ids are not reused.

use std::sync::atomic::{AtomicU64, Ordering};
use terrane_core::Gid;

/// Monotonic per-worker gid source.
#[derive(Debug)]
pub struct GidGenerator {
    worker_id: u16,
    next_local: AtomicU64,
}

impl GidGenerator {
    /// Generator starting at local id 0.
    pub fn new(worker_id: u16) -> GidGenerator {
        GidGenerator {
            worker_id,
            next_local: AtomicU64::new(0),
        }
    }

    /// The worker this generator mints ids for.
    pub fn worker_id(&self) -> u16 {
        self.worker_id
    }

    /// Hand out the next gid.
    pub fn next(&self) -> Gid {
        let local = self.next_local.fetch_add(1, Ordering::Relaxed);
        Gid::new(self.worker_id, local)
    }

    /// Note an externally supplied gid so generated ids stay beyond it.
    pub fn note_used(&self, gid: Gid) {
        debug_assert_eq!(gid.worker_id(), self.worker_id);
        self.next_local.fetch_max(gid.local_id() + 1, Ordering::Relaxed);
    }

    /// The next local id that would be handed out (snapshot header field).
    pub fn high_water(&self) -> u64 {
        self.next_local.load(Ordering::Relaxed)
    }

    /// Restore the counter to at least `high` (snapshot recovery).
    pub fn restore(&self, high: u64) {
        self.next_local.fetch_max(high, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let generator = GidGenerator::new(3);
        let a = generator.next();
        let b = generator.next();
        assert_eq!(a.worker_id(), 3);
        assert_eq!(a.local_id() + 1, b.local_id());
    }

    #[test]
    fn test_note_used_bumps_past() {
        let generator = GidGenerator::new(0);
        generator.note_used(Gid::new(0, 41));
        assert_eq!(generator.next().local_id(), 42);
    }

    #[test]
    fn test_note_used_never_lowers() {
        let generator = GidGenerator::new(0);
        generator.restore(100);
        generator.note_used(Gid::new(0, 5));
        assert_eq!(generator.high_water(), 100);
    }

    #[test]
    fn test_restore_round_trip() {
        let generator = GidGenerator::new(0);
        for _ in 0..10 {
            generator.next();
        }
        let high = generator.high_water();

        let recovered = GidGenerator::new(0);
        recovered.restore(high);
        assert_eq!(recovered.next().local_id(), 10);
    }
}
