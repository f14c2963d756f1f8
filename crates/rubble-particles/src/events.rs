//! Bounded per-tick event lists filled concurrently by the physics pass

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Fixed-capacity list appended to from many threads.
///
/// A writer reserves a slot with `fetch_add` on the counter and stores its
/// value only if the slot is below capacity. Overflowing reservations still
/// advance the counter but their values are dropped.
pub struct BoundedEventList {
    slots: Box<[AtomicU32]>,
    reserved: AtomicUsize,
}

impl BoundedEventList {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            reserved: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn reset(&mut self) {
        *self.reserved.get_mut() = 0;
    }

    /// Reserve a slot and store `value`; false if the list was already full
    pub fn push(&self, value: u32) -> bool {
        let slot = self.reserved.fetch_add(1, Ordering::Relaxed);
        match self.slots.get(slot) {
            Some(cell) => {
                cell.store(value, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Reservations made since the last reset, including dropped ones
    pub fn reserved(&self) -> usize {
        self.reserved.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.reserved().min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> usize {
        self.reserved().saturating_sub(self.slots.len())
    }

    /// Recorded values, at most `capacity` of them
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots[..self.len()]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rubble_core::WorkerPool;

    #[test]
    fn overflow_advances_the_counter_only() {
        let mut list = BoundedEventList::new(2);
        assert!(list.push(10));
        assert!(list.push(11));
        assert!(!list.push(12));
        assert_eq!(list.reserved(), 3);
        assert_eq!(list.len(), 2);
        assert_eq!(list.dropped(), 1);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![10, 11]);

        list.reset();
        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);
    }

    proptest! {
        #[test]
        fn concurrent_pushes_stay_in_bounds(capacity in 0usize..300, pushes in 0usize..2000) {
            let list = BoundedEventList::new(capacity);
            let pool = WorkerPool::new(4).unwrap();
            let work: Vec<u32> = (0..pushes as u32).collect();
            pool.run_chunks(work.chunks(64).collect(), |chunk| {
                for v in chunk {
                    list.push(*v);
                }
            });

            prop_assert_eq!(list.reserved(), pushes);
            prop_assert_eq!(list.len(), pushes.min(capacity));
            let mut seen: Vec<u32> = list.iter().collect();
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), pushes.min(capacity));
            prop_assert!(seen.iter().all(|v| (*v as usize) < pushes));
        }
    }
}
