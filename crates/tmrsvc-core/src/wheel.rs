//! Timing wheel: `W` buckets of ordered doubly-linked lists over pool slots.
//!
//! Grounded on the reference's hash table (`init_hash_table`,
//! `insert_hash_entry`, `remove_hash_entry`, bucket = `match % 10`) combined
//! with the bucket-scan-with-early-break behaviour of `RTOSTmrTask`. Slot
//! storage itself lives in [`crate::pool::PoolState`]; this module only
//! owns the per-bucket head/tail/count bookkeeping and the linking logic,
//! consistent with how `mio`'s `Timer<T>` keeps a `Slab` of entries
//! separate from its `Vec<WheelEntry>` bucket list.

use crate::pool::PoolState;
use crate::record::TimerState;

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    head: Option<u32>,
    tail: Option<u32>,
    count: u32,
}

/// Bucket bookkeeping for the timing wheel. Always acquired together with,
/// and after, the pool lock (see the dispatcher's lock-ordering contract).
pub(crate) struct WheelState {
    width: u32,
    buckets: Vec<Bucket>,
}

impl WheelState {
    pub(crate) fn new(width: u32) -> Self {
        Self {
            width,
            buckets: vec![Bucket::default(); width as usize],
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    fn bucket_for(&self, match_tick: u32) -> usize {
        (match_tick % self.width) as usize
    }

    /// Link `index` into the bucket for `match_tick`, keeping the bucket's
    /// list in non-decreasing `match_tick` order so the dispatcher's scan
    /// can break at the first entry that is not yet due.
    pub(crate) fn insert(&mut self, pool: &mut PoolState, index: u32, match_tick: u32) {
        pool.slot_mut(index).match_tick = match_tick;
        let bucket_no = self.bucket_for(match_tick);

        let mut cursor = self.buckets[bucket_no].head;
        let mut prev = None;
        while let Some(cur) = cursor {
            if pool.slot(cur).match_tick > match_tick {
                break;
            }
            prev = Some(cur);
            cursor = pool.slot(cur).next;
        }

        pool.slot_mut(index).prev = prev;
        pool.slot_mut(index).next = cursor;

        match prev {
            Some(p) => pool.slot_mut(p).next = Some(index),
            None => self.buckets[bucket_no].head = Some(index),
        }
        match cursor {
            Some(c) => pool.slot_mut(c).prev = Some(index),
            None => self.buckets[bucket_no].tail = Some(index),
        }
        self.buckets[bucket_no].count += 1;
    }

    /// Unlink `index` from the bucket it currently occupies, as recorded by
    /// its own `match_tick`. No-op-safe to call on an already-unlinked slot
    /// only if the caller tracks that separately; here it always assumes
    /// the slot is currently linked.
    pub(crate) fn remove(&mut self, pool: &mut PoolState, index: u32) {
        let match_tick = pool.slot(index).match_tick;
        let bucket_no = self.bucket_for(match_tick);
        let prev = pool.slot(index).prev;
        let next = pool.slot(index).next;

        match prev {
            Some(p) => pool.slot_mut(p).next = next,
            None => self.buckets[bucket_no].head = next,
        }
        match next {
            Some(n) => pool.slot_mut(n).prev = prev,
            None => self.buckets[bucket_no].tail = prev,
        }
        pool.slot_mut(index).prev = None;
        pool.slot_mut(index).next = None;
        self.buckets[bucket_no].count -= 1;
    }

    /// Pop every slot index in the bucket for `current_tick` whose
    /// `match_tick == current_tick`, in order, unlinking each as it is
    /// collected. Mirrors `RTOSTmrTask`'s scan that walks a bucket and
    /// breaks at the first record whose `match` isn't the current tick —
    /// safe here because [`WheelState::insert`] keeps buckets sorted.
    pub(crate) fn drain_due(&mut self, pool: &mut PoolState, current_tick: u32) -> Vec<u32> {
        let bucket_no = self.bucket_for(current_tick);
        let mut due = Vec::new();
        loop {
            let Some(head) = self.buckets[bucket_no].head else {
                break;
            };
            if pool.slot(head).match_tick != current_tick {
                break;
            }
            debug_assert_eq!(pool.slot(head).state, TimerState::Running);
            self.remove(pool, head);
            due.push(head);
        }
        due
    }

    #[cfg(test)]
    pub(crate) fn bucket_count(&self, bucket_no: usize) -> u32 {
        self.buckets[bucket_no].count
    }
}
