//! Fixed-size timer pool: preallocated slots plus a free list.
//!
//! Grounded on the reference's `Create_Timer_Pool`/`alloc_timer_obj`/
//! `free_timer_obj` trio, reshaped from an intrusive singly-linked free
//! list of raw structs into an arena (`Vec<TimerSlot>`) indexed by `u32`
//! slot numbers, linked the same way the reference links its free list —
//! just via indices instead of pointers.

use crate::error::TimerError;
use crate::record::{TimerHandle, TimerOpt, TimerSlot, TimerState, MAX_NAME_LEN};

/// All slot storage and free-list bookkeeping for a timer manager.
///
/// Lives behind a single `Mutex<PoolState>`; the wheel never reaches
/// through to this data without holding that lock (see the dispatcher's
/// lock-ordering contract: pool before wheel).
pub(crate) struct PoolState {
    pub(crate) slots: Vec<TimerSlot>,
    free_head: Option<u32>,
    free_count: u32,
}

impl PoolState {
    pub(crate) fn new(capacity: u32) -> Self {
        let mut slots = Vec::with_capacity(capacity as usize);
        for i in 0..capacity {
            let mut slot = TimerSlot::vacant(0);
            slot.next = if i + 1 < capacity { Some(i + 1) } else { None };
            slots.push(slot);
        }
        Self {
            slots,
            free_head: if capacity > 0 { Some(0) } else { None },
            free_count: capacity,
        }
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    pub(crate) fn free_count(&self) -> u32 {
        self.free_count
    }

    /// Pop a slot off the free list and mark it `Stopped`, configured with
    /// the given parameters. Mirrors `alloc_timer_obj` returning
    /// `RTOS_ERR_TMR_NON_AVAIL` when the pool is exhausted — unlike the
    /// reference, that error is actually propagated by every caller.
    ///
    /// Bumps the slot's generation so any handle issued for its previous
    /// occupant (if any) is rejected by [`PoolState::resolve`]. The
    /// generation is bumped here, at reuse, rather than in [`PoolState::free`] —
    /// see that method's doc comment for why.
    pub(crate) fn alloc(
        &mut self,
        name: &str,
        opt: TimerOpt,
        delay: u32,
        period: u32,
        callback: Option<crate::record::TimerCallback>,
    ) -> Result<TimerHandle, TimerError> {
        let index = self.free_head.ok_or(TimerError::NonAvail)?;
        let slot = &mut self.slots[index as usize];
        let next_free = slot.next;

        slot.generation = slot.generation.wrapping_add(1);
        slot.state = TimerState::Stopped;
        slot.opt = opt;
        slot.delay = delay;
        slot.period = period;
        slot.match_tick = 0;
        slot.name = truncate_name(name);
        slot.callback = callback;
        slot.prev = None;
        slot.next = None;

        self.free_head = next_free;
        self.free_count -= 1;

        Ok(slot.handle(index))
    }

    /// Return a slot to the free list, so long as `handle`'s generation
    /// still matches the slot it names.
    ///
    /// Idempotent: if the slot is already `Unused` (this is a repeat
    /// `free` of the very same handle), this is a no-op that still
    /// succeeds — mirroring `RTOSTmrDel`'s treatment of an already-`UNUSED`
    /// record as a successful no-op. This is only reachable because the
    /// generation bump lives in [`PoolState::alloc`], not here: a slot's
    /// generation stays fixed across a `free`, so the very handle that was
    /// just freed still resolves by generation and can be freed again
    /// harmlessly. A handle only goes stale once its slot is reallocated
    /// to a new timer by `alloc`, which is where the generation actually
    /// advances — so a *different* handle pointing at a since-recycled
    /// slot is still correctly rejected by [`PoolState::resolve_any`].
    pub(crate) fn free(&mut self, handle: TimerHandle) -> Result<(), TimerError> {
        let index = self.resolve_any(handle)?;
        let slot = &mut self.slots[index as usize];
        if slot.state == TimerState::Unused {
            return Ok(());
        }
        slot.state = TimerState::Unused;
        slot.callback = None;
        slot.name.clear();
        slot.next = self.free_head;
        slot.prev = None;
        self.free_head = Some(index);
        self.free_count += 1;
        Ok(())
    }

    /// Validate a handle against the slot's current generation, rejecting
    /// an `Unused` slot — used by every API operation except `delete`,
    /// which must also accept an `Unused` slot at the handle's own
    /// generation to stay idempotent (see [`PoolState::free`]).
    pub(crate) fn resolve(&self, handle: TimerHandle) -> Result<u32, TimerError> {
        let index = self.resolve_any(handle)?;
        if self.slots[index as usize].state == TimerState::Unused {
            return Err(TimerError::Invalid);
        }
        Ok(index)
    }

    /// Validate a handle's index and generation only, independent of the
    /// slot's current state. Used by `delete`/`free` so a slot already
    /// `Unused` at the handle's own generation resolves successfully
    /// instead of being treated the same as a handle whose slot has since
    /// been recycled into an unrelated timer.
    pub(crate) fn resolve_any(&self, handle: TimerHandle) -> Result<u32, TimerError> {
        let slot = self
            .slots
            .get(handle.index as usize)
            .ok_or(TimerError::Invalid)?;
        if slot.generation != handle.generation {
            return Err(TimerError::Invalid);
        }
        Ok(handle.index)
    }

    pub(crate) fn slot(&self, index: u32) -> &TimerSlot {
        &self.slots[index as usize]
    }

    pub(crate) fn slot_mut(&mut self, index: u32) -> &mut TimerSlot {
        &mut self.slots[index as usize]
    }
}

fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        name.to_string()
    } else {
        name.chars().take(MAX_NAME_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn alloc_and_free_round_trip() {
        let mut pool = PoolState::new(2);
        assert_eq!(pool.free_count(), 2);

        let h1 = pool.alloc("t1", TimerOpt::OneShot, 5, 0, None).unwrap();
        assert_eq!(pool.free_count(), 1);

        let h2 = pool.alloc("t2", TimerOpt::Periodic, 0, 3, None).unwrap();
        assert_eq!(pool.free_count(), 0);

        assert_eq!(
            pool.alloc("t3", TimerOpt::OneShot, 1, 0, None).unwrap_err(),
            TimerError::NonAvail
        );

        pool.free(h1).unwrap();
        assert_eq!(pool.free_count(), 1);
        // Stale handle is now rejected.
        assert_eq!(pool.resolve(h1).unwrap_err(), TimerError::Invalid);

        let h3 = pool.alloc("t3", TimerOpt::OneShot, 1, 0, None).unwrap();
        assert_eq!(h3.index, h1.index);
        assert_ne!(h3.generation, h1.generation);

        pool.free(h2).unwrap();
        pool.free(h3).unwrap();
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn name_longer_than_max_is_truncated() {
        let mut pool = PoolState::new(1);
        let long_name: String = std::iter::repeat('x').take(MAX_NAME_LEN + 10).collect();
        let handle = pool
            .alloc(&long_name, TimerOpt::OneShot, 1, 0, None)
            .unwrap();
        let idx = pool.resolve(handle).unwrap();
        assert_eq!(pool.slot(idx).name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn resolve_rejects_out_of_range_index() {
        let pool = PoolState::new(1);
        let bogus = TimerHandle { index: 9, generation: 0 };
        assert_eq!(pool.resolve(bogus).unwrap_err(), TimerError::Invalid);
    }

    #[test]
    fn freeing_the_same_handle_twice_is_idempotent() {
        let mut pool = PoolState::new(1);
        let handle = pool.alloc("t", TimerOpt::OneShot, 1, 0, None).unwrap();

        pool.free(handle).unwrap();
        assert_eq!(pool.free_count(), 1);

        // The slot is Unused but the handle's generation hasn't moved on
        // (only `alloc` bumps it), so a repeat free of the same handle
        // succeeds as a no-op instead of being rejected.
        pool.free(handle).unwrap();
        assert_eq!(pool.free_count(), 1);

        // A handle for a *different* occupant of the same slot is still
        // correctly rejected.
        let recycled = pool.alloc("t2", TimerOpt::OneShot, 1, 0, None).unwrap();
        assert_ne!(recycled.generation, handle.generation);
        assert_eq!(pool.free(handle).unwrap_err(), TimerError::Invalid);
    }
}
