//! Page table mapping resident page IDs to frame IDs.

use crate::frame::FrameId;
use meridian_common::page::PageId;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Sentinel value for empty key slots.
const EMPTY_KEY: u64 = u64::MAX;

/// Sentinel value for deleted key slots (tombstone).
const TOMBSTONE_KEY: u64 = u64::MAX - 1;

/// Open-addressing atomic hash table mapping PageId to FrameId.
///
/// Only resident pages appear here, so the table is sized from the
/// frame count and never needs to grow. Keys are page IDs widened to
/// u64 so the sentinels cannot collide with real pages.
pub struct PageTable {
    /// Hash table keys.
    keys: Box<[AtomicU64]>,
    /// Hash table values (frame IDs).
    values: Box<[AtomicU32]>,
    /// Bitmask for indexing (table size - 1).
    mask: usize,
}

impl PageTable {
    /// Creates a new page table with capacity for the given number of
    /// frames. Table size is 2x capacity rounded up to a power of two,
    /// keeping the load factor at or below 50%.
    pub fn new(capacity: usize) -> Self {
        let size = (capacity * 2).next_power_of_two().max(16);

        let keys: Box<[AtomicU64]> = (0..size).map(|_| AtomicU64::new(EMPTY_KEY)).collect();
        let values: Box<[AtomicU32]> = (0..size).map(|_| AtomicU32::new(0)).collect();

        Self {
            keys,
            values,
            mask: size - 1,
        }
    }

    /// Computes the table index for a key.
    #[inline(always)]
    fn hash_index(&self, key: u64) -> usize {
        let hash = key.wrapping_mul(0x517cc1b727220a95);
        (hash as usize) & self.mask
    }

    /// Looks up a page ID and returns its frame ID if resident.
    #[inline]
    pub fn get(&self, page_id: PageId) -> Option<FrameId> {
        let key = page_id.0 as u64;
        let mut idx = self.hash_index(key);

        for _ in 0..self.keys.len() {
            let stored = self.keys[idx].load(Ordering::Acquire);
            if stored == EMPTY_KEY {
                return None;
            }
            if stored == key {
                return Some(FrameId(self.values[idx].load(Ordering::Acquire)));
            }
            // Skip tombstones and continue probing.
            idx = (idx + 1) & self.mask;
        }
        None
    }

    /// Inserts a page ID to frame ID mapping. Returns true on success.
    pub fn insert(&self, page_id: PageId, frame_id: FrameId) -> bool {
        let key = page_id.0 as u64;
        let mut idx = self.hash_index(key);

        for _ in 0..self.keys.len() {
            let stored = self.keys[idx].load(Ordering::Acquire);
            if stored == EMPTY_KEY || stored == TOMBSTONE_KEY {
                self.values[idx].store(frame_id.0, Ordering::Release);
                self.keys[idx].store(key, Ordering::Release);
                return true;
            }
            if stored == key {
                self.values[idx].store(frame_id.0, Ordering::Release);
                return true;
            }
            idx = (idx + 1) & self.mask;
        }
        false
    }

    /// Removes a page ID mapping. Returns the frame ID if it was present.
    pub fn remove(&self, page_id: PageId) -> Option<FrameId> {
        let key = page_id.0 as u64;
        let mut idx = self.hash_index(key);

        for _ in 0..self.keys.len() {
            let stored = self.keys[idx].load(Ordering::Acquire);
            if stored == EMPTY_KEY {
                return None;
            }
            if stored == key {
                let frame_id = self.values[idx].load(Ordering::Acquire);
                self.keys[idx].store(TOMBSTONE_KEY, Ordering::Release);
                return Some(FrameId(frame_id));
            }
            idx = (idx + 1) & self.mask;
        }
        None
    }

    /// Returns true if the page ID is in the table.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.get(page_id).is_some()
    }

    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize {
        self.keys
            .iter()
            .filter(|k| {
                let v = k.load(Ordering::Relaxed);
                v != EMPTY_KEY && v != TOMBSTONE_KEY
            })
            .count()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over all entries, calling the provided function for
    /// each. Returns early if the function returns false.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(PageId, FrameId) -> bool,
    {
        for (idx, key_slot) in self.keys.iter().enumerate() {
            let key = key_slot.load(Ordering::Relaxed);
            if key != EMPTY_KEY && key != TOMBSTONE_KEY {
                let frame_id = FrameId(self.values[idx].load(Ordering::Relaxed));
                if !f(PageId(key as u32), frame_id) {
                    return;
                }
            }
        }
    }
}
