//! Page replacement policies for the buffer pool.

use crate::frame::FrameId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Trait for page replacement algorithms.
///
/// Evictability is decided by the caller through the `is_evictable`
/// predicate (in practice: pin count zero), so the replacer only has
/// to order the candidates.
pub trait Replacer {
    /// Records that the given frame was accessed.
    fn record_access(&self, frame_id: FrameId);

    /// Selects a victim frame for eviction.
    ///
    /// Returns None if no frame satisfies the predicate.
    fn evict<F: Fn(FrameId) -> bool>(&self, is_evictable: F) -> Option<FrameId>;

    /// Forgets any access history for a frame.
    fn remove(&self, frame_id: FrameId);
}

/// Clock replacement algorithm.
///
/// Reference bits are atomic for lock-free access recording; only the
/// clock hand sits behind a mutex.
pub struct ClockReplacer {
    /// Number of frames.
    num_frames: usize,
    /// Reference bits for each frame.
    reference_bits: Vec<AtomicBool>,
    /// Current clock hand position.
    clock_hand: Mutex<usize>,
}

impl ClockReplacer {
    /// Creates a new clock replacer with the given number of frames.
    pub fn new(num_frames: usize) -> Self {
        let reference_bits: Vec<AtomicBool> =
            (0..num_frames).map(|_| AtomicBool::new(false)).collect();

        Self {
            num_frames,
            reference_bits,
            clock_hand: Mutex::new(0),
        }
    }

    /// Returns the total capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.num_frames
    }
}

impl Replacer for ClockReplacer {
    #[inline]
    fn record_access(&self, frame_id: FrameId) {
        let idx = frame_id.0 as usize;
        if idx < self.num_frames {
            self.reference_bits[idx].store(true, Ordering::Relaxed);
        }
    }

    fn evict<F: Fn(FrameId) -> bool>(&self, is_evictable: F) -> Option<FrameId> {
        let mut hand = self.clock_hand.lock();

        // Two full rotations: the first clears reference bits, the
        // second catches frames whose bits were cleared in the first.
        for _ in 0..(2 * self.num_frames) {
            let pos = *hand;
            *hand = (pos + 1) % self.num_frames;

            let frame_id = FrameId(pos as u32);
            if !is_evictable(frame_id) {
                continue;
            }
            if self.reference_bits[pos].load(Ordering::Relaxed) {
                self.reference_bits[pos].store(false, Ordering::Relaxed);
            } else {
                return Some(frame_id);
            }
        }

        // Everything evictable kept its reference bit alive during the
        // sweep; take the first evictable frame regardless.
        for pos in 0..self.num_frames {
            let frame_id = FrameId(pos as u32);
            if is_evictable(frame_id) {
                *hand = (pos + 1) % self.num_frames;
                return Some(frame_id);
            }
        }

        None
    }

    fn remove(&self, frame_id: FrameId) {
        let idx = frame_id.0 as usize;
        if idx < self.num_frames {
            self.reference_bits[idx].store(false, Ordering::Relaxed);
        }
    }
}
