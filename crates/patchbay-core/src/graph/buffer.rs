//! Scratch buffer pools and delay lines for the executor.
//!
//! The [`ChannelPool`] holds one mono buffer per scratch slot the compiler
//! asked for, each sized to the maximum block size. The
//! [`DelayLine`] provides fixed-delay ring buffers for latency compensation.

use crate::sample::Sample;

/// Pool of reusable mono audio buffers.
///
/// Slot 0 is the silent buffer; nothing but the executor's clear path writes it.
#[derive(Debug, Clone)]
pub struct ChannelPool<T> {
    buffers: Vec<Vec<T>>,
    block_size: usize,
}

impl<T: Sample> ChannelPool<T> {
    /// Creates a pool with `count` zeroed slots of `block_size` samples.
    pub fn new(count: usize, block_size: usize) -> Self {
        Self {
            buffers: (0..count).map(|_| vec![T::ZERO; block_size]).collect(),
            block_size,
        }
    }

    /// The first `len` samples of slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not a slot or `len` exceeds the block size.
    #[inline]
    pub fn get(&self, idx: usize, len: usize) -> &[T] {
        &self.buffers[idx][..len]
    }

    /// Mutable access to the first `len` samples of slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not a slot or `len` exceeds the block size.
    #[inline]
    pub fn get_mut(&mut self, idx: usize, len: usize) -> &mut [T] {
        &mut self.buffers[idx][..len]
    }

    /// Zeroes the first `len` samples of slot `idx`.
    #[inline]
    pub fn clear(&mut self, idx: usize, len: usize) {
        self.get_mut(idx, len).fill(T::ZERO);
    }

    /// Copies slot `src` over slot `dst`.
    pub fn copy(&mut self, src: usize, dst: usize, len: usize) {
        if let Some((from, to)) = self.pair_mut(src, dst, len) {
            to.copy_from_slice(from);
        }
    }

    /// Adds slot `src` into slot `dst`.
    pub fn add(&mut self, src: usize, dst: usize, len: usize) {
        if let Some((from, to)) = self.pair_mut(src, dst, len) {
            for (d, s) in to.iter_mut().zip(from) {
                *d += *s;
            }
        }
    }

    /// Borrows two distinct slots, one shared and one mutable.
    fn pair_mut(&mut self, src: usize, dst: usize, len: usize) -> Option<(&[T], &mut [T])> {
        if src == dst {
            return None;
        }
        if src < dst {
            let (lo, hi) = self.buffers.split_at_mut(dst);
            Some((&lo[src][..len], &mut hi[0][..len]))
        } else {
            let (lo, hi) = self.buffers.split_at_mut(src);
            Some((&hi[0][..len], &mut lo[dst][..len]))
        }
    }

    /// Exchanges slot `idx` with `other`, which must be one block long.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not a slot.
    #[inline]
    pub fn swap(&mut self, idx: usize, other: &mut Vec<T>) {
        debug_assert_eq!(other.len(), self.block_size);
        std::mem::swap(&mut self.buffers[idx], other);
    }
}

/// Fixed-delay mono ring buffer for latency compensation.
///
/// State persists across blocks, so a delay split over several calls produces
/// the same output as one call over the whole signal.
#[derive(Debug, Clone)]
pub struct DelayLine<T> {
    ring: Vec<T>,
    write_pos: usize,
    delay_samples: usize,
}

impl<T: Sample> DelayLine<T> {
    /// Creates a delay line. A delay of 0 is a no-op.
    pub fn new(delay_samples: usize) -> Self {
        Self {
            ring: vec![T::ZERO; delay_samples.max(1)],
            write_pos: 0,
            delay_samples,
        }
    }

    /// Delays a block in place.
    pub fn process_block_inplace(&mut self, block: &mut [T]) {
        if self.delay_samples == 0 {
            return;
        }
        for sample in block.iter_mut() {
            let out = self.ring[self.write_pos];
            self.ring[self.write_pos] = *sample;
            self.write_pos = (self.write_pos + 1) % self.delay_samples;
            *sample = out;
        }
    }
}
