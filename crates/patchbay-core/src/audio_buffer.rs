//! Non-owning multichannel audio view.
//!
//! [`AudioBuffer`] borrows a slice of channel vectors and exposes a window of
//! `num_samples` frames starting at an offset. Sub-windows are created with
//! [`AudioBuffer::slice`] without copying or allocating, which is how the
//! executor splits oversized host blocks into chunks.

use crate::sample::Sample;

/// A mutable window over a set of audio channels.
#[derive(Debug)]
pub struct AudioBuffer<'a, T> {
    channels: &'a mut [Vec<T>],
    start: usize,
    len: usize,
}

impl<'a, T: Sample> AudioBuffer<'a, T> {
    /// Creates a view over the first `num_samples` frames of every channel.
    ///
    /// Every channel must hold at least `num_samples` samples.
    pub fn new(channels: &'a mut [Vec<T>], num_samples: usize) -> Self {
        debug_assert!(
            channels.iter().all(|c| c.len() >= num_samples),
            "every channel must hold at least {num_samples} samples"
        );
        Self {
            channels,
            start: 0,
            len: num_samples,
        }
    }

    /// Creates a view spanning the shortest channel.
    pub fn from_channels(channels: &'a mut [Vec<T>]) -> Self {
        let len = channels.iter().map(Vec::len).min().unwrap_or(0);
        Self::new(channels, len)
    }

    /// Number of channels in the view.
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames in the view.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.len
    }

    /// Read access to one channel.
    ///
    /// # Panics
    ///
    /// Panics if `index >= num_channels()`.
    #[inline]
    pub fn channel(&self, index: usize) -> &[T] {
        &self.channels[index][self.start..self.start + self.len]
    }

    /// Write access to one channel.
    ///
    /// # Panics
    ///
    /// Panics if `index >= num_channels()`.
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [T] {
        &mut self.channels[index][self.start..self.start + self.len]
    }

    /// Zeroes one channel.
    pub fn clear_channel(&mut self, index: usize) {
        self.channel_mut(index).fill(T::ZERO);
    }

    /// Zeroes every channel.
    pub fn clear(&mut self) {
        let (start, end) = (self.start, self.start + self.len);
        for channel in self.channels.iter_mut() {
            channel[start..end].fill(T::ZERO);
        }
    }

    /// Borrows a sub-window of `len` frames beginning `offset` frames into this view.
    ///
    /// # Panics
    ///
    /// Panics if the window extends past the end of this view.
    pub fn slice(&mut self, offset: usize, len: usize) -> AudioBuffer<'_, T> {
        assert!(
            offset + len <= self.len,
            "slice {offset}..{} out of range for {} frames",
            offset + len,
            self.len
        );
        AudioBuffer {
            channels: &mut *self.channels,
            start: self.start + offset,
            len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_channels_uses_shortest_channel() {
        let mut data = vec![vec![1.0f32; 8], vec![1.0f32; 5]];
        let buffer = AudioBuffer::from_channels(&mut data);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.num_samples(), 5);
    }

    #[test]
    fn test_slice_addresses_the_right_frames() {
        let mut data = vec![(0..8).map(|i| i as f32).collect::<Vec<_>>()];
        let mut buffer = AudioBuffer::from_channels(&mut data);
        let mut chunk = buffer.slice(2, 3);
        assert_eq!(chunk.channel(0), &[2.0, 3.0, 4.0]);
        chunk.clear();
        assert_eq!(buffer.channel(0), &[0.0, 1.0, 0.0, 0.0, 0.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_nested_slices_accumulate_offsets() {
        let mut data = vec![(0..10).map(f64::from).collect::<Vec<_>>()];
        let mut buffer = AudioBuffer::from_channels(&mut data);
        let mut outer = buffer.slice(4, 6);
        let inner = outer.slice(1, 2);
        assert_eq!(inner.channel(0), &[5.0, 6.0]);
    }

    #[test]
    #[should_panic]
    fn test_slice_out_of_range_panics() {
        let mut data = vec![vec![0.0f32; 4]];
        let mut buffer = AudioBuffer::from_channels(&mut data);
        let _ = buffer.slice(3, 2);
    }

    #[test]
    fn test_zero_channel_view_keeps_length() {
        let mut data: Vec<Vec<f32>> = Vec::new();
        let buffer = AudioBuffer::new(&mut data, 64);
        assert_eq!(buffer.num_channels(), 0);
        assert_eq!(buffer.num_samples(), 64);
    }
}
