//! Time-stamped MIDI event buffers.
//!
//! A [`MidiBuffer`] is a fixed-capacity, time-ordered list of short MIDI
//! messages. Capacity is reserved up front; inserting into a full buffer drops
//! the event rather than growing, so every operation is allocation-free once
//! the buffer exists.

/// Default number of events a buffer reserves.
pub const DEFAULT_EVENT_CAPACITY: usize = 512;

/// One short MIDI message positioned inside a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MidiEvent {
    /// Frame offset from the start of the block.
    pub time: usize,
    bytes: [u8; 3],
    len: u8,
}

impl MidiEvent {
    /// Creates an event from up to three raw bytes.
    ///
    /// Returns `None` for an empty or over-long message.
    pub fn new(time: usize, data: &[u8]) -> Option<Self> {
        if data.is_empty() || data.len() > 3 {
            return None;
        }
        let mut bytes = [0u8; 3];
        bytes[..data.len()].copy_from_slice(data);
        Some(Self {
            time,
            bytes,
            len: data.len() as u8,
        })
    }

    /// Note-on on `channel` (0-15).
    pub fn note_on(time: usize, channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            time,
            bytes: [0x90 | (channel & 0x0f), note & 0x7f, velocity & 0x7f],
            len: 3,
        }
    }

    /// Note-off on `channel` (0-15).
    pub fn note_off(time: usize, channel: u8, note: u8) -> Self {
        Self {
            time,
            bytes: [0x80 | (channel & 0x0f), note & 0x7f, 0],
            len: 3,
        }
    }

    /// Raw message bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Returns a copy moved to a new frame offset.
    #[inline]
    pub fn with_time(self, time: usize) -> Self {
        Self { time, ..self }
    }
}

/// Fixed-capacity, time-ordered event list.
#[derive(Debug, PartialEq, Eq)]
pub struct MidiBuffer {
    events: Vec<MidiEvent>,
    capacity: usize,
}

impl MidiBuffer {
    /// Creates a buffer reserving [`DEFAULT_EVENT_CAPACITY`] events.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a buffer that holds at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of events held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the buffer holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Removes every event.
    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Iterates events in time order.
    pub fn iter(&self) -> impl Iterator<Item = &MidiEvent> {
        self.events.iter()
    }

    /// Inserts an event after any events with the same or earlier time.
    ///
    /// Returns `false` and drops the event when the buffer is full.
    pub fn add_event(&mut self, event: MidiEvent) -> bool {
        if self.events.len() >= self.capacity {
            return false;
        }
        let pos = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(pos, event);
        true
    }

    /// Merges events from `other` whose time lies in `start..start + num_samples`,
    /// shifting each by `offset` frames.
    pub fn add_events(&mut self, other: &MidiBuffer, start: usize, num_samples: usize, offset: isize) {
        let end = start + num_samples;
        for event in other.events.iter().filter(|e| e.time >= start && e.time < end) {
            let time = event.time.saturating_add_signed(offset);
            if !self.add_event(event.with_time(time)) {
                break;
            }
        }
    }

    /// Replaces the contents with those of `other`, truncated to capacity.
    pub fn copy_from(&mut self, other: &MidiBuffer) {
        self.events.clear();
        let n = other.events.len().min(self.capacity);
        self.events.extend_from_slice(&other.events[..n]);
    }
}

impl Default for MidiBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MidiBuffer {
    fn clone(&self) -> Self {
        let mut copy = Self::with_capacity(self.capacity);
        copy.copy_from(self);
        copy
    }
}

impl<'a> IntoIterator for &'a MidiBuffer {
    type Item = &'a MidiEvent;
    type IntoIter = core::slice::Iter<'a, MidiEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_stay_time_ordered() {
        let mut buffer = MidiBuffer::new();
        buffer.add_event(MidiEvent::note_on(10, 0, 60, 100));
        buffer.add_event(MidiEvent::note_on(2, 0, 62, 100));
        buffer.add_event(MidiEvent::note_off(10, 0, 64));
        let times: Vec<usize> = buffer.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![2, 10, 10]);
        // Equal timestamps keep insertion order.
        assert_eq!(buffer.iter().nth(2).unwrap().data(), &[0x80, 64, 0]);
    }

    #[test]
    fn test_full_buffer_drops_events_without_growing() {
        let mut buffer = MidiBuffer::with_capacity(2);
        assert!(buffer.add_event(MidiEvent::note_on(0, 0, 60, 1)));
        assert!(buffer.add_event(MidiEvent::note_on(1, 0, 61, 1)));
        assert!(!buffer.add_event(MidiEvent::note_on(2, 0, 62, 1)));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_add_events_windows_and_shifts() {
        let mut source = MidiBuffer::new();
        for t in [0, 31, 32, 40, 63, 64] {
            source.add_event(MidiEvent::note_on(t, 0, 60, 1));
        }
        let mut chunk = MidiBuffer::new();
        chunk.add_events(&source, 32, 32, -32);
        let times: Vec<usize> = chunk.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0, 8, 31]);
    }

    #[test]
    fn test_new_rejects_bad_lengths() {
        assert!(MidiEvent::new(0, &[]).is_none());
        assert!(MidiEvent::new(0, &[1, 2, 3, 4]).is_none());
        assert_eq!(MidiEvent::new(5, &[0xc0, 7]).unwrap().data(), &[0xc0, 7]);
    }

    #[test]
    fn test_clone_keeps_capacity() {
        let mut buffer = MidiBuffer::with_capacity(8);
        buffer.add_event(MidiEvent::note_on(0, 0, 60, 1));
        let copy = buffer.clone();
        assert_eq!(copy.capacity(), 8);
        assert_eq!(copy, buffer);
    }
}
