//! Small processors for the demo graphs.

use std::f64::consts::TAU;

use patchbay_core::{AudioBuffer, MidiBuffer, Processor, Transport};

/// Free-running sine oscillator written to every output channel.
pub struct Sine {
    channels: usize,
    freq: f64,
    amplitude: f64,
    phase: f64,
    increment: f64,
}

impl Sine {
    pub fn new(channels: usize, freq: f64, amplitude: f64) -> Self {
        Self {
            channels,
            freq,
            amplitude,
            phase: 0.0,
            increment: 0.0,
        }
    }
}

impl Processor for Sine {
    fn name(&self) -> &str {
        "sine"
    }

    fn num_input_channels(&self) -> usize {
        0
    }

    fn num_output_channels(&self) -> usize {
        self.channels
    }

    fn prepare(&mut self, sample_rate: f64, _block_size: usize) {
        self.increment = self.freq / sample_rate;
        self.phase = 0.0;
    }

    fn release(&mut self) {}

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn process(&mut self, audio: &mut AudioBuffer<'_, f32>, _midi: &mut MidiBuffer, _transport: Option<&Transport>) {
        let start = self.phase;
        for ch in 0..self.channels {
            let mut phase = start;
            for s in audio.channel_mut(ch) {
                *s = ((phase * TAU).sin() * self.amplitude) as f32;
                phase = (phase + self.increment).fract();
            }
            self.phase = phase;
        }
    }
}

/// Per-channel gain with native double precision.
pub struct Gain {
    channels: usize,
    factor: f64,
}

impl Gain {
    pub fn new(channels: usize, factor: f64) -> Self {
        Self { channels, factor }
    }
}

impl Processor for Gain {
    fn name(&self) -> &str {
        "gain"
    }

    fn num_input_channels(&self) -> usize {
        self.channels
    }

    fn num_output_channels(&self) -> usize {
        self.channels
    }

    fn supports_double_precision(&self) -> bool {
        true
    }

    fn prepare(&mut self, _sample_rate: f64, _block_size: usize) {}

    fn release(&mut self) {}

    fn process(&mut self, audio: &mut AudioBuffer<'_, f32>, _midi: &mut MidiBuffer, _transport: Option<&Transport>) {
        let factor = self.factor as f32;
        for ch in 0..self.channels {
            for s in audio.channel_mut(ch) {
                *s *= factor;
            }
        }
    }

    fn process_f64(&mut self, audio: &mut AudioBuffer<'_, f64>, _midi: &mut MidiBuffer, _transport: Option<&Transport>) {
        for ch in 0..self.channels {
            for s in audio.channel_mut(ch) {
                *s *= self.factor;
            }
        }
    }
}

/// Fixed delay that reports its length as latency.
pub struct Delay {
    samples: usize,
    lines: Vec<Vec<f32>>,
    pos: usize,
}

impl Delay {
    pub fn new(channels: usize, samples: usize) -> Self {
        Self {
            samples,
            lines: vec![Vec::new(); channels],
            pos: 0,
        }
    }
}

impl Processor for Delay {
    fn name(&self) -> &str {
        "delay"
    }

    fn num_input_channels(&self) -> usize {
        self.lines.len()
    }

    fn num_output_channels(&self) -> usize {
        self.lines.len()
    }

    fn latency_samples(&self) -> usize {
        self.samples
    }

    fn prepare(&mut self, _sample_rate: f64, _block_size: usize) {
        for line in &mut self.lines {
            line.clear();
            line.resize(self.samples.max(1), 0.0);
        }
        self.pos = 0;
    }

    fn release(&mut self) {
        for line in &mut self.lines {
            *line = Vec::new();
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.fill(0.0);
        }
        self.pos = 0;
    }

    fn process(&mut self, audio: &mut AudioBuffer<'_, f32>, _midi: &mut MidiBuffer, _transport: Option<&Transport>) {
        if self.samples == 0 {
            return;
        }
        let start = self.pos;
        for (ch, line) in self.lines.iter_mut().enumerate() {
            let mut pos = start;
            for s in audio.channel_mut(ch) {
                let out = line[pos];
                line[pos] = *s;
                pos = (pos + 1) % self.samples;
                *s = out;
            }
            self.pos = pos;
        }
    }
}

/// Monophonic sine voice driven by note-on/note-off events.
pub struct NoteSynth {
    channels: usize,
    sample_rate: f64,
    note: Option<u8>,
    phase: f64,
}

impl NoteSynth {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            sample_rate: 48000.0,
            note: None,
            phase: 0.0,
        }
    }

    fn handle(&mut self, data: &[u8]) {
        match data {
            [status, note, velocity] if status & 0xf0 == 0x90 && *velocity > 0 => self.note = Some(*note),
            [status, note, _] if status & 0xf0 == 0x80 || status & 0xf0 == 0x90 => {
                if self.note == Some(*note) {
                    self.note = None;
                }
            }
            _ => {}
        }
    }

    fn next_sample(&mut self) -> f32 {
        let Some(note) = self.note else {
            return 0.0;
        };
        let freq = 440.0 * 2f64.powf((f64::from(note) - 69.0) / 12.0);
        let out = (self.phase * TAU).sin() * 0.25;
        self.phase = (self.phase + freq / self.sample_rate).fract();
        out as f32
    }
}

impl Processor for NoteSynth {
    fn name(&self) -> &str {
        "note-synth"
    }

    fn num_input_channels(&self) -> usize {
        0
    }

    fn num_output_channels(&self) -> usize {
        self.channels
    }

    fn accepts_midi(&self) -> bool {
        true
    }

    fn prepare(&mut self, sample_rate: f64, _block_size: usize) {
        self.sample_rate = sample_rate;
        self.note = None;
        self.phase = 0.0;
    }

    fn release(&mut self) {}

    fn process(&mut self, audio: &mut AudioBuffer<'_, f32>, midi: &mut MidiBuffer, _transport: Option<&Transport>) {
        let mut events = midi.iter().peekable();
        for i in 0..audio.num_samples() {
            while let Some(event) = events.next_if(|e| e.time <= i) {
                self.handle(event.data());
            }
            let sample = self.next_sample();
            for ch in 0..self.channels {
                audio.channel_mut(ch)[i] = sample;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_core::MidiEvent;

    fn run(processor: &mut dyn Processor, channels: &mut [Vec<f32>], midi: &mut MidiBuffer) {
        let mut audio = AudioBuffer::from_channels(channels);
        processor.process(&mut audio, midi, None);
    }

    #[test]
    fn test_sine_channels_match() {
        let mut sine = Sine::new(2, 1000.0, 0.5);
        sine.prepare(48000.0, 64);
        let mut block = vec![vec![0.0f32; 64]; 2];
        run(&mut sine, &mut block, &mut MidiBuffer::new());
        assert_eq!(block[0], block[1]);
        assert!(block[0].iter().all(|s| s.abs() <= 0.5));
        assert!(block[0].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_delay_shifts_every_channel() {
        let mut delay = Delay::new(2, 2);
        delay.prepare(48000.0, 4);
        let mut block = vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]];
        run(&mut delay, &mut block, &mut MidiBuffer::new());
        assert_eq!(block, vec![vec![0.0, 0.0, 1.0, 2.0], vec![0.0, 0.0, 5.0, 6.0]]);
        assert_eq!(delay.latency_samples(), 2);
    }

    #[test]
    fn test_synth_follows_notes() {
        let mut synth = NoteSynth::new(1);
        synth.prepare(48000.0, 32);
        let mut midi = MidiBuffer::new();
        midi.add_event(MidiEvent::note_on(8, 0, 69, 100));
        midi.add_event(MidiEvent::note_off(24, 0, 69));
        let mut block = vec![vec![1.0f32; 32]];
        run(&mut synth, &mut block, &mut midi);
        assert!(block[0][..8].iter().all(|&s| s == 0.0));
        assert!(block[0][9..24].iter().any(|&s| s != 0.0));
        assert!(block[0][24..].iter().all(|&s| s == 0.0));
    }
}
