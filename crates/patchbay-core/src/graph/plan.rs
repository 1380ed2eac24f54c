//! Render plans: a compiled schedule bound to one set of prepare settings.

use super::compiler::{GraphSnapshot, compile};
use super::executor::Executor;
use super::schedule::CompiledSchedule;
use super::states::PrepareSettings;
use crate::audio_buffer::AudioBuffer;
use crate::midi::MidiBuffer;
use crate::processor::Transport;

/// An immutable, self-contained execution unit.
///
/// Holds one executor per sample type, both built from the same schedule, so
/// the host may call either entry point.
pub struct RenderPlan {
    settings: PrepareSettings,
    latency_samples: usize,
    single: Executor<f32>,
    double: Executor<f64>,
}

impl RenderPlan {
    /// Compiles `snapshot` and allocates all buffers. Control thread only.
    pub fn build(snapshot: &GraphSnapshot, settings: PrepareSettings, event_capacity: usize) -> Self {
        Self::from_schedule(&compile(snapshot), settings, event_capacity)
    }

    /// Allocates buffers for an already compiled schedule.
    pub fn from_schedule(schedule: &CompiledSchedule, settings: PrepareSettings, event_capacity: usize) -> Self {
        Self {
            settings,
            latency_samples: schedule.latency_samples(),
            single: Executor::new(schedule, &settings, event_capacity),
            double: Executor::new(schedule, &settings, event_capacity),
        }
    }

    /// Settings the plan was built for.
    pub fn settings(&self) -> &PrepareSettings {
        &self.settings
    }

    /// Total latency in samples.
    pub fn latency_samples(&self) -> usize {
        self.latency_samples
    }

    /// Renders a single-precision block.
    #[inline]
    pub fn process(&mut self, audio: &mut AudioBuffer<'_, f32>, midi: &mut MidiBuffer, transport: Option<&Transport>) {
        self.single.perform(audio, midi, transport);
    }

    /// Renders a double-precision block.
    #[inline]
    pub fn process_f64(
        &mut self,
        audio: &mut AudioBuffer<'_, f64>,
        midi: &mut MidiBuffer,
        transport: Option<&Transport>,
    ) {
        self.double.perform(audio, midi, transport);
    }
}

impl core::fmt::Debug for RenderPlan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RenderPlan")
            .field("settings", &self.settings)
            .field("latency_samples", &self.latency_samples)
            .finish_non_exhaustive()
    }
}
