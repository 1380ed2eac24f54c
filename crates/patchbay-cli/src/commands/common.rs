//! Shared helpers for CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use patchbay_config::EngineConfig;
use patchbay_core::{Connection, GraphRenderer, IoKind, NodeId, ProcessingGraph};

use crate::processors::{Delay, Gain, NoteSynth, Sine};

/// Built-in demo topologies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Demo {
    /// Input -> gain -> gain -> output
    #[default]
    Chain,
    /// Sine split into a direct path and a delayed path, summed at the output
    Diamond,
    /// Gain loop with a delayed return path
    Feedback,
    /// MIDI input driving a synth voice
    Synth,
}

/// A demo graph with the node an editing thread may toggle.
pub struct DemoGraph {
    pub graph: ProcessingGraph,
    pub renderer: GraphRenderer,
    pub toggle: NodeId,
}

/// Loads the configuration file, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            EngineConfig::load(path).with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(EngineConfig::default()),
    }
}

fn connect_all(graph: &mut ProcessingGraph, source: NodeId, dest: NodeId, channels: usize) -> Result<()> {
    for ch in 0..channels {
        graph.add_connection(Connection::audio(source, ch, dest, ch))?;
    }
    Ok(())
}

/// Builds `demo` with channel counts from `config`. The graph is not prepared.
pub fn build_demo(demo: Demo, config: &EngineConfig) -> Result<DemoGraph> {
    let (mut graph, renderer) = ProcessingGraph::with_event_capacity(config.layout(), config.event_capacity);
    let channels = config.output_channels;
    if channels == 0 {
        anyhow::bail!("demo graphs need at least one output channel");
    }
    let output = graph.add_io_node(IoKind::AudioOutput)?.id();

    let toggle = match demo {
        Demo::Chain => {
            let source = graph.add_node(Box::new(Sine::new(channels, 220.0, 0.5)))?.id();
            let first = graph.add_node(Box::new(Gain::new(channels, 0.8)))?.id();
            let second = graph.add_node(Box::new(Gain::new(channels, 0.5)))?.id();
            connect_all(&mut graph, source, first, channels)?;
            connect_all(&mut graph, first, second, channels)?;
            connect_all(&mut graph, second, output, channels)?;
            second
        }
        Demo::Diamond => {
            let source = graph.add_node(Box::new(Sine::new(channels, 330.0, 0.4)))?.id();
            let direct = graph.add_node(Box::new(Gain::new(channels, 0.5)))?.id();
            let delayed = graph.add_node(Box::new(Delay::new(channels, 480)))?.id();
            connect_all(&mut graph, source, direct, channels)?;
            connect_all(&mut graph, source, delayed, channels)?;
            connect_all(&mut graph, direct, output, channels)?;
            connect_all(&mut graph, delayed, output, channels)?;
            delayed
        }
        Demo::Feedback => {
            let source = graph.add_node(Box::new(Sine::new(channels, 110.0, 0.3)))?.id();
            let mix = graph.add_node(Box::new(Gain::new(channels, 0.7)))?.id();
            let ret = graph.add_node(Box::new(Delay::new(channels, 240)))?.id();
            connect_all(&mut graph, source, mix, channels)?;
            connect_all(&mut graph, mix, ret, channels)?;
            connect_all(&mut graph, ret, mix, channels)?;
            connect_all(&mut graph, mix, output, channels)?;
            ret
        }
        Demo::Synth => {
            let midi_in = graph.add_io_node(IoKind::MidiInput)?.id();
            let synth = graph.add_node(Box::new(NoteSynth::new(channels)))?.id();
            let gain = graph.add_node(Box::new(Gain::new(channels, 0.9)))?.id();
            graph.add_connection(Connection::midi(midi_in, synth))?;
            connect_all(&mut graph, synth, gain, channels)?;
            connect_all(&mut graph, gain, output, channels)?;
            gain
        }
    };

    graph.set_non_realtime(config.non_realtime);
    Ok(DemoGraph {
        graph,
        renderer,
        toggle,
    })
}
