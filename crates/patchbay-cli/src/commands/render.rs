//! Offline rendering command.
//!
//! Renders a demo graph to a 32-bit float WAV file. With `--edit`, a second
//! thread keeps rewiring the graph while rendering runs, so every block may
//! pick up a freshly published plan.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use hound::{SampleFormat, WavSpec, WavWriter};
use patchbay_core::graph::RenderSample;
use patchbay_core::{
    AudioBuffer, Connection, GraphRenderer, MidiBuffer, MidiEvent, NodeId, Precision, ProcessingGraph, Sample,
    Transport,
};

use super::common::{Demo, build_demo, load_config};

#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Demo topology to render
    #[arg(long, value_enum, default_value_t = Demo::Chain)]
    demo: Demo,

    /// Engine configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Duration in seconds
    #[arg(long, default_value = "2.0")]
    seconds: f64,

    /// Host block size; larger than the configured block size forces chunking
    #[arg(long)]
    host_block: Option<usize>,

    /// Rewire the graph from a second thread while rendering
    #[arg(long)]
    edit: bool,

    /// Milliseconds between edits
    #[arg(long, default_value = "5")]
    edit_interval_ms: u64,
}

/// Note events for the synth demo, in absolute frames.
fn demo_notes(total_frames: usize) -> Vec<MidiEvent> {
    vec![
        MidiEvent::note_on(0, 0, 57, 100),
        MidiEvent::note_off(total_frames / 2, 0, 57),
        MidiEvent::note_on(total_frames / 2, 0, 64, 100),
        MidiEvent::note_off(total_frames * 7 / 8, 0, 64),
    ]
}

/// Repeatedly disconnects and restores `node` until `stop` is set.
fn spawn_editor(
    mut graph: ProcessingGraph,
    node: NodeId,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<(ProcessingGraph, usize)>> {
    let saved: Vec<Connection> = graph
        .connections()
        .into_iter()
        .filter(|c| c.source.node == node || c.destination.node == node)
        .collect();

    let handle = std::thread::Builder::new()
        .name("patchbay-editor".into())
        .spawn(move || {
            let mut edits = 0;
            let mut connected = true;
            while !stop.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if connected {
                    graph.disconnect_node(node);
                } else {
                    for c in &saved {
                        if let Err(e) = graph.add_connection(*c) {
                            tracing::warn!("restoring {c}: {e}");
                        }
                    }
                }
                connected = !connected;
                edits += 1;
            }
            (graph, edits)
        })
        .context("spawning editor thread")?;
    Ok(handle)
}

/// Renders `total_frames` frames in host blocks, handing each block to `sink`.
fn render_blocks<T: RenderSample>(
    renderer: &mut GraphRenderer,
    channels: usize,
    host_block: usize,
    total_frames: usize,
    notes: &[MidiEvent],
    mut sink: impl FnMut(&[Vec<T>], usize) -> Result<()>,
) -> Result<()> {
    let mut block = vec![vec![T::ZERO; host_block]; channels];
    let mut midi = MidiBuffer::new();
    let mut start = 0;

    while start < total_frames {
        let len = host_block.min(total_frames - start);
        for channel in &mut block {
            channel.fill(T::ZERO);
        }
        midi.clear();
        for note in notes.iter().filter(|e| e.time >= start && e.time < start + len) {
            midi.add_event(note.with_time(note.time - start));
        }
        let transport = Transport {
            position_samples: Some(start as i64),
            tempo_bpm: None,
            is_playing: true,
        };

        let mut audio = AudioBuffer::new(&mut block, len);
        renderer.process_buffer(&mut audio, &mut midi, Some(&transport));
        sink(&block, len)?;
        start += len;
    }
    Ok(())
}

pub fn run(args: RenderArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    if !(args.seconds.is_finite() && args.seconds > 0.0) {
        anyhow::bail!("--seconds must be positive");
    }
    let host_block = args.host_block.unwrap_or(config.block_size).max(1);
    let total_frames = (args.seconds * config.sample_rate).round() as usize;
    let channels = config.output_channels;

    let demo = build_demo(args.demo, &config)?;
    let mut graph = demo.graph;
    let mut renderer = demo.renderer;
    graph.set_non_realtime(true);
    graph.prepare(config.prepare_settings());
    let reclaimer = graph
        .spawn_reclaimer(config.reclaim_interval())
        .context("spawning reclaim thread")?;

    tracing::info!(
        "rendering {:?} demo: {} frames, {} channels, host block {}, graph block {}, latency {} samples",
        args.demo,
        total_frames,
        channels,
        host_block,
        config.block_size,
        graph.latency_samples()
    );

    let stop = Arc::new(AtomicBool::new(false));
    let editor = if args.edit {
        Some(spawn_editor(
            graph,
            demo.toggle,
            Duration::from_millis(args.edit_interval_ms.max(1)),
            Arc::clone(&stop),
        )?)
    } else {
        None
    };

    let spec = WavSpec {
        channels: u16::try_from(channels).context("too many output channels for WAV")?,
        sample_rate: config.sample_rate.round() as u32,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&args.output, spec)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let notes = if args.demo == Demo::Synth {
        demo_notes(total_frames)
    } else {
        Vec::new()
    };
    let mut peak = 0.0f64;
    let mut write = |block: &[Vec<f64>], len: usize| -> Result<()> {
        for i in 0..len {
            for channel in block {
                peak = peak.max(channel[i].abs());
                writer.write_sample(channel[i] as f32)?;
            }
        }
        Ok(())
    };

    let rendered = match config.precision {
        Precision::Single => {
            let mut wide = vec![vec![0.0f64; host_block]; channels];
            render_blocks::<f32>(&mut renderer, channels, host_block, total_frames, &notes, |block, len| {
                for (dst, src) in wide.iter_mut().zip(block) {
                    for (d, s) in dst[..len].iter_mut().zip(&src[..len]) {
                        *d = s.to_f64();
                    }
                }
                write(&wide, len)
            })
        }
        Precision::Double => {
            render_blocks::<f64>(&mut renderer, channels, host_block, total_frames, &notes, &mut write)
        }
    };

    stop.store(true, Ordering::Relaxed);
    let edits = match editor {
        Some(handle) => {
            let (_graph, edits) = handle
                .join()
                .map_err(|_| anyhow::anyhow!("editor thread panicked"))?;
            edits
        }
        None => 0,
    };
    drop(reclaimer);
    rendered?;
    writer.finalize().context("finalizing WAV file")?;

    tracing::info!(
        "wrote {} ({} frames, peak {:.3}, {} edits)",
        args.output.display(),
        total_frames,
        peak,
        edits
    );
    Ok(())
}
