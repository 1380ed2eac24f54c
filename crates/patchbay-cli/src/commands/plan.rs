//! Compiled schedule inspection command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::common::{Demo, build_demo, load_config};

#[derive(Args)]
pub struct PlanArgs {
    /// Demo topology to compile
    #[arg(long, value_enum, default_value_t = Demo::Chain)]
    demo: Demo,

    /// Engine configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only print the summary line
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(args: PlanArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let mut demo = build_demo(args.demo, &config)?;
    demo.graph.prepare(config.prepare_settings());

    let schedule = demo.graph.compile();
    tracing::info!(
        "compiled {:?}: {} nodes, {} steps, latency {} samples",
        args.demo,
        demo.graph.node_count(),
        schedule.step_count(),
        schedule.latency_samples()
    );

    if args.quiet {
        return Ok(());
    }

    println!("Nodes:");
    for node in demo.graph.nodes() {
        let caps = node.capabilities();
        println!(
            "  {:<12} {:<12} in={} out={} midi={}/{} latency={}",
            node.id().to_string(),
            node.processor().name(),
            caps.inputs,
            caps.outputs,
            if caps.accepts_midi { "in" } else { "-" },
            if caps.produces_midi { "out" } else { "-" },
            caps.latency
        );
    }

    println!("\nConnections:");
    for connection in demo.graph.connections() {
        println!("  {connection}");
    }

    println!("\n{schedule}");
    Ok(())
}
