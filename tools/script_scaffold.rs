/// Script Scaffold: writes a skeleton script for a design document.
///
/// Every node gets its summary as narration plus the navigation its edges
/// imply, in generation order. With `--plan`, also prints each node's memory.
///
/// Usage: script_scaffold --design <design.json> --output <script.txt> [--config <config.ron>] [--plan]
use std::env;
use std::process;
use story_engine::core::compose::ScriptComposer;
use story_engine::core::engine::StoryEngine;

const USAGE: &str =
    "Usage: script_scaffold --design <design.json> --output <script.txt> [--config <config.ron>] [--plan]";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut design = None;
    let mut output = None;
    let mut config = None;
    let mut show_plan = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--design" if i + 1 < args.len() => {
                i += 1;
                design = Some(args[i].clone());
            }
            "--output" if i + 1 < args.len() => {
                i += 1;
                output = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config = Some(args[i].clone());
            }
            "--plan" => show_plan = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let design_path = design.unwrap_or_else(|| {
        eprintln!("Error: --design is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });

    let output_path = output.unwrap_or_else(|| {
        eprintln!("Error: --output is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });

    let mut builder = StoryEngine::builder().design_path(&design_path);
    if let Some(ref path) = config {
        builder = builder.config_path(path);
    }
    let engine = builder.build().unwrap_or_else(|e| {
        eprintln!("Error loading design: {}", e);
        process::exit(1);
    });

    let narrator = engine
        .config()
        .script
        .narrator_ids
        .first()
        .cloned()
        .unwrap_or_else(|| "narrator".to_string());
    let text = ScriptComposer::skeleton(engine.graph(), &narrator);

    if let Err(e) = std::fs::write(&output_path, &text) {
        eprintln!("Error writing {}: {}", output_path, e);
        process::exit(1);
    }

    println!(
        "Wrote skeleton for {} nodes to {}",
        engine.graph().len(),
        output_path
    );

    if show_plan {
        let plan = engine.generation_plan().unwrap_or_else(|e| {
            eprintln!("Error building generation plan: {}", e);
            process::exit(1);
        });
        println!("\n=== Generation Plan ===");
        for (n, step) in plan.iter().enumerate() {
            let merge = if engine.graph().is_merge_point(&step.node) {
                " (merge)"
            } else {
                ""
            };
            println!("\n{}. {}{}: {}", n + 1, step.node, merge, step.summary);
            for line in step.memory.lines() {
                println!("   | {}", line);
            }
        }
    }
}
