/// Script Linter: checks a script against its design document.
///
/// Usage: script_linter <design.json> <script.txt> [--config <config.ron>]
use std::process;
use story_engine::core::engine::StoryEngine;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: script_linter <design.json> <script.txt> [--config <config.ron>]");
        process::exit(0);
    }

    let design_path = &args[1];
    let script_path = &args[2];
    let mut config_path = None;

    let mut i = 3;
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            i += 1;
            config_path = Some(args[i].clone());
        }
        i += 1;
    }

    let mut builder = StoryEngine::builder()
        .design_path(design_path)
        .script_path(script_path);
    if let Some(ref path) = config_path {
        builder = builder.config_path(path);
    }

    let engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: Failed to load story: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Loaded {} nodes, {} edges, {} scripted nodes",
        engine.graph().len(),
        engine.graph().edges().len(),
        engine.script().len()
    );

    let report = engine.lint();
    let anomalies = engine.parse_anomalies();

    println!("\n=== Script Lint Report ===\n");

    if report.is_clean() && anomalies.is_empty() {
        println!("All checks passed!");
    }

    for anomaly in anomalies {
        println!("PARSE: {}", anomaly);
    }

    for warning in &report.warnings {
        println!("WARNING: {}", warning);
    }

    for error in &report.errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings, {} parse anomalies",
        report.errors.len(),
        report.warnings.len(),
        anomalies.len()
    );

    if report.errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}
