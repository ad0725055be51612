/// Playthrough: interactive (or automatic) player for a story script.
///
/// Usage: playthrough --design <design.json> --script <script.txt>
///                    [--config <config.ron>] [--levels <levels.ron>]
///                    [--load <save.ron>] [--auto] [--seed <n>]
///
/// Commands:
///   <enter> / next         advance past the current line
///   <n>                    pick menu option n
///   set <role> <level>     set a character level
///   levels                 show character levels
///   state                  show the session position and display state
///   history                list choices made so far
///   save <path>            write the session to a RON save file
///   load <path>            resume a session from a RON save file
///   help                   list commands
///   quit                   exit
use std::io::{self, BufRead, Write};
use std::path::Path;
use story_engine::core::anomaly::ContentAnomaly;
use story_engine::core::autoplay::AutoPlayer;
use story_engine::core::engine::StoryEngine;
use story_engine::core::interpreter::PlaybackObserver;
use story_engine::core::progression::{CharacterLevels, ProgressionLookup};
use story_engine::core::session::{PlaybackSession, PlaybackState, Portrait};
use story_engine::schema::node::NodeId;

/// Prints everything the interpreter reports.
struct Console;

impl PlaybackObserver for Console {
    fn on_scene_change(&mut self, background: &str) {
        println!("  [scene: {}]", background);
    }

    fn on_portrait_change(&mut self, portrait: Option<&Portrait>) {
        match portrait {
            Some(p) => println!("  [{} looks {}]", p.speaker, p.expression),
            None => println!("  [portrait cleared]"),
        }
    }

    fn on_line(&mut self, speaker: Option<&str>, text: &str) {
        match speaker {
            Some(name) => println!("{}: {}", name, text),
            None => println!("  {}", text),
        }
    }

    fn on_choices(&mut self, options: &[String]) {
        println!();
        for (i, option) in options.iter().enumerate() {
            println!("  {}) {}", i + 1, option);
        }
    }

    fn on_node_finished(&mut self, node: &NodeId) {
        println!("\n--- The End ({}) ---", node);
    }

    fn on_anomaly(&mut self, anomaly: &ContentAnomaly) {
        println!("  (warning: {})", anomaly);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut design_path = None;
    let mut script_path = None;
    let mut config_path = None;
    let mut levels_path = None;
    let mut load_path = None;
    let mut auto = false;
    let mut seed: u64 = 42;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--design" if i + 1 < args.len() => {
                i += 1;
                design_path = Some(args[i].clone());
            }
            "--script" if i + 1 < args.len() => {
                i += 1;
                script_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--levels" if i + 1 < args.len() => {
                i += 1;
                levels_path = Some(args[i].clone());
            }
            "--load" if i + 1 < args.len() => {
                i += 1;
                load_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--auto" => auto = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let (Some(design_path), Some(script_path)) = (design_path, script_path) else {
        eprintln!("Error: --design and --script are required");
        print_usage();
        std::process::exit(1);
    };

    let mut builder = StoryEngine::builder()
        .design_path(&design_path)
        .script_path(&script_path);
    if let Some(ref path) = config_path {
        builder = builder.config_path(path);
    }
    let engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let mut levels = match levels_path {
        Some(ref path) => match CharacterLevels::load_from_ron(Path::new(path)) {
            Ok(levels) => levels,
            Err(e) => {
                eprintln!("ERROR loading levels: {}", e);
                std::process::exit(1);
            }
        },
        None => CharacterLevels::new(),
    };

    let mut session = match load_path {
        Some(ref path) => match PlaybackSession::load(Path::new(path)) {
            Ok(session) => session,
            Err(e) => {
                eprintln!("ERROR loading save: {}", e);
                std::process::exit(1);
            }
        },
        None => engine.new_session(),
    };

    println!(
        "Loaded {} nodes ({} scripted), {} parse warnings",
        engine.graph().len(),
        engine.script().len(),
        engine.parse_anomalies().len()
    );

    if auto {
        run_auto(&engine, &levels, &mut session, seed);
        return;
    }

    println!("Type 'help' for commands.\n");

    // a loaded session already shows its line or menu
    let start = if session.awaiting_advance || session.state != PlaybackState::Running {
        Ok(session.state)
    } else {
        engine.interpreter(&levels).step(&mut session, &mut Console)
    };
    if let Err(e) = start {
        println!("ERROR: {}", e);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("play> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts.first().map(|s| s.to_lowercase()).unwrap_or_default();

        let interpreter = engine.interpreter(&levels);
        let result = match cmd.as_str() {
            "" | "next" | "n" => interpreter.advance(&mut session, &mut Console),
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
                continue;
            }
            "state" => {
                println!("{:#?}", session.displayed);
                println!(
                    "node={} ip={} state={:?} open_conditions={}",
                    session.current_node,
                    session.instruction_pointer,
                    session.state,
                    session.condition_stack.len()
                );
                continue;
            }
            "history" => {
                if session.history.is_empty() {
                    println!("No choices yet.");
                }
                for record in &session.history {
                    let target = record
                        .target
                        .as_ref()
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "(stay)".to_string());
                    println!("  {}: \"{}\" -> {}", record.node, record.text, target);
                }
                continue;
            }
            "levels" => {
                for role in roles_in_script(&engine) {
                    match levels.level(&role) {
                        Some(level) => println!("  {} = {}", role, level),
                        None => println!("  {} (unset)", role),
                    }
                }
                continue;
            }
            "set" => {
                if parts.len() < 3 {
                    println!("Usage: set <role> <level>");
                    continue;
                }
                match parts[2].parse::<i32>() {
                    Ok(level) => {
                        levels.set(parts[1], level);
                        println!("{} = {}", parts[1], level);
                    }
                    Err(_) => println!("Invalid level: {}", parts[2]),
                }
                continue;
            }
            "save" => {
                if parts.len() < 2 {
                    println!("Usage: save <path>");
                    continue;
                }
                match session.save(Path::new(parts[1])) {
                    Ok(()) => println!("Saved to {}", parts[1]),
                    Err(e) => println!("ERROR: {}", e),
                }
                continue;
            }
            "load" => {
                if parts.len() < 2 {
                    println!("Usage: load <path>");
                    continue;
                }
                match PlaybackSession::load(Path::new(parts[1])) {
                    Ok(loaded) => {
                        session = loaded;
                        println!("Loaded session at node {}", session.current_node);
                        if let Some(text) = &session.displayed.text {
                            println!("{}", text);
                        }
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
                continue;
            }
            other => match other.parse::<usize>() {
                Ok(n) if n >= 1 => interpreter.choose(&mut session, n - 1, &mut Console),
                _ => {
                    println!("Unknown command: {}. Type 'help'.", other);
                    continue;
                }
            },
        };

        if let Err(e) = result {
            println!("ERROR: {}", e);
        }
    }
}

fn run_auto(
    engine: &StoryEngine,
    levels: &CharacterLevels,
    session: &mut PlaybackSession,
    seed: u64,
) {
    let interpreter = engine.interpreter(levels);
    match AutoPlayer::new(seed).play(&interpreter, session) {
        Ok(run) => {
            for (speaker, text) in &run.lines {
                match speaker {
                    Some(name) => println!("{}: {}", name, text),
                    None => println!("  {}", text),
                }
            }
            println!("\n--- Summary ---");
            let path: Vec<&str> = run.visited.iter().map(|id| id.as_str()).collect();
            println!("Path: {}", path.join(" -> "));
            for record in &run.choices {
                println!("Chose \"{}\" at {}", record.text, record.node);
            }
            match run.ending {
                Some(ending) => println!("Ending: {} after {} steps", ending, run.steps),
                None => println!("No ending reached after {} steps", run.steps),
            }
            if !run.anomalies.is_empty() {
                println!("{} content warnings", run.anomalies.len());
            }
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}

/// Roles named by any `[IF]` in the script.
fn roles_in_script(engine: &StoryEngine) -> Vec<String> {
    let mut roles: Vec<String> = engine
        .script()
        .iter()
        .flat_map(|(_, instructions)| instructions.iter())
        .filter_map(|i| match i {
            story_engine::schema::instruction::ScriptInstruction::ConditionIf { role, .. } => {
                Some(role.clone())
            }
            _ => None,
        })
        .collect();
    roles.sort();
    roles.dedup();
    roles
}

fn print_usage() {
    println!("Usage: playthrough --design <design.json> --script <script.txt>");
    println!("                   [--config <config.ron>] [--levels <levels.ron>]");
    println!("                   [--load <save.ron>] [--auto] [--seed <n>]");
}

fn print_help() {
    println!("Commands:");
    println!("  <enter> / next        advance past the current line");
    println!("  <n>                   pick menu option n");
    println!("  set <role> <level>    set a character level");
    println!("  levels                show character levels");
    println!("  state                 show position and display state");
    println!("  history               list choices made so far");
    println!("  save <path>           write the session to a RON save file");
    println!("  load <path>           resume a session from a RON save file");
    println!("  help                  this list");
    println!("  quit                  exit");
}
