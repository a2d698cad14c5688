use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use stormflow::prelude::*;
use stormflow::storage::save_snapshot_file;
use tracing_subscriber::EnvFilter;

/// Replay event-storming flows on a virtual clock
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the flow JSON document
    flow_path: Option<String>,

    /// Trigger node id to fire, in order (repeatable)
    #[arg(short, long)]
    trigger: Vec<String>,

    /// Policy decision as `policy_id:output_id`, applied after the triggers (repeatable)
    #[arg(short, long)]
    decide: Vec<String>,

    /// Step the clock by this many milliseconds after each action instead of running until idle
    #[arg(short, long)]
    advance: Option<u64>,

    /// Animation duration per edge, in milliseconds
    #[arg(long, default_value_t = 1000)]
    animation_ms: u64,

    /// Write the cleaned flow back out as JSON
    #[arg(short, long)]
    export: Option<String>,

    /// Write a binary snapshot of the cleaned flow
    #[arg(long)]
    snapshot: Option<String>,

    /// Run in interactive mode to be prompted for commands
    #[arg(short = 'i', long, help = "Run in interactive 'human' mode")]
    human: bool,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if cli.human {
        run_interactive(cli);
    } else {
        run_non_interactive(cli);
    }
}

/// Logs go to stderr, filtered by `STORMFLOW_LOG` (defaults to `warn`).
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("STORMFLOW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_session(flow_path: &str, animation: Duration) -> Session {
    let load_start = Instant::now();
    let flow_json = fs::read_to_string(flow_path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read flow file '{}': {}", flow_path, e))
    });

    let mut session = Session::builder().with_animation_duration(animation).build();
    let report = session
        .import_json(&flow_json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to import flow: {}", e)));

    println!(
        "Loaded '{}': {} nodes, {} edges in {:?}",
        flow_path,
        session.graph().nodes().len(),
        session.graph().edges().len(),
        load_start.elapsed()
    );
    if !report.is_clean() {
        println!(
            "  -> Cleanup: {} duplicate output ids, {} orphaned outputs, {} dangling edges, {} duplicate edges, {} handles normalized",
            report.duplicate_output_ids,
            report.orphaned_outputs,
            report.dangling_edges,
            report.duplicate_edges,
            report.normalized_handles
        );
    }
    session
}

/// Lets the wave settle: either a fixed clock step or until nothing is pending.
fn settle(session: &mut Session, advance: Option<u64>) {
    match advance {
        Some(ms) => {
            session.advance(Duration::from_millis(ms));
        }
        None => {
            session.run_until_idle();
        }
    }
}

/// Runs the CLI in non-interactive mode, taking all arguments from the command line.
fn run_non_interactive(cli: Cli) {
    let flow_path = cli.flow_path.unwrap_or_else(|| {
        exit_with_error("Flow path is required in non-interactive mode.");
    });
    let mut session = load_session(&flow_path, Duration::from_millis(cli.animation_ms));

    for trigger in &cli.trigger {
        if session.graph().node(trigger).is_none() {
            exit_with_error(&format!("Unknown trigger node '{}'", trigger));
        }
        session.trigger(trigger);
        settle(&mut session, cli.advance);
    }

    for decision in &cli.decide {
        let (policy_id, output_id) = decision.split_once(':').unwrap_or_else(|| {
            exit_with_error(&format!(
                "Invalid decision '{}', expected policy_id:output_id",
                decision
            ))
        });
        session.resolve_policy_decision(policy_id, output_id);
        settle(&mut session, cli.advance);
    }

    print_timeline(&mut session);
    print_state(&session);

    if let Some(path) = cli.export {
        export_flow(&session, &path);
    }
    if let Some(path) = cli.snapshot {
        save_snapshot_file(session.graph(), &path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to write snapshot: {}", e)));
        println!("Snapshot written to '{}'", path);
    }
}

/// Runs the CLI in an interactive, human-friendly mode with prompts.
fn run_interactive(cli: Cli) {
    println!("--- stormflow Interactive Mode ---");

    let flow_path = match cli.flow_path {
        Some(path) => path,
        None => prompt_for_input("Enter flow path", Some("data/flow.json")),
    };
    let mut session = load_session(&flow_path, Duration::from_millis(cli.animation_ms));
    print_help();

    loop {
        let line = prompt_for_input("command", None);
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["trigger", id] => {
                session.trigger(id);
                print_timeline(&mut session);
            }
            ["output", id] => {
                session.trigger_from_output(id);
                print_timeline(&mut session);
            }
            ["decide", policy_id, output_id] => {
                session.resolve_policy_decision(policy_id, output_id);
                print_timeline(&mut session);
            }
            ["advance", ms] => match ms.parse::<u64>() {
                Ok(ms) => {
                    session.advance(Duration::from_millis(ms));
                    print_timeline(&mut session);
                }
                Err(_) => println!("Invalid duration '{}'.", ms),
            },
            ["run"] => {
                session.run_until_idle();
                print_timeline(&mut session);
            }
            ["reset"] => {
                session.reset_simulation();
                session.drain_journal();
                println!("Simulation reset.");
            }
            ["state"] => print_state(&session),
            ["downstream", id] => {
                print_reach("Downstream", id, compute_downstream(session.graph(), id))
            }
            ["upstream", id] => print_reach("Upstream", id, compute_upstream(session.graph(), id)),
            ["export", path] => export_flow(&session, path),
            ["help"] => print_help(),
            ["quit"] | ["exit"] => break,
            [] => {}
            _ => println!("Unknown command. Type 'help' for a list of commands."),
        }
    }
}

fn print_help() {
    println!("\nCommands:");
    println!("  trigger <node>            fire a trigger");
    println!("  output <node>             restart from a policy output");
    println!("  decide <policy> <output>  resolve a waiting policy");
    println!("  advance <ms>              step the virtual clock");
    println!("  run                       run until nothing is pending");
    println!("  reset                     clear the simulation");
    println!("  state                     print node and edge status");
    println!("  downstream <node>         nodes reachable from a node");
    println!("  upstream <node>           nodes that reach a node");
    println!("  export <path>             write the flow as JSON");
    println!("  quit");
}

fn print_timeline(session: &mut Session) {
    let journal = session.drain_journal();
    if journal.is_empty() {
        return;
    }
    println!("\n--- Timeline ---");
    for entry in journal {
        println!("{:>10}  {:?}", format!("{:?}", entry.at), entry.event);
    }
}

fn print_state(session: &Session) {
    let state = session.state();
    println!("\n--- Nodes ---");
    for node in session.graph().nodes() {
        println!(
            "{:<12} {:<13} {:<24} {:?}",
            node.id,
            node.kind().type_name(),
            node.label(),
            state.node_status(&node.id)
        );
    }
    println!("\n--- Edges ---");
    for edge in session.graph().edges() {
        println!(
            "{:<12} {} -> {}  {:?}",
            edge.id,
            edge.source,
            edge.target,
            state.edge_status(&edge.id)
        );
    }
    println!(
        "\nClock: {:?}, pending animations: {}, simulation active: {}",
        session.now(),
        session.pending_timers(),
        session.is_simulation_active()
    );
}

fn print_reach(direction: &str, id: &str, reached: impl IntoIterator<Item = NodeId>) {
    let mut reached: Vec<NodeId> = reached.into_iter().collect();
    reached.sort();
    if reached.is_empty() {
        println!("{} of '{}': none", direction, id);
    } else {
        println!("{} of '{}': {}", direction, id, reached.join(", "));
    }
}

fn export_flow(session: &Session, path: &str) {
    fs::write(path, session.export_json())
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to write '{}': {}", path, e)));
    println!("Flow exported to '{}'", path);
}

/// A helper function to prompt the user and read a line of input.
fn prompt_for_input(prompt_text: &str, default: Option<&str>) -> String {
    let mut line = String::new();
    let default_prompt = default.map_or("".to_string(), |d| format!(" [default: {}]", d));

    print!("> {}{}: ", prompt_text, default_prompt);
    let _ = io::stdout().flush();

    match io::stdin().read_line(&mut line) {
        Ok(0) => return "quit".to_string(),
        Ok(_) => {}
        Err(e) => exit_with_error(&format!("Failed to read line: {}", e)),
    }
    let trimmed = line.trim().to_string();

    if trimmed.is_empty() {
        default.unwrap_or("").to_string()
    } else {
        trimmed
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
