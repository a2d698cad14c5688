use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs;
use stormflow::prelude::*;

/// Output choices a generated policy draws from.
const OUTPUT_CHOICES: [(&str, &str); 4] = [
    ("yes", "Yes"),
    ("no", "No"),
    ("retry", "Retry"),
    ("escalate", "Escalate"),
];

/// A CLI tool to generate random event-storming flows for the stormflow engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The path to write the generated flow JSON file to
    #[arg(short, long, default_value = "generated_flow.json")]
    output: String,

    /// Number of Trigger nodes
    #[arg(long, default_value_t = 2)]
    triggers: usize,

    /// Number of Step nodes
    #[arg(long, default_value_t = 12)]
    steps: usize,

    /// Number of Policy nodes
    #[arg(long, default_value_t = 3)]
    policies: usize,

    /// Probability that an outgoing edge loops back to an earlier node
    #[arg(long, default_value_t = 0.0)]
    cycle_chance: f64,

    /// Seed for reproducible flows
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.triggers == 0 || cli.steps + cli.policies == 0 {
        eprintln!("Error: a flow needs at least one trigger and one step or policy");
        std::process::exit(1);
    }
    if !(0.0..=1.0).contains(&cli.cycle_chance) {
        eprintln!(
            "Error: --cycle-chance ({}) must be between 0 and 1",
            cli.cycle_chance
        );
        std::process::exit(1);
    }

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    println!(
        "Generating flow ({} triggers, {} steps, {} policies)...",
        cli.triggers, cli.steps, cli.policies
    );
    let session = generate_flow(&mut rng, &cli)?;

    fs::write(&cli.output, session.export_json())?;
    println!(
        "Successfully generated {} nodes and {} edges into '{}'",
        session.graph().nodes().len(),
        session.graph().edges().len(),
        cli.output
    );

    Ok(())
}

fn generate_flow(rng: &mut StdRng, cli: &Cli) -> Result<Session> {
    let mut session = Session::default();

    // Steps and policies in a random order; edges mostly point forward in it.
    let mut order: Vec<bool> = std::iter::repeat_n(false, cli.steps)
        .chain(std::iter::repeat_n(true, cli.policies))
        .collect();
    order.shuffle(rng);

    let mut cards: Vec<NodeId> = Vec::with_capacity(order.len());
    for (column, is_policy) in order.into_iter().enumerate() {
        let position = Position::new(300.0 * (column + 1) as f64, rng.random_range(0.0..600.0));
        let id = if is_policy {
            let outputs = generate_outputs(rng);
            session.add_policy(&format!("Policy {}", column + 1), outputs, position)?
        } else {
            session.add_step(&format!("Step {}", column + 1), position)
        };
        cards.push(id);
    }

    for index in 0..cli.triggers {
        let trigger = session.add_trigger(
            &format!("Trigger {}", index + 1),
            Position::new(0.0, 200.0 * index as f64),
        );
        let target = &cards[rng.random_range(0..cards.len())];
        session.connect(&trigger, target)?;
    }

    for (index, card) in cards.iter().enumerate() {
        let sources: Vec<NodeId> = match session.graph().node(card).and_then(|n| n.as_policy()) {
            Some(policy) => policy.output_node_ids.clone(),
            None => vec![card.clone()],
        };
        for source in sources {
            let target = if index > 0 && rng.random_bool(cli.cycle_chance) {
                rng.random_range(0..index)
            } else if index + 1 < cards.len() {
                rng.random_range(index + 1..cards.len())
            } else {
                continue;
            };
            let already_linked = session
                .graph()
                .outgoing(&source)
                .any(|e| e.target == cards[target]);
            if !already_linked {
                session.connect(&source, &cards[target])?;
            }
        }
    }

    Ok(session)
}

/// Picks two to four distinct outputs for a policy.
fn generate_outputs(rng: &mut StdRng) -> Vec<PolicyOutputSpec> {
    let count = rng.random_range(2..=OUTPUT_CHOICES.len());
    let mut choices = OUTPUT_CHOICES.to_vec();
    choices.shuffle(rng);
    choices
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(index, (id, label))| {
            let side = if index == 0 { Side::Right } else { Side::Bottom };
            PolicyOutputSpec::new(id, label).on_side(side)
        })
        .collect()
}
