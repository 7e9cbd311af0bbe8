use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regex::Regex;

use scorp_core::WeightRegistry;
use scorp_sim::{Scenario, SimMetrics, World, interest_census};

#[derive(Parser)]
#[command(name = "scorp", about = "Social-weight opportunistic routing simulator")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file and print the delivery report
    Run {
        /// Scenario TOML file
        scenario: PathBuf,

        /// Include final per-node weights in the report
        #[arg(long)]
        weights: bool,

        /// Emit the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the interest census for a scenario
    Interests {
        /// Scenario TOML file
        scenario: PathBuf,

        /// Only count topics matching this regular expression
        #[arg(long)]
        filter: Option<String>,
    },

    /// Generate a deterministic synthetic scenario as TOML on stdout
    Gen {
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 8)]
        nodes: usize,

        #[arg(long, default_value_t = 4)]
        topics: usize,

        #[arg(long, default_value_t = 40)]
        contacts: usize,

        #[arg(long, default_value_t = 12)]
        messages: usize,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run {
            scenario,
            weights,
            json,
        } => cmd_run(scenario, *weights, *json),
        Commands::Interests { scenario, filter } => cmd_interests(scenario, filter.as_deref()),
        Commands::Gen {
            seed,
            nodes,
            topics,
            contacts,
            messages,
        } => cmd_gen(*seed, *nodes, *topics, *contacts, *messages),
    }
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file {}", path.display()))?;
    Scenario::from_toml_str(&text).context("failed to parse scenario")
}

#[derive(serde::Serialize)]
struct RunReport<'a> {
    metrics: &'a SimMetrics,
    delivery_ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    weights: Option<&'a WeightRegistry>,
}

fn cmd_run(path: &Path, with_weights: bool, json: bool) -> Result<()> {
    let scenario = load_scenario(path)?;
    let mut world = World::from_scenario(&scenario)?;
    world.run()?;

    let metrics = world.metrics();
    if json {
        let report = RunReport {
            metrics,
            delivery_ratio: metrics.delivery_ratio(),
            weights: with_weights.then(|| world.weights()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("messages created    {}", metrics.messages_created);
    println!("transfers started   {}", metrics.transfers_started);
    println!("transfers completed {}", metrics.transfers_completed);
    println!("first deliveries    {}", metrics.first_deliveries);
    println!("denied delivered    {}", metrics.denied_delivered);
    println!("denied old          {}", metrics.denied_old);
    println!("expired dropped     {}", metrics.expired_dropped);
    println!("delivery ratio      {:.3}", metrics.delivery_ratio());

    if with_weights {
        println!();
        println!("final social weights");
        println!("--------------------");
        for node in world.node_ids().collect::<Vec<_>>() {
            let name = world.node_name(node).unwrap_or("?");
            let entries: Vec<String> = world
                .weights()
                .vector(node)
                .map(|v| {
                    v.iter()
                        .map(|(topic, w)| format!("{topic}={w:.1}"))
                        .collect()
                })
                .unwrap_or_default();
            println!("{name}\t{}", entries.join(" "));
        }
    }
    Ok(())
}

fn cmd_interests(path: &Path, filter: Option<&str>) -> Result<()> {
    let scenario = load_scenario(path)?;
    let filter = filter
        .map(Regex::new)
        .transpose()
        .context("invalid filter expression")?;
    let census = interest_census(&scenario, filter.as_ref());

    println!("number of interests = {}", census.interest_count);
    println!("---------");
    println!("interest\tnodes\tmembers");
    for entry in &census.entries {
        println!(
            "{}\t{}\t{}",
            entry.topic,
            entry.node_count,
            entry.nodes.join(", ")
        );
    }
    Ok(())
}

fn cmd_gen(seed: u64, nodes: usize, topics: usize, contacts: usize, messages: usize) -> Result<()> {
    let scenario = Scenario::synthetic(seed, nodes, topics, contacts, messages);
    let text = toml::to_string(&scenario).context("failed to serialize scenario")?;
    print!("{text}");
    Ok(())
}
