//! polyshield CLI
//!
//! Command-line driver for running shielded policies on the built-in
//! environments and checking single decisions from scenario files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use polyshield::config::ShieldConfig;
use polyshield::dynamics::AffineModel;
use polyshield::env::{ControlEnv, EpisodeStats};
use polyshield::log::ConsoleLogger;
use polyshield::policy::{FnPolicy, Policy, RandomPolicy};
use polyshield::shield::{Outcome, Shield};
use polyshield::utils::format_duration;
use polyshield_envs::ENV_NAMES;

mod scenario;

use scenario::Scenario;

#[derive(Parser)]
#[command(name = "polyshield")]
#[command(version, about = "polyshield - Runtime safety shield for black-box policies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a random policy under the shield
    Simulate {
        /// Environment name
        #[arg(default_value = "wall-cart")]
        env: String,

        /// Number of steps
        #[arg(long, default_value = "200")]
        steps: usize,

        /// Planning horizon
        #[arg(long, default_value = "5")]
        horizon: usize,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Run the policy without the shield for comparison
        #[arg(long)]
        no_shield: bool,

        /// Print the environment after every step
        #[arg(long)]
        render: bool,
    },

    /// Evaluate a single decision described by a JSON scenario
    Check {
        /// Scenario file
        scenario: PathBuf,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available environments
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            env,
            steps,
            horizon,
            seed,
            no_shield,
            render,
        } => {
            simulate(&env, steps, horizon, seed, no_shield, render)?;
        }
        Commands::Check { scenario, json } => {
            check(&scenario, json)?;
        }
        Commands::List => {
            list_envs();
        }
    }

    Ok(())
}

/// Summary of one simulation run
#[derive(Debug, Default)]
struct RunSummary {
    steps: usize,
    episodes: usize,
    total_return: f64,
    violations: u32,
}

fn simulate(
    env_name: &str,
    steps: usize,
    horizon: usize,
    seed: u64,
    no_shield: bool,
    render: bool,
) -> Result<()> {
    let registered = polyshield_envs::make(env_name, seed)?;
    let mut env = EpisodeStats::new(registered.env);
    let policy = RandomPolicy::new(env.action_space(), seed);

    println!("Simulating {env_name} for {steps} steps (horizon {horizon}, seed {seed})");

    if no_shield {
        let mut policy = policy;
        let summary = run(&mut env, steps, seed, render, |state| {
            Ok(policy.act(state.view())?)
        })?;
        print_summary(&summary);
        return Ok(());
    }

    let config = ShieldConfig::default().with_horizon(horizon);
    let mut shield = Shield::new(
        policy,
        registered.model,
        env.safe_region(),
        env.unsafe_polytopes(),
        env.action_space(),
        config,
    )?;

    let summary = run(&mut env, steps, seed, render, |state| {
        let decision = shield.decide_tagged(state)?;
        if decision.outcome == Outcome::Backup {
            tracing::info!(state = ?state.to_vec(), "backup controller engaged");
        }
        Ok(decision.action)
    })?;

    print_summary(&summary);
    let report = shield.stats();
    println!("Agent actions:    {}", report.agent_times);
    println!("Shielded actions: {}", report.shield_times);
    println!("Backup actions:   {}", report.backup_times);
    println!("Mean decision:    {}", format_duration(report.mean_time()));
    report.log_to(&ConsoleLogger::new(), summary.steps as u64);
    Ok(())
}

fn run<F>(
    env: &mut EpisodeStats<Box<dyn ControlEnv>>,
    steps: usize,
    seed: u64,
    render: bool,
    mut choose: F,
) -> Result<RunSummary>
where
    F: FnMut(&ndarray::Array1<f64>) -> Result<ndarray::Array1<f64>>,
{
    let mut summary = RunSummary::default();
    let mut state = env.reset(Some(seed));

    for step in 0..steps {
        let action = choose(&state)?;
        let result = env.step(&action)?;
        summary.steps += 1;

        if render {
            if let Some(frame) = env.render() {
                println!("Step {}: {}", step, frame);
            }
        }

        state = result.observation.clone();
        if result.done() || step + 1 == steps {
            summary.episodes += 1;
            summary.total_return += env.episode_return();
            summary.violations += env.violations();
            if result.done() {
                tracing::debug!(step, "Episode ended, resetting");
                state = env.reset(None);
            }
        }
    }

    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!("Steps:            {}", summary.steps);
    println!("Episodes:         {}", summary.episodes);
    println!("Return:           {:.3}", summary.total_return);
    println!("Violations:       {}", summary.violations);
}

#[derive(Serialize)]
struct CheckOutput {
    outcome: Outcome,
    action: Vec<f64>,
    unsafe_proposal: bool,
}

fn check(path: &Path, json: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let proposal = scenario.proposal();
    let replay = proposal.clone();
    let policy = FnPolicy::new(move |_state: ndarray::ArrayView1<f64>| replay.clone());

    let mut shield = Shield::new(
        policy,
        AffineModel::new(scenario.dynamics()?),
        scenario.safe_region()?,
        scenario.unsafe_polytopes()?,
        scenario.bounds()?,
        scenario.config.clone(),
    )?;

    let state = scenario.state();
    let unsafe_proposal = shield.is_unsafe(&state, &proposal)?;
    let decision = shield.decide_tagged(&state)?;

    let output = CheckOutput {
        outcome: decision.outcome,
        action: decision.action.to_vec(),
        unsafe_proposal,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Outcome: {}", output.outcome);
        println!("Action:  {:?}", output.action);
        println!("Proposal unsafe: {}", output.unsafe_proposal);
    }
    Ok(())
}

fn list_envs() {
    println!("Available environments:");
    println!();
    for name in ENV_NAMES {
        let description = match *name {
            "double-integrator" => "Point mass kept inside a position/velocity box",
            "wall-cart" => "Cart rewarded for speed on a track ending in a wall",
            _ => "",
        };
        println!("  {:<18} {}", name, description);
    }
}
