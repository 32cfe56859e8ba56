//! Benchmarking CLI for the CIP solver.

mod comparison;
mod instances;
mod solver_choice;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use solver_cip::{CipSettings, Model, Solver};

use comparison::{BenchmarkResult, SolverComparison, SolverResults};
use instances::{instance_name, Family};
use solver_choice::{build_settings, settings_label, BranchingChoice, NodeSelectionChoice};

#[derive(Debug, Parser)]
#[command(name = "solver-bench", version, about = "Benchmarks for the CIP solver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Solve one generated instance with progress output.
    Run {
        /// Instance family.
        #[arg(short, long, value_enum, default_value_t = Family::Knapsack)]
        family: Family,

        /// Instance size (number of items, sets or customers).
        #[arg(short, long, default_value_t = 30)]
        size: usize,

        /// Generator seed.
        #[arg(long, default_value_t = 12345)]
        seed: u64,

        #[command(flatten)]
        search: SearchArgs,

        /// Log every N nodes.
        #[arg(long, default_value_t = 100)]
        log_freq: u64,
    },

    /// Solve a generated suite and write a JSON report.
    Suite {
        /// Families to include (all if omitted).
        #[arg(short, long, value_enum)]
        family: Vec<Family>,

        /// Instance sizes.
        #[arg(short, long, value_delimiter = ',', default_values_t = [20, 40])]
        sizes: Vec<usize>,

        /// Number of seeds per family and size.
        #[arg(long, default_value_t = 3)]
        seeds: u64,

        #[command(flatten)]
        search: SearchArgs,

        /// Output JSON path.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare JSON reports written by `suite`.
    Compare {
        /// Report files.
        #[arg(required = true, num_args = 2..)]
        reports: Vec<PathBuf>,

        /// Print the per-instance table (limited to N rows).
        #[arg(long)]
        detailed: Option<usize>,
    },
}

#[derive(Debug, Args)]
struct SearchArgs {
    /// Node selection policy.
    #[arg(long, value_enum, default_value_t = NodeSelectionChoice::BestBound)]
    node_selection: NodeSelectionChoice,

    /// Branching rule.
    #[arg(long, value_enum, default_value_t = BranchingChoice::Hybrid)]
    branching: BranchingChoice,

    /// Disable cutting planes.
    #[arg(long)]
    no_cuts: bool,

    /// Node limit per instance.
    #[arg(long, default_value_t = 100_000)]
    node_limit: u64,

    /// Time limit per instance in seconds.
    #[arg(short, long)]
    time_limit: Option<f64>,
}

impl SearchArgs {
    fn settings(&self) -> CipSettings {
        build_settings(
            self.node_selection,
            self.branching,
            !self.no_cuts,
            self.node_limit,
            self.time_limit,
        )
    }

    fn label(&self) -> String {
        settings_label(self.node_selection, self.branching, !self.no_cuts)
    }
}

/// Interrupt flag set by SIGINT.
fn install_interrupt() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&flag))
        .context("Failed to register SIGINT handler")?;
    Ok(flag)
}

fn solve_instance(
    name: String,
    model: Model,
    settings: &CipSettings,
    interrupt: &Arc<AtomicBool>,
) -> (BenchmarkResult, Option<Vec<f64>>) {
    let (n, m) = (model.num_vars(), model.num_constraints());
    let mut solver = Solver::new(settings.clone());
    solver.set_interrupt(Arc::clone(interrupt));

    let start = Instant::now();
    let result = solver.solve(model);
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(sol) => {
            let x = sol.x.clone();
            (BenchmarkResult::from_solution(name, n, m, &sol, elapsed_ms), x)
        }
        Err(e) => (BenchmarkResult::from_error(name, n, m, e.to_string()), None),
    }
}

fn print_result(r: &BenchmarkResult) {
    let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.6e}", v));
    println!("Status:           {}", r.status);
    println!("Primal bound:     {}", show(r.primal_bound));
    println!("Dual bound:       {}", show(r.dual_bound));
    println!("Gap:              {}", r.gap.map_or_else(|| "-".to_string(), |g| format!("{:.4}%", g * 100.0)));
    println!("Nodes:            {}", r.nodes);
    println!("LP iterations:    {}", r.lp_iterations);
    println!("Cuts:             {}", r.cuts);
    println!("Solve time:       {:.3} ms", r.solve_time_ms);
    if let Some(e) = &r.error {
        println!("ERROR: {}", e);
    }
}

fn run(family: Family, size: usize, seed: u64, search: &SearchArgs, log_freq: u64) -> Result<()> {
    if size < 2 {
        bail!("size must be at least 2");
    }
    let interrupt = install_interrupt()?;
    let name = instance_name(family, size, seed);
    let model = family.build(size, seed).with_context(|| format!("Failed to build {}", name))?;

    println!("\n{}", "=".repeat(60));
    println!("{} ({})", name, search.label());
    println!("{}", "=".repeat(60));
    println!("Variables (n):    {}", model.num_vars());
    println!("Constraints (m):  {}", model.num_constraints());
    println!();

    let settings = CipSettings {
        verbose: true,
        log_freq,
        ..search.settings()
    };
    let (result, x) = solve_instance(name, model, &settings, &interrupt);
    print_result(&result);
    if let Some(x) = x {
        let nonzeros = x.iter().filter(|v| v.abs() > 1e-9).count();
        println!("Nonzeros:         {}", nonzeros);
    }
    Ok(())
}

fn suite(
    families: &[Family],
    sizes: &[usize],
    seeds: u64,
    search: &SearchArgs,
    output: Option<&PathBuf>,
) -> Result<()> {
    if sizes.iter().any(|&s| s < 2) {
        bail!("sizes must be at least 2");
    }
    let interrupt = install_interrupt()?;
    let families = if families.is_empty() { &Family::ALL[..] } else { families };
    let settings = search.settings();
    let label = search.label();

    println!("CIP Solver Benchmark Suite ({})", label);
    println!("{}", "=".repeat(60));

    let mut results = Vec::new();
    'outer: for &family in families {
        for &size in sizes {
            for seed in 0..seeds {
                if interrupt.load(Ordering::Relaxed) {
                    log::warn!("interrupted, writing partial results");
                    break 'outer;
                }
                let name = instance_name(family, size, seed);
                let model = family.build(size, seed).with_context(|| format!("Failed to build {}", name))?;
                let (result, _) = solve_instance(name, model, &settings, &interrupt);
                println!(
                    "{:<18} {:>18} {:>8} nodes {:>10.1} ms",
                    result.name,
                    result.status.to_string(),
                    result.nodes,
                    result.solve_time_ms
                );
                results.push(result);
            }
        }
    }

    let report = SolverResults::new(label, results);
    let s = &report.summary;
    println!("{}", "=".repeat(60));
    println!(
        "Solved {}/{} (limits {}, failures {}), total {:.2}s, geom mean {:.2}ms",
        s.solved, s.total, s.limits, s.failures, s.total_time_s, s.geom_mean_time_ms
    );

    if let Some(path) = output {
        report.save_json(path)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn compare(reports: &[PathBuf], detailed: Option<usize>) -> Result<()> {
    let solvers = reports
        .iter()
        .map(SolverResults::load_json)
        .collect::<Result<Vec<_>>>()?;
    let comparison = SolverComparison::new(solvers);
    comparison.print_summary();
    comparison.print_pairs();
    if detailed.is_some() {
        comparison.print_detailed_comparison(detailed);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            family,
            size,
            seed,
            search,
            log_freq,
        } => run(family, size, seed, &search, log_freq.max(1)),
        Command::Suite {
            family,
            sizes,
            seeds,
            search,
            output,
        } => suite(&family, &sizes, seeds, &search, output.as_ref()),
        Command::Compare { reports, detailed } => compare(&reports, detailed),
    }
}
