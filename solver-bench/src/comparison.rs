//! Benchmark results, JSON reports and multi-configuration comparison.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use solver_cip::{CipSolution, CipStatus};

/// Result of solving one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Instance name
    pub name: String,
    /// Number of variables
    pub n: usize,
    /// Number of constraints
    pub m: usize,
    /// Solve status
    pub status: CipStatus,
    /// Primal bound (objective of the best solution); `None` if infinite
    pub primal_bound: Option<f64>,
    /// Dual bound; `None` if infinite
    pub dual_bound: Option<f64>,
    /// Relative gap; `None` if infinite
    pub gap: Option<f64>,
    /// Nodes processed
    pub nodes: u64,
    /// Simplex iterations
    pub lp_iterations: u64,
    /// Cuts added
    pub cuts: u64,
    /// Solve time in milliseconds
    pub solve_time_ms: f64,
    /// Error message if any
    pub error: Option<String>,
}

impl BenchmarkResult {
    pub fn from_solution(name: String, n: usize, m: usize, sol: &CipSolution, solve_time_ms: f64) -> Self {
        Self {
            name,
            n,
            m,
            status: sol.status,
            primal_bound: finite(sol.primal_bound),
            dual_bound: finite(sol.dual_bound),
            gap: finite(sol.gap),
            nodes: sol.stats.nodes_processed,
            lp_iterations: sol.stats.lp_iterations,
            cuts: sol.stats.cuts_added,
            solve_time_ms,
            error: None,
        }
    }

    pub fn from_error(name: String, n: usize, m: usize, error: String) -> Self {
        Self {
            name,
            n,
            m,
            status: CipStatus::NumericalTrouble,
            primal_bound: None,
            dual_bound: None,
            gap: None,
            nodes: 0,
            lp_iterations: 0,
            cuts: 0,
            solve_time_ms: 0.0,
            error: Some(error),
        }
    }

    /// Solved to a proof (optimal within tolerance, infeasible or
    /// unbounded).
    pub fn is_solved(&self) -> bool {
        self.error.is_none()
            && matches!(
                self.status,
                CipStatus::Optimal | CipStatus::GapLimit | CipStatus::Infeasible | CipStatus::Unbounded
            )
    }
}

/// JSON has no infinities
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Summary statistics of a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    /// Instances attempted
    pub total: usize,
    /// Instances solved to a proof
    pub solved: usize,
    /// Instances stopped by a node, time or open-node limit
    pub limits: usize,
    /// Instances with errors or numerical trouble
    pub failures: usize,
    /// Total solve time in seconds
    pub total_time_s: f64,
    /// Shifted geometric mean of solve time (ms)
    pub geom_mean_time_ms: f64,
    /// Shifted geometric mean of nodes (solved instances)
    pub geom_mean_nodes: f64,
}

/// Compute shifted geometric mean
pub fn geom_mean(values: &[f64], shift: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let log_sum: f64 = values.iter().map(|&t| (t + shift).ln()).sum();
    (log_sum / values.len() as f64).exp() - shift
}

pub fn compute_summary(results: &[BenchmarkResult]) -> BenchmarkSummary {
    let mut summary = BenchmarkSummary {
        total: results.len(),
        ..Default::default()
    };
    let mut times = Vec::new();
    let mut nodes = Vec::new();

    for r in results {
        summary.total_time_s += r.solve_time_ms / 1000.0;
        times.push(r.solve_time_ms);

        if r.is_solved() {
            summary.solved += 1;
            nodes.push(r.nodes as f64);
        } else if r.error.is_none() && r.status != CipStatus::NumericalTrouble {
            summary.limits += 1;
        } else {
            summary.failures += 1;
        }
    }

    summary.geom_mean_time_ms = geom_mean(&times, 1.0);
    summary.geom_mean_nodes = geom_mean(&nodes, 10.0);
    summary
}

/// Results from a single settings configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverResults {
    /// Configuration label
    pub solver_name: String,
    /// Results for each instance
    pub results: Vec<BenchmarkResult>,
    /// Summary statistics
    pub summary: BenchmarkSummary,
}

impl SolverResults {
    /// Create from a list of benchmark results
    pub fn new(solver_name: String, results: Vec<BenchmarkResult>) -> Self {
        let summary = compute_summary(&results);
        Self {
            solver_name,
            results,
            summary,
        }
    }

    /// Save to JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create file {}", path.as_ref().display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("Failed to write JSON to {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Load from JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open file {}", path.as_ref().display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse JSON from {}", path.as_ref().display()))
    }
}

/// Head-to-head numbers of two configurations `a` and `b`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairStats {
    /// Instances solved by `a` only.
    pub a_only: usize,
    /// Instances solved by both.
    pub both: usize,
    /// Instances solved by `b` only.
    pub b_only: usize,
    /// Shifted geometric mean of nodes on commonly solved instances.
    pub nodes: (f64, f64),
    /// Shifted geometric mean of time (ms) on commonly solved instances.
    pub time_ms: (f64, f64),
    /// Instances where both stopped at a limit, counted for the side that
    /// ended with the smaller gap.
    pub smaller_gap: (usize, usize),
}

/// Comparison between configurations
pub struct SolverComparison {
    /// Results from each configuration
    pub solvers: Vec<SolverResults>,
}

impl SolverComparison {
    /// Create a new comparison
    pub fn new(solvers: Vec<SolverResults>) -> Self {
        Self { solvers }
    }

    /// Sorted instance names appearing in any report
    fn instances(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .solvers
            .iter()
            .flat_map(|s| s.results.iter().map(|r| r.name.clone()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();
        names
    }

    fn by_name(results: &[BenchmarkResult]) -> HashMap<&str, &BenchmarkResult> {
        results.iter().map(|r| (r.name.as_str(), r)).collect()
    }

    /// Compare two configurations instance by instance.
    pub fn compare_pair(&self, a: &SolverResults, b: &SolverResults) -> PairStats {
        let (map_a, map_b) = (Self::by_name(&a.results), Self::by_name(&b.results));
        let mut stats = PairStats::default();
        let (mut nodes_a, mut nodes_b, mut time_a, mut time_b) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());

        for name in self.instances() {
            let ra = map_a.get(name.as_str());
            let rb = map_b.get(name.as_str());
            let a_solved = ra.is_some_and(|r| r.is_solved());
            let b_solved = rb.is_some_and(|r| r.is_solved());
            match (a_solved, b_solved) {
                (true, true) => {
                    stats.both += 1;
                    if let (Some(ra), Some(rb)) = (ra, rb) {
                        nodes_a.push(ra.nodes as f64);
                        nodes_b.push(rb.nodes as f64);
                        time_a.push(ra.solve_time_ms);
                        time_b.push(rb.solve_time_ms);
                    }
                }
                (true, false) => stats.a_only += 1,
                (false, true) => stats.b_only += 1,
                (false, false) => {
                    if let (Some(ra), Some(rb)) = (ra, rb) {
                        if ra.error.is_some() || rb.error.is_some() {
                            continue;
                        }
                        let gap_a = ra.gap.unwrap_or(f64::INFINITY);
                        let gap_b = rb.gap.unwrap_or(f64::INFINITY);
                        if gap_a < gap_b - 1e-9 {
                            stats.smaller_gap.0 += 1;
                        } else if gap_b < gap_a - 1e-9 {
                            stats.smaller_gap.1 += 1;
                        }
                    }
                }
            }
        }

        stats.nodes = (geom_mean(&nodes_a, 10.0), geom_mean(&nodes_b, 10.0));
        stats.time_ms = (geom_mean(&time_a, 1.0), geom_mean(&time_b, 1.0));
        stats
    }

    /// Print one line per configuration
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!(
            "{:<30} {:>7} {:>7} {:>7} {:>12} {:>12}",
            "Configuration", "Solved", "Limits", "Failed", "Nodes (gm)", "Time (gm)"
        );
        println!("{}", "-".repeat(80));
        for solver in &self.solvers {
            let s = &solver.summary;
            println!(
                "{:<30} {:>7} {:>7} {:>7} {:>12.1} {:>10.2}ms",
                solver.solver_name, s.solved, s.limits, s.failures, s.geom_mean_nodes, s.geom_mean_time_ms
            );
        }
        println!("{}", "=".repeat(80));
    }

    /// Print head-to-head numbers for every pair of configurations
    pub fn print_pairs(&self) {
        for (i, a) in self.solvers.iter().enumerate() {
            for b in &self.solvers[i + 1..] {
                let p = self.compare_pair(a, b);
                println!("\n{} vs {}", a.solver_name, b.solver_name);
                println!(
                    "  solved: {} only {}, both {}, {} only {}",
                    a.solver_name, p.a_only, p.both, b.solver_name, p.b_only
                );
                if p.both > 0 {
                    println!(
                        "  on {} common: nodes {:.1} vs {:.1}, time {:.2}ms vs {:.2}ms",
                        p.both, p.nodes.0, p.nodes.1, p.time_ms.0, p.time_ms.1
                    );
                }
                if p.smaller_gap != (0, 0) {
                    println!("  both at limit, smaller gap: {} vs {}", p.smaller_gap.0, p.smaller_gap.1);
                }
            }
        }
    }

    /// Print status, nodes and gap per instance (up to `limit` rows)
    pub fn print_detailed_comparison(&self, limit: Option<usize>) {
        let instances = self.instances();
        let maps: Vec<_> = self.solvers.iter().map(|s| Self::by_name(&s.results)).collect();

        print!("\n{:<18}", "Instance");
        for solver in &self.solvers {
            let name: String = solver.solver_name.chars().take(24).collect();
            print!(" {:>24}", name);
        }
        println!();

        let shown = limit.unwrap_or(instances.len());
        for name in instances.iter().take(shown) {
            print!("{:<18}", name);
            for map in &maps {
                let cell = map.get(name.as_str()).map_or_else(
                    || "-".to_string(),
                    |r| {
                        let gap = r.gap.map_or_else(|| "inf".to_string(), |g| format!("{:.2}%", g * 100.0));
                        format!("{} {} {}", status_code(r), r.nodes, gap)
                    },
                );
                print!(" {:>24}", cell);
            }
            println!();
        }
        if instances.len() > shown {
            println!("... and {} more instances", instances.len() - shown);
        }
    }
}

fn status_code(result: &BenchmarkResult) -> &'static str {
    if result.error.is_some() {
        return "Error";
    }
    match result.status {
        CipStatus::Optimal => "Opt",
        CipStatus::GapLimit => "Gap",
        CipStatus::Infeasible => "Inf",
        CipStatus::Unbounded => "Unbd",
        CipStatus::NodeLimit => "Nodes",
        CipStatus::TimeLimit => "Time",
        CipStatus::OpenNodeLimit => "Open",
        CipStatus::Interrupted => "Intr",
        CipStatus::NumericalTrouble => "NumErr",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_result(name: &str, status: CipStatus, time_ms: f64) -> BenchmarkResult {
        BenchmarkResult {
            name: name.to_string(),
            n: 10,
            m: 5,
            status,
            primal_bound: Some(1.0),
            dual_bound: Some(1.0),
            gap: Some(0.0),
            nodes: 7,
            lp_iterations: 40,
            cuts: 2,
            solve_time_ms: time_ms,
            error: None,
        }
    }

    fn two_configs() -> SolverComparison {
        let a = SolverResults::new(
            "best-bound".to_string(),
            vec![
                make_test_result("P1", CipStatus::Optimal, 1.0),
                make_test_result("P2", CipStatus::Optimal, 2.0),
                make_test_result("P3", CipStatus::NodeLimit, 3.0),
            ],
        );
        let b = SolverResults::new(
            "depth-first".to_string(),
            vec![
                make_test_result("P1", CipStatus::Optimal, 1.5),
                make_test_result("P2", CipStatus::TimeLimit, 2.5),
                make_test_result("P3", CipStatus::Infeasible, 3.5),
            ],
        );
        SolverComparison::new(vec![a, b])
    }

    #[test]
    fn test_summary_counts() {
        let cmp = two_configs();
        let s = &cmp.solvers[0].summary;
        assert_eq!((s.total, s.solved, s.limits, s.failures), (3, 2, 1, 0));
        assert!((s.total_time_s - 0.006).abs() < 1e-12);
    }

    #[test]
    fn test_compare_pair() {
        let mut cmp = two_configs();
        let mut stalled = make_test_result("P4", CipStatus::NodeLimit, 4.0);
        stalled.gap = Some(0.1);
        cmp.solvers[0].results.push(stalled.clone());
        stalled.gap = None;
        cmp.solvers[1].results.push(stalled);

        let p = cmp.compare_pair(&cmp.solvers[0], &cmp.solvers[1]);
        assert_eq!((p.a_only, p.both, p.b_only), (1, 1, 1));
        assert_eq!(p.smaller_gap, (1, 0));
        assert!((p.time_ms.0 - 1.0).abs() < 1e-9);
        assert!((p.time_ms.1 - 1.5).abs() < 1e-9);
        assert!((p.nodes.0 - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_geom_mean() {
        assert_eq!(geom_mean(&[], 1.0), 0.0);
        assert!((geom_mean(&[3.0, 3.0], 1.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_json_roundtrip() {
        let cmp = two_configs();
        let path = std::env::temp_dir().join(format!("cip_bench_{}.json", std::process::id()));
        cmp.solvers[0].save_json(&path).unwrap();
        let loaded = SolverResults::load_json(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.solver_name, "best-bound");
        assert_eq!(loaded.results.len(), 3);
        assert_eq!(loaded.results[2].status, CipStatus::NodeLimit);
    }

    #[test]
    fn test_printing_does_not_panic() {
        let cmp = two_configs();
        cmp.print_summary();
        cmp.print_pairs();
        cmp.print_detailed_comparison(Some(2));
    }
}
