// Economy Benchmark Runner: seeded Monte Carlo load against the economy engine
// ChaCha8 PRNG, concurrent tokio tasks, post-run invariant audit
//
// Usage:
//   cargo run --release --bin bench                        # All scenarios (10 runs each)
//   cargo run --release --bin bench -- --runs 3            # Quick mode
//   cargo run --release --bin bench -- --users 200         # Override user count
//   cargo run --release --bin bench -- DUPLICATE           # Filter by name
//   cargo run --release --bin bench -- --seed 42           # Custom base seed
//   RUST_LOG=economy_ledger=debug cargo run --bin bench    # Engine logs on stderr

mod monte_carlo;
mod report;
mod scenarios;

use report::*;
use scenarios::*;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    runs: usize,
    seed: u64,
    users: Option<usize>,
    filter: Option<String>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        runs: 10,
        seed: 0,
        users: None,
        filter: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--runs" => {
                i += 1;
                if i < args.len() {
                    cli.runs = args[i].parse().unwrap_or(10);
                }
            }
            "--seed" => {
                i += 1;
                if i < args.len() {
                    cli.seed = args[i].parse().unwrap_or(0);
                }
            }
            "--users" => {
                i += 1;
                if i < args.len() {
                    cli.users = args[i].parse().ok().filter(|n| *n > 0);
                }
            }
            arg if !arg.starts_with('-') => {
                cli.filter = Some(arg.to_string());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    cli
}

// ─── Main ───────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = parse_args();
    let mut all_scenarios = scenarios();
    if let Some(users) = cli.users {
        for scenario in &mut all_scenarios {
            scenario.users = users;
        }
    }

    let to_run: Vec<&Scenario> = match &cli.filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            all_scenarios.iter()
                .filter(|s| s.name.to_lowercase().contains(&f_lower)
                          || s.label.to_lowercase().contains(&f_lower)
                          || s.category.to_lowercase().contains(&f_lower))
                .collect()
        }
        None => all_scenarios.iter().collect(),
    };

    if to_run.is_empty() {
        eprintln!("No scenarios match filter: {:?}", cli.filter);
        std::process::exit(1);
    }

    println!("\n  Economy Benchmark Runner v0.2.0");
    println!("  PRNG: ChaCha8Rng | Runs/scenario: {} | Base seed: {}", cli.runs, cli.seed);
    println!("  Running {} scenario(s)...\n", to_run.len());
    println!("  {:<24} {:>5} {:>9} {:>8} {:>8} {:>10} {:>8}",
        "Scenario", "Pass%", "Applied%", "Errors%", "Retries", "Ops/s", "Time");
    println!("  {}", "-".repeat(80));

    let suite_start = Instant::now();
    let mut mc_reports = Vec::new();

    for scenario in &to_run {
        let report = monte_carlo::run_monte_carlo(scenario, cli.runs, cli.seed).await;

        let pass_pct = report.pass_rate * 100.0;
        let status = if report.pass_rate >= 1.0 { "PASS" } else { "FAIL" };

        println!("  {:<24} {:>4}% {:>8.1}% {:>7.2}% {:>8.1} {:>10.0} {:>6.0}ms  {}",
            report.label,
            pass_pct as u32,
            report.applied_rate.mean * 100.0,
            report.error_rate.mean * 100.0,
            report.retries.mean,
            report.ops_per_sec.mean,
            report.elapsed_ms.mean,
            status,
        );
        for run in report.individual_runs.iter().filter(|r| !r.pass) {
            for violation in run.invariant_violations.iter().take(5) {
                println!("      seed {}: {}", run.seed, violation);
            }
        }

        mc_reports.push(report);
    }

    let suite_elapsed = suite_start.elapsed();

    // ─── Summary ────────────────────────────────────────────────────────

    let total = mc_reports.len();
    let passed = mc_reports.iter().filter(|r| r.pass_rate >= 1.0).count();
    let failed = total - passed;
    let invariant_violations: usize = mc_reports.iter().map(|r| r.invariant_violations).sum();

    println!("  {}", "-".repeat(80));
    println!("  Total: {}  Passed: {}  Failed: {}  Invariant violations: {}  Suite time: {:.1}s\n",
        total, passed, failed, invariant_violations, suite_elapsed.as_secs_f64());

    // ─── Write JSON Report ──────────────────────────────────────────────

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let timestamp = format!("{}", ts);

    let report = BenchReport {
        timestamp: timestamp.clone(),
        version: "0.2.0",
        prng: "ChaCha8Rng",
        n_runs_per_scenario: cli.runs,
        summary: Summary {
            total,
            passed,
            failed,
            pass_rate: passed as f64 / total as f64,
            invariant_violations,
        },
        scenarios: mc_reports,
    };

    let dir = std::path::Path::new("benchmark-results");
    if !dir.exists() {
        std::fs::create_dir_all(dir).expect("Failed to create benchmark-results/");
    }
    let path = dir.join(format!("bench-{}.json", timestamp));
    let json = serde_json::to_string_pretty(&report).expect("Failed to serialize");
    std::fs::write(&path, &json).expect("Failed to write benchmark file");
    println!("  Results saved to: {}\n", path.display());

    if failed > 0 {
        std::process::exit(1);
    }
}
