//! Kuhn poker solver binary.
//!
//! Usage:
//!   cargo run --release --bin solve_kuhn -- [OPTIONS]
//!
//! Options:
//!   --algorithm <NAME>   Named option set (default: vanilla)
//!   --iterations <N>     Iteration count (default: from the option set)
//!   --checkpoint <N>     Iterations between best-response checkpoints
//!   --threads <N>        Number of worker threads (default: auto)
//!   --seed <N>           Base RNG seed
//!   --output <FILE>      Output file (default: solution.json)

use std::env;
use std::fs;
use std::process::ExitCode;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use cfr_engine::engine::diagnostics;
use cfr_engine::engine::{Report, SolverConfig, Trainer};
use cfr_engine::games::kuhn::Kuhn;

#[derive(Serialize)]
struct StrategyEntry {
    decision: usize,
    label: String,
    average: Vec<f64>,
}

#[derive(Serialize)]
struct SolutionOutput {
    config: SolverConfig,
    reports: Vec<Report>,
    strategies: Vec<StrategyEntry>,
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let mut algorithm = "vanilla".to_string();
    let mut iterations: Option<u64> = None;
    let mut checkpoint: Option<u64> = None;
    let mut threads: Option<usize> = None;
    let mut seed: Option<u64> = None;
    let mut output_file = "solution.json".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--algorithm" | "-a" => {
                i += 1;
                if i < args.len() {
                    algorithm = args[i].clone();
                }
            }
            "--iterations" | "-i" => {
                i += 1;
                if i < args.len() {
                    iterations = args[i].parse().ok();
                }
            }
            "--checkpoint" => {
                i += 1;
                if i < args.len() {
                    checkpoint = args[i].parse().ok();
                }
            }
            "--threads" | "-t" => {
                i += 1;
                if i < args.len() {
                    threads = args[i].parse().ok();
                }
            }
            "--seed" | "-s" => {
                i += 1;
                if i < args.len() {
                    seed = args[i].parse().ok();
                }
            }
            "--output" | "-o" => {
                i += 1;
                if i < args.len() {
                    output_file = args[i].clone();
                }
            }
            "--help" | "-h" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_help();
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    let mut config = match SolverConfig::named(&algorithm) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(n) = iterations {
        config = config.with_iterations(n);
    }
    if let Some(n) = checkpoint {
        config = config.with_checkpoint_interval(n);
    }
    if let Some(n) = threads {
        config = config.with_threads(n);
    }
    if let Some(s) = seed {
        config = config.with_seed(s);
    }

    println!("=================================================");
    println!("  Kuhn Poker Solver");
    println!("=================================================");
    println!();
    println!("Algorithm: {algorithm}");
    println!("Iterations: {}", config.iterations);
    println!(
        "Threads: {}",
        config
            .threads
            .map_or("auto".to_string(), |n| n.to_string())
    );
    println!("Seed: {}", config.seed);
    println!("Output: {output_file}");
    println!();

    let total = config.iterations;
    let mut trainer = match Trainer::new(Kuhn::new(), config) {
        Ok(trainer) => trainer,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>8}/{len:8} {msg}")
            .expect("static template"),
    );

    let reports = {
        let bar = &bar;
        trainer.run_with_observer(move |report: &Report| {
            bar.set_position(report.iteration);
            bar.set_message(format!("exploitability {:.5}", report.exploitability));
        })
    };
    let reports = match reports {
        Ok(reports) => reports,
        Err(e) => {
            bar.abandon();
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    bar.finish();
    println!();

    if let Some(last) = reports.last() {
        println!("Final exploitability: {:.6}", last.exploitability);
        println!(
            "Best-response values: {:?}",
            last.best_response_values
        );
        println!("Total time: {:.2}s", last.elapsed_seconds);
    }
    match diagnostics::evaluate(trainer.tree(), trainer.table(), 0) {
        Ok(tracks) => println!(
            "Game value (player 0): {:.5}  (exact equilibrium: {:.5})",
            tracks.average,
            -1.0 / 18.0
        ),
        Err(e) => eprintln!("Error: {e}"),
    }
    println!();

    println!("=== Average Strategy ===");
    let strategies: Vec<StrategyEntry> = (1..trainer.table().len())
        .map(|decision| {
            let average = trainer.table().infoset(decision).average_strategy();
            StrategyEntry {
                decision,
                label: trainer.tree().decision_label(decision).to_string(),
                average,
            }
        })
        .collect();
    for entry in &strategies {
        println!(
            "  {:>5}  check/fold {:>5.1}%  bet/call {:>5.1}%",
            entry.label,
            entry.average[0] * 100.0,
            entry.average[1] * 100.0
        );
    }
    println!();

    let output = SolutionOutput {
        config: trainer.config().clone(),
        reports,
        strategies,
    };
    match serde_json::to_string_pretty(&output) {
        Ok(json) => match fs::write(&output_file, json) {
            Ok(()) => println!("Results saved to {output_file}"),
            Err(e) => {
                eprintln!("Error writing {output_file}: {e}");
                return ExitCode::FAILURE;
            }
        },
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn print_help() {
    println!("Kuhn Poker Solver");
    println!();
    println!("Usage: solve_kuhn [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -a, --algorithm <NAME>   Named option set (default: vanilla)");
    println!("                           vanilla, cfr-br, discounted, exploratory,");
    println!("                           gibson, modified-gibson, hedge, average-sampling");
    println!("  -i, --iterations <N>     Iteration count");
    println!("      --checkpoint <N>     Checkpoint interval (0 = final only)");
    println!("  -t, --threads <N>        Number of worker threads (default: auto)");
    println!("  -s, --seed <N>           Base RNG seed");
    println!("  -o, --output <FILE>      Output file (default: solution.json)");
    println!("  -h, --help               Show this help");
    println!();
    println!("Examples:");
    println!("  # Vanilla CFR, 100k iterations");
    println!("  solve_kuhn --iterations 100000");
    println!();
    println!("  # Sampled run with a fixed seed");
    println!("  solve_kuhn --algorithm gibson --seed 7");
}
