//! CLI entrypoint for the heapward scenario harness.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use heapward_harness::evidence::{EvidenceLog, EvidenceRecord, Outcome};
use heapward_harness::scenario::{self, ScenarioError, SCENARIOS};

/// Scenario tooling for the heapward debugging allocator.
#[derive(Debug, Parser)]
#[command(name = "heapward-harness")]
#[command(about = "Scenario harness for the heapward debugging allocator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one scenario, or all of them.
    Run {
        /// Scenario name, or "all".
        #[arg(long)]
        scenario: String,
        /// Emit report lines as a JSON array instead of plain text.
        #[arg(long)]
        json: bool,
        /// Append JSONL evidence records plus a SHA-256 seal to this path.
        #[arg(long)]
        evidence: Option<PathBuf>,
        /// Fixed timestamp string for deterministic evidence output.
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// List the scenarios this harness knows about.
    List,
}

fn now_stamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => format!("unix:{}", elapsed.as_secs()),
        Err(_) => "unix:0".to_owned(),
    }
}

fn run_scenarios(
    which: &str,
    json: bool,
    evidence: Option<PathBuf>,
    timestamp: Option<String>,
) -> ExitCode {
    let names: Vec<&str> = if which == "all" {
        SCENARIOS.to_vec()
    } else {
        vec![which]
    };
    let stamp = timestamp.unwrap_or_else(now_stamp);
    let mut log = EvidenceLog::new();
    let mut all_passed = true;

    for name in names {
        let result = scenario::run(name);
        let (outcome, detail) = match &result {
            Ok(_) => (Outcome::Pass, None),
            Err(err) => (Outcome::Fail, Some(err.to_string())),
        };
        if evidence.is_some() {
            let record = EvidenceRecord {
                timestamp: stamp.clone(),
                scenario: name.to_owned(),
                outcome,
                detail,
            };
            if let Err(err) = log.push(&record) {
                eprintln!("evidence serialization failed: {err}");
                return ExitCode::FAILURE;
            }
        }
        match result {
            Ok(lines) if json => match serde_json::to_string(&lines) {
                Ok(rendered) => println!("{rendered}"),
                Err(err) => {
                    eprintln!("report serialization failed: {err}");
                    return ExitCode::FAILURE;
                }
            },
            Ok(lines) => {
                println!("== {name}");
                for line in lines {
                    println!("{line}");
                }
            }
            Err(err @ ScenarioError::Unknown(_)) => {
                eprintln!("{err}");
                eprintln!("known scenarios: {}", SCENARIOS.join(", "));
                return ExitCode::FAILURE;
            }
            Err(err) => {
                eprintln!("{err}");
                all_passed = false;
            }
        }
    }

    if let Some(path) = evidence {
        if let Err(err) = log.write_to(&path) {
            eprintln!("failed to write evidence to {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    }
    if all_passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            scenario,
            json,
            evidence,
            timestamp,
        } => run_scenarios(&scenario, json, evidence, timestamp),
        Command::List => {
            for name in SCENARIOS {
                println!("{name}");
            }
            ExitCode::SUCCESS
        }
    }
}
