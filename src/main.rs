//! Binary entry point.
//!
//! Deliberately thin: configuration comes from environment variables and
//! two positional arguments. Usage:
//!
//! ```text
//! code-swarm "<task description>" [project-dir]
//! code-swarm --resume [project-dir]
//! code-swarm --continue "<change request>" [project-dir]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use code_swarm::swarm::Swarm;
use code_swarm::{BuildOutcome, SwarmConfig, SwarmEvent};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: code-swarm \"<task>\" [dir] | --resume [dir] | --continue \"<changes>\" [dir]");
        return ExitCode::FAILURE;
    }

    let mut config = SwarmConfig::default();
    config.api_key = std::env::var("SWARM_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .ok();
    if let Ok(model) = std::env::var("SWARM_MODEL") {
        config.model = model;
    }
    if let Ok(base_url) = std::env::var("SWARM_BASE_URL") {
        config.base_url = base_url;
    }

    let swarm = match Swarm::new(config) {
        Ok(swarm) => swarm,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    swarm.subscribe(|event| match event {
        SwarmEvent::WorkerToken { .. } => {}
        other => println!("[{}] {}", other.topic(), summarize(other)),
    });

    let outcome = match args[0].as_str() {
        "--resume" => {
            let root = arg_dir(&args, 1);
            swarm.resume(&root).await
        }
        "--continue" => {
            let Some(changes) = args.get(1) else {
                eprintln!("--continue requires a change request");
                return ExitCode::FAILURE;
            };
            let root = arg_dir(&args, 2);
            swarm.continue_build(&root, changes).await
        }
        task => {
            let root = arg_dir(&args, 1);
            if let Err(e) = std::fs::create_dir_all(&root) {
                eprintln!("cannot create project dir: {}", e);
                return ExitCode::FAILURE;
            }
            swarm.build(task, &root).await
        }
    };

    let totals = swarm.token_totals();
    eprintln!(
        "tokens: {} prompt + {} completion over {} calls",
        totals.prompt_tokens, totals.completion_tokens, totals.total_calls
    );

    match outcome {
        Ok(BuildOutcome::Done { summary }) => {
            println!("done: {}", summary);
            ExitCode::SUCCESS
        }
        Ok(BuildOutcome::IterationLimitReached) => {
            println!("iteration limit reached; run with --resume to continue");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("build failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn arg_dir(args: &[String], index: usize) -> PathBuf {
    args.get(index)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn summarize(event: &SwarmEvent) -> String {
    match event {
        SwarmEvent::OrchestratorPhase { phase } => phase.to_string(),
        SwarmEvent::OrchestratorPlan { subtask_count } => {
            format!("{} subtask(s) planned", subtask_count)
        }
        SwarmEvent::OrchestratorIteration {
            iteration,
            completed,
            total,
        } => format!("iteration {} ({}/{} completed)", iteration, completed, total),
        SwarmEvent::SubtaskAssigned { subtask_id, worker } => {
            format!("{} -> worker {}", subtask_id, worker)
        }
        SwarmEvent::SubtaskCompleted { subtask_id, status } => {
            format!("{} is {}", subtask_id, status)
        }
        SwarmEvent::FileWritten { path, worker } => format!("worker {} wrote {}", worker, path),
        SwarmEvent::ProjectDone { summary } => summary.clone(),
        SwarmEvent::ProjectError { message } => message.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
