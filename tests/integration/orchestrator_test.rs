//! End-to-end control-loop scenarios against the scripted endpoint.

use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use code_swarm::services::checkpoint;
use code_swarm::swarm::Swarm;
use code_swarm::{BuildOutcome, SubtaskStatus, SwarmError, SwarmEvent};

use crate::helpers::{mock_endpoint, FlakyVerifier, PassVerifier, ScriptedLlm, WorkerReply};

fn collect_events(swarm: &Swarm) -> Arc<Mutex<Vec<SwarmEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    swarm.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

fn topics(events: &Arc<Mutex<Vec<SwarmEvent>>>) -> Vec<&'static str> {
    events.lock().unwrap().iter().map(|e| e.topic()).collect()
}

#[tokio::test]
async fn test_happy_path_single_subtask() {
    let dir = TempDir::new().unwrap();
    let script = Arc::new(ScriptedLlm::new(&[("Build the app", vec![])]));
    let (_server, config) = mock_endpoint(script.clone()).await;

    let swarm = Swarm::with_verifier(config, Arc::new(PassVerifier)).unwrap();
    let events = collect_events(&swarm);

    let outcome = swarm.build("build a hello app", dir.path()).await.unwrap();
    assert_eq!(
        outcome,
        BuildOutcome::Done {
            summary: "project complete".to_string()
        }
    );

    // Exactly one planning, one review, one final-review orchestrator call
    assert_eq!(
        script.orchestrator_call_kinds(),
        vec!["plan", "review", "final_review"]
    );

    let saved = checkpoint::load(dir.path()).await.unwrap();
    assert_eq!(saved.subtasks.len(), 1);
    assert_eq!(saved.subtasks[0].status, SubtaskStatus::Completed);
    assert_eq!(saved.subtasks[0].attempts, 1);
    assert_eq!(
        saved.subtasks[0].result.as_deref(),
        Some("completed the subtask")
    );

    let seen = topics(&events);
    assert!(seen.contains(&"orchestrator:plan"));
    assert!(seen.contains(&"subtask:assigned"));
    assert!(seen.contains(&"worker:token"));
    assert!(seen.contains(&"tokens:update"));
    assert!(seen.contains(&"project:done"));
    assert!(!seen.contains(&"project:error"));

    let totals = swarm.token_totals();
    assert!(totals.total_calls >= 4);
    assert!(totals.prompt_tokens > 0);
}

#[tokio::test]
async fn test_dependency_chain_dispatches_in_order() {
    let dir = TempDir::new().unwrap();
    let script = Arc::new(ScriptedLlm::new(&[
        ("Alpha", vec![]),
        ("Beta", vec!["Alpha"]),
        ("Gamma", vec!["Beta"]),
    ]));
    let (_server, config) = mock_endpoint(script.clone()).await;

    let swarm = Swarm::with_verifier(config, Arc::new(PassVerifier)).unwrap();
    let events = collect_events(&swarm);

    swarm.build("three steps", dir.path()).await.unwrap();

    // Map assignment order back to titles through the checkpoint
    let saved = checkpoint::load(dir.path()).await.unwrap();
    let title_of = |id: &str| {
        saved
            .subtasks
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.title.clone())
            .unwrap()
    };
    let assigned: Vec<String> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            SwarmEvent::SubtaskAssigned { subtask_id, .. } => Some(title_of(subtask_id)),
            _ => None,
        })
        .collect();
    assert_eq!(assigned, vec!["Alpha", "Beta", "Gamma"]);

    // One batch per dependency level: three review calls
    let kinds = script.orchestrator_call_kinds();
    assert_eq!(kinds.iter().filter(|k| *k == "review").count(), 3);
    assert!(saved
        .subtasks
        .iter()
        .all(|s| s.status == SubtaskStatus::Completed));
}

#[tokio::test]
async fn test_revise_then_accept_counts_two_attempts() {
    let dir = TempDir::new().unwrap();
    let script = Arc::new(
        ScriptedLlm::new(&[("Polish", vec![])]).with_review_verdicts(&["revise", "accept"]),
    );
    let (_server, config) = mock_endpoint(script.clone()).await;

    let swarm = Swarm::with_verifier(config, Arc::new(PassVerifier)).unwrap();
    let outcome = swarm.build("polish it", dir.path()).await.unwrap();
    assert!(matches!(outcome, BuildOutcome::Done { .. }));

    let saved = checkpoint::load(dir.path()).await.unwrap();
    assert_eq!(saved.subtasks[0].status, SubtaskStatus::Completed);
    assert_eq!(saved.subtasks[0].attempts, 2);
    // Reviewer feedback was recorded for the retry
    assert_eq!(saved.subtasks[0].feedback.as_deref(), Some("fix X"));
    assert_eq!(
        script
            .orchestrator_call_kinds()
            .iter()
            .filter(|k| *k == "review")
            .count(),
        2
    );
}

#[tokio::test]
async fn test_exhausted_retries_terminate_the_build() {
    let dir = TempDir::new().unwrap();
    let script = Arc::new(
        ScriptedLlm::new(&[("Doomed", vec![])])
            .with_review_verdicts(&["none", "none", "none", "none"])
            .with_worker_replies(vec![
                WorkerReply::Empty,
                WorkerReply::Empty,
                WorkerReply::Empty,
            ]),
    );
    let (_server, config) = mock_endpoint(script.clone()).await;

    let swarm = Swarm::with_verifier(config, Arc::new(PassVerifier)).unwrap();
    let events = collect_events(&swarm);

    let result = swarm.build("impossible", dir.path()).await;
    match result {
        Err(SwarmError::SubtasksFailed(message)) => assert!(message.contains("Doomed")),
        other => panic!("expected SubtasksFailed, got {:?}", other.map(|_| ())),
    }

    let saved = checkpoint::load(dir.path()).await.unwrap();
    assert_eq!(saved.subtasks[0].status, SubtaskStatus::Failed);
    assert_eq!(saved.subtasks[0].attempts, 3);
    assert!(topics(&events).contains(&"project:error"));
}

#[tokio::test]
async fn test_verifier_driven_fix_cycle() {
    let dir = TempDir::new().unwrap();
    let script =
        Arc::new(ScriptedLlm::new(&[("Implement", vec![])]).with_fix_plan(&["Fix tsc error"]));
    let (_server, config) = mock_endpoint(script.clone()).await;

    let swarm = Swarm::with_verifier(config, Arc::new(FlakyVerifier::new(1))).unwrap();
    let events = collect_events(&swarm);

    let outcome = swarm.build("typescript app", dir.path()).await.unwrap();
    assert!(matches!(outcome, BuildOutcome::Done { .. }));

    // plan -> review -> fix_plan -> review -> final_review
    let kinds = script.orchestrator_call_kinds();
    assert_eq!(kinds.first().map(String::as_str), Some("plan"));
    assert!(kinds.contains(&"fix_plan".to_string()));
    assert_eq!(kinds.last().map(String::as_str), Some("final_review"));

    let saved = checkpoint::load(dir.path()).await.unwrap();
    assert_eq!(saved.subtasks.len(), 2);
    assert!(saved
        .subtasks
        .iter()
        .any(|subtask| subtask.title == "Fix tsc error"
            && subtask.status == SubtaskStatus::Completed));
    assert!(topics(&events).contains(&"project:done"));
}

#[tokio::test]
async fn test_worker_tool_call_produces_artifact() {
    let dir = TempDir::new().unwrap();
    let script = Arc::new(ScriptedLlm::new(&[("Write config", vec![])]).with_worker_replies(
        vec![
            WorkerReply::ToolCall {
                name: "write_file".to_string(),
                arguments: serde_json::json!({"path": "config.json", "content": "{\"ok\": true}"}),
            },
            WorkerReply::Summary("wrote config.json".to_string()),
        ],
    ));
    let (_server, config) = mock_endpoint(script.clone()).await;

    let swarm = Swarm::with_verifier(config, Arc::new(PassVerifier)).unwrap();
    let events = collect_events(&swarm);

    swarm.build("write a config file", dir.path()).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("config.json")).unwrap(),
        "{\"ok\": true}"
    );
    let saved = checkpoint::load(dir.path()).await.unwrap();
    assert_eq!(saved.subtasks[0].artifacts, vec!["config.json"]);

    let seen = topics(&events);
    assert!(seen.contains(&"file:written"));
    assert!(seen.contains(&"subtask:progress"));
}

#[tokio::test]
async fn test_continuation_adds_subtasks_without_rerunning_completed() {
    let dir = TempDir::new().unwrap();
    let script = Arc::new(
        ScriptedLlm::new(&[("Original", vec![])]).with_continuation_plan(&["Add dark mode"]),
    );
    let (_server, config) = mock_endpoint(script.clone()).await;

    let swarm = Swarm::with_verifier(config, Arc::new(PassVerifier)).unwrap();
    swarm.build("original build", dir.path()).await.unwrap();

    let outcome = swarm
        .continue_build(dir.path(), "add dark mode")
        .await
        .unwrap();
    assert!(matches!(outcome, BuildOutcome::Done { .. }));

    let saved = checkpoint::load(dir.path()).await.unwrap();
    assert_eq!(saved.subtasks.len(), 2);
    assert!(saved
        .subtasks
        .iter()
        .all(|subtask| subtask.status == SubtaskStatus::Completed));

    // The original subtask ran exactly once: one review before the
    // continuation, one for the new subtask after it.
    let kinds = script.orchestrator_call_kinds();
    assert_eq!(kinds.iter().filter(|k| *k == "review").count(), 2);
    assert_eq!(kinds.iter().filter(|k| *k == "continuation").count(), 1);
}

#[tokio::test]
async fn test_resume_demotes_interrupted_subtasks() {
    let dir = TempDir::new().unwrap();

    // Seed a checkpoint by hand: one completed, one interrupted.
    {
        let mut ctx = code_swarm::ProjectContext::new(dir.path(), "resume me");
        let mut done = code_swarm::Subtask::new("Done already", "");
        done.status = SubtaskStatus::Completed;
        done.result = Some("ok".to_string());
        let mut interrupted = code_swarm::Subtask::new("Interrupted", "");
        interrupted.status = SubtaskStatus::InProgress;
        ctx.subtasks.extend([done, interrupted]);
        checkpoint::save(&ctx).await.unwrap();
    }

    let script = Arc::new(ScriptedLlm::new(&[]));
    let (_server, config) = mock_endpoint(script.clone()).await;
    let swarm = Swarm::with_verifier(config, Arc::new(PassVerifier)).unwrap();

    let outcome = swarm.resume(dir.path()).await.unwrap();
    assert!(matches!(outcome, BuildOutcome::Done { .. }));

    // Resume skips planning: the interrupted subtask was demoted to
    // pending, re-dispatched, and completed.
    let kinds = script.orchestrator_call_kinds();
    assert!(!kinds.contains(&"plan".to_string()));
    assert_eq!(kinds.iter().filter(|k| *k == "review").count(), 1);

    let saved = checkpoint::load(dir.path()).await.unwrap();
    assert!(saved
        .subtasks
        .iter()
        .all(|subtask| subtask.status == SubtaskStatus::Completed));
}
