//! Scripted mock LLM endpoint.
//!
//! One wiremock responder serves every role: streaming requests are worker
//! calls and consume the worker script; non-streaming requests are
//! orchestrator calls, routed by prompt content (plan, review, verifier
//! fix, final review, continuation). Review decisions are synthesized from
//! the subtask ids embedded in the review prompt.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use code_swarm::services::verifier::{ProjectVerifier, VerificationReport};
use code_swarm::SwarmConfig;

static SUBTASK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Subtask ([0-9a-f]{8}-[0-9a-f-]{27})").unwrap());

/// One scripted worker reply.
#[derive(Clone)]
pub enum WorkerReply {
    /// Plain summary, no tool calls: the worker completes.
    Summary(String),
    /// Empty reply: the worker fails with "empty response from model".
    Empty,
    /// One tool call; the next worker reply continues the same loop.
    ToolCall { name: String, arguments: Value },
}

pub struct ScriptedLlm {
    /// Content of the planning reply
    plan: String,
    /// Content of the verifier-fix reply, if expected
    fix_plan: Mutex<Option<String>>,
    /// Content of the continuation-plan reply, if expected
    continuation_plan: Mutex<Option<String>>,
    /// Verdict applied to every subtask of each review call, in order.
    /// "none" produces an empty decision list. Empty queue defaults to
    /// "accept".
    review_verdicts: Mutex<VecDeque<&'static str>>,
    /// Worker replies, consumed per streaming call. Empty queue defaults
    /// to a generic completion summary.
    worker_replies: Mutex<VecDeque<WorkerReply>>,
    /// Kinds of orchestrator calls seen, for assertions
    pub orchestrator_calls: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(plan_titles_deps: &[(&str, Vec<&str>)]) -> Self {
        let subtasks: Vec<Value> = plan_titles_deps
            .iter()
            .map(|(title, deps)| {
                json!({
                    "title": title,
                    "description": format!("Implement {}", title),
                    "dependencies": deps,
                })
            })
            .collect();
        Self {
            plan: json!({ "subtasks": subtasks }).to_string(),
            fix_plan: Mutex::new(None),
            continuation_plan: Mutex::new(None),
            review_verdicts: Mutex::new(VecDeque::new()),
            worker_replies: Mutex::new(VecDeque::new()),
            orchestrator_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fix_plan(self, titles: &[&str]) -> Self {
        let subtasks: Vec<Value> = titles
            .iter()
            .map(|title| json!({"title": title, "description": "fix", "dependencies": []}))
            .collect();
        *self.fix_plan.lock().unwrap() = Some(json!({ "subtasks": subtasks }).to_string());
        self
    }

    pub fn with_continuation_plan(self, titles: &[&str]) -> Self {
        let subtasks: Vec<Value> = titles
            .iter()
            .map(|title| json!({"title": title, "description": "change", "dependencies": []}))
            .collect();
        *self.continuation_plan.lock().unwrap() =
            Some(json!({ "subtasks": subtasks }).to_string());
        self
    }

    pub fn with_review_verdicts(self, verdicts: &[&'static str]) -> Self {
        *self.review_verdicts.lock().unwrap() = verdicts.iter().copied().collect();
        self
    }

    pub fn with_worker_replies(self, replies: Vec<WorkerReply>) -> Self {
        *self.worker_replies.lock().unwrap() = replies.into();
        self
    }

    pub fn orchestrator_call_kinds(&self) -> Vec<String> {
        self.orchestrator_calls.lock().unwrap().clone()
    }

    fn respond_worker(&self) -> ResponseTemplate {
        let reply = self
            .worker_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| WorkerReply::Summary("completed the subtask".to_string()));
        match reply {
            WorkerReply::Summary(summary) => sse_response(&[
                json!({"choices": [{"delta": {"content": summary}}]}),
                json!({"choices": [{"finish_reason": "stop"}]}),
                json!({"choices": [], "usage": {"prompt_tokens": 40, "completion_tokens": 12}}),
            ]),
            WorkerReply::Empty => sse_response(&[
                json!({"choices": [{"finish_reason": "stop"}]}),
                json!({"choices": [], "usage": {"prompt_tokens": 8, "completion_tokens": 0}}),
            ]),
            WorkerReply::ToolCall { name, arguments } => sse_response(&[
                json!({"choices": [{"delta": {"tool_calls": [{
                    "index": 0,
                    "id": "call_scripted",
                    "function": {"name": name, "arguments": arguments.to_string()}
                }]}}]}),
                json!({"choices": [{"finish_reason": "tool_calls"}]}),
                json!({"choices": [], "usage": {"prompt_tokens": 40, "completion_tokens": 20}}),
            ]),
        }
    }

    fn respond_orchestrator(&self, prompt: &str) -> ResponseTemplate {
        let content = if prompt.contains("Create a plan") {
            self.record("plan");
            self.plan.clone()
        } else if prompt.contains("project verification failed") {
            self.record("fix_plan");
            self.fix_plan
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| json!({"subtasks": []}).to_string())
        } else if prompt.contains("[CONTINUATION]") {
            self.record("continuation");
            self.continuation_plan
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| json!({"subtasks": []}).to_string())
        } else if prompt.contains("Review the results") {
            self.record("review");
            let verdict = self
                .review_verdicts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or("accept");
            let decisions: Vec<Value> = if verdict == "none" {
                Vec::new()
            } else {
                extract_subtask_ids(prompt)
                    .into_iter()
                    .map(|id| {
                        json!({
                            "subtaskId": id,
                            "verdict": verdict,
                            "feedback": if verdict == "accept" { Value::Null } else { json!("fix X") },
                        })
                    })
                    .collect()
            };
            json!({ "decisions": decisions }).to_string()
        } else if prompt.contains("fully satisfied") {
            self.record("final_review");
            json!({"status": "done", "summary": "project complete"}).to_string()
        } else {
            self.record("other");
            json!({}).to_string()
        };

        completion_response(&content)
    }

    fn record(&self, kind: &str) {
        self.orchestrator_calls.lock().unwrap().push(kind.to_string());
    }
}

impl Respond for ScriptedLlm {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };

        if body["stream"].as_bool() == Some(true) {
            return self.respond_worker();
        }

        let prompt = last_user_content(&body);
        self.respond_orchestrator(&prompt)
    }
}

fn last_user_content(body: &Value) -> String {
    body["messages"]
        .as_array()
        .map(|messages| {
            messages
                .iter()
                .rev()
                .find(|message| message["role"] == "user")
                .and_then(|message| message["content"].as_str())
                .unwrap_or("")
                .to_string()
        })
        .unwrap_or_default()
}

pub fn extract_subtask_ids(prompt: &str) -> Vec<String> {
    SUBTASK_ID
        .captures_iter(prompt)
        .map(|captures| captures[1].to_string())
        .collect()
}

fn completion_response(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "mock-model",
        "choices": [{
            "message": {"content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 60, "completion_tokens": 25}
    }))
}

fn sse_response(chunks: &[Value]) -> ResponseTemplate {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

/// Start a mock endpoint serving the script; returns the server (keep it
/// alive) and a config pointed at it.
pub async fn mock_endpoint(script: Arc<ScriptedLlm>) -> (MockServer, SwarmConfig) {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/chat/completions"))
        .respond_with(ScriptHandle(script))
        .mount(&server)
        .await;

    let config = SwarmConfig {
        api_key: Some("sk-test".to_string()),
        base_url: server.uri(),
        ..Default::default()
    };
    (server, config)
}

/// Newtype so an `Arc<ScriptedLlm>` can be handed to wiremock while the
/// test keeps its own handle for assertions.
pub struct ScriptHandle(pub Arc<ScriptedLlm>);

impl Respond for ScriptHandle {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.0.respond(request)
    }
}

// ── Stub verifiers ───────────────────────────────────────────────────

pub struct PassVerifier;

#[async_trait::async_trait]
impl ProjectVerifier for PassVerifier {
    async fn verify(&self, _root: &std::path::Path) -> VerificationReport {
        VerificationReport::passed("all checks passed")
    }
}

/// Fails the first `failures` verifications, then passes.
pub struct FlakyVerifier {
    remaining_failures: Mutex<u32>,
}

impl FlakyVerifier {
    pub fn new(failures: u32) -> Self {
        Self {
            remaining_failures: Mutex::new(failures),
        }
    }
}

#[async_trait::async_trait]
impl ProjectVerifier for FlakyVerifier {
    async fn verify(&self, _root: &std::path::Path) -> VerificationReport {
        let mut remaining = self.remaining_failures.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            VerificationReport::failed("error TS2304: Cannot find name 'foo'.")
        } else {
            VerificationReport::passed("tsc clean")
        }
    }
}
