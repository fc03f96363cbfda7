//! Prompt Builders
//!
//! Every prompt the orchestrator and workers send lives here, so wording
//! changes never touch control flow. All JSON the model is asked for uses
//! camelCase keys matching the parse types in `models::subtask`.

use crate::models::{ProjectContext, Subtask, SubtaskStatus};
use crate::services::analyzer::ProjectAnalysis;
use crate::services::verifier::VerificationReport;
use swarm_core::text::truncate_chars;

/// Review prompts include at most this many characters of each summary.
const REVIEW_SUMMARY_CAP: usize = 1500;
/// Sibling context includes at most this many characters of each result.
const SIBLING_RESULT_CAP: usize = 300;

// ── Orchestrator ─────────────────────────────────────────────────────

pub fn orchestrator_system_prompt(task_description: &str, root_display: &str) -> String {
    format!(
        "You are the orchestrator of a team of coding agents building a software project.\n\
         Project root: {root}\n\
         Overall task: {task}\n\n\
         You plan subtasks, review worker output, and decide when the project is done.\n\
         Always respond with ONLY valid JSON in the exact shape each request asks for. \
         No markdown fences, no commentary outside the JSON.",
        root = root_display,
        task = task_description,
    )
}

pub fn planning_prompt(
    task_description: &str,
    analysis: Option<&ProjectAnalysis>,
    planning_context: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Create a plan for this task:\n{}\n\n\
         Break the work into 2-8 concrete subtasks. Each subtask should be completable \
         by one agent with file and shell tools. List dependencies between subtasks by \
         title (or by 0-based index into this plan). Independent subtasks run in parallel, \
         so avoid having two concurrent subtasks touch the same file.\n",
        task_description
    );

    if let Some(context) = planning_context {
        prompt.push_str(&format!("\nPlanning discussion so far:\n{}\n", context));
    }
    if let Some(analysis) = analysis {
        prompt.push_str(&format!("\nExisting project contents:\n{}\n", analysis.render()));
    }

    prompt.push_str(
        "\nRespond with JSON:\n\
         {\"subtasks\": [{\"title\": \"...\", \"description\": \"...\", \"dependencies\": [\"...\"]}]}",
    );
    prompt
}

pub fn review_prompt(ctx: &ProjectContext, batch_ids: &[String], status_summary: &str) -> String {
    let mut prompt = String::from("Review the results of the subtasks that just ran:\n\n");
    for id in batch_ids {
        let Some(subtask) = ctx.subtask(id) else { continue };
        prompt.push_str(&format!(
            "Subtask {id}\n  title: {title}\n  status: {status}\n",
            id = subtask.id,
            title = subtask.title,
            status = subtask.status,
        ));
        if let Some(result) = &subtask.result {
            prompt.push_str(&format!(
                "  summary: {}\n",
                truncate_chars(result, REVIEW_SUMMARY_CAP)
            ));
        }
        if !subtask.artifacts.is_empty() {
            prompt.push_str(&format!("  artifacts: {}\n", subtask.artifacts.join(", ")));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("Overall status:\n{}\n", status_summary));
    prompt.push_str(
        "\nFor each reviewed subtask decide: \"accept\" (work is good), \"revise\" \
         (same worker retries with your feedback), or \"reassign\" (a different worker \
         takes over with your feedback).\n\
         Respond with JSON:\n\
         {\"decisions\": [{\"subtaskId\": \"...\", \"verdict\": \"accept|revise|reassign\", \"feedback\": \"...\"}]}",
    );
    prompt
}

pub fn verifier_fix_prompt(report: &VerificationReport) -> String {
    format!(
        "All subtasks are complete, but project verification failed:\n\n{}\n\n\
         Plan subtasks to fix these errors. Respond with JSON:\n\
         {{\"subtasks\": [{{\"title\": \"...\", \"description\": \"...\", \"dependencies\": []}}]}}",
        truncate_chars(&report.output, 4000)
    )
}

pub fn final_review_prompt(status_summary: &str, report: &VerificationReport) -> String {
    format!(
        "All subtasks are complete and verification passed.\n\n\
         Project status:\n{status}\n\nVerifier report:\n{report}\n\n\
         Is the original task fully satisfied? Respond with JSON, either:\n\
         {{\"status\": \"done\", \"summary\": \"what was built\"}}\n\
         or:\n\
         {{\"status\": \"needs_more\", \"summary\": \"what is missing\", \
         \"additionalSubtasks\": [{{\"title\": \"...\", \"description\": \"...\", \"dependencies\": []}}]}}",
        status = status_summary,
        report = truncate_chars(&report.output, 2000),
    )
}

pub fn resume_message(status_summary: &str) -> String {
    format!(
        "[RESUMED FROM CHECKPOINT]\n\
         The build was interrupted and has been restored from disk. Current state:\n{}",
        status_summary
    )
}

pub fn continuation_message(change_request: &str, status_summary: &str) -> String {
    format!(
        "[CONTINUATION]\n\
         The previous build finished successfully. The user now requests these changes:\n{}\n\n\
         Current project state:\n{}\n\n\
         Plan subtasks for the requested changes only; completed subtasks will not be re-run. \
         Respond with JSON:\n\
         {{\"subtasks\": [{{\"title\": \"...\", \"description\": \"...\", \"dependencies\": []}}]}}",
        change_request, status_summary
    )
}

pub fn summarization_system_prompt() -> String {
    "Summarize this orchestration conversation transcript. Preserve: the original task, \
     every subtask plan and its outcome, architectural decisions, unresolved issues, and \
     all file names mentioned. Be dense; bullet points are fine."
        .to_string()
}

// ── Worker ───────────────────────────────────────────────────────────

pub fn worker_system_prompt(worker_index: usize, root_display: &str) -> String {
    format!(
        "You are worker {index} on a team of coding agents. You complete ONE subtask \
         using the provided tools, then stop.\n\
         Project root: {root}. All paths are relative to it.\n\n\
         Rules:\n\
         - Use tools to inspect before you modify; never invent file contents.\n\
         - write_file replaces the whole file; patch_file edits a unique snippet.\n\
         - execute_command runs without a shell: no pipes, redirection, or && chaining.\n\
         - Other workers run in parallel on other subtasks; touch only files your \
           subtask owns.\n\
         - When the subtask is done, reply with a short plain-text summary of what you \
           did and which files you touched, and make no further tool calls.",
        index = worker_index,
        root = root_display,
    )
}

pub fn worker_user_prompt(
    subtask: &Subtask,
    file_tree: Option<&str>,
    sibling_context: &str,
) -> String {
    let mut prompt = format!(
        "Your subtask:\n{title}\n\n{description}\n",
        title = subtask.title,
        description = subtask.description,
    );
    if let Some(feedback) = &subtask.feedback {
        prompt.push_str(&format!("\nReviewer feedback on the previous attempt:\n{}\n", feedback));
    }
    if let Some(tree) = file_tree {
        prompt.push_str(&format!("\nProject files:\n{}\n", tree));
    }
    if !sibling_context.is_empty() {
        prompt.push_str(&format!("\nAlready completed by other workers:\n{}", sibling_context));
    }
    prompt
}

/// Compressed summaries of completed sibling subtasks with their artifacts.
pub fn sibling_context(ctx: &ProjectContext, exclude_id: &str) -> String {
    let mut rendered = String::new();
    for subtask in &ctx.subtasks {
        if subtask.id == exclude_id || subtask.status != SubtaskStatus::Completed {
            continue;
        }
        rendered.push_str(&format!("- {}", subtask.title));
        if let Some(result) = &subtask.result {
            rendered.push_str(&format!(": {}", truncate_chars(result, SIBLING_RESULT_CAP)));
        }
        if !subtask.artifacts.is_empty() {
            rendered.push_str(&format!(" (files: {})", subtask.artifacts.join(", ")));
        }
        rendered.push('\n');
    }
    rendered
}
