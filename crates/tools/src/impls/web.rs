//! web_search and web_reader Tools
//!
//! Thin web access for workers. Both use the context's HTTP client with a
//! 20 second per-request timeout; HTML is reduced to readable text before
//! being handed to the model.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use swarm_core::text::truncate_chars;
use swarm_llm::ParameterSchema;

use crate::trait_def::{Tool, ToolContext, ToolResult};

const WEB_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_PAGE_CHARS: usize = 10_000;
const MAX_SEARCH_CHARS: usize = 5_000;

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<script.*?</script>|<style.*?</style>|<[^>]*>").expect("valid tag regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

fn html_to_text(html: &str) -> String {
    let stripped = TAG.replace_all(html, " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Fetch a URL and return its readable text.
pub struct WebReaderTool;

#[async_trait]
impl Tool for WebReaderTool {
    fn name(&self) -> &str {
        "web_reader"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its text content (HTML tags stripped)."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "url".to_string(),
            ParameterSchema::string(Some("The http(s) URL to fetch")),
        );
        ParameterSchema::object(None, properties, vec!["url".to_string()])
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(url) = args.get("url").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: url");
        };
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return ToolResult::err("Only http(s) URLs are supported");
        }

        let response = match ctx.http.get(url).timeout(WEB_TIMEOUT).send().await {
            Ok(r) => r,
            Err(e) => return ToolResult::err(format!("Failed to fetch '{}': {}", url, e)),
        };
        if !response.status().is_success() {
            return ToolResult::err(format!("'{}' returned HTTP {}", url, response.status()));
        }
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return ToolResult::err(format!("Failed to read body: {}", e)),
        };

        ToolResult::ok(truncate_chars(&html_to_text(&body), MAX_PAGE_CHARS))
    }
}

/// Search the web and return result snippets.
pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for a query and return result titles and snippets."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "query".to_string(),
            ParameterSchema::string(Some("The search query")),
        );
        ParameterSchema::object(None, properties, vec!["query".to_string()])
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(query) = args.get("query").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: query");
        };

        let response = match ctx
            .http
            .get("https://html.duckduckgo.com/html/")
            .query(&[("q", query)])
            .timeout(WEB_TIMEOUT)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return ToolResult::err(format!("Search request failed: {}", e)),
        };
        if !response.status().is_success() {
            return ToolResult::err(format!("Search returned HTTP {}", response.status()));
        }
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return ToolResult::err(format!("Failed to read search results: {}", e)),
        };

        let text = html_to_text(&body);
        if text.is_empty() {
            return ToolResult::ok(format!("No results for '{}'", query));
        }
        ToolResult::ok(truncate_chars(&text, MAX_SEARCH_CHARS))
    }
}
