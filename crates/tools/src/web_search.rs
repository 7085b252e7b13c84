//! Web search tool — deterministic mock results.
//!
//! Network search is a collaborator, not core; the mock returns plausible
//! results so plans that include a research step run end-to-end without
//! network access.

use async_trait::async_trait;
use taskhelm_core::error::ToolError;
use taskhelm_core::tool::{Tool, ToolResult};

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns relevant results with titles, \
         URLs, and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results to return (default 3)",
                    "default": 3
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let num_results = arguments["num_results"].as_u64().unwrap_or(3).min(5) as usize;

        let results = mock_results(query, num_results);
        let output =
            serde_json::to_string_pretty(&results).map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_search".into(),
                reason: e.to_string(),
            })?;
        let data = serde_json::to_value(&results).ok();

        Ok(ToolResult {
            call_id: String::new(),
            output,
            data,
        })
    }
}

#[derive(serde::Serialize)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

fn mock_results(query: &str, count: usize) -> Vec<SearchResult> {
    let q = query.to_lowercase();

    let mut results = if q.contains("venue") || q.contains("offsite") {
        vec![
            SearchResult {
                title: "Top conference venues for team offsites".into(),
                url: "https://example.com/venues/offsites".into(),
                snippet: "Compare capacity, catering options, and transit access for popular offsite venues.".into(),
            },
            SearchResult {
                title: "How to choose an offsite location".into(),
                url: "https://example.com/guides/offsite-location".into(),
                snippet: "A checklist covering budget, travel time, and on-site facilities.".into(),
            },
            SearchResult {
                title: "Offsite venue booking timeline".into(),
                url: "https://example.com/guides/booking-timeline".into(),
                snippet: "Book at least eight weeks ahead for groups above twenty people.".into(),
            },
        ]
    } else if q.contains("catering") || q.contains("restaurant") {
        vec![
            SearchResult {
                title: "Group catering options compared".into(),
                url: "https://example.com/catering/compare".into(),
                snippet: "Buffet, plated, and boxed options with per-head pricing.".into(),
            },
            SearchResult {
                title: "Dietary requirements planning guide".into(),
                url: "https://example.com/catering/dietary".into(),
                snippet: "Collect restrictions early and confirm with the caterer in writing.".into(),
            },
        ]
    } else {
        vec![
            SearchResult {
                title: format!("Results for \"{query}\""),
                url: format!(
                    "https://example.com/search?q={}",
                    q.replace(' ', "+")
                ),
                snippet: format!("An overview of {query} with key facts and references."),
            },
            SearchResult {
                title: format!("{query} — background"),
                url: "https://example.com/background".into(),
                snippet: "Context and history of the topic from a general reference.".into(),
            },
            SearchResult {
                title: format!("{query} — practical guide"),
                url: "https://example.com/guide".into(),
                snippet: "Step-by-step guidance with common pitfalls.".into(),
            },
        ]
    };

    results.truncate(count);
    results
}
