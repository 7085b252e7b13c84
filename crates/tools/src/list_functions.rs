//! Catalog tool — renders the available functions as a table.

use async_trait::async_trait;
use std::sync::Arc;
use taskhelm_core::display::DisplaySink;
use taskhelm_core::error::ToolError;
use taskhelm_core::provider::ToolDefinition;
use taskhelm_core::tool::{Tool, ToolResult};

pub struct ListFunctionsTool {
    catalog: Vec<ToolDefinition>,
    display: Arc<dyn DisplaySink>,
}

impl ListFunctionsTool {
    /// Built last during registry assembly so `catalog` covers everything
    /// registered before it; its own entry is appended here.
    pub fn new(mut catalog: Vec<ToolDefinition>, display: Arc<dyn DisplaySink>) -> Self {
        let own = ToolDefinition {
            name: "list_functions".into(),
            description: DESCRIPTION.into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        };
        catalog.push(own);
        catalog.sort_by(|a, b| a.name.cmp(&b.name));
        Self { catalog, display }
    }

    /// `name — description (params: a, b)` per line.
    pub fn render_table(&self) -> String {
        let mut lines = Vec::with_capacity(self.catalog.len());
        for def in &self.catalog {
            let params: Vec<&str> = def.parameters["properties"]
                .as_object()
                .map(|props| props.keys().map(String::as_str).collect())
                .unwrap_or_default();
            if params.is_empty() {
                lines.push(format!("{} — {}", def.name, def.description));
            } else {
                lines.push(format!(
                    "{} — {} (params: {})",
                    def.name,
                    def.description,
                    params.join(", ")
                ));
            }
        }
        lines.join("\n")
    }
}

const DESCRIPTION: &str =
    "Show the operator the catalog of available functions and their parameters.";

#[async_trait]
impl Tool for ListFunctionsTool {
    fn name(&self) -> &str {
        "list_functions"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.display.panel("Available functions", &self.render_table());
        Ok(ToolResult::text(
            "The list of available functions was shown to the operator.",
        ))
    }
}
