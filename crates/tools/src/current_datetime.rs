//! Current-date tool.

use async_trait::async_trait;
use chrono::Local;
use taskhelm_core::error::ToolError;
use taskhelm_core::tool::{Tool, ToolResult};

pub struct CurrentDatetimeTool;

#[async_trait]
impl Tool for CurrentDatetimeTool {
    fn name(&self) -> &str {
        "current_datetime"
    }

    fn description(&self) -> &str {
        "Get today's date in YYYY-MM-DD format."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::text(Local::now().format("%Y-%m-%d").to_string()))
    }
}
