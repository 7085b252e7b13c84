//! Plan operations exposed to the model as tools.
//!
//! The six lifecycle tools share the engine through `Arc`.
//! `convert_plan_chart` is internal: the engine invokes it through the
//! dispatcher during chart rendering and the interceptor keeps it off the
//! console; the model never needs to call it directly.

use crate::engine::PlanEngine;
use async_trait::async_trait;
use std::sync::Arc;
use taskhelm_core::error::{Error, ToolError};
use taskhelm_core::message::Message;
use taskhelm_core::provider::{Provider, ProviderRequest};
use taskhelm_core::tool::{Tool, ToolResult};

fn tool_failure(name: &str, error: Error) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: name.to_string(),
        reason: error.to_string(),
    }
}

fn string_arg(arguments: &serde_json::Value, key: &str) -> Result<String, ToolError> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{key}' must be a non-empty string")))
}

pub struct CreatePlanTool {
    engine: Arc<PlanEngine>,
}

impl CreatePlanTool {
    pub fn new(engine: Arc<PlanEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for CreatePlanTool {
    fn name(&self) -> &str {
        "create_plan"
    }

    fn description(&self) -> &str {
        "Create a step-by-step plan for a task, or revise the current plan. \
         Set is_revision when the operator asks to adjust the existing plan."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task to plan, or the adjustment to make"
                },
                "is_revision": {
                    "type": "boolean",
                    "description": "True when adjusting the current plan",
                    "default": false
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let task = string_arg(&arguments, "task")?;
        let is_revision = arguments
            .get("is_revision")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let reply = self
            .engine
            .create_plan(&task, is_revision)
            .await
            .map_err(|e| tool_failure("create_plan", e))?;
        Ok(ToolResult::text(reply))
    }
}

pub struct ExecutePlanTool {
    engine: Arc<PlanEngine>,
}

impl ExecutePlanTool {
    pub fn new(engine: Arc<PlanEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for ExecutePlanTool {
    fn name(&self) -> &str {
        "execute_plan"
    }

    fn description(&self) -> &str {
        "Execute the current plan step by step and return its result."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let reply = self
            .engine
            .execute_plan()
            .await
            .map_err(|e| tool_failure("execute_plan", e))?;
        Ok(ToolResult::text(reply))
    }
}

pub struct SavePlanTool {
    engine: Arc<PlanEngine>,
}

impl SavePlanTool {
    pub fn new(engine: Arc<PlanEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for SavePlanTool {
    fn name(&self) -> &str {
        "save_plan"
    }

    fn description(&self) -> &str {
        "Save the current plan to a file under the given name."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "File name for the plan (without directory)"
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let name = string_arg(&arguments, "name")?;
        let reply = self
            .engine
            .save_plan(&name)
            .await
            .map_err(|e| tool_failure("save_plan", e))?;
        Ok(ToolResult::text(reply))
    }
}

pub struct LoadPlanTool {
    engine: Arc<PlanEngine>,
}

impl LoadPlanTool {
    pub fn new(engine: Arc<PlanEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for LoadPlanTool {
    fn name(&self) -> &str {
        "load_plan"
    }

    fn description(&self) -> &str {
        "Load a saved plan file and make it the current plan."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the saved plan file"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = string_arg(&arguments, "path")?;
        let reply = self
            .engine
            .load_plan(&path)
            .await
            .map_err(|e| tool_failure("load_plan", e))?;
        Ok(ToolResult::text(reply))
    }
}

pub struct ListPlansTool {
    engine: Arc<PlanEngine>,
}

impl ListPlansTool {
    pub fn new(engine: Arc<PlanEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for ListPlansTool {
    fn name(&self) -> &str {
        "list_plans"
    }

    fn description(&self) -> &str {
        "List the saved plan files. Use this when the operator wants to pick \
         a plan to load."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let paths = self
            .engine
            .list_saved_plans()
            .map_err(|e| tool_failure("list_plans", e))?;
        Ok(ToolResult::list(paths))
    }
}

pub struct RenderPlanChartTool {
    engine: Arc<PlanEngine>,
}

impl RenderPlanChartTool {
    pub fn new(engine: Arc<PlanEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for RenderPlanChartTool {
    fn name(&self) -> &str {
        "render_plan_chart"
    }

    fn description(&self) -> &str {
        "Render the current plan as a flowchart and return a shareable link."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let reply = self
            .engine
            .render_chart()
            .await
            .map_err(|e| tool_failure("render_plan_chart", e))?;
        Ok(ToolResult::text(reply))
    }
}

/// Internal: turns a plan template into mermaid flowchart code via one model
/// call. Personal data in the template (names, dates, emails) is generalized
/// away; every template step appears in the chart and none are invented.
pub struct ConvertPlanChartTool {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ConvertPlanChartTool {
    pub fn new(provider: Arc<dyn Provider>, model: String) -> Self {
        Self { provider, model }
    }
}

#[async_trait]
impl Tool for ConvertPlanChartTool {
    fn name(&self) -> &str {
        "convert_plan_chart"
    }

    fn description(&self) -> &str {
        "Internal: convert a plan template into mermaid flowchart code."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "template": {
                    "type": "string",
                    "description": "The plan template text"
                }
            },
            "required": ["template"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let template = string_arg(&arguments, "template")?;
        let system = "Convert the given plan template into a mermaid flowchart \
                      (flowchart TD). Every step in the template must appear as \
                      a node; do not invent steps that are not in the template. \
                      Generalize away personal data: replace names, dates and \
                      email addresses with neutral descriptions. Respond with \
                      the mermaid code only.";

        let mut request = ProviderRequest::new(
            self.model.clone(),
            vec![Message::system(system), Message::user(template)],
        );
        request.temperature = 0.0;

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| tool_failure("convert_plan_chart", Error::Provider(e)))?;
        Ok(ToolResult::text(
            strip_mermaid_fence(&response.message.content).to_string(),
        ))
    }
}

fn strip_mermaid_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```mermaid")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
