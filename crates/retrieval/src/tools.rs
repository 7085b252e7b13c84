//! Retrieval-backed tools exposed to the model.

use crate::retriever::{KnowledgeRetriever, Topic};
use async_trait::async_trait;
use std::sync::Arc;
use taskhelm_core::error::ToolError;
use taskhelm_core::tool::{Tool, ToolResult};

fn question_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "question": {
                "type": "string",
                "description": "The question to answer"
            }
        },
        "required": ["question"]
    })
}

fn question_arg(arguments: &serde_json::Value) -> Result<&str, ToolError> {
    arguments
        .get("question")
        .and_then(|v| v.as_str())
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments("'question' must be a non-empty string".into()))
}

/// Answers questions from the documentation partition.
pub struct RetrieveDocsTool {
    retriever: Arc<KnowledgeRetriever>,
}

impl RetrieveDocsTool {
    pub fn new(retriever: Arc<KnowledgeRetriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for RetrieveDocsTool {
    fn name(&self) -> &str {
        "retrieve_docs"
    }

    fn description(&self) -> &str {
        "Answer a question from the indexed documentation. Use this for factual \
         questions about the documented material."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        question_schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let question = question_arg(&arguments)?;
        let answer = self
            .retriever
            .ask(question, Topic::Documentation)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "retrieve_docs".into(),
                reason: e.to_string(),
            })?;
        Ok(ToolResult::text(answer))
    }
}

/// Answers process how-to questions from the cookbook partition.
pub struct ProcessGuidanceTool {
    retriever: Arc<KnowledgeRetriever>,
}

impl ProcessGuidanceTool {
    pub fn new(retriever: Arc<KnowledgeRetriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for ProcessGuidanceTool {
    fn name(&self) -> &str {
        "process_guidance"
    }

    fn description(&self) -> &str {
        "Look up how-to guidance for carrying out a process (e.g. organizing an \
         event). Use this when the operator asks how something should be done."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        question_schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let question = question_arg(&arguments)?;
        let answer = self
            .retriever
            .ask(question, Topic::Cookbook)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "process_guidance".into(),
                reason: e.to_string(),
            })?;
        Ok(ToolResult::text(answer))
    }
}
