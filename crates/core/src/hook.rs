//! Invocation hooks — the call-interception seam.
//!
//! Every tool invocation, whether triggered by the model mid-conversation or
//! by a plan step during execution, flows through the [`Dispatcher`]. Hooks
//! observe the call before it runs and may rewrite the *successful* result
//! before it reaches the model. A failed invocation propagates before the
//! after-hook ever runs — hooks can never swallow a tool failure.

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::tool::{ToolCall, ToolRegistry, ToolResult};
use std::sync::Arc;

/// Observer/transformer over tool invocations.
///
/// `after_invoke` may block for operator input (the plan-selection prompt);
/// that is an accepted trade-off in a single-operator session and must not
/// be parallelized.
pub trait InvocationHook: Send + Sync {
    /// Called before the tool runs, with the resolved argument map.
    fn before_invoke(&self, name: &str, arguments: &serde_json::Value);

    /// Called after a successful run. Returning `Some` replaces the result
    /// the caller (and thus the model) sees; `None` keeps the original.
    fn after_invoke(&self, name: &str, result: &ToolResult) -> Option<ToolResult>;
}

/// Dispatches tool calls through the registry, wrapped by hooks.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    hooks: Vec<Arc<dyn InvocationHook>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            hooks: Vec::new(),
        }
    }

    /// Attach a hook. Hooks run in registration order.
    pub fn with_hook(mut self, hook: Arc<dyn InvocationHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Tool definitions for the LLM, straight from the registry.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Whether a tool with this name is registered.
    pub fn has_tool(&self, name: &str) -> bool {
        self.registry.get(name).is_some()
    }

    /// Execute a tool call through the hook pipeline.
    pub async fn invoke(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        for hook in &self.hooks {
            hook.before_invoke(&call.name, &call.arguments);
        }

        // Failures propagate here, untouched by after-hooks.
        let mut result = self.registry.execute(call).await?;

        for hook in &self.hooks {
            if let Some(replacement) = hook.after_invoke(&call.name, &result) {
                result = replacement;
            }
        }
        Ok(result)
    }
}
