//! The call interceptor — audit rendering and result overrides.
//!
//! Implements [`InvocationHook`], so it sees every tool invocation the
//! dispatcher runs: model-issued calls and plan steps alike. It renders the
//! call for the operator, keeps bulk plan text out of the audit trail, and
//! turns the saved-plans listing into an interactive selection whose pick
//! replaces the result the model sees.

use std::sync::Arc;
use taskhelm_core::display::{truncate_for_display, DisplaySink};
use taskhelm_core::hook::InvocationHook;
use taskhelm_core::tool::ToolResult;
use tracing::debug;

/// Blocking operator selection among saved plan paths.
///
/// The CLI backs this with an arrow-key prompt; tests script it. Returning
/// `None` (selection aborted) leaves the original listing untouched.
pub trait PlanPicker: Send + Sync {
    fn pick(&self, paths: &[String]) -> Option<String>;
}

/// Argument keys that carry bulk plan text; shown as a placeholder.
const ELIDED_KEYS: &[&str] = &["template"];

/// The designated internal tool; never rendered.
const INTERNAL_TOOL: &str = "convert_plan_chart";

/// Tools whose results the engine already displayed; no result echo.
const QUIET_RESULTS: &[&str] = &["create_plan", "render_plan_chart", "list_functions"];

const RESULT_BUDGET: usize = 250;

pub struct CallInterceptor {
    display: Arc<dyn DisplaySink>,
    picker: Arc<dyn PlanPicker>,
}

impl CallInterceptor {
    pub fn new(display: Arc<dyn DisplaySink>, picker: Arc<dyn PlanPicker>) -> Self {
        Self { display, picker }
    }

    fn summarize_arguments(arguments: &serde_json::Value) -> String {
        let Some(map) = arguments.as_object() else {
            return arguments.to_string();
        };
        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            let rendered = if ELIDED_KEYS.contains(&key.as_str()) {
                "<plan text>".to_string()
            } else {
                match value {
                    serde_json::Value::String(s) => truncate_for_display(s, 80),
                    other => truncate_for_display(&other.to_string(), 80),
                }
            };
            parts.push(format!("{key}={rendered}"));
        }
        parts.join(", ")
    }
}

impl InvocationHook for CallInterceptor {
    fn before_invoke(&self, name: &str, arguments: &serde_json::Value) {
        if name == INTERNAL_TOOL {
            debug!(tool = name, "Internal tool call, not rendered");
            return;
        }
        self.display
            .panel(name, &Self::summarize_arguments(arguments));
    }

    fn after_invoke(&self, name: &str, result: &ToolResult) -> Option<ToolResult> {
        match name {
            "list_plans" => {
                let paths: Vec<String> = result
                    .data
                    .as_ref()
                    .and_then(|v| v.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();

                if paths.is_empty() {
                    return Some(ToolResult {
                        call_id: result.call_id.clone(),
                        output: "No plans found!".into(),
                        data: None,
                    });
                }

                // Blocks for operator input; single-operator session.
                let picked = self.picker.pick(&paths)?;
                Some(ToolResult {
                    call_id: result.call_id.clone(),
                    output: format!("The selected plan: {picked}."),
                    data: None,
                })
            }
            _ if name == INTERNAL_TOOL || QUIET_RESULTS.contains(&name) => None,
            _ => {
                self.display
                    .panel(name, &truncate_for_display(&result.output, RESULT_BUDGET));
                None
            }
        }
    }
}
