//! Calendar tool — stub confirmation.
//!
//! A real deployment would talk to a calendar backend; the stub confirms so
//! plans exercising calendar steps run end-to-end without external services.

use async_trait::async_trait;
use taskhelm_core::error::ToolError;
use taskhelm_core::tool::{Tool, ToolResult};
use tracing::info;

pub struct AddCalendarEventTool;

#[async_trait]
impl Tool for AddCalendarEventTool {
    fn name(&self) -> &str {
        "add_calendar_event"
    }

    fn description(&self) -> &str {
        "Add an event to the operator's calendar with a title, description, \
         location, and start/end times."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Event title" },
                "description": { "type": "string", "description": "Event description" },
                "location": { "type": "string", "description": "Where the event takes place" },
                "start": { "type": "string", "description": "Start, ISO 8601" },
                "end": { "type": "string", "description": "End, ISO 8601" }
            },
            "required": ["title", "start", "end"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let title = arguments["title"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'title' argument".into()))?;
        for key in ["start", "end"] {
            if arguments[key].as_str().is_none() {
                return Err(ToolError::InvalidArguments(format!(
                    "Missing '{key}' argument"
                )));
            }
        }

        info!(title, "Calendar event recorded");
        Ok(ToolResult::text("Event added to the calendar!"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn confirms_valid_event() {
        let result = AddCalendarEventTool
            .execute(serde_json::json!({
                "title": "Offsite",
                "start": "2025-06-01T09:00:00",
                "end": "2025-06-02T17:00:00"
            }))
            .await
            .unwrap();
        assert_eq!(result.output, "Event added to the calendar!");
    }

    #[tokio::test]
    async fn rejects_missing_times() {
        let err = AddCalendarEventTool
            .execute(serde_json::json!({"title": "Offsite"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
