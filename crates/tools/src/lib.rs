//! Built-in action tools for TaskHelm.
//!
//! These are the capabilities plans and the model act through: send an
//! email, add a calendar event, read and write files, search the web, and
//! show the function catalog.

pub mod add_calendar_event;
pub mod current_datetime;
pub mod file_read;
pub mod file_write;
pub mod list_functions;
pub mod send_email;
pub mod web_search;

pub use add_calendar_event::AddCalendarEventTool;
pub use current_datetime::CurrentDatetimeTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use list_functions::ListFunctionsTool;
pub use send_email::{SendEmailTool, SmtpSettings};
pub use web_search::WebSearchTool;

use taskhelm_core::tool::ToolRegistry;

/// Register the action tools. Email is optional: it needs SMTP settings.
pub fn register_action_tools(registry: &mut ToolRegistry, email: Option<SendEmailTool>) {
    registry.register(Box::new(AddCalendarEventTool));
    registry.register(Box::new(CurrentDatetimeTool));
    registry.register(Box::new(FileReadTool));
    registry.register(Box::new(FileWriteTool));
    registry.register(Box::new(WebSearchTool));
    if let Some(email) = email {
        registry.register(Box::new(email));
    }
}
