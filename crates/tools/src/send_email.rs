//! Send-email tool — one recipient, subject, body, over async SMTP.

use async_trait::async_trait;
use lettre::message::{header, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use taskhelm_core::error::ToolError;
use taskhelm_core::tool::{Tool, ToolResult};
use tracing::info;

/// SMTP connection settings, mapped from configuration by the binary.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// From address, e.g. `"TaskHelm <assistant@example.com>"`.
    pub sender: String,
}

pub struct SendEmailTool {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SendEmailTool {
    pub fn new(settings: &SmtpSettings) -> Result<Self, ToolError> {
        let sender: Mailbox = settings.sender.parse().map_err(|e| {
            ToolError::InvalidArguments(format!(
                "invalid sender address \"{}\": {e}",
                settings.sender
            ))
        })?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "send_email".into(),
                reason: format!("SMTP relay setup failed: {e}"),
            })?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send an email to a single recipient with the given subject and body."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "to": {
                    "type": "string",
                    "description": "Recipient email address"
                },
                "subject": {
                    "type": "string",
                    "description": "Email subject line"
                },
                "body": {
                    "type": "string",
                    "description": "Plain-text email body"
                }
            },
            "required": ["to", "subject", "body"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let to = arguments["to"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'to' argument".into()))?;
        let subject = arguments["subject"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'subject' argument".into()))?;
        let body = arguments["body"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'body' argument".into()))?;

        let recipient: Mailbox = to.parse().map_err(|e| {
            ToolError::InvalidArguments(format!("invalid To address \"{to}\": {e}"))
        })?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "send_email".into(),
                reason: format!("failed to build message: {e}"),
            })?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "send_email".into(),
                reason: format!("SMTP send failed: {e}"),
            })?;

        info!(to, subject, "Email sent");
        Ok(ToolResult::text(format!("Email sent to {to}!")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".into(),
            port: 465,
            username: "assistant@example.com".into(),
            password: "secret".into(),
            sender: "TaskHelm <assistant@example.com>".into(),
        }
    }

    #[test]
    fn tool_definition() {
        let tool = SendEmailTool::new(&settings()).unwrap();
        assert_eq!(tool.name(), "send_email");
        let schema = tool.parameters_schema();
        assert_eq!(
            schema["required"],
            serde_json::json!(["to", "subject", "body"])
        );
    }

    #[test]
    fn invalid_sender_is_rejected() {
        let mut bad = settings();
        bad.sender = "not an address".into();
        assert!(SendEmailTool::new(&bad).is_err());
    }

    #[tokio::test]
    async fn missing_arguments_are_rejected() {
        let tool = SendEmailTool::new(&settings()).unwrap();
        let err = tool
            .execute(serde_json::json!({"to": "ana@example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected() {
        let tool = SendEmailTool::new(&settings()).unwrap();
        let err = tool
            .execute(serde_json::json!({
                "to": "not an address",
                "subject": "Hi",
                "body": "Hello"
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
