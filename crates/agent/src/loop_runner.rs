//! The conversation loop: stream model turns, execute requested tools.

use crate::interceptor::CallInterceptor;
use chrono::Local;
use std::sync::Arc;
use taskhelm_core::display::DisplaySink;
use taskhelm_core::error::{Error, Result};
use taskhelm_core::hook::Dispatcher;
use taskhelm_core::message::{Conversation, Message, MessageToolCall, Role};
use taskhelm_core::provider::{Provider, ProviderRequest};
use taskhelm_core::tool::ToolCall;
use tracing::{debug, info, warn};

/// Standing reply when a turn exhausts the tool-iteration budget.
const ITERATION_LIMIT_MESSAGE: &str =
    "I've reached the maximum number of tool steps for this request. Please \
     tell me how to continue.";

/// Drives one operator session: owns the conversation, builds the system
/// prompt, streams model output to the display, and feeds tool results back
/// until the model produces a plain answer.
pub struct ChatLoop {
    provider: Arc<dyn Provider>,
    dispatcher: Arc<Dispatcher>,
    display: Arc<dyn DisplaySink>,
    model: String,
    max_tokens: Option<u32>,
    assistant_name: String,
    language: String,
    /// Operator profile notes gathered at startup (name, preferences).
    profile: Option<String>,
    max_iterations: u32,
    conversation: Conversation,
}

impl ChatLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        dispatcher: Arc<Dispatcher>,
        display: Arc<dyn DisplaySink>,
        model: impl Into<String>,
        assistant_name: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            display,
            model: model.into(),
            max_tokens: None,
            assistant_name: assistant_name.into(),
            language: language.into(),
            profile: None,
            max_iterations: 10,
            conversation: Conversation::new(),
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Fold operator profile notes into the system prompt.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are {name}, a personal assistant at a text console. Answer in \
             {language}. Today's date is {date}.\n\n\
             Standing instructions:\n\
             - When the operator asks you to carry out a multi-step task \
             (organize, arrange, prepare something), call create_plan with the \
             task instead of acting directly.\n\
             - When the operator asks to adjust the current plan, call \
             create_plan with is_revision set to true.\n\
             - Never execute a plan unless the operator explicitly asks.\n\
             - Answer questions about the documented material with \
             retrieve_docs, and questions about how a process is usually done \
             with process_guidance.\n\
             - For single concrete actions (one email, one calendar entry), \
             call the matching tool directly.",
            name = self.assistant_name,
            language = self.language,
            date = Local::now().format("%Y-%m-%d"),
        );
        if let Some(profile) = &self.profile {
            prompt.push_str(&format!("\n\nAbout the operator: {profile}"));
        }
        prompt
    }

    /// Process one operator message and return the assistant's final answer.
    ///
    /// Streams content fragments to the display as they arrive; tool calls
    /// run synchronously through the dispatcher between model iterations.
    pub async fn process(&mut self, user_input: &str) -> Result<String> {
        self.conversation.push(Message::user(user_input));

        // The system prompt is rebuilt each turn so the date stays current.
        let system = Message::system(self.system_prompt());
        if self
            .conversation
            .messages
            .first()
            .is_some_and(|m| m.role == Role::System)
        {
            self.conversation.messages[0] = system;
        } else {
            self.conversation.messages.insert(0, system);
        }

        let tool_definitions = self.dispatcher.definitions();
        let mut iteration = 0u32;

        loop {
            iteration += 1;
            if iteration > self.max_iterations {
                warn!(iterations = iteration, "Tool iteration budget exhausted");
                return Ok(ITERATION_LIMIT_MESSAGE.to_string());
            }
            debug!(iteration, "Conversation loop iteration");

            let mut request =
                ProviderRequest::new(self.model.clone(), self.conversation.messages.clone());
            request.max_tokens = self.max_tokens;
            request.tools = tool_definitions.clone();
            request.stream = true;

            let (content, tool_calls) = self.consume_stream(request).await?;

            let mut assistant = Message::assistant(&content);
            assistant.tool_calls = tool_calls.clone();
            self.conversation.push(assistant);

            if tool_calls.is_empty() {
                return Ok(content);
            }

            info!(count = tool_calls.len(), "Model requested tool calls");
            for tc in &tool_calls {
                let arguments = match serde_json::from_str(&tc.arguments) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Malformed tool arguments from model");
                        self.conversation.push(Message::tool_result(
                            &tc.id,
                            format!("Error: malformed arguments JSON: {e}"),
                        ));
                        continue;
                    }
                };
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };
                match self.dispatcher.invoke(&call).await {
                    Ok(result) => {
                        self.conversation
                            .push(Message::tool_result(&tc.id, &result.output));
                    }
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool invocation failed");
                        // Feed the failure back so the model can recover.
                        self.conversation
                            .push(Message::tool_result(&tc.id, format!("Error: {e}")));
                    }
                }
            }
        }
    }

    /// Drain one streamed model response, flushing fragments as they arrive.
    async fn consume_stream(
        &self,
        request: ProviderRequest,
    ) -> Result<(String, Vec<MessageToolCall>)> {
        let mut rx = self.provider.stream(request).await.map_err(Error::Provider)?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.map_err(Error::Provider)?;
            if let Some(delta) = chunk.content {
                self.display.fragment(&delta);
                content.push_str(&delta);
            }
            if chunk.done {
                tool_calls = chunk.tool_calls;
                break;
            }
        }
        if !content.is_empty() {
            self.display.line("");
        }
        Ok((content, tool_calls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::PlanPicker;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use taskhelm_core::display::NullSink;
    use taskhelm_core::error::{ProviderError, ToolError};
    use taskhelm_core::hook::InvocationHook;
    use taskhelm_core::provider::ProviderResponse;
    use taskhelm_core::tool::{Tool, ToolRegistry, ToolResult};

    /// Pops scripted turns; a turn is either text or tool calls.
    struct ScriptedProvider {
        turns: Mutex<Vec<Message>>,
    }

    impl ScriptedProvider {
        fn new(turns: Vec<Message>) -> Self {
            Self {
                turns: Mutex::new(turns.into_iter().rev().collect()),
            }
        }

        fn tool_call_turn(name: &str, arguments: &str) -> Message {
            let mut msg = Message::assistant("");
            msg.tool_calls = vec![MessageToolCall {
                id: format!("call_{name}"),
                name: name.into(),
                arguments: arguments.into(),
            }];
            msg
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            let message = self
                .turns
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Message::assistant("done"));
            Ok(ProviderResponse {
                message,
                model: "scripted".into(),
            })
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            match arguments["text"].as_str() {
                Some(text) => Ok(ToolResult::text(text)),
                None => Err(ToolError::InvalidArguments("missing text".into())),
            }
        }
    }

    struct NoPicker;

    impl PlanPicker for NoPicker {
        fn pick(&self, _paths: &[String]) -> Option<String> {
            None
        }
    }

    fn chat_loop(turns: Vec<Message>) -> ChatLoop {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let display: Arc<dyn DisplaySink> = Arc::new(NullSink);
        let hook: Arc<dyn InvocationHook> =
            Arc::new(CallInterceptor::new(display.clone(), Arc::new(NoPicker)));
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry)).with_hook(hook));
        ChatLoop::new(
            Arc::new(ScriptedProvider::new(turns)),
            dispatcher,
            display,
            "scripted",
            "TaskHelm",
            "English",
        )
    }

    #[tokio::test]
    async fn plain_answer_round_trip() {
        let mut chat = chat_loop(vec![Message::assistant("Hello! How can I help?")]);
        let answer = chat.process("Hi").await.unwrap();
        assert_eq!(answer, "Hello! How can I help?");

        // system + user + assistant
        let messages = &chat.conversation().messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("TaskHelm"));
    }

    #[tokio::test]
    async fn tool_call_feeds_next_iteration() {
        let mut chat = chat_loop(vec![
            ScriptedProvider::tool_call_turn("echo", r#"{"text": "pong"}"#),
            Message::assistant("The tool said pong."),
        ]);
        let answer = chat.process("ping the tool").await.unwrap();
        assert_eq!(answer, "The tool said pong.");

        let tool_msg = chat
            .conversation()
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert_eq!(tool_msg.content, "pong");
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_echo"));
    }

    #[tokio::test]
    async fn tool_failure_is_reported_to_model() {
        let mut chat = chat_loop(vec![
            ScriptedProvider::tool_call_turn("echo", r#"{"wrong": true}"#),
            Message::assistant("That did not work."),
        ]);
        let answer = chat.process("ping").await.unwrap();
        assert_eq!(answer, "That did not work.");

        let tool_msg = chat
            .conversation()
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(tool_msg.content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn malformed_tool_arguments_are_fed_back() {
        let mut chat = chat_loop(vec![
            ScriptedProvider::tool_call_turn("echo", "{not json"),
            Message::assistant("Could not parse that."),
        ]);
        let answer = chat.process("ping").await.unwrap();
        assert_eq!(answer, "Could not parse that.");

        let tool_msg = chat
            .conversation()
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(tool_msg.content.starts_with("Error: malformed arguments JSON:"));
    }

    #[tokio::test]
    async fn iteration_budget_is_enforced() {
        let turns: Vec<Message> = (0..5)
            .map(|_| ScriptedProvider::tool_call_turn("echo", r#"{"text": "again"}"#))
            .collect();
        let mut chat = chat_loop(turns).with_max_iterations(3);
        let answer = chat.process("loop forever").await.unwrap();
        assert_eq!(answer, ITERATION_LIMIT_MESSAGE);
    }

    #[tokio::test]
    async fn second_turn_keeps_single_system_message() {
        let mut chat = chat_loop(vec![
            Message::assistant("First answer."),
            Message::assistant("Second answer."),
        ]);
        chat.process("one").await.unwrap();
        chat.process("two").await.unwrap();

        let system_count = chat
            .conversation()
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        assert_eq!(system_count, 1);
    }
}
