//! The plan template dialect — parser and executor.
//!
//! Plans are declarative step sequences the model emits as text and the
//! engine interprets at execution time:
//!
//! ```text
//! {{!-- invite everyone --}}
//! {{set "attendees" (array "ana@example.com" "ben@example.com")}}
//! {{#each attendees}}
//!   {{send_email to=this subject="Offsite" body=(concat "Hi " this)}}
//! {{/each}}
//! {{json attendees}}
//! ```
//!
//! Statements are comments, `set`, `#each` blocks, `json` emissions, and
//! bare helper calls whose name resolves to a registered tool. Expressions
//! are literals, variable paths, the builtins `array` and `concat`, and
//! nested tool calls. Execution is strictly sequential; a failing step
//! aborts the plan and earlier side effects stand.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use taskhelm_core::error::PlanError;
use taskhelm_core::hook::Dispatcher;
use taskhelm_core::tool::{ToolCall, ToolResult};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Comment(String),
    Set { name: String, value: Expr },
    Each { path: Vec<String>, body: Vec<Statement> },
    Json(Expr),
    Call { name: String, args: Vec<(String, Expr)> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Num(f64),
    Bool(bool),
    /// Variable reference: `this`, `attendees`, `event.date`
    Path(Vec<String>),
    /// `(array …)`, `(concat …)`, or a nested tool call
    Helper {
        name: String,
        positional: Vec<Expr>,
        named: Vec<(String, Expr)>,
    },
}

/// Parse a template into its statement list.
///
/// Validation is exactly syntactic parseability; helper names are resolved
/// against the registry at execution time, not here.
pub fn parse(src: &str) -> Result<Vec<Statement>, PlanError> {
    let mut parser = Parser { src, pos: 0 };
    let statements = parser.parse_sequence(false)?;
    Ok(statements)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, at: usize, message: impl Into<String>) -> PlanError {
        PlanError::Parse {
            offset: at,
            message: message.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), PlanError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(self.pos, format!("expected '{token}'")))
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    /// Parse statements until EOF, or until `{{/each}}` when inside a block.
    fn parse_sequence(&mut self, in_each: bool) -> Result<Vec<Statement>, PlanError> {
        let mut statements = Vec::new();
        loop {
            match self.rest().find("{{") {
                Some(offset) => self.pos += offset,
                None => {
                    if in_each {
                        return Err(self.error(self.pos, "unterminated {{#each}} block"));
                    }
                    return Ok(statements);
                }
            }

            let block_start = self.pos;
            self.pos += 2;

            if self.eat("!--") {
                match self.rest().find("--}}") {
                    Some(end) => {
                        let text = self.rest()[..end].trim().to_string();
                        self.pos += end + 4;
                        statements.push(Statement::Comment(text));
                    }
                    None => return Err(self.error(block_start, "unterminated comment")),
                }
                continue;
            }

            self.skip_ws();
            if self.eat("/") {
                let name = self.parse_ident()?;
                self.skip_ws();
                self.expect("}}")?;
                if in_each && name == "each" {
                    return Ok(statements);
                }
                return Err(self.error(block_start, format!("unexpected closing block '{{{{/{name}}}}}'")));
            }

            if self.eat("#") {
                let name = self.parse_ident()?;
                if name != "each" {
                    return Err(self.error(block_start, format!("unknown block helper '#{name}'")));
                }
                self.skip_ws();
                let path = self.parse_path()?;
                self.skip_ws();
                self.expect("}}")?;
                let body = self.parse_sequence(true)?;
                statements.push(Statement::Each { path, body });
                continue;
            }

            let name = self.parse_ident()?;
            match name.as_str() {
                "set" => {
                    self.skip_ws();
                    let var_start = self.pos;
                    let var = match self.parse_expr()? {
                        Expr::Str(s) => s,
                        _ => return Err(self.error(var_start, "set expects a quoted variable name")),
                    };
                    self.skip_ws();
                    let value = self.parse_expr()?;
                    self.skip_ws();
                    self.expect("}}")?;
                    statements.push(Statement::Set { name: var, value });
                }
                "json" => {
                    self.skip_ws();
                    let value = self.parse_expr()?;
                    self.skip_ws();
                    self.expect("}}")?;
                    statements.push(Statement::Json(value));
                }
                _ => {
                    let args = self.parse_named_args("}}")?;
                    self.expect("}}")?;
                    statements.push(Statement::Call { name, args });
                }
            }
        }
    }

    /// `key=expr` pairs up to (not consuming) the terminator.
    fn parse_named_args(&mut self, terminator: &str) -> Result<Vec<(String, Expr)>, PlanError> {
        let mut args = Vec::new();
        loop {
            self.skip_ws();
            if self.rest().starts_with(terminator) || self.peek().is_none() {
                return Ok(args);
            }
            let key = self.parse_ident()?;
            self.expect("=")?;
            let value = self.parse_expr()?;
            args.push((key, value));
        }
    }

    fn parse_ident(&mut self) -> Result<String, PlanError> {
        let start = self.pos;
        if !self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            return Err(self.error(start, "expected an identifier"));
        }
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn parse_path(&mut self) -> Result<Vec<String>, PlanError> {
        let mut segments = vec![self.parse_ident()?];
        while self.eat(".") {
            segments.push(self.parse_ident()?);
        }
        Ok(segments)
    }

    fn parse_expr(&mut self) -> Result<Expr, PlanError> {
        match self.peek() {
            Some('"') => self.parse_string(),
            Some('(') => self.parse_helper(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let path = self.parse_path()?;
                match path.as_slice() {
                    [single] if single == "true" => Ok(Expr::Bool(true)),
                    [single] if single == "false" => Ok(Expr::Bool(false)),
                    _ => Ok(Expr::Path(path)),
                }
            }
            _ => Err(self.error(self.pos, "expected an expression")),
        }
    }

    fn parse_string(&mut self) -> Result<Expr, PlanError> {
        let start = self.pos;
        self.expect("\"")?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Expr::Str(out)),
                Some('\\') => match self.bump() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    _ => return Err(self.error(self.pos, "invalid escape sequence")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error(start, "unterminated string literal")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Expr, PlanError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        text.parse::<f64>()
            .map(Expr::Num)
            .map_err(|_| self.error(start, format!("invalid number '{text}'")))
    }

    /// `(name expr… key=expr…)`
    fn parse_helper(&mut self) -> Result<Expr, PlanError> {
        let start = self.pos;
        self.expect("(")?;
        self.skip_ws();
        let name = self.parse_ident()?;
        let mut positional = Vec::new();
        let mut named = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(')') => {
                    self.bump();
                    return Ok(Expr::Helper { name, positional, named });
                }
                None => return Err(self.error(start, "unterminated helper expression")),
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                    // Lookahead: `ident=` is a named argument, otherwise a path.
                    let save = self.pos;
                    let ident = self.parse_ident()?;
                    if self.eat("=") {
                        named.push((ident, self.parse_expr()?));
                    } else {
                        self.pos = save;
                        positional.push(self.parse_expr()?);
                    }
                }
                _ => positional.push(self.parse_expr()?),
            }
        }
    }
}

// --- Execution ---

struct Scope {
    frames: Vec<HashMap<String, Value>>,
}

impl Scope {
    fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    fn set(&mut self, name: String, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, value);
        }
    }

    fn resolve(&self, path: &[String]) -> Option<Value> {
        let root = path.first()?;
        let mut value = self
            .frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(root))?
            .clone();
        for segment in &path[1..] {
            value = value.get(segment)?.clone();
        }
        Some(value)
    }
}

#[derive(Default)]
struct Output {
    emissions: Vec<String>,
    last_tool_output: Option<String>,
}

impl Output {
    fn finish(self) -> String {
        if self.emissions.is_empty() {
            self.last_tool_output.unwrap_or_default()
        } else {
            self.emissions.join("\n")
        }
    }
}

/// Runs parsed statements against the live tool set.
///
/// Every tool reference goes through the [`Dispatcher`], so invocation hooks
/// observe plan steps exactly like model-issued calls.
pub struct TemplateExecutor<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> TemplateExecutor<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub async fn run(&self, statements: &[Statement]) -> Result<String, PlanError> {
        let mut scope = Scope::new();
        let mut out = Output::default();
        self.exec_block(statements, &mut scope, &mut out).await?;
        Ok(out.finish())
    }

    fn exec_block<'b>(
        &'b self,
        statements: &'b [Statement],
        scope: &'b mut Scope,
        out: &'b mut Output,
    ) -> BoxFuture<'b, Result<(), PlanError>> {
        Box::pin(async move {
            for statement in statements {
                match statement {
                    Statement::Comment(_) => {}
                    Statement::Set { name, value } => {
                        let value = self.eval(value, scope).await?;
                        scope.set(name.clone(), value);
                    }
                    Statement::Json(expr) => {
                        let value = self.eval(expr, scope).await?;
                        out.emissions.push(render_value(&value));
                    }
                    Statement::Call { name, args } => {
                        let result = self.invoke_tool(name, args, scope).await?;
                        out.last_tool_output = Some(result.output);
                    }
                    Statement::Each { path, body } => {
                        let value = scope.resolve(path).ok_or_else(|| PlanError::StepFailed {
                            step: format!("each {}", path.join(".")),
                            reason: "unknown variable".into(),
                        })?;
                        let Value::Array(items) = value else {
                            return Err(PlanError::StepFailed {
                                step: format!("each {}", path.join(".")),
                                reason: "value is not a list".into(),
                            });
                        };
                        for item in items {
                            let mut frame = HashMap::new();
                            frame.insert("this".to_string(), item);
                            scope.frames.push(frame);
                            let ran = self.exec_block(body, scope, out).await;
                            scope.frames.pop();
                            ran?;
                        }
                    }
                }
            }
            Ok(())
        })
    }

    fn eval<'b>(
        &'b self,
        expr: &'b Expr,
        scope: &'b Scope,
    ) -> BoxFuture<'b, Result<Value, PlanError>> {
        Box::pin(async move {
            match expr {
                Expr::Str(s) => Ok(Value::String(s.clone())),
                Expr::Num(n) => Ok(serde_json::json!(n)),
                Expr::Bool(b) => Ok(Value::Bool(*b)),
                Expr::Path(path) => scope.resolve(path).ok_or_else(|| PlanError::StepFailed {
                    step: path.join("."),
                    reason: "unknown variable".into(),
                }),
                Expr::Helper {
                    name,
                    positional,
                    named,
                } => match name.as_str() {
                    "array" => {
                        let mut items = Vec::with_capacity(positional.len());
                        for arg in positional {
                            items.push(self.eval(arg, scope).await?);
                        }
                        Ok(Value::Array(items))
                    }
                    "concat" => {
                        let mut joined = String::new();
                        for arg in positional {
                            joined.push_str(&render_value(&self.eval(arg, scope).await?));
                        }
                        Ok(Value::String(joined))
                    }
                    _ => {
                        if !positional.is_empty() {
                            return Err(PlanError::StepFailed {
                                step: name.clone(),
                                reason: "tool helpers take named arguments only".into(),
                            });
                        }
                        let result = self.invoke_tool(name, named, scope).await?;
                        Ok(result
                            .data
                            .unwrap_or(Value::String(result.output)))
                    }
                },
            }
        })
    }

    async fn invoke_tool(
        &self,
        name: &str,
        args: &[(String, Expr)],
        scope: &Scope,
    ) -> Result<ToolResult, PlanError> {
        let mut arguments = serde_json::Map::new();
        for (key, expr) in args {
            arguments.insert(key.clone(), self.eval(expr, scope).await?);
        }
        let call = ToolCall {
            id: format!("plan_{}", Uuid::new_v4()),
            name: name.to_string(),
            arguments: Value::Object(arguments),
        };
        self.dispatcher
            .invoke(&call)
            .await
            .map_err(|e| PlanError::StepFailed {
                step: name.to_string(),
                reason: e.to_string(),
            })
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use taskhelm_core::error::ToolError;
    use taskhelm_core::tool::{Tool, ToolRegistry};

    const OFFSITE: &str = r#"
{{!-- invite everyone --}}
{{set "attendees" (array "ana@example.com" "ben@example.com")}}
{{#each attendees}}
  {{send_email to=this subject="Offsite" body=(concat "Hi " this)}}
{{/each}}
{{json attendees}}
"#;

    #[test]
    fn parses_full_dialect() {
        let statements = parse(OFFSITE).unwrap();
        assert_eq!(statements.len(), 4);
        assert!(matches!(statements[0], Statement::Comment(_)));
        assert!(matches!(statements[1], Statement::Set { .. }));
        let Statement::Each { path, body } = &statements[2] else {
            panic!("expected each block");
        };
        assert_eq!(path, &["attendees".to_string()]);
        assert_eq!(body.len(), 1);
        assert!(matches!(statements[3], Statement::Json(_)));
    }

    #[test]
    fn parse_error_reports_offset() {
        let err = parse("text {{#each items}} {{send_email to=this}}").unwrap_err();
        let PlanError::Parse { message, .. } = err else {
            panic!("expected parse error");
        };
        assert!(message.contains("unterminated"));
    }

    #[test]
    fn unterminated_comment_is_rejected() {
        assert!(parse("{{!-- never closed").is_err());
    }

    #[test]
    fn stray_closer_is_rejected() {
        assert!(parse("{{/each}}").is_err());
    }

    #[test]
    fn unknown_block_helper_is_rejected() {
        let err = parse("{{#if cond}}{{/if}}").unwrap_err();
        assert!(err.to_string().contains("#if"));
    }

    #[test]
    fn nested_helper_expressions_parse() {
        let statements = parse(r#"{{set "msg" (concat "a" (concat "b" "c"))}}"#).unwrap();
        let Statement::Set { value, .. } = &statements[0] else {
            panic!("expected set");
        };
        assert!(matches!(value, Expr::Helper { name, .. } if name == "concat"));
    }

    #[test]
    fn plain_text_between_blocks_is_ignored() {
        let statements = parse("Step one:\n{{json 1}}\nDone.").unwrap();
        assert_eq!(statements.len(), 1);
    }

    // --- Execution ---

    struct RecordingTool {
        calls: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &str {
            "send_email"
        }
        fn description(&self) -> &str {
            "Records invocations"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
            self.calls.lock().unwrap().push(arguments);
            Ok(ToolResult::text("Email sent!"))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: Value) -> Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "smtp down".into(),
            })
        }
    }

    fn dispatcher(calls: Arc<Mutex<Vec<Value>>>) -> Dispatcher {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(RecordingTool { calls }));
        registry.register(Box::new(FailingTool));
        Dispatcher::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn executes_each_in_source_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let d = dispatcher(calls.clone());
        let statements = parse(OFFSITE).unwrap();

        let output = TemplateExecutor::new(&d).run(&statements).await.unwrap();
        assert_eq!(output, r#"["ana@example.com","ben@example.com"]"#);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0]["to"], "ana@example.com");
        assert_eq!(calls[0]["body"], "Hi ana@example.com");
        assert_eq!(calls[1]["to"], "ben@example.com");
    }

    #[tokio::test]
    async fn failing_second_step_keeps_first_side_effect() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let d = dispatcher(calls.clone());
        let statements =
            parse(r#"{{send_email to="ana@example.com"}}{{broken}}"#).unwrap();

        let err = TemplateExecutor::new(&d).run(&statements).await.unwrap_err();
        assert!(matches!(err, PlanError::StepFailed { ref step, .. } if step == "broken"));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn without_json_output_is_last_tool_output() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let d = dispatcher(calls.clone());
        let statements = parse(r#"{{send_email to="ana@example.com"}}"#).unwrap();
        let output = TemplateExecutor::new(&d).run(&statements).await.unwrap();
        assert_eq!(output, "Email sent!");
    }

    #[tokio::test]
    async fn unknown_variable_fails_step() {
        let d = dispatcher(Arc::new(Mutex::new(Vec::new())));
        let statements = parse("{{json missing}}").unwrap();
        let err = TemplateExecutor::new(&d).run(&statements).await.unwrap_err();
        assert!(matches!(err, PlanError::StepFailed { .. }));
    }

    #[tokio::test]
    async fn nested_tool_call_result_feeds_expression() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let d = dispatcher(calls.clone());
        let statements =
            parse(r#"{{json (concat "status: " (send_email to="ana@example.com"))}}"#).unwrap();
        let output = TemplateExecutor::new(&d).run(&statements).await.unwrap();
        assert_eq!(output, "status: Email sent!");
    }

    #[tokio::test]
    async fn path_expressions_index_objects() {
        let d = dispatcher(Arc::new(Mutex::new(Vec::new())));
        // No object literal in the dialect; drive paths through `this`.
        let statements = parse(
            r#"{{set "names" (array "ana")}}{{#each names}}{{json this}}{{/each}}"#,
        )
        .unwrap();
        let output = TemplateExecutor::new(&d).run(&statements).await.unwrap();
        assert_eq!(output, "ana");
    }
}
