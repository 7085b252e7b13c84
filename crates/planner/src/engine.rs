//! The plan lifecycle engine: create, revise, execute, persist, chart.

use crate::plan::{Plan, PlanSession, PlanStatus};
use crate::template::{parse, TemplateExecutor};
use async_trait::async_trait;
use base64::Engine as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use taskhelm_core::display::{truncate_for_display, DisplaySink};
use taskhelm_core::error::{Error, PlanError, Result, RetrievalError};
use taskhelm_core::hook::Dispatcher;
use taskhelm_core::message::Message;
use taskhelm_core::provider::{Provider, ProviderRequest};
use taskhelm_core::tool::ToolCall;
use taskhelm_retrieval::{KnowledgeRetriever, Topic};
use tracing::{debug, info};
use uuid::Uuid;

/// Conversational nudge when an operation needs a plan and none exists.
pub const NO_PLAN_MESSAGE: &str =
    "No plan has been created yet. Please provide instructions for a plan first.";

/// Confirmation returned after a successful create (unless auto-executing).
pub const PLAN_CREATED_MESSAGE: &str =
    "Plan was created. Please check and revise the plan as needed before executing it.";

/// Characters of execution output shown on the console; the caller always
/// gets the full value.
const DISPLAY_BUDGET: usize = 250;

/// Tools that manage the plan lifecycle (or look up guidance). They are
/// registered for the model's conversational use but must never appear as
/// template helpers: a template calling `execute_plan` would re-enter the
/// engine on its own plan.
const NON_TEMPLATE_TOOLS: &[&str] = &[
    "create_plan",
    "execute_plan",
    "save_plan",
    "load_plan",
    "list_plans",
    "render_plan_chart",
    "convert_plan_chart",
    "process_guidance",
    "list_functions",
];

/// Pre-planning how-to lookup. [`KnowledgeRetriever`] is the production
/// source; tests substitute a scripted one.
#[async_trait]
pub trait GuidanceSource: Send + Sync {
    async fn how_to(&self, task: &str) -> std::result::Result<String, RetrievalError>;
}

#[async_trait]
impl GuidanceSource for KnowledgeRetriever {
    async fn how_to(&self, task: &str) -> std::result::Result<String, RetrievalError> {
        self.ask(task, Topic::Cookbook).await
    }
}

/// Policy knobs for the engine, mapped from configuration by the binary.
#[derive(Debug, Clone)]
pub struct PlanEngineOptions {
    pub chat_model: String,
    /// Consult the cookbook partition before synthesizing (never for revisions).
    pub consult_cookbook: bool,
    /// Execute a freshly created plan immediately and return its result.
    pub auto_execute: bool,
    /// When off, `render_chart` is a no-op returning "".
    pub enable_chart: bool,
    /// Append the raw template to the creation confirmation.
    pub verbose_create: bool,
    pub plans_dir: PathBuf,
}

/// Owns the session's current-plan slot and every plan operation.
///
/// The dispatcher is attached after registry assembly (the plan tools
/// themselves live in the registry), so it sits behind a `OnceLock`.
pub struct PlanEngine {
    provider: Arc<dyn Provider>,
    guidance: Option<Arc<dyn GuidanceSource>>,
    display: Arc<dyn DisplaySink>,
    options: PlanEngineOptions,
    dispatcher: OnceLock<Arc<Dispatcher>>,
    session: tokio::sync::Mutex<PlanSession>,
    executing: AtomicBool,
}

/// Clears the in-flight flag however execution unwinds.
struct ExecutionGuard<'a>(&'a AtomicBool);

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PlanEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        guidance: Option<Arc<dyn GuidanceSource>>,
        display: Arc<dyn DisplaySink>,
        options: PlanEngineOptions,
    ) -> Self {
        Self {
            provider,
            guidance,
            display,
            options,
            dispatcher: OnceLock::new(),
            session: tokio::sync::Mutex::new(PlanSession::default()),
            executing: AtomicBool::new(false),
        }
    }

    /// Wire in the dispatcher once the registry (which holds the plan tools)
    /// is assembled.
    pub fn attach_dispatcher(&self, dispatcher: Arc<Dispatcher>) {
        let _ = self.dispatcher.set(dispatcher);
    }

    fn dispatcher(&self) -> Result<&Arc<Dispatcher>> {
        self.dispatcher
            .get()
            .ok_or_else(|| Error::Internal("dispatcher not attached to plan engine".into()))
    }

    /// Synthesize a plan for `task` and make it current.
    ///
    /// Guidance is consulted at most once, and never for a revision. A
    /// revision folds the prior template into the prompt as the plan to
    /// adjust. Sampling is pinned (temperature 0.0, top_p 0.1) to minimize
    /// structural drift in the template.
    pub async fn create_plan(&self, task: &str, is_revision: bool) -> Result<String> {
        let prior = {
            let session = self.session.lock().await;
            session.current.as_ref().map(|p| p.template.clone())
        };
        let revising = is_revision && prior.is_some();

        let guidance = if self.options.consult_cookbook && !is_revision {
            match &self.guidance {
                Some(source) => {
                    let answer = source.how_to(task).await.map_err(Error::Retrieval)?;
                    self.display.dim(&truncate_for_display(&answer, DISPLAY_BUDGET));
                    Some(answer)
                }
                None => None,
            }
        } else {
            None
        };

        let system = self.synthesis_prompt(guidance.as_deref(), if revising {
            prior.as_deref()
        } else {
            None
        });

        let mut request = ProviderRequest::new(
            self.options.chat_model.clone(),
            vec![Message::system(system), Message::user(task)],
        );
        request.temperature = 0.0;
        request.top_p = Some(0.1);

        let response = self.provider.complete(request).await.map_err(Error::Provider)?;
        let template = strip_code_fence(&response.message.content).to_string();

        let status = if revising {
            PlanStatus::Revised
        } else {
            PlanStatus::Draft
        };
        let plan = Plan::new(task, template.clone(), status);
        info!(plan_id = %plan.id, revision = revising, "Plan synthesized");

        {
            let mut session = self.session.lock().await;
            session.replace(plan);
        }
        self.display.panel("Plan", &template);

        if self.options.auto_execute {
            return self.execute_plan().await;
        }
        if self.options.verbose_create {
            return Ok(format!("{PLAN_CREATED_MESSAGE}\n\n{template}"));
        }
        Ok(PLAN_CREATED_MESSAGE.to_string())
    }

    /// Run the current plan against the live tool set.
    ///
    /// Returns the full produced value; the console shows it truncated.
    pub async fn execute_plan(&self) -> Result<String> {
        // Clone out and release the lock: plan steps may themselves call
        // plan tools, which re-enter this engine.
        let (plan_id, template) = {
            let session = self.session.lock().await;
            match &session.current {
                Some(plan) => (plan.id.clone(), plan.template.clone()),
                None => return Ok(NO_PLAN_MESSAGE.to_string()),
            }
        };

        // A template step that reaches execute_plan through the dispatcher
        // would recurse on its own plan without bound; refuse it so the
        // step fails instead.
        if self.executing.swap(true, Ordering::SeqCst) {
            return Err(Error::Plan(PlanError::AlreadyExecuting));
        }
        let _running = ExecutionGuard(&self.executing);

        let statements = parse(&template).map_err(Error::Plan)?;
        let dispatcher = self.dispatcher()?;
        let output = TemplateExecutor::new(dispatcher)
            .run(&statements)
            .await
            .map_err(Error::Plan)?;

        let mut session = self.session.lock().await;
        if let Some(plan) = session.current.as_mut() {
            if plan.id == plan_id {
                plan.status = PlanStatus::Executed;
            }
        }
        drop(session);

        self.display.dim(&truncate_for_display(&output, DISPLAY_BUDGET));
        Ok(output)
    }

    /// Write the current plan's verbatim template to
    /// `<plans_dir>/<stamp>-<name>` (`.hbp` appended when missing).
    pub async fn save_plan(&self, name: &str) -> Result<String> {
        let session = self.session.lock().await;
        let plan = session
            .current
            .as_ref()
            .ok_or(Error::Plan(PlanError::NoCurrentPlan))?;

        let mut file_name = format!("{}-{}", plan.stamp, name.trim());
        if !file_name.ends_with(".hbp") {
            file_name.push_str(".hbp");
        }
        let path = self.options.plans_dir.join(file_name);

        std::fs::create_dir_all(&self.options.plans_dir).map_err(|e| {
            Error::Plan(PlanError::File {
                path: self.options.plans_dir.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        std::fs::write(&path, &plan.template).map_err(|e| {
            Error::Plan(PlanError::File {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        })?;

        info!(path = %path.display(), "Plan saved");
        Ok(format!("Plan saved to {}.", path.display()))
    }

    /// Read a saved plan, parse-check it, and make it the current Draft.
    pub async fn load_plan(&self, path: &str) -> Result<String> {
        let template = std::fs::read_to_string(path).map_err(|e| {
            Error::Plan(PlanError::File {
                path: path.to_string(),
                reason: e.to_string(),
            })
        })?;

        // Validation is exactly syntactic parseability.
        parse(&template).map_err(Error::Plan)?;

        let stem = std::path::Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("plan");
        let plan = Plan::from_file(stem, template.clone());
        info!(plan_id = %plan.id, "Plan loaded");

        let mut session = self.session.lock().await;
        session.replace(plan);
        drop(session);

        self.display.panel("Plan", &template);
        Ok(format!("Plan loaded from {path}."))
    }

    /// Saved `.hbp` plan paths, sorted. Empty/missing directory is not an
    /// error.
    pub fn list_saved_plans(&self) -> Result<Vec<String>> {
        Ok(list_plan_files(&self.options.plans_dir))
    }

    /// Render the current plan as a shareable mermaid.live flowchart link.
    ///
    /// Disabled feature → empty string, zero model calls.
    pub async fn render_chart(&self) -> Result<String> {
        if !self.options.enable_chart {
            debug!("Chart rendering disabled");
            return Ok(String::new());
        }

        let template = {
            let session = self.session.lock().await;
            match &session.current {
                Some(plan) => plan.template.clone(),
                None => return Ok(NO_PLAN_MESSAGE.to_string()),
            }
        };

        // The conversion runs through the dispatcher so hooks see it (and
        // the interceptor can keep it off the console).
        let call = ToolCall {
            id: format!("chart_{}", Uuid::new_v4()),
            name: "convert_plan_chart".to_string(),
            arguments: serde_json::json!({ "template": template }),
        };
        let result = self.dispatcher()?.invoke(&call).await.map_err(Error::Tool)?;

        let payload = serde_json::json!({
            "code": result.output,
            "editorMode": "code",
            "mermaid": { "theme": "dark" },
        });
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(payload.to_string().as_bytes());
        let link = format!("https://mermaid.live/view#base64:{encoded}");

        self.display.panel("Plan chart", &link);
        Ok(link)
    }

    fn synthesis_prompt(&self, guidance: Option<&str>, prior: Option<&str>) -> String {
        let mut prompt = String::from(
            "You write executable plan templates for an assistant. A template \
             is a sequence of {{ }} blocks:\n\
             - {{!-- step annotation --}}\n\
             - {{set \"name\" <expression>}}\n\
             - {{#each <variable>}} … {{/each}} to repeat for every element\n\
             - {{json <expression>}} to emit a value as the plan result\n\
             - {{tool_name arg=<expression> …}} to invoke a tool\n\
             Expressions are string/number/bool literals, variable paths \
             (this, event.date), and the helpers (array …) and (concat …).\n\
             Only use helpers that exist in the tool catalog below. Do not \
             invent helpers that do not exist. Never call the plan management \
             helpers (create_plan, execute_plan, save_plan, load_plan, \
             list_plans, render_plan_chart) or guidance lookups from a \
             template.\n\nTool catalog:\n",
        );
        if let Some(dispatcher) = self.dispatcher.get() {
            for def in dispatcher.definitions() {
                if NON_TEMPLATE_TOOLS.contains(&def.name.as_str()) {
                    continue;
                }
                prompt.push_str(&format!("- {}: {}\n", def.name, def.description));
            }
        }
        if let Some(guidance) = guidance {
            prompt.push_str(&format!(
                "\nGuidance on how this kind of task is usually carried out:\n{guidance}\n"
            ));
        }
        if let Some(prior) = prior {
            prompt.push_str(&format!(
                "\nThis is the plan to adjust. Extend it according to the \
                 request; do not replace it:\n{prior}\n"
            ));
        }
        prompt.push_str("\nRespond with the template text only.");
        prompt
    }
}

/// Saved `.hbp` plan paths under `plans_dir`, sorted. Empty or missing
/// directory yields an empty list.
pub fn list_plan_files(plans_dir: &std::path::Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(plans_dir) else {
        return Vec::new();
    };
    let mut paths: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "hbp"))
        .map(|path| path.display().to_string())
        .collect();
    paths.sort();
    paths
}

/// Models often wrap the template in a fenced code block; unwrap it.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence.
    match body.find('\n') {
        Some(nl) => body[nl + 1..].trim_end(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use taskhelm_core::display::NullSink;
    use taskhelm_core::error::{ProviderError, ToolError};
    use taskhelm_core::provider::{EmbeddingRequest, EmbeddingResponse, ProviderResponse};
    use taskhelm_core::tool::{Tool, ToolRegistry, ToolResult};

    /// Pops scripted completions; counts every model call.
    struct ScriptedProvider {
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
                calls: AtomicUsize::new(0),
            }
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
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "{{json \"done\"}}".into());
            Ok(ProviderResponse {
                message: Message::assistant(next),
                model: "scripted".into(),
            })
        }
        async fn embed(
            &self,
            _request: EmbeddingRequest,
        ) -> std::result::Result<EmbeddingResponse, ProviderError> {
            Err(ProviderError::NotConfigured("no embeddings".into()))
        }
    }

    struct CountingGuidance {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GuidanceSource for CountingGuidance {
        async fn how_to(&self, _task: &str) -> std::result::Result<String, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Fix the date first, then invite attendees.".into())
        }
    }

    struct MarkerTool {
        hits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for MarkerTool {
        fn name(&self) -> &str {
            "mark"
        }
        fn description(&self) -> &str {
            "Counts invocations"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Ok(ToolResult::text("marked"))
        }
    }

    fn options(dir: &std::path::Path) -> PlanEngineOptions {
        PlanEngineOptions {
            chat_model: "scripted".into(),
            consult_cookbook: true,
            auto_execute: false,
            enable_chart: true,
            verbose_create: false,
            plans_dir: dir.join("plans"),
        }
    }

    struct Fixture {
        engine: Arc<PlanEngine>,
        provider: Arc<ScriptedProvider>,
        guidance: Arc<CountingGuidance>,
        tool_hits: Arc<AtomicUsize>,
        _tmp: tempfile::TempDir,
    }

    fn fixture(responses: Vec<&str>, mutate: impl FnOnce(&mut PlanEngineOptions)) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(responses));
        let guidance = Arc::new(CountingGuidance {
            calls: AtomicUsize::new(0),
        });
        let mut opts = options(tmp.path());
        mutate(&mut opts);

        let engine = Arc::new(PlanEngine::new(
            provider.clone(),
            Some(guidance.clone()),
            Arc::new(NullSink),
            opts,
        ));

        let tool_hits = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(MarkerTool {
            hits: tool_hits.clone(),
        }));
        registry.register(Box::new(crate::tools::ConvertPlanChartTool::new(
            provider.clone(),
            "scripted".into(),
        )));
        engine.attach_dispatcher(Arc::new(Dispatcher::new(Arc::new(registry))));

        Fixture {
            engine,
            provider,
            guidance,
            tool_hits,
            _tmp: tmp,
        }
    }

    const TEMPLATE: &str = "{{!-- greet --}}\n{{mark}}\n{{json \"ready\"}}";

    #[tokio::test]
    async fn guided_create_produces_draft_without_executing() {
        let f = fixture(vec![TEMPLATE], |_| {});
        let reply = f.engine.create_plan("organize a 2-day offsite", false).await.unwrap();

        assert_eq!(reply, PLAN_CREATED_MESSAGE);
        assert_eq!(f.guidance.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.tool_hits.load(Ordering::SeqCst), 0);

        let session = f.engine.session.lock().await;
        let plan = session.current.as_ref().unwrap();
        assert_eq!(plan.status, PlanStatus::Draft);
        assert_eq!(plan.template, TEMPLATE);
    }

    #[tokio::test]
    async fn revision_skips_guidance_and_marks_revised() {
        let f = fixture(vec![TEMPLATE, "{{mark}}\n{{json \"v2\"}}"], |_| {});
        f.engine.create_plan("offsite", false).await.unwrap();
        assert_eq!(f.guidance.calls.load(Ordering::SeqCst), 1);

        f.engine.create_plan("add a dinner", true).await.unwrap();
        assert_eq!(f.guidance.calls.load(Ordering::SeqCst), 1);

        let session = f.engine.session.lock().await;
        assert_eq!(session.current.as_ref().unwrap().status, PlanStatus::Revised);
    }

    #[tokio::test]
    async fn execute_without_plan_returns_nudge() {
        let f = fixture(vec![], |_| {});
        let reply = f.engine.execute_plan().await.unwrap();
        assert_eq!(reply, NO_PLAN_MESSAGE);
    }

    #[tokio::test]
    async fn execute_runs_steps_and_marks_executed() {
        let f = fixture(vec![TEMPLATE], |_| {});
        f.engine.create_plan("offsite", false).await.unwrap();

        let output = f.engine.execute_plan().await.unwrap();
        assert_eq!(output, "ready");
        assert_eq!(f.tool_hits.load(Ordering::SeqCst), 1);

        let session = f.engine.session.lock().await;
        assert_eq!(session.current.as_ref().unwrap().status, PlanStatus::Executed);
    }

    #[tokio::test]
    async fn auto_execute_returns_execution_result() {
        let f = fixture(vec![TEMPLATE], |o| o.auto_execute = true);
        let reply = f.engine.create_plan("offsite", false).await.unwrap();
        assert_eq!(reply, "ready");
        assert_eq!(f.tool_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn verbose_create_carries_template() {
        let f = fixture(vec![TEMPLATE], |o| o.verbose_create = true);
        let reply = f.engine.create_plan("offsite", false).await.unwrap();
        assert!(reply.starts_with(PLAN_CREATED_MESSAGE));
        assert!(reply.contains(TEMPLATE));
    }

    #[tokio::test]
    async fn save_without_plan_is_an_error() {
        let f = fixture(vec![], |_| {});
        let err = f.engine.save_plan("offsite").await.unwrap_err();
        assert!(matches!(err, Error::Plan(PlanError::NoCurrentPlan)));
    }

    #[tokio::test]
    async fn save_then_load_round_trips_byte_identical() {
        let f = fixture(vec![TEMPLATE], |_| {});
        f.engine.create_plan("offsite", false).await.unwrap();
        f.engine.save_plan("offsite").await.unwrap();

        let paths = f.engine.list_saved_plans().unwrap();
        assert_eq!(paths.len(), 1);
        let file_name = std::path::Path::new(&paths[0])
            .file_name()
            .unwrap()
            .to_str()
            .unwrap();
        assert!(file_name.ends_with("-offsite.hbp"));
        let stamp = &file_name[..12];
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));

        f.engine.load_plan(&paths[0]).await.unwrap();
        let session = f.engine.session.lock().await;
        let plan = session.current.as_ref().unwrap();
        assert_eq!(plan.template, TEMPLATE);
        assert_eq!(plan.status, PlanStatus::Draft);
    }

    #[tokio::test]
    async fn load_rejects_malformed_template() {
        let f = fixture(vec![], |_| {});
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("202501011200-bad.hbp");
        std::fs::write(&path, "{{#each items}} never closed").unwrap();

        let err = f.engine.load_plan(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, Error::Plan(PlanError::Parse { .. })));
    }

    #[tokio::test]
    async fn list_on_missing_dir_is_empty() {
        let f = fixture(vec![], |_| {});
        assert!(f.engine.list_saved_plans().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chart_disabled_is_silent_noop() {
        let f = fixture(vec![TEMPLATE], |o| o.enable_chart = false);
        f.engine.create_plan("offsite", false).await.unwrap();
        let before = f.provider.calls.load(Ordering::SeqCst);

        let link = f.engine.render_chart().await.unwrap();
        assert_eq!(link, "");
        assert_eq!(f.provider.calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn chart_without_plan_returns_nudge() {
        let f = fixture(vec![], |_| {});
        let reply = f.engine.render_chart().await.unwrap();
        assert_eq!(reply, NO_PLAN_MESSAGE);
    }

    #[tokio::test]
    async fn chart_link_encodes_dark_theme_payload() {
        let f = fixture(vec![TEMPLATE, "flowchart TD\n  A --> B"], |_| {});
        f.engine.create_plan("offsite", false).await.unwrap();

        let link = f.engine.render_chart().await.unwrap();
        let encoded = link
            .strip_prefix("https://mermaid.live/view#base64:")
            .unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(payload["code"], "flowchart TD\n  A --> B");
        assert_eq!(payload["editorMode"], "code");
        assert_eq!(payload["mermaid"]["theme"], "dark");
    }

    #[tokio::test]
    async fn template_reentering_execution_fails_the_step() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec!["{{execute_plan}}"]));
        let guidance = Arc::new(CountingGuidance {
            calls: AtomicUsize::new(0),
        });
        let engine = Arc::new(PlanEngine::new(
            provider.clone(),
            Some(guidance),
            Arc::new(NullSink),
            options(tmp.path()),
        ));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(crate::tools::ExecutePlanTool::new(engine.clone())));
        engine.attach_dispatcher(Arc::new(Dispatcher::new(Arc::new(registry))));

        engine.create_plan("loop forever", false).await.unwrap();
        let err = engine.execute_plan().await.unwrap_err();
        assert!(
            matches!(err, Error::Plan(PlanError::StepFailed { ref step, .. }) if step == "execute_plan")
        );

        // The in-flight flag clears; a well-formed follow-up plan still runs.
        engine.create_plan("something sane", false).await.unwrap();
        assert_eq!(engine.execute_plan().await.unwrap(), "done");
    }

    #[test]
    fn synthesis_prompt_omits_plan_lifecycle_helpers() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let engine = Arc::new(PlanEngine::new(
            provider,
            None,
            Arc::new(NullSink),
            options(tmp.path()),
        ));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(MarkerTool {
            hits: Arc::new(AtomicUsize::new(0)),
        }));
        registry.register(Box::new(crate::tools::CreatePlanTool::new(engine.clone())));
        registry.register(Box::new(crate::tools::ExecutePlanTool::new(engine.clone())));
        registry.register(Box::new(crate::tools::ListPlansTool::new(engine.clone())));
        engine.attach_dispatcher(Arc::new(Dispatcher::new(Arc::new(registry))));

        let prompt = engine.synthesis_prompt(None, None);
        assert!(prompt.contains("- mark:"));
        assert!(!prompt.contains("- create_plan:"));
        assert!(!prompt.contains("- execute_plan:"));
        assert!(!prompt.contains("- list_plans:"));
        assert!(prompt.contains("Never call the plan management helpers"));
    }

    #[test]
    fn strip_code_fence_unwraps_fenced_blocks() {
        assert_eq!(strip_code_fence("{{json 1}}"), "{{json 1}}");
        assert_eq!(strip_code_fence("```\n{{json 1}}\n```"), "{{json 1}}");
        assert_eq!(strip_code_fence("```handlebars\n{{json 1}}\n```"), "{{json 1}}");
    }
}
