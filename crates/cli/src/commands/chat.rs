//! `taskhelm chat` — the interactive assistant session.

use crate::console::{ConsoleSink, DialoguerPicker};
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use taskhelm_agent::{CallInterceptor, ChatLoop};
use taskhelm_config::AppConfig;
use taskhelm_core::display::DisplaySink;
use taskhelm_core::hook::{Dispatcher, InvocationHook};
use taskhelm_core::provider::Provider;
use taskhelm_core::tool::{ToolCall, ToolRegistry};
use taskhelm_planner::{
    ConvertPlanChartTool, CreatePlanTool, ExecutePlanTool, GuidanceSource, ListPlansTool,
    LoadPlanTool, PlanEngine, PlanEngineOptions, RenderPlanChartTool, SavePlanTool,
};
use taskhelm_retrieval::{
    KnowledgeRetriever, ProcessGuidanceTool, RetrieveDocsTool, VectorStore,
};
use taskhelm_tools::{ListFunctionsTool, SendEmailTool, SmtpSettings};
use tracing::warn;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set the environment variable:");
        eprintln!("    export TASKHELM_API_KEY='sk-...'");
        eprintln!();
        eprintln!("  Or add it to taskhelm.toml under [provider].");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let display: Arc<dyn DisplaySink> = Arc::new(ConsoleSink);
    let provider: Arc<dyn Provider> = Arc::new(taskhelm_providers::OpenAiCompatProvider::new(
        "openai",
        &config.provider.base_url,
        config.provider.api_key.clone().unwrap_or_default(),
    )?);

    // Ingestion completes before the loop starts; ask() is never racing it.
    let retriever = Arc::new(KnowledgeRetriever::new(
        provider.clone(),
        VectorStore::new(&config.retrieval.index_dir),
        &config.provider.chat_model,
        &config.provider.embedding_model,
        config.retrieval.top_k,
    ));
    retriever
        .ingest(
            &config.retrieval.docs_file,
            &config.retrieval.cookbook_file,
            config.retrieval.reimport,
        )
        .await?;

    let engine = Arc::new(PlanEngine::new(
        provider.clone(),
        Some(retriever.clone() as Arc<dyn GuidanceSource>),
        display.clone(),
        PlanEngineOptions {
            chat_model: config.provider.chat_model.clone(),
            consult_cookbook: config.planner.consult_cookbook,
            auto_execute: config.planner.auto_execute,
            enable_chart: config.planner.enable_chart,
            verbose_create: config.planner.verbose_create,
            plans_dir: config.planner.plans_dir.clone(),
        },
    ));

    // Explicit registration table — every capability the model or a plan
    // step can reach is listed here.
    let mut registry = ToolRegistry::new();
    taskhelm_tools::register_action_tools(&mut registry, email_tool(&config));
    registry.register(Box::new(RetrieveDocsTool::new(retriever.clone())));
    registry.register(Box::new(ProcessGuidanceTool::new(retriever.clone())));
    registry.register(Box::new(CreatePlanTool::new(engine.clone())));
    registry.register(Box::new(ExecutePlanTool::new(engine.clone())));
    registry.register(Box::new(SavePlanTool::new(engine.clone())));
    registry.register(Box::new(LoadPlanTool::new(engine.clone())));
    registry.register(Box::new(ListPlansTool::new(engine.clone())));
    registry.register(Box::new(RenderPlanChartTool::new(engine.clone())));
    registry.register(Box::new(ConvertPlanChartTool::new(
        provider.clone(),
        config.provider.chat_model.clone(),
    )));
    let catalog = registry.definitions();
    registry.register(Box::new(ListFunctionsTool::new(catalog, display.clone())));

    let interceptor: Arc<dyn InvocationHook> = Arc::new(CallInterceptor::new(
        display.clone(),
        Arc::new(DialoguerPicker),
    ));
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry)).with_hook(interceptor));
    engine.attach_dispatcher(dispatcher.clone());

    let mut chat = ChatLoop::new(
        provider,
        dispatcher.clone(),
        display.clone(),
        &config.provider.chat_model,
        &config.assistant.name,
        &config.assistant.language,
    )
    .with_max_tokens(config.provider.max_tokens);

    if config.assistant.ask_profile_on_start {
        if let Some(profile) = ask_profile()? {
            chat = chat.with_profile(profile);
        }
    }

    println!();
    println!("  {}", format!("{} — console planning assistant", config.assistant.name).bold());
    println!("  Model: {}", config.provider.chat_model);
    println!("  Type your request and press Enter. 'exit' or 'quit' to leave.");
    println!();

    if config.assistant.print_catalog_on_start {
        let call = ToolCall {
            id: "startup_catalog".into(),
            name: "list_functions".into(),
            arguments: serde_json::json!({}),
        };
        if let Err(e) = dispatcher.invoke(&call).await {
            warn!(error = %e, "Could not render the function catalog");
        }
    }

    let stdin = std::io::stdin();
    loop {
        print!("{}", "  You > ".green().bold());
        std::io::stdout().flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        print!("{}", format!("  {} > ", config.assistant.name).cyan().bold());
        std::io::stdout().flush()?;
        match chat.process(input).await {
            Ok(_) => println!(),
            Err(e) => {
                println!();
                eprintln!("  {}", format!("Error: {e}").red());
            }
        }
    }

    println!("  Goodbye!");
    Ok(())
}

fn email_tool(config: &AppConfig) -> Option<SendEmailTool> {
    let password = config.smtp.password.clone()?;
    if config.smtp.username.is_empty() || config.smtp.sender.is_empty() {
        warn!("SMTP username/sender not configured; send_email disabled");
        return None;
    }
    match SendEmailTool::new(&SmtpSettings {
        host: config.smtp.host.clone(),
        port: config.smtp.port,
        username: config.smtp.username.clone(),
        password,
        sender: config.smtp.sender.clone(),
    }) {
        Ok(tool) => Some(tool),
        Err(e) => {
            warn!(error = %e, "SMTP setup failed; send_email disabled");
            None
        }
    }
}

/// Gather operator name and preferences before the first turn.
fn ask_profile() -> Result<Option<String>, Box<dyn std::error::Error>> {
    let name: String = dialoguer::Input::new()
        .with_prompt("Your name")
        .allow_empty(true)
        .interact_text()?;
    if name.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(format!("The operator's name is {}.", name.trim())))
}
