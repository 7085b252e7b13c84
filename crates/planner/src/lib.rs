//! Plan lifecycle for TaskHelm: synthesis, revision, persistence (`.hbp`
//! files), sequential execution through the tool dispatcher, and flowchart
//! rendering.

pub mod engine;
pub mod plan;
pub mod template;
pub mod tools;

pub use engine::{
    list_plan_files, GuidanceSource, PlanEngine, PlanEngineOptions, NO_PLAN_MESSAGE,
    PLAN_CREATED_MESSAGE,
};
pub use plan::{Plan, PlanSession, PlanStatus};
pub use tools::{
    ConvertPlanChartTool, CreatePlanTool, ExecutePlanTool, ListPlansTool, LoadPlanTool,
    RenderPlanChartTool, SavePlanTool,
};
