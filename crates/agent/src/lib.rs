//! The TaskHelm conversation layer: the chat loop that drives model turns
//! and the interceptor that audits every tool invocation.

pub mod interceptor;
pub mod loop_runner;

pub use interceptor::{CallInterceptor, PlanPicker};
pub use loop_runner::ChatLoop;
