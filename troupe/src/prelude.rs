//! Convenience re-exports of the types most callers need.

pub use crate::agent::{Agent, AgentBuilder, ToolUseBehavior};
pub use crate::error::{Error, Result};
pub use crate::guardrail::{
    GuardrailOutput, InputGuardrail, InputGuardrailCheck, OutputGuardrail, OutputGuardrailCheck,
};
pub use crate::handoff::{Handoff, HandoffInputData};
pub use crate::hooks::{AgentHooks, RunHooks};
pub use crate::items::{Item, RunInput, RunItem, RunItemKind};
pub use crate::model::{Model, ModelProvider, ModelSettings, ToolChoice};
pub use crate::result::{RunResult, RunResultStreaming, StreamEvent};
pub use crate::runner::{RunConfig, Runner};
pub use crate::schema::AgentOutputSchema;
pub use crate::tool::{FunctionTool, Tool};
pub use crate::usage::Usage;
