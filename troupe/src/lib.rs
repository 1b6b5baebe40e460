//! Troupe is a runtime for multi-turn conversations between a user, a cast
//! of configurable agents, and a model backend.
//!
//! An [`Agent`] carries instructions, callable tools, optional structured
//! output, safety guardrails, and handoffs to peer agents. The [`Runner`]
//! loops: invoke the model, interpret its output, then either return a
//! final answer, execute tool calls and loop again, or transfer control to
//! a peer agent and loop again.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use troupe::prelude::*;
//!
//! let weather = FunctionTool::typed::<WeatherArgs, _, _>(
//!     "get_weather",
//!     "Look up the weather for a city.",
//!     |args| async move { Ok(format!("Sunny in {}", args.city)) },
//! );
//!
//! let agent = Agent::builder("Assistant")
//!     .instructions("You are a helpful assistant.")
//!     .model("gpt-4.1")
//!     .tool(weather)
//!     .build();
//!
//! let result = Runner::run(agent, "What's the weather in Oslo?").await?;
//! println!("{}", result.final_output);
//! ```
//!
//! Streaming runs execute on a background task and surface events through
//! [`RunResultStreaming::stream_events`](result::RunResultStreaming::stream_events);
//! see the [`result`] module.

pub mod agent;
pub mod error;
pub mod guardrail;
pub mod handoff;
pub mod hooks;
pub mod items;
pub mod model;
pub mod prelude;
pub mod result;
pub mod runner;
pub mod schema;
pub mod tool;
pub mod usage;

pub use agent::{
    Agent, AgentBuilder, Instructions, ToolUseBehavior, ToolUseDecider, ToolsToFinalOutput,
};
pub use error::{Error, Result, RunErrorDetails};
pub use guardrail::{
    GuardrailOutput, InputGuardrail, InputGuardrailCheck, InputGuardrailResult, OutputGuardrail,
    OutputGuardrailCheck, OutputGuardrailResult,
};
pub use handoff::{Handoff, HandoffInputData, HandoffInputFilter};
pub use hooks::{AgentHooks, NoopRunHooks, RunHooks};
pub use items::{ContentPart, Item, Role, RunInput, RunItem, RunItemKind};
pub use model::{
    ApiFlavor, Model, ModelProvider, ModelRef, ModelRequest, ModelResponse, ModelSettings,
    ToolChoice,
};
pub use result::{CancelHandle, RunResult, RunResultStreaming, StreamEvent};
pub use runner::{DEFAULT_MAX_TURNS, RunConfig, Runner};
pub use schema::AgentOutputSchema;
pub use tool::{FunctionTool, FunctionToolResult, Tool, ToolDefinition};
pub use usage::Usage;
