//! Agent configuration.
//!
//! An [`Agent`] is a value: instructions, tools, handoff targets, guardrails,
//! an optional structured output schema, and model tuning. Agents are built
//! once through [`AgentBuilder`] and shared as `Arc<Agent>`; the run loop
//! holds only the currently active reference, so cyclic handoff graphs
//! (A → B → A) are plain `Arc` clones and are never walked.
//!
//! # Example
//!
//! ```rust,ignore
//! let support = Agent::builder("Support")
//!     .instructions("You answer support questions.")
//!     .tool(lookup_order.into())
//!     .build();
//!
//! let triage = Agent::builder("Triage")
//!     .instructions("Route the user to the right agent.")
//!     .handoff_to(Arc::clone(&support))
//!     .build();
//!
//! let result = Runner::run(triage, "Where is my order?").await?;
//! ```

mod builder;

pub use builder::AgentBuilder;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::guardrail::{InputGuardrail, OutputGuardrail};
use crate::handoff::Handoff;
use crate::hooks::AgentHooks;
use crate::items::RunInput;
use crate::model::{ModelRef, ModelSettings};
use crate::runner::{RunConfig, Runner};
use crate::schema::AgentOutputSchema;
use crate::tool::{FunctionTool, FunctionToolResult, Tool};

/// System instructions of an agent: a literal string or a function of the
/// agent evaluated at each turn.
#[derive(Clone)]
pub enum Instructions {
    /// A literal instruction string.
    Text(String),
    /// Instructions computed from the agent at turn time.
    Dynamic(Arc<dyn Fn(&Agent) -> String + Send + Sync>),
}

impl std::fmt::Debug for Instructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// The decision of a custom tool-use behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolsToFinalOutput {
    /// Whether the tool results constitute the run's final output.
    pub is_final_output: bool,
    /// The final output value, required when `is_final_output` is `true`.
    pub final_output: Option<Value>,
}

impl ToolsToFinalOutput {
    /// Declare the given value as the final output.
    #[must_use]
    pub const fn done(value: Value) -> Self {
        Self {
            is_final_output: true,
            final_output: Some(value),
        }
    }

    /// Keep running: the tool results are informational.
    #[must_use]
    pub const fn run_again() -> Self {
        Self {
            is_final_output: false,
            final_output: None,
        }
    }
}

/// Custom decision logic for [`ToolUseBehavior::Custom`].
#[async_trait]
pub trait ToolUseDecider: Send + Sync {
    /// Decide whether this turn's function tool results end the run.
    async fn decide(&self, agent: &Agent, results: &[FunctionToolResult])
    -> Result<ToolsToFinalOutput>;
}

/// Policy deciding whether function tool results become the final output or
/// the model is invoked again with them.
#[derive(Clone)]
pub enum ToolUseBehavior {
    /// Tool results are informational; the model is always invoked again.
    RunLlmAgain,
    /// The first function tool result becomes the final output.
    StopOnFirstTool,
    /// The first result of a tool named in the set becomes the final output.
    StopAtTools(Vec<String>),
    /// Delegate the decision to custom logic.
    Custom(Arc<dyn ToolUseDecider>),
}

impl std::fmt::Debug for ToolUseBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RunLlmAgain => f.write_str("RunLlmAgain"),
            Self::StopOnFirstTool => f.write_str("StopOnFirstTool"),
            Self::StopAtTools(names) => f.debug_tuple("StopAtTools").field(names).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Default for ToolUseBehavior {
    fn default() -> Self {
        Self::RunLlmAgain
    }
}

/// A configured agent: instructions + tools + handoffs + guardrails +
/// output schema + model tuning.
pub struct Agent {
    pub(crate) name: String,
    pub(crate) instructions: Option<Instructions>,
    pub(crate) handoff_description: Option<String>,
    pub(crate) tools: Vec<Tool>,
    pub(crate) agent_handoffs: Vec<Arc<Agent>>,
    pub(crate) handoffs: Vec<Handoff>,
    pub(crate) input_guardrails: Vec<InputGuardrail>,
    pub(crate) output_guardrails: Vec<OutputGuardrail>,
    pub(crate) output_schema: Option<AgentOutputSchema>,
    pub(crate) model: Option<ModelRef>,
    pub(crate) model_settings: ModelSettings,
    pub(crate) prompt: Option<Value>,
    pub(crate) tool_use_behavior: ToolUseBehavior,
    pub(crate) reset_tool_choice: bool,
    pub(crate) hooks: Option<Arc<dyn AgentHooks>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools", &self.tools.len())
            .field("handoffs", &(self.handoffs.len() + self.agent_handoffs.len()))
            .field("structured_output", &self.output_schema.is_some())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create a builder for an agent with the given name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    /// The agent's name, also used in default handoff tool names.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The short description used when this agent is a handoff target.
    #[must_use]
    pub fn handoff_description(&self) -> Option<&str> {
        self.handoff_description.as_deref()
    }

    /// Resolve the system instructions for the current turn.
    #[must_use]
    pub fn resolve_instructions(&self) -> Option<String> {
        match &self.instructions {
            Some(Instructions::Text(text)) => Some(text.clone()),
            Some(Instructions::Dynamic(f)) => Some(f(self)),
            None => None,
        }
    }

    /// The agent's declared tools, before enable-predicate filtering.
    #[must_use]
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Explicit handoff descriptors.
    #[must_use]
    pub fn handoffs(&self) -> &[Handoff] {
        &self.handoffs
    }

    /// Peer agents lifted to handoffs at run time.
    #[must_use]
    pub fn agent_handoffs(&self) -> &[Arc<Agent>] {
        &self.agent_handoffs
    }

    /// Input guardrails, in declaration order.
    #[must_use]
    pub fn input_guardrails(&self) -> &[InputGuardrail] {
        &self.input_guardrails
    }

    /// Output guardrails, in declaration order.
    #[must_use]
    pub fn output_guardrails(&self) -> &[OutputGuardrail] {
        &self.output_guardrails
    }

    /// The structured output schema, if any.
    #[must_use]
    pub fn output_schema(&self) -> Option<&AgentOutputSchema> {
        self.output_schema.as_ref()
    }

    /// The agent's model binding, if any.
    #[must_use]
    pub fn model(&self) -> Option<&ModelRef> {
        self.model.as_ref()
    }

    /// Model tuning knobs.
    #[must_use]
    pub fn model_settings(&self) -> &ModelSettings {
        &self.model_settings
    }

    /// Server-stored prompt reference forwarded to the model, if any.
    #[must_use]
    pub fn prompt(&self) -> Option<&Value> {
        self.prompt.as_ref()
    }

    /// The tool-use behavior policy.
    #[must_use]
    pub fn tool_use_behavior(&self) -> &ToolUseBehavior {
        &self.tool_use_behavior
    }

    /// Whether a forced tool choice is cleared after the first tool use.
    #[must_use]
    pub const fn reset_tool_choice(&self) -> bool {
        self.reset_tool_choice
    }

    /// Per-agent lifecycle hooks.
    #[must_use]
    pub fn hooks(&self) -> Option<&dyn AgentHooks> {
        self.hooks.as_deref()
    }

    /// Expose this agent as a function tool.
    ///
    /// Unlike a handoff, the calling agent keeps control: the wrapped agent
    /// runs a nested blocking run on the provided `input` string and its
    /// message text is returned as the tool output.
    #[must_use]
    pub fn as_tool(
        self: Arc<Self>,
        tool_name: Option<String>,
        tool_description: Option<String>,
    ) -> Tool {
        let name = tool_name.unwrap_or_else(|| {
            Handoff::default_tool_name(self.name()).replace("transfer_to_", "run_")
        });
        let description = tool_description
            .or_else(|| self.handoff_description.clone())
            .unwrap_or_default();
        let target = self;
        let parameters = serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string" }
            },
            "required": ["input"],
            "additionalProperties": false,
        });
        FunctionTool::new(name, description, parameters, move |args: String| {
            let target = Arc::clone(&target);
            async move {
                let input: Value = serde_json::from_str(&args).unwrap_or(Value::Null);
                let text = input
                    .get("input")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                let result =
                    Runner::run_with_config(target, RunInput::from(text), RunConfig::default())
                        .await?;
                Ok(crate::items::text_message_outputs(&result.new_items))
            }
        })
        .into()
    }
}
