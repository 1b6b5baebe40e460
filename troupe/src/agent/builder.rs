//! Fluent builder for [`Agent`].

use std::sync::Arc;

use crate::guardrail::{InputGuardrail, OutputGuardrail};
use crate::handoff::Handoff;
use crate::hooks::AgentHooks;
use crate::model::{Model, ModelRef, ModelSettings};
use crate::schema::AgentOutputSchema;
use crate::tool::Tool;

use super::{Agent, Instructions, ToolUseBehavior};

/// Builder for [`Agent`].
///
/// # Example
///
/// ```rust,ignore
/// let agent = Agent::builder("Assistant")
///     .instructions("You are helpful.")
///     .model("gpt-4.1")
///     .tool(my_tool.into())
///     .build();
/// ```
pub struct AgentBuilder {
    name: String,
    instructions: Option<Instructions>,
    handoff_description: Option<String>,
    tools: Vec<Tool>,
    agent_handoffs: Vec<Arc<Agent>>,
    handoffs: Vec<Handoff>,
    input_guardrails: Vec<InputGuardrail>,
    output_guardrails: Vec<OutputGuardrail>,
    output_schema: Option<AgentOutputSchema>,
    model: Option<ModelRef>,
    model_settings: ModelSettings,
    prompt: Option<serde_json::Value>,
    tool_use_behavior: ToolUseBehavior,
    reset_tool_choice: bool,
    hooks: Option<Arc<dyn AgentHooks>>,
}

impl std::fmt::Debug for AgentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentBuilder")
            .field("name", &self.name)
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl AgentBuilder {
    /// Create a builder for an agent with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: None,
            handoff_description: None,
            tools: Vec::new(),
            agent_handoffs: Vec::new(),
            handoffs: Vec::new(),
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            output_schema: None,
            model: None,
            model_settings: ModelSettings::default(),
            prompt: None,
            tool_use_behavior: ToolUseBehavior::RunLlmAgain,
            reset_tool_choice: true,
            hooks: None,
        }
    }

    /// Set literal system instructions.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(Instructions::Text(instructions.into()));
        self
    }

    /// Set system instructions computed from the agent at turn time.
    #[must_use]
    pub fn instructions_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Agent) -> String + Send + Sync + 'static,
    {
        self.instructions = Some(Instructions::Dynamic(Arc::new(f)));
        self
    }

    /// Set the description used when this agent is a handoff target.
    #[must_use]
    pub fn handoff_description(mut self, description: impl Into<String>) -> Self {
        self.handoff_description = Some(description.into());
        self
    }

    /// Add a tool.
    #[must_use]
    pub fn tool(mut self, tool: impl Into<Tool>) -> Self {
        self.tools.push(tool.into());
        self
    }

    /// Add multiple tools.
    #[must_use]
    pub fn tools(mut self, tools: impl IntoIterator<Item = Tool>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Add a peer agent as a handoff target with default tool naming.
    #[must_use]
    pub fn handoff_to(mut self, agent: Arc<Agent>) -> Self {
        self.agent_handoffs.push(agent);
        self
    }

    /// Add an explicit handoff descriptor.
    #[must_use]
    pub fn handoff(mut self, handoff: Handoff) -> Self {
        self.handoffs.push(handoff);
        self
    }

    /// Add an input guardrail.
    #[must_use]
    pub fn input_guardrail(mut self, guardrail: InputGuardrail) -> Self {
        self.input_guardrails.push(guardrail);
        self
    }

    /// Add an output guardrail.
    #[must_use]
    pub fn output_guardrail(mut self, guardrail: OutputGuardrail) -> Self {
        self.output_guardrails.push(guardrail);
        self
    }

    /// Require structured output matching the given schema.
    #[must_use]
    pub fn output_schema(mut self, schema: AgentOutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Bind a model by name, resolved through the configured provider.
    #[must_use]
    pub fn model(mut self, name: impl Into<String>) -> Self {
        self.model = Some(ModelRef::Named(name.into()));
        self
    }

    /// Bind a concrete model instance.
    #[must_use]
    pub fn model_instance(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(ModelRef::Instance(model));
        self
    }

    /// Set model tuning knobs.
    #[must_use]
    pub fn model_settings(mut self, settings: ModelSettings) -> Self {
        self.model_settings = settings;
        self
    }

    /// Set a server-stored prompt reference forwarded to the model.
    #[must_use]
    pub fn prompt(mut self, prompt: serde_json::Value) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Set the tool-use behavior policy (default: run the model again).
    #[must_use]
    pub fn tool_use_behavior(mut self, behavior: ToolUseBehavior) -> Self {
        self.tool_use_behavior = behavior;
        self
    }

    /// Control whether a forced tool choice is cleared once any tool has
    /// been used (default: `true`).
    #[must_use]
    pub const fn reset_tool_choice(mut self, reset: bool) -> Self {
        self.reset_tool_choice = reset;
        self
    }

    /// Attach per-agent lifecycle hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn AgentHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Finish the configuration.
    #[must_use]
    pub fn build(self) -> Arc<Agent> {
        Arc::new(Agent {
            name: self.name,
            instructions: self.instructions,
            handoff_description: self.handoff_description,
            tools: self.tools,
            agent_handoffs: self.agent_handoffs,
            handoffs: self.handoffs,
            input_guardrails: self.input_guardrails,
            output_guardrails: self.output_guardrails,
            output_schema: self.output_schema,
            model: self.model,
            model_settings: self.model_settings,
            prompt: self.prompt,
            tool_use_behavior: self.tool_use_behavior,
            reset_tool_choice: self.reset_tool_choice,
            hooks: self.hooks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let agent = Agent::builder("A").build();
        assert_eq!(agent.name(), "A");
        assert!(agent.resolve_instructions().is_none());
        assert!(agent.reset_tool_choice());
        assert!(agent.output_schema().is_none());
    }

    #[test]
    fn dynamic_instructions_see_the_agent() {
        let agent = Agent::builder("Helper")
            .instructions_fn(|a| format!("You are {}.", a.name()))
            .build();
        assert_eq!(agent.resolve_instructions().as_deref(), Some("You are Helper."));
    }
}
