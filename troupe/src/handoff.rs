//! Handoffs — delegation of a run to a peer agent.
//!
//! A [`Handoff`] is advertised to the model as a regular tool. When the
//! model calls it, the runtime transfers control: the named peer becomes the
//! active agent and the loop continues with it. The conversation the new
//! agent sees can be rewritten on the way through an input filter.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::agent::Agent;
use crate::error::Result;
use crate::items::{RunInput, RunItem};
use crate::tool::{EnabledFn, ToolDefinition};

/// The conversation state visible to a handoff input filter.
#[derive(Debug, Clone)]
pub struct HandoffInputData {
    /// The run's original input.
    pub input_history: RunInput,
    /// Items generated before the turn that triggered the handoff.
    pub pre_handoff_items: Vec<RunItem>,
    /// Items generated during the triggering turn.
    pub new_items: Vec<RunItem>,
}

/// A function that rewrites the conversation handed to the next agent.
pub type HandoffInputFilter = Arc<dyn Fn(HandoffInputData) -> HandoffInputData + Send + Sync>;

/// Boxed async resolver producing the agent that receives control.
pub type HandoffInvokeFn =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Arc<Agent>>> + Send + Sync>;

/// A delegation descriptor targeting a peer agent.
#[derive(Clone)]
pub struct Handoff {
    /// Name of the tool the model calls to trigger this handoff.
    pub tool_name: String,
    /// Description of the tool shown to the model.
    pub tool_description: String,
    /// JSON Schema of the handoff's arguments.
    pub input_schema: Value,
    /// Name of the target agent.
    pub agent_name: String,
    /// Whether the schema is declared in strict mode.
    pub strict_json_schema: bool,
    on_invoke: HandoffInvokeFn,
    input_filter: Option<HandoffInputFilter>,
    is_enabled: Option<EnabledFn>,
}

impl Handoff {
    /// Lift an agent reference into a handoff with the default tool name,
    /// description, and empty-object input schema.
    #[must_use]
    pub fn from_agent(agent: Arc<Agent>) -> Self {
        let agent_name = agent.name().to_owned();
        let tool_name = Self::default_tool_name(&agent_name);
        let tool_description = Self::default_tool_description(&agent);
        let target = Arc::clone(&agent);
        Self {
            tool_name,
            tool_description,
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false,
                "required": [],
            }),
            agent_name,
            strict_json_schema: true,
            on_invoke: Arc::new(move |_args| {
                let target = Arc::clone(&target);
                Box::pin(async move { Ok(target) })
            }),
            input_filter: None,
            is_enabled: None,
        }
    }

    /// The default tool name for a handoff to the named agent.
    #[must_use]
    pub fn default_tool_name(agent_name: &str) -> String {
        format!("transfer_to_{}", function_style(agent_name))
    }

    /// The default tool description for a handoff to `agent`.
    #[must_use]
    pub fn default_tool_description(agent: &Agent) -> String {
        let mut description = format!(
            "Handoff to the {} agent to handle the request.",
            agent.name()
        );
        if let Some(extra) = agent.handoff_description() {
            description.push(' ');
            description.push_str(extra);
        }
        description
    }

    /// Override the tool name.
    #[must_use]
    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self
    }

    /// Override the tool description.
    #[must_use]
    pub fn with_tool_description(mut self, description: impl Into<String>) -> Self {
        self.tool_description = description.into();
        self
    }

    /// Set a non-empty input schema for the handoff payload.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Attach an input filter rewriting the conversation the target sees.
    ///
    /// A handoff-local filter takes precedence over the run-level filter.
    #[must_use]
    pub fn with_input_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(HandoffInputData) -> HandoffInputData + Send + Sync + 'static,
    {
        self.input_filter = Some(Arc::new(f));
        self
    }

    /// Attach a dynamic enable-predicate evaluated against the owning agent.
    #[must_use]
    pub fn with_enabled<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<Agent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        self.is_enabled = Some(Arc::new(move |agent| Box::pin(f(agent))));
        self
    }

    /// Override how the target agent is resolved from the call's arguments.
    #[must_use]
    pub fn with_on_invoke<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<Agent>>> + Send + 'static,
    {
        self.on_invoke = Arc::new(move |args| Box::pin(f(args)));
        self
    }

    /// Resolve the agent that receives control.
    pub(crate) async fn invoke(&self, arguments: String) -> Result<Arc<Agent>> {
        (self.on_invoke)(arguments).await
    }

    pub(crate) fn input_filter(&self) -> Option<&HandoffInputFilter> {
        self.input_filter.as_ref()
    }

    pub(crate) async fn enabled_for(&self, agent: &Arc<Agent>) -> Result<bool> {
        match &self.is_enabled {
            Some(f) => f(Arc::clone(agent)).await,
            None => Ok(true),
        }
    }

    /// The describe-form advertised to the model.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.tool_name.clone(),
            description: self.tool_description.clone(),
            parameters: self.input_schema.clone(),
            strict: self.strict_json_schema,
        }
    }
}

impl std::fmt::Debug for Handoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handoff")
            .field("tool_name", &self.tool_name)
            .field("agent_name", &self.agent_name)
            .field("has_filter", &self.input_filter.is_some())
            .finish_non_exhaustive()
    }
}

/// Transform an agent name into function-call style: spaces become
/// underscores, other punctuation is stripped, letters are lowercased.
fn function_style(name: &str) -> String {
    name.chars()
        .filter_map(|c| {
            if c == ' ' || c == '-' {
                Some('_')
            } else if c.is_ascii_alphanumeric() || c == '_' {
                Some(c.to_ascii_lowercase())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;

    #[test]
    fn default_tool_name_is_sanitized() {
        assert_eq!(Handoff::default_tool_name("Billing"), "transfer_to_billing");
        assert_eq!(
            Handoff::default_tool_name("Order Support v2"),
            "transfer_to_order_support_v2"
        );
        assert_eq!(
            Handoff::default_tool_name("café-agent!"),
            "transfer_to_caf_agent"
        );
    }

    #[test]
    fn from_agent_uses_handoff_description() {
        let agent = Agent::builder("Refunds")
            .handoff_description("Handles refund requests.")
            .build();
        let handoff = Handoff::from_agent(agent);

        assert_eq!(handoff.tool_name, "transfer_to_refunds");
        assert_eq!(handoff.agent_name, "Refunds");
        assert_eq!(
            handoff.tool_description,
            "Handoff to the Refunds agent to handle the request. Handles refund requests."
        );
    }

    #[test]
    fn invoke_returns_the_target_agent() {
        let agent = Agent::builder("Target").build();
        let handoff = Handoff::from_agent(Arc::clone(&agent));
        let resolved = tokio_test::block_on(handoff.invoke("{}".into())).unwrap();
        assert_eq!(resolved.name(), agent.name());
    }
}
