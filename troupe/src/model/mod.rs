//! Model interface and process-wide model defaults.
//!
//! The runtime never speaks HTTP itself: it drives a [`Model`] through two
//! operations, one-shot [`Model::get_response`] and streamed
//! [`Model::stream_response`], and resolves named models through a
//! [`ModelProvider`]. Concrete backends (chat-completions or responses
//! flavored) live outside this crate; the [`FakeModel`](fake::FakeModel) is
//! provided for tests.

pub mod events;
pub mod fake;

use std::pin::Pin;
use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::items::Item;
use crate::schema::AgentOutputSchema;
use crate::tool::ToolDefinition;
use crate::usage::Usage;

use events::ResponseStreamEvent;

/// How the model is told to use tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides freely.
    Auto,
    /// The model must call some tool.
    Required,
    /// The model must not call tools.
    None,
    /// The model must call the named tool.
    Tool(String),
    /// The model must call the named MCP server (and optionally tool).
    Mcp {
        /// Label of the MCP server.
        server_label: String,
        /// Specific tool on that server, if constrained.
        name: Option<String>,
    },
}

impl ToolChoice {
    /// Returns `true` for the forced choices that the tool-use tracker may
    /// clear after a tool has run (`required`, `none`, or a specific tool).
    #[must_use]
    pub const fn is_forced(&self) -> bool {
        !matches!(self, Self::Auto)
    }
}

/// Model tuning knobs.
///
/// Agent-level settings are resolved against an optional run-level override:
/// any field the override sets wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSettings {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Tool choice constraint.
    pub tool_choice: Option<ToolChoice>,
    /// Whether the model may emit several tool calls in one response.
    pub parallel_tool_calls: Option<bool>,
}

impl ModelSettings {
    /// Merge a run-level override over these settings.
    #[must_use]
    pub fn resolve(&self, overrides: Option<&ModelSettings>) -> ModelSettings {
        let Some(overrides) = overrides else {
            return self.clone();
        };
        ModelSettings {
            temperature: overrides.temperature.or(self.temperature),
            top_p: overrides.top_p.or(self.top_p),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            tool_choice: overrides
                .tool_choice
                .clone()
                .or_else(|| self.tool_choice.clone()),
            parallel_tool_calls: overrides.parallel_tool_calls.or(self.parallel_tool_calls),
        }
    }
}

/// One model invocation, assembled fresh each turn.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Resolved system instructions, if any.
    pub system_instructions: Option<String>,
    /// Conversation input: original input items plus generated items in
    /// input form.
    pub input: Vec<Item>,
    /// Resolved tuning knobs.
    pub model_settings: ModelSettings,
    /// Effective tools of the active agent.
    pub tools: Vec<ToolDefinition>,
    /// Effective handoffs of the active agent, advertised as tools.
    pub handoffs: Vec<ToolDefinition>,
    /// Structured output schema, if the agent declares one.
    pub output_schema: Option<AgentOutputSchema>,
    /// Server-stored prompt reference (id, version, variables), passed
    /// through untouched.
    pub prompt: Option<serde_json::Value>,
    /// Server-side conversation state handle, passed through untouched.
    pub previous_response_id: Option<String>,
}

/// A complete model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Output items in model order.
    pub output: Vec<Item>,
    /// Token usage of this call.
    pub usage: Usage,
    /// Provider-assigned response id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

/// A lazy sequence of wire events produced by a streaming model call.
pub type ModelEventStream = Pin<Box<dyn Stream<Item = Result<ResponseStreamEvent>> + Send>>;

/// A language model backend.
///
/// Implementations must be safe for concurrent use across runs; the runtime
/// never issues two concurrent calls to the same model within one run.
#[async_trait]
pub trait Model: Send + Sync {
    /// The model's name.
    fn name(&self) -> &str;

    /// Perform a one-shot call.
    async fn get_response(&self, request: ModelRequest) -> Result<ModelResponse>;

    /// Perform a streaming call.
    ///
    /// The terminal event is [`ResponseStreamEvent::Completed`] and carries
    /// the full response for reconstruction.
    async fn stream_response(&self, request: ModelRequest) -> Result<ModelEventStream>;
}

/// Resolves model names to model instances.
pub trait ModelProvider: Send + Sync {
    /// Resolve a model by name, or the provider's default when `None`.
    fn get_model(&self, name: Option<&str>) -> Result<Arc<dyn Model>>;
}

/// An agent's model binding: a name resolved through a provider, or a bound
/// instance.
#[derive(Clone)]
pub enum ModelRef {
    /// A model name resolved through the run's provider.
    Named(String),
    /// A bound model instance.
    Instance(Arc<dyn Model>),
}

impl std::fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Instance(model) => f.debug_tuple("Instance").field(&model.name()).finish(),
        }
    }
}

/// API flavor of the OpenAI-style backend selected by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiFlavor {
    /// The chat-completions API.
    ChatCompletions,
    /// The responses API.
    #[default]
    Responses,
}

#[derive(Default)]
struct RuntimeDefaults {
    provider: Option<Arc<dyn ModelProvider>>,
    api: ApiFlavor,
}

fn defaults() -> &'static RwLock<RuntimeDefaults> {
    static DEFAULTS: OnceLock<RwLock<RuntimeDefaults>> = OnceLock::new();
    DEFAULTS.get_or_init(|| RwLock::new(RuntimeDefaults::default()))
}

/// Install the process-wide default model provider.
pub fn set_default_model_provider(provider: Arc<dyn ModelProvider>) {
    if let Ok(mut d) = defaults().write() {
        d.provider = Some(provider);
    }
}

/// The process-wide default model provider, if one is installed.
#[must_use]
pub fn default_model_provider() -> Option<Arc<dyn ModelProvider>> {
    defaults().read().ok().and_then(|d| d.provider.clone())
}

/// Select the process-wide default API flavor.
pub fn set_default_api(api: ApiFlavor) {
    if let Ok(mut d) = defaults().write() {
        d.api = api;
    }
}

/// The process-wide default API flavor.
#[must_use]
pub fn default_api() -> ApiFlavor {
    defaults().read().map(|d| d.api).unwrap_or_default()
}

/// Reset the process-wide defaults. Intended for test isolation.
pub fn clear_defaults() {
    if let Ok(mut d) = defaults().write() {
        *d = RuntimeDefaults::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_resolve_prefers_overrides() {
        let base = ModelSettings {
            temperature: Some(0.2),
            tool_choice: Some(ToolChoice::Required),
            ..ModelSettings::default()
        };
        let overrides = ModelSettings {
            temperature: Some(0.9),
            ..ModelSettings::default()
        };

        let resolved = base.resolve(Some(&overrides));
        assert_eq!(resolved.temperature, Some(0.9));
        assert_eq!(resolved.tool_choice, Some(ToolChoice::Required));
    }

    #[test]
    fn forced_tool_choices() {
        assert!(!ToolChoice::Auto.is_forced());
        assert!(ToolChoice::Required.is_forced());
        assert!(ToolChoice::None.is_forced());
        assert!(ToolChoice::Tool("foo".into()).is_forced());
        assert!(
            ToolChoice::Mcp {
                server_label: "srv".into(),
                name: None
            }
            .is_forced()
        );
    }

    #[test]
    fn defaults_registry_clears() {
        set_default_api(ApiFlavor::ChatCompletions);
        assert_eq!(default_api(), ApiFlavor::ChatCompletions);

        clear_defaults();
        assert_eq!(default_api(), ApiFlavor::Responses);
        assert!(default_model_provider().is_none());
    }
}
