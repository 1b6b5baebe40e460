//! The run loop.
//!
//! [`Runner`] drives an agent through its turns:
//!
//! 1. Resolve the active agent's effective tools and handoffs
//! 2. Build the model input from the original input plus generated items
//! 3. Call the model (one-shot here; streamed in the streaming variant)
//! 4. Interpret the response into an ordered plan
//! 5. Execute the plan and decide the next step
//! 6. Return a final output, transfer control to a peer, or loop
//!
//! On the first turn only, input guardrails run concurrently with the model
//! call, and a tripwire is surfaced in preference to any model error. On a
//! final output, output guardrails run before the result is returned. The
//! loop enforces a turn ceiling (default [`DEFAULT_MAX_TURNS`]) and never
//! retries: retry policy belongs to the model backend.

mod execute;
mod process;
mod resolve;
mod streaming;
mod tracker;

#[cfg(test)]
mod tests;

pub(crate) use streaming::spawn_streamed_run;

use std::sync::Arc;

use tracing::{Instrument, debug, error, info, info_span};

use crate::agent::Agent;
use crate::error::{Error, Result, RunErrorDetails, join_concurrent_errors};
use crate::guardrail::{
    InputGuardrail, InputGuardrailResult, OutputGuardrail, OutputGuardrailResult,
    evaluate_input_guardrails, evaluate_output_guardrails,
};
use crate::handoff::{Handoff, HandoffInputFilter};
use crate::hooks::{HookPair, NoopRunHooks, RunHooks};
use crate::items::{RunInput, RunItem, input_to_new_input_list};
use crate::model::{
    Model, ModelProvider, ModelRef, ModelRequest, ModelResponse, ModelSettings,
    default_model_provider,
};
use crate::result::{RunResult, RunResultStreaming};
use crate::tool::Tool;
use crate::usage::Usage;

use execute::{NextStep, SingleStepResult, execute_tools_and_side_effects};
use process::process_model_response;
use resolve::{effective_handoffs, effective_tools};
use tracker::ToolUseTracker;

/// Default ceiling on the number of turns in a run.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Run-level configuration.
#[derive(Clone)]
pub struct RunConfig {
    /// Turn ceiling (default [`DEFAULT_MAX_TURNS`]).
    pub max_turns: usize,
    /// Model override applied to every agent in the run.
    pub model: Option<ModelRef>,
    /// Provider used to resolve named models (falls back to the process
    /// default).
    pub model_provider: Option<Arc<dyn ModelProvider>>,
    /// Settings override merged over each agent's settings.
    pub model_settings: Option<ModelSettings>,
    /// Run-level handoff input filter (a handoff-local filter wins).
    pub handoff_input_filter: Option<HandoffInputFilter>,
    /// Input guardrails appended after the agent's own.
    pub input_guardrails: Vec<InputGuardrail>,
    /// Output guardrails appended after the agent's own.
    pub output_guardrails: Vec<OutputGuardrail>,
    /// Run-level lifecycle hooks.
    pub hooks: Option<Arc<dyn RunHooks>>,
    /// Server-side conversation state handle, passed through to the model.
    pub previous_response_id: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            model: None,
            model_provider: None,
            model_settings: None,
            handoff_input_filter: None,
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            hooks: None,
            previous_response_id: None,
        }
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("max_turns", &self.max_turns)
            .field("input_guardrails", &self.input_guardrails.len())
            .field("output_guardrails", &self.output_guardrails.len())
            .finish_non_exhaustive()
    }
}

impl RunConfig {
    /// Set the turn ceiling.
    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Set the model provider for this run.
    #[must_use]
    pub fn with_model_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.model_provider = Some(provider);
        self
    }

    /// Attach run-level lifecycle hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn RunHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }
}

/// Stateless execution engine driving agents through the run loop.
#[derive(Debug, Clone, Copy)]
pub struct Runner;

impl Runner {
    /// Run an agent to completion with default configuration.
    pub async fn run(agent: Arc<Agent>, input: impl Into<RunInput>) -> Result<RunResult> {
        Self::run_with_config(agent, input, RunConfig::default()).await
    }

    /// Run an agent to completion.
    pub async fn run_with_config(
        agent: Arc<Agent>,
        input: impl Into<RunInput>,
        config: RunConfig,
    ) -> Result<RunResult> {
        let span = info_span!(
            "agent_run",
            agent.name = %agent.name(),
            run.max_turns = config.max_turns,
        );
        Self::run_inner(agent, input.into(), config)
            .instrument(span)
            .await
    }

    /// Run an agent with streaming output and default configuration.
    #[must_use]
    pub fn run_streamed(agent: Arc<Agent>, input: impl Into<RunInput>) -> RunResultStreaming {
        Self::run_streamed_with_config(agent, input, RunConfig::default())
    }

    /// Run an agent with streaming output.
    ///
    /// The run executes on a background task; consume events through
    /// [`RunResultStreaming::stream_events`] or
    /// [`RunResultStreaming::events`].
    #[must_use]
    pub fn run_streamed_with_config(
        agent: Arc<Agent>,
        input: impl Into<RunInput>,
        config: RunConfig,
    ) -> RunResultStreaming {
        spawn_streamed_run(agent, input.into(), config)
    }

    async fn run_inner(agent: Arc<Agent>, input: RunInput, config: RunConfig) -> Result<RunResult> {
        let noop = NoopRunHooks;
        let run_hooks: &dyn RunHooks = config.hooks.as_deref().unwrap_or(&noop);

        let mut current_agent = agent;
        let mut original_input = input;
        let mut generated_items: Vec<RunItem> = Vec::new();
        let mut raw_responses: Vec<ModelResponse> = Vec::new();
        let mut usage = Usage::zero();
        let mut input_guardrail_results: Vec<InputGuardrailResult> = Vec::new();
        let mut tracker = ToolUseTracker::default();
        let mut cached_tools: Option<Vec<Tool>> = None;
        let mut run_agent_start_hooks = true;
        let mut current_turn = 0usize;

        loop {
            let tools = match &cached_tools {
                Some(tools) => tools.clone(),
                None => {
                    let tools = effective_tools(&current_agent).await.map_err(|e| {
                        e.with_run_data(partial_run(
                            &original_input,
                            &generated_items,
                            &raw_responses,
                            &current_agent,
                            &input_guardrail_results,
                            &[],
                        ))
                    })?;
                    cached_tools = Some(tools.clone());
                    tools
                }
            };

            current_turn += 1;
            if current_turn > config.max_turns {
                let err = Error::MaxTurnsExceeded {
                    max_turns: config.max_turns,
                    run_data: None,
                };
                error!(agent = %current_agent.name(), max_turns = config.max_turns, "Max turns exceeded");
                return Err(err.with_run_data(partial_run(
                    &original_input,
                    &generated_items,
                    &raw_responses,
                    &current_agent,
                    &input_guardrail_results,
                    &[],
                )));
            }
            debug!(agent = %current_agent.name(), turn = current_turn, "Starting turn");

            // On the first turn, input guardrails run concurrently with the
            // model call; a tripwire is surfaced in preference to any model
            // error.
            let turn_result = if current_turn == 1 {
                let guardrails =
                    collect_input_guardrails(&current_agent, &config.input_guardrails);
                let (guardrail_result, turn_result) = tokio::join!(
                    evaluate_input_guardrails(
                        guardrails,
                        Arc::clone(&current_agent),
                        original_input.clone(),
                        None,
                    ),
                    Self::run_single_turn(
                        &current_agent,
                        &config,
                        run_hooks,
                        &original_input,
                        &generated_items,
                        &tools,
                        &mut tracker,
                        run_agent_start_hooks,
                    ),
                );
                match guardrail_result {
                    Ok(results) => {
                        input_guardrail_results = results;
                        turn_result
                    }
                    Err(guardrail_err) => {
                        // When the turn failed too, join the pair by
                        // priority so a tripwire is surfaced first.
                        let err = match turn_result {
                            Err(turn_err) => {
                                join_concurrent_errors(vec![guardrail_err, turn_err])
                            }
                            Ok(_) => guardrail_err,
                        };
                        return Err(err.with_run_data(partial_run(
                            &original_input,
                            &generated_items,
                            &raw_responses,
                            &current_agent,
                            &input_guardrail_results,
                            &[],
                        )));
                    }
                }
            } else {
                Self::run_single_turn(
                    &current_agent,
                    &config,
                    run_hooks,
                    &original_input,
                    &generated_items,
                    &tools,
                    &mut tracker,
                    run_agent_start_hooks,
                )
                .await
            };
            run_agent_start_hooks = false;

            let step = turn_result.map_err(|e| {
                e.with_run_data(partial_run(
                    &original_input,
                    &generated_items,
                    &raw_responses,
                    &current_agent,
                    &input_guardrail_results,
                    &[],
                ))
            })?;

            usage += step.model_response.usage;
            raw_responses.push(step.model_response.clone());
            original_input = step.original_input.clone();
            generated_items = step.generated_items();

            match step.next_step {
                NextStep::RunAgain => {}
                NextStep::Handoff(new_agent) => {
                    info!(from = %current_agent.name(), to = %new_agent.name(), "Handoff");
                    current_agent = new_agent;
                    cached_tools = None;
                    run_agent_start_hooks = true;
                }
                NextStep::FinalOutput(final_output) => {
                    let guardrails =
                        collect_output_guardrails(&current_agent, &config.output_guardrails);
                    let output_guardrail_results = evaluate_output_guardrails(
                        guardrails,
                        Arc::clone(&current_agent),
                        final_output.clone(),
                    )
                    .await
                    .map_err(|e| {
                        e.with_run_data(partial_run(
                            &original_input,
                            &generated_items,
                            &raw_responses,
                            &current_agent,
                            &input_guardrail_results,
                            &[],
                        ))
                    })?;

                    let hooks = HookPair::new(run_hooks, current_agent.hooks());
                    hooks.agent_end(&current_agent, &final_output).await?;

                    info!(
                        agent = %current_agent.name(),
                        turns = current_turn,
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "Run completed",
                    );
                    return Ok(RunResult {
                        input: original_input,
                        new_items: generated_items,
                        raw_responses,
                        final_output,
                        input_guardrail_results,
                        output_guardrail_results,
                        usage,
                        last_agent: current_agent,
                    });
                }
            }
        }
    }

    /// One turn: start hooks, resolve handoffs and model, call the model,
    /// interpret and execute the response.
    #[allow(clippy::too_many_arguments)]
    async fn run_single_turn(
        agent: &Arc<Agent>,
        config: &RunConfig,
        run_hooks: &dyn RunHooks,
        original_input: &RunInput,
        generated_items: &[RunItem],
        tools: &[Tool],
        tracker: &mut ToolUseTracker,
        run_agent_start_hooks: bool,
    ) -> Result<SingleStepResult> {
        let hooks = HookPair::new(run_hooks, agent.hooks());
        if run_agent_start_hooks {
            hooks.agent_start(agent).await?;
        }

        let handoffs = effective_handoffs(agent).await?;
        let model = resolve_model(agent, config)?;
        let request = build_model_request(
            agent,
            config,
            tracker,
            original_input,
            generated_items,
            tools,
            &handoffs,
        );

        let response = model.get_response(request).await.map_err(|e| {
            error!(agent = %agent.name(), error = %e, "Model call failed");
            e
        })?;

        finish_turn(
            agent,
            config,
            &hooks,
            tracker,
            original_input,
            generated_items,
            tools,
            &handoffs,
            response,
        )
        .await
    }
}

/// Interpret a completed model response and execute its plan. Shared by the
/// blocking and streaming drivers.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn finish_turn(
    agent: &Arc<Agent>,
    config: &RunConfig,
    hooks: &HookPair<'_>,
    tracker: &mut ToolUseTracker,
    original_input: &RunInput,
    generated_items: &[RunItem],
    tools: &[Tool],
    handoffs: &[Handoff],
    response: ModelResponse,
) -> Result<SingleStepResult> {
    let processed = process_model_response(agent, tools, handoffs, &response)?;
    tracker.add_tool_use(agent.name(), &processed.tools_used);
    execute_tools_and_side_effects(
        agent,
        original_input.clone(),
        generated_items.to_vec(),
        processed,
        response,
        hooks,
        config.handoff_input_filter.as_ref(),
    )
    .await
}

/// Resolve the model for this turn: run override, then the agent's binding,
/// then the provider default.
pub(crate) fn resolve_model(agent: &Arc<Agent>, config: &RunConfig) -> Result<Arc<dyn Model>> {
    let provider = || -> Result<Arc<dyn ModelProvider>> {
        config
            .model_provider
            .clone()
            .or_else(default_model_provider)
            .ok_or_else(|| Error::user("no model provider configured"))
    };

    let binding = config.model.as_ref().or_else(|| agent.model());
    match binding {
        Some(ModelRef::Instance(model)) => Ok(Arc::clone(model)),
        Some(ModelRef::Named(name)) => provider()?.get_model(Some(name)),
        None => provider()?.get_model(None),
    }
}

/// Assemble the model request for this turn.
pub(crate) fn build_model_request(
    agent: &Arc<Agent>,
    config: &RunConfig,
    tracker: &ToolUseTracker,
    original_input: &RunInput,
    generated_items: &[RunItem],
    tools: &[Tool],
    handoffs: &[Handoff],
) -> ModelRequest {
    let settings = agent.model_settings().resolve(config.model_settings.as_ref());
    let settings = tracker.maybe_reset_tool_choice(agent, settings);

    let mut input = input_to_new_input_list(original_input);
    input.extend(generated_items.iter().map(RunItem::to_input));

    ModelRequest {
        system_instructions: agent.resolve_instructions(),
        input,
        model_settings: settings,
        tools: tools.iter().map(Tool::definition).collect(),
        handoffs: handoffs.iter().map(Handoff::definition).collect(),
        output_schema: agent.output_schema().cloned(),
        prompt: agent.prompt().cloned(),
        previous_response_id: config.previous_response_id.clone(),
    }
}

/// The agent's input guardrails followed by the run-level ones.
pub(crate) fn collect_input_guardrails(
    agent: &Arc<Agent>,
    from_config: &[InputGuardrail],
) -> Vec<InputGuardrail> {
    agent
        .input_guardrails()
        .iter()
        .chain(from_config)
        .cloned()
        .collect()
}

/// The agent's output guardrails followed by the run-level ones.
pub(crate) fn collect_output_guardrails(
    agent: &Arc<Agent>,
    from_config: &[OutputGuardrail],
) -> Vec<OutputGuardrail> {
    agent
        .output_guardrails()
        .iter()
        .chain(from_config)
        .cloned()
        .collect()
}

/// Snapshot the run's observed data for error enrichment.
pub(crate) fn partial_run(
    original_input: &RunInput,
    generated_items: &[RunItem],
    raw_responses: &[ModelResponse],
    last_agent: &Arc<Agent>,
    input_guardrail_results: &[InputGuardrailResult],
    output_guardrail_results: &[OutputGuardrailResult],
) -> RunErrorDetails {
    RunErrorDetails {
        input: original_input.clone(),
        new_items: generated_items.to_vec(),
        raw_responses: raw_responses.to_vec(),
        last_agent: Arc::clone(last_agent),
        input_guardrail_results: input_guardrail_results.to_vec(),
        output_guardrail_results: output_guardrail_results.to_vec(),
    }
}
