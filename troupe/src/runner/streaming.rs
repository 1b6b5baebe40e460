//! The streaming run driver.
//!
//! Same state machine as the blocking driver, with three differences: the
//! whole loop runs on a background task feeding an event queue; the model is
//! called through `stream_response`, with every wire event forwarded to the
//! consumer as it arrives; and guardrails run as background tasks. Input
//! guardrail results are fed through a second internal queue as they
//! complete, and a tripwire aborts the run at the next turn boundary.
//!
//! On any outcome (success, error, cancellation) `is_complete` becomes true
//! and the completion sentinel is enqueued; an error is additionally parked
//! on the shared state for [`stream_events`](crate::result::RunResultStreaming::stream_events)
//! to surface, together with the partial-run diagnostic.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::agent::Agent;
use crate::error::{Error, Result, RunErrorDetails};
use crate::guardrail::{
    InputGuardrailResult, evaluate_input_guardrails, evaluate_output_guardrails,
};
use crate::hooks::{HookPair, NoopRunHooks, RunHooks};
use crate::items::{RunInput, RunItem};
use crate::model::ModelResponse;
use crate::model::events::ResponseStreamEvent;
use crate::result::{QueueItem, RunResultStreaming, StreamEvent, StreamShared};
use crate::tool::Tool;
use crate::usage::Usage;

use super::execute::NextStep;
use super::resolve::{effective_handoffs, effective_tools};
use super::tracker::ToolUseTracker;
use super::{
    RunConfig, build_model_request, collect_input_guardrails, collect_output_guardrails,
    finish_turn, resolve_model,
};

/// Create the streaming result and launch the background driver.
pub(crate) fn spawn_streamed_run(
    agent: Arc<Agent>,
    input: RunInput,
    config: RunConfig,
) -> RunResultStreaming {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (guardrail_tx, guardrail_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(StreamShared::new(
        Arc::clone(&agent),
        input.clone(),
        config.max_turns,
    ));

    let driver = StreamDriver {
        agent,
        input,
        config,
        events: events_tx,
        guardrail_feed: guardrail_tx,
        shared: Arc::clone(&shared),
    };
    let handle = tokio::spawn(driver.run());
    shared.register_task(handle.abort_handle());

    RunResultStreaming::new(shared, events_rx, guardrail_rx)
}

struct StreamDriver {
    agent: Arc<Agent>,
    input: RunInput,
    config: RunConfig,
    events: mpsc::UnboundedSender<QueueItem>,
    guardrail_feed: mpsc::UnboundedSender<InputGuardrailResult>,
    shared: Arc<StreamShared>,
}

impl StreamDriver {
    async fn run(mut self) {
        if let Err(e) = self.drive().await {
            error!(error = %e, "Streamed run failed");
            let details = self.partial_from_shared();
            self.shared.set_error(e.with_run_data(details));
        }
        self.shared.set_complete();
        let _ = self.events.send(QueueItem::Done);
    }

    async fn drive(&mut self) -> Result<()> {
        let noop = NoopRunHooks;
        let config_hooks = self.config.hooks.clone();
        let run_hooks: &dyn RunHooks = config_hooks.as_deref().unwrap_or(&noop);

        let mut current_agent = Arc::clone(&self.agent);
        let mut original_input = self.input.clone();
        let mut generated_items: Vec<RunItem> = Vec::new();
        let mut tracker = ToolUseTracker::default();
        let mut cached_tools: Option<Vec<Tool>> = None;
        let mut run_agent_start_hooks = true;
        let mut current_turn = 0usize;

        self.emit(StreamEvent::AgentUpdated(Arc::clone(&current_agent)));

        // Input guardrails run as a background task for the whole run; each
        // result is fed through the internal guardrail queue as it lands.
        let guardrails = collect_input_guardrails(&current_agent, &self.config.input_guardrails);
        let mut guardrail_task: Option<JoinHandle<Result<Vec<InputGuardrailResult>>>> =
            Some(tokio::spawn(evaluate_input_guardrails(
                guardrails,
                Arc::clone(&current_agent),
                original_input.clone(),
                Some(self.guardrail_feed.clone()),
            )));
        if let Some(task) = &guardrail_task {
            self.shared.register_task(task.abort_handle());
        }

        loop {
            if self.shared.is_canceled() {
                return Ok(());
            }

            // Surface a guardrail tripwire at the turn boundary.
            if guardrail_task.as_ref().is_some_and(JoinHandle::is_finished) {
                if let Some(task) = guardrail_task.take() {
                    let results = settle_guardrail_task(task).await?;
                    self.shared
                        .with_state(|s| s.input_guardrail_results = results);
                }
            }

            let tools = match &cached_tools {
                Some(tools) => tools.clone(),
                None => {
                    let tools = effective_tools(&current_agent).await?;
                    cached_tools = Some(tools.clone());
                    tools
                }
            };

            current_turn += 1;
            self.shared.set_turn(current_turn);
            if current_turn > self.config.max_turns {
                return Err(Error::MaxTurnsExceeded {
                    max_turns: self.config.max_turns,
                    run_data: None,
                });
            }
            debug!(agent = %current_agent.name(), turn = current_turn, "Starting streamed turn");

            let hooks = HookPair::new(run_hooks, current_agent.hooks());
            if run_agent_start_hooks {
                hooks.agent_start(&current_agent).await?;
            }
            run_agent_start_hooks = false;

            let handoffs = effective_handoffs(&current_agent).await?;
            let model = resolve_model(&current_agent, &self.config)?;
            let request = build_model_request(
                &current_agent,
                &self.config,
                &tracker,
                &original_input,
                &generated_items,
                &tools,
                &handoffs,
            );

            // Forward every wire event; reconstruct the full response from
            // the terminal one.
            let mut stream = model.stream_response(request).await?;
            let mut completed: Option<ModelResponse> = None;
            while let Some(event) = stream.next().await {
                let event = event?;
                if let ResponseStreamEvent::Completed { response, .. } = &event {
                    completed = Some(ModelResponse {
                        output: response.output.clone(),
                        usage: response.usage.unwrap_or_else(Usage::zero),
                        response_id: response.id.clone(),
                    });
                }
                self.emit(StreamEvent::RawResponse(event));
            }
            drop(stream);
            let response = completed.ok_or_else(|| {
                Error::model_behavior("model stream ended without a completed response")
            })?;

            let step = finish_turn(
                &current_agent,
                &self.config,
                &hooks,
                &mut tracker,
                &original_input,
                &generated_items,
                &tools,
                &handoffs,
                response,
            )
            .await?;

            for item in &step.new_step_items {
                self.emit(StreamEvent::RunItem(item.clone()));
            }

            original_input = step.original_input.clone();
            generated_items = step.generated_items();
            let turn_usage = step.model_response.usage;
            let raw_response = step.model_response.clone();
            let input_snapshot = original_input.clone();
            let items_snapshot = generated_items.clone();
            self.shared.with_state(move |s| {
                s.input = input_snapshot;
                s.new_items = items_snapshot;
                s.raw_responses.push(raw_response);
                s.usage += turn_usage;
            });

            match step.next_step {
                NextStep::RunAgain => {}
                NextStep::Handoff(new_agent) => {
                    info!(from = %current_agent.name(), to = %new_agent.name(), "Handoff");
                    self.shared.set_current_agent(Arc::clone(&new_agent));
                    self.emit(StreamEvent::AgentUpdated(Arc::clone(&new_agent)));
                    current_agent = new_agent;
                    cached_tools = None;
                    run_agent_start_hooks = true;
                }
                NextStep::FinalOutput(final_output) => {
                    // Input guardrails must settle before the run completes.
                    if let Some(task) = guardrail_task.take() {
                        let results = settle_guardrail_task(task).await?;
                        self.shared
                            .with_state(|s| s.input_guardrail_results = results);
                    }

                    // Output guardrails as a background task.
                    let out_guardrails =
                        collect_output_guardrails(&current_agent, &self.config.output_guardrails);
                    let out_task = tokio::spawn(evaluate_output_guardrails(
                        out_guardrails,
                        Arc::clone(&current_agent),
                        final_output.clone(),
                    ));
                    self.shared.register_task(out_task.abort_handle());
                    let output_results = settle_guardrail_task(out_task).await?;

                    hooks.agent_end(&current_agent, &final_output).await?;

                    self.shared.with_state(move |s| {
                        s.output_guardrail_results = output_results;
                        s.final_output = Some(final_output);
                    });
                    info!(
                        agent = %current_agent.name(),
                        turns = current_turn,
                        "Streamed run completed",
                    );
                    return Ok(());
                }
            }
        }
    }

    fn emit(&self, event: StreamEvent) {
        let _ = self.events.send(QueueItem::Event(event));
    }

    fn partial_from_shared(&self) -> RunErrorDetails {
        let last_agent = self.shared.current_agent();
        let fallback_input = self.input.clone();
        self.shared
            .with_state(|s| RunErrorDetails {
                input: s.input.clone(),
                new_items: s.new_items.clone(),
                raw_responses: s.raw_responses.clone(),
                last_agent: Arc::clone(&last_agent),
                input_guardrail_results: s.input_guardrail_results.clone(),
                output_guardrail_results: s.output_guardrail_results.clone(),
            })
            .unwrap_or_else(|| RunErrorDetails {
                input: fallback_input,
                new_items: Vec::new(),
                raw_responses: Vec::new(),
                last_agent,
                input_guardrail_results: Vec::new(),
                output_guardrail_results: Vec::new(),
            })
    }
}

/// Await a background guardrail task, mapping an aborted task to
/// cancellation.
async fn settle_guardrail_task<T>(task: JoinHandle<Result<T>>) -> Result<T> {
    match task.await {
        Ok(result) => result,
        Err(join_error) if join_error.is_cancelled() => Err(Error::Canceled),
        Err(join_error) => Err(Error::provider(format!(
            "guardrail task failed: {join_error}"
        ))),
    }
}
