//! Run results: the terminal [`RunResult`] of a blocking run and the live
//! [`RunResultStreaming`] of a streamed run.
//!
//! A streamed run is driven by a background task that pushes
//! [`StreamEvent`]s onto an internal queue; the consumer drains the queue
//! through [`RunResultStreaming::stream_events`] (or the
//! [`RunResultStreaming::events`] adapter) until the internal completion
//! sentinel arrives. The queue itself is never exposed.
//!
//! Cancellation is available from outside ([`RunResultStreaming::cancel`])
//! and from inside the consumer's sink via a cloneable [`CancelHandle`]:
//! both abort the driver and guardrail tasks, discard pending events, and
//! force completion.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::AbortHandle;

use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::guardrail::{InputGuardrailResult, OutputGuardrailResult};
use crate::items::{Item, RunInput, RunItem, input_to_new_input_list};
use crate::model::ModelResponse;
use crate::model::events::ResponseStreamEvent;
use crate::usage::Usage;

/// The terminal result of a run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The run's original input (possibly rewritten by handoff filters).
    pub input: RunInput,
    /// All items generated during the run, in order.
    pub new_items: Vec<RunItem>,
    /// All raw model responses, one per turn.
    pub raw_responses: Vec<ModelResponse>,
    /// The final output: a string value for plain-text agents, a parsed
    /// value for agents with an output schema.
    pub final_output: Value,
    /// Input guardrail results, in declaration order.
    pub input_guardrail_results: Vec<InputGuardrailResult>,
    /// Output guardrail results, in declaration order.
    pub output_guardrail_results: Vec<OutputGuardrailResult>,
    /// Aggregate token usage across all turns.
    pub usage: Usage,
    pub(crate) last_agent: Arc<Agent>,
}

impl RunResult {
    /// The agent that produced the final output.
    #[must_use]
    pub fn last_agent(&self) -> &Arc<Agent> {
        &self.last_agent
    }

    /// The final output as text, when it is a plain string.
    #[must_use]
    pub fn final_output_text(&self) -> Option<&str> {
        self.final_output.as_str()
    }

    /// Deserialize the final output into a concrete type.
    pub fn final_output_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.final_output.clone())
            .map_err(|e| Error::user(format!("final output does not deserialize: {e}")))
    }

    /// The original input plus all generated items, in input form, ready to
    /// seed a follow-up run that continues this conversation.
    #[must_use]
    pub fn to_input_list(&self) -> Vec<Item> {
        let mut items = input_to_new_input_list(&self.input);
        items.extend(self.new_items.iter().map(RunItem::to_input));
        items
    }
}

/// An event surfaced to the consumer of a streamed run.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A wire event forwarded from the model stream.
    RawResponse(ResponseStreamEvent),
    /// An item generated by the run loop.
    RunItem(RunItem),
    /// The active agent changed (emitted once at start and on every handoff).
    AgentUpdated(Arc<Agent>),
}

/// Internal queue element: an event or the completion sentinel.
pub(crate) enum QueueItem {
    Event(StreamEvent),
    Done,
}

/// Mutable result fields shared between the background driver and the
/// consumer. All writes happen on the driver task; the consumer only reads.
#[derive(Debug)]
pub(crate) struct StreamState {
    pub input: RunInput,
    pub new_items: Vec<RunItem>,
    pub raw_responses: Vec<ModelResponse>,
    pub usage: Usage,
    pub input_guardrail_results: Vec<InputGuardrailResult>,
    pub output_guardrail_results: Vec<OutputGuardrailResult>,
    pub final_output: Option<Value>,
}

pub(crate) struct StreamShared {
    canceled: AtomicBool,
    complete: AtomicBool,
    current_turn: AtomicUsize,
    max_turns: usize,
    current_agent: StdMutex<Arc<Agent>>,
    state: StdMutex<StreamState>,
    error: StdMutex<Option<Error>>,
    tasks: StdMutex<Vec<AbortHandle>>,
}

impl StreamShared {
    pub fn new(agent: Arc<Agent>, input: RunInput, max_turns: usize) -> Self {
        Self {
            canceled: AtomicBool::new(false),
            complete: AtomicBool::new(false),
            current_turn: AtomicUsize::new(0),
            max_turns,
            current_agent: StdMutex::new(agent),
            state: StdMutex::new(StreamState {
                input,
                new_items: Vec::new(),
                raw_responses: Vec::new(),
                usage: Usage::zero(),
                input_guardrail_results: Vec::new(),
                output_guardrail_results: Vec::new(),
                final_output: None,
            }),
            error: StdMutex::new(None),
            tasks: StdMutex::new(Vec::new()),
        }
    }

    pub fn register_task(&self, handle: AbortHandle) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(handle);
        }
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        if let Ok(tasks) = self.tasks.lock() {
            for task in tasks.iter() {
                task.abort();
            }
        }
        self.complete.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    pub fn set_complete(&self) {
        self.complete.store(true, Ordering::SeqCst);
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    pub fn set_turn(&self, turn: usize) {
        self.current_turn.store(turn, Ordering::SeqCst);
    }

    pub fn current_turn(&self) -> usize {
        self.current_turn.load(Ordering::SeqCst)
    }

    pub const fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn set_current_agent(&self, agent: Arc<Agent>) {
        if let Ok(mut current) = self.current_agent.lock() {
            *current = agent;
        }
    }

    pub fn current_agent(&self) -> Arc<Agent> {
        self.current_agent
            .lock()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_else(|poisoned| Arc::clone(&poisoned.into_inner()))
    }

    pub fn set_error(&self, error: Error) {
        if let Ok(mut slot) = self.error.lock() {
            *slot = Some(error);
        }
    }

    pub fn error(&self) -> Option<Error> {
        self.error.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut StreamState) -> R) -> Option<R> {
        self.state.lock().ok().map(|mut state| f(&mut state))
    }
}

/// A cloneable handle that cancels a streamed run.
///
/// Safe to call from inside the consumer's sink callback.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<StreamShared>,
}

impl CancelHandle {
    /// Cancel the run: abort the driver and background tasks, discard
    /// pending events, and mark the run complete.
    pub fn cancel(&self) {
        self.shared.cancel();
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle").finish_non_exhaustive()
    }
}

/// The live result of a streamed run.
///
/// Created before the run loop starts; its fields are updated by the
/// background driver while the consumer drains events.
pub struct RunResultStreaming {
    shared: Arc<StreamShared>,
    events: tokio::sync::Mutex<UnboundedReceiver<QueueItem>>,
    guardrail_feed: tokio::sync::Mutex<UnboundedReceiver<InputGuardrailResult>>,
}

impl std::fmt::Debug for RunResultStreaming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunResultStreaming")
            .field("current_turn", &self.current_turn())
            .field("is_complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}

impl RunResultStreaming {
    pub(crate) fn new(
        shared: Arc<StreamShared>,
        events: UnboundedReceiver<QueueItem>,
        guardrail_feed: UnboundedReceiver<InputGuardrailResult>,
    ) -> Self {
        Self {
            shared,
            events: tokio::sync::Mutex::new(events),
            guardrail_feed: tokio::sync::Mutex::new(guardrail_feed),
        }
    }

    /// The agent currently (or last) active.
    #[must_use]
    pub fn current_agent(&self) -> Arc<Agent> {
        self.shared.current_agent()
    }

    /// The current turn number (0 before the first model call).
    #[must_use]
    pub fn current_turn(&self) -> usize {
        self.shared.current_turn()
    }

    /// The run's turn ceiling.
    #[must_use]
    pub fn max_turns(&self) -> usize {
        self.shared.max_turns()
    }

    /// Whether the run has finished (successfully, with an error, or by
    /// cancellation).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shared.is_complete()
    }

    /// The final output, once produced.
    #[must_use]
    pub fn final_output(&self) -> Option<Value> {
        self.shared
            .with_state(|s| s.final_output.clone())
            .flatten()
    }

    /// Items generated so far.
    #[must_use]
    pub fn new_items(&self) -> Vec<RunItem> {
        self.shared
            .with_state(|s| s.new_items.clone())
            .unwrap_or_default()
    }

    /// Raw model responses received so far.
    #[must_use]
    pub fn raw_responses(&self) -> Vec<ModelResponse> {
        self.shared
            .with_state(|s| s.raw_responses.clone())
            .unwrap_or_default()
    }

    /// The run's (possibly handoff-filtered) input.
    #[must_use]
    pub fn input(&self) -> Option<RunInput> {
        self.shared.with_state(|s| s.input.clone())
    }

    /// Aggregate token usage so far.
    #[must_use]
    pub fn usage(&self) -> Usage {
        self.shared
            .with_state(|s| s.usage)
            .unwrap_or_else(Usage::zero)
    }

    /// Input guardrail results, in declaration order (complete once the
    /// guardrail task finishes).
    #[must_use]
    pub fn input_guardrail_results(&self) -> Vec<InputGuardrailResult> {
        self.shared
            .with_state(|s| s.input_guardrail_results.clone())
            .unwrap_or_default()
    }

    /// Output guardrail results, in declaration order.
    #[must_use]
    pub fn output_guardrail_results(&self) -> Vec<OutputGuardrailResult> {
        self.shared
            .with_state(|s| s.output_guardrail_results.clone())
            .unwrap_or_default()
    }

    /// The error that terminated the run, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        self.shared.error()
    }

    /// A cloneable cancel handle, safe to call from inside a sink.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Cancel the run and discard all pending events.
    pub fn cancel(&self) {
        self.shared.cancel();
        self.drain();
    }

    /// The next event, or `None` once the run completed or was canceled.
    pub async fn next_event(&self) -> Option<StreamEvent> {
        let mut events = self.events.lock().await;
        loop {
            if self.shared.is_canceled() {
                while events.try_recv().is_ok() {}
                return None;
            }
            return match events.recv().await {
                Some(QueueItem::Event(event)) => {
                    if self.shared.is_canceled() {
                        continue;
                    }
                    Some(event)
                }
                Some(QueueItem::Done) | None => None,
            };
        }
    }

    /// Drain events into `sink` until the run completes or is canceled.
    ///
    /// Returns the error that terminated the run, if any; a canceled run
    /// returns `Ok(())` and exposes its partial data through the accessors.
    pub async fn stream_events<F>(&self, mut sink: F) -> Result<()>
    where
        F: FnMut(StreamEvent),
    {
        while let Some(event) = self.next_event().await {
            sink(event);
        }
        self.drain();
        if self.shared.is_canceled() {
            return Ok(());
        }
        match self.shared.error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// The events of this run as a [`Stream`].
    pub fn events(&self) -> impl Stream<Item = StreamEvent> + '_ {
        async_stream::stream! {
            while let Some(event) = self.next_event().await {
                yield event;
            }
        }
    }

    /// Discard everything still queued on both internal channels.
    fn drain(&self) {
        if let Ok(mut events) = self.events.try_lock() {
            while events.try_recv().is_ok() {}
        }
        if let Ok(mut feed) = self.guardrail_feed.try_lock() {
            while feed.try_recv().is_ok() {}
        }
    }

    /// Whether both internal queues are empty.
    #[must_use]
    pub fn queues_empty(&self) -> bool {
        let events_empty = self
            .events
            .try_lock()
            .map(|events| events.is_empty())
            .unwrap_or(false);
        let feed_empty = self
            .guardrail_feed
            .try_lock()
            .map(|feed| feed.is_empty())
            .unwrap_or(false);
        events_empty && feed_empty
    }
}
