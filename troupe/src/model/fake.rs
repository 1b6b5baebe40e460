//! A scripted model for testing.
//!
//! [`FakeModel`] returns predefined turns in sequence without any network
//! access, records every request it receives, and synthesizes the full wire
//! event sequence for streamed calls. Useful for exercising the run loop in
//! unit tests.
//!
//! # Example
//!
//! ```rust,ignore
//! let model = Arc::new(FakeModel::new());
//! model.add_turn(vec![fake::output_message("done")]);
//!
//! let agent = Agent::builder("A").model_instance(model).build();
//! let result = Runner::run(agent, "hi").await?;
//! assert_eq!(result.final_output, serde_json::json!("done"));
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::{Error, Result};
use crate::items::{ContentPart, Item};
use crate::usage::Usage;

use super::events::{CompletedResponse, ResponseStreamEvent};
use super::{Model, ModelEventStream, ModelRequest, ModelResponse};

/// Build an assistant message item for a fake turn.
#[must_use]
pub fn output_message(text: impl Into<String>) -> Item {
    Item::assistant_message(text)
}

/// Build a function-call item for a fake turn, with a generated call id.
#[must_use]
pub fn function_call(name: impl Into<String>, arguments: impl Into<String>) -> Item {
    Item::FunctionCall(crate::items::FunctionCallItem {
        id: None,
        call_id: format!("call_{}", uuid::Uuid::new_v4().simple()),
        name: name.into(),
        arguments: arguments.into(),
        status: None,
    })
}

/// A scripted model returning predefined turns in sequence.
#[derive(Debug)]
pub struct FakeModel {
    name: String,
    script: Mutex<VecDeque<Result<Vec<Item>>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl Default for FakeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeModel {
    /// Create an empty fake model.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "fake-model".to_owned(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Override the model name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Queue one turn's output items.
    pub fn add_turn(&self, output: Vec<Item>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(output));
        }
    }

    /// Queue an error in place of a turn.
    pub fn add_error(&self, error: Error) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(error));
        }
    }

    /// All requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// The most recent request, if any.
    #[must_use]
    pub fn last_request(&self) -> Option<ModelRequest> {
        self.requests
            .lock()
            .ok()
            .and_then(|r| r.last().cloned())
    }

    fn next_turn(&self, request: ModelRequest) -> Result<Vec<Item>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| Err(Error::model_behavior("fake model script exhausted")))
    }

    fn turn_usage() -> Usage {
        Usage::new(10, 5)
    }
}

#[async_trait]
impl Model for FakeModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_response(&self, request: ModelRequest) -> Result<ModelResponse> {
        let output = self.next_turn(request)?;
        Ok(ModelResponse {
            output,
            usage: Self::turn_usage(),
            response_id: Some(format!("resp_{}", uuid::Uuid::new_v4().simple())),
        })
    }

    async fn stream_response(&self, request: ModelRequest) -> Result<ModelEventStream> {
        let output = self.next_turn(request)?;
        let events = synthesize_events(&output);
        Ok(futures::stream::iter(events).map(Ok).boxed())
    }
}

fn bump(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

/// Expand a turn's items into the full wire event sequence, with sequence
/// numbers starting at 0.
fn synthesize_events(output: &[Item]) -> Vec<ResponseStreamEvent> {
    let mut events = Vec::new();
    let mut seq = 0u64;

    events.push(ResponseStreamEvent::Created {
        sequence_number: bump(&mut seq),
    });

    for (output_index, item) in output.iter().enumerate() {
        events.push(ResponseStreamEvent::OutputItemAdded {
            sequence_number: bump(&mut seq),
            output_index,
            item: item.clone(),
        });

        match item {
            Item::Message(message) => {
                for (content_index, part) in message.content.iter().enumerate() {
                    events.push(ResponseStreamEvent::ContentPartAdded {
                        sequence_number: bump(&mut seq),
                        output_index,
                        content_index,
                        part: part.clone(),
                    });
                    match part {
                        ContentPart::OutputText { text } => {
                            events.push(ResponseStreamEvent::OutputTextDelta {
                                sequence_number: bump(&mut seq),
                                output_index,
                                content_index,
                                delta: text.clone(),
                            });
                        }
                        ContentPart::Refusal { refusal } => {
                            events.push(ResponseStreamEvent::RefusalDelta {
                                sequence_number: bump(&mut seq),
                                output_index,
                                content_index,
                                delta: refusal.clone(),
                            });
                        }
                        ContentPart::InputText { .. } | ContentPart::InputImage { .. } => {}
                    }
                    events.push(ResponseStreamEvent::ContentPartDone {
                        sequence_number: bump(&mut seq),
                        output_index,
                        content_index,
                        part: part.clone(),
                    });
                }
            }
            Item::FunctionCall(call) => {
                events.push(ResponseStreamEvent::FunctionCallArgumentsDelta {
                    sequence_number: bump(&mut seq),
                    output_index,
                    delta: call.arguments.clone(),
                });
            }
            _ => {}
        }

        events.push(ResponseStreamEvent::OutputItemDone {
            sequence_number: bump(&mut seq),
            output_index,
            item: item.clone(),
        });
    }

    events.push(ResponseStreamEvent::Completed {
        sequence_number: bump(&mut seq),
        response: CompletedResponse {
            id: Some(format!("resp_{}", uuid::Uuid::new_v4().simple())),
            output: output.to_vec(),
            usage: Some(FakeModel::turn_usage()),
        },
    });

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_turns_in_order() {
        let model = FakeModel::new();
        model.add_turn(vec![output_message("first")]);
        model.add_turn(vec![output_message("second")]);

        let request = ModelRequest {
            system_instructions: None,
            input: Vec::new(),
            model_settings: crate::model::ModelSettings::default(),
            tools: Vec::new(),
            handoffs: Vec::new(),
            output_schema: None,
            prompt: None,
            previous_response_id: None,
        };

        let r1 = model.get_response(request.clone()).await.unwrap();
        assert_eq!(crate::items::extract_last_text(&r1.output[0]).as_deref(), Some("first"));

        let r2 = model.get_response(request.clone()).await.unwrap();
        assert_eq!(crate::items::extract_last_text(&r2.output[0]).as_deref(), Some("second"));

        // An exhausted script is a model-behavior error.
        assert!(model.get_response(request).await.is_err());
    }

    #[tokio::test]
    async fn stream_events_are_sequenced_and_terminated() {
        let model = FakeModel::new();
        model.add_turn(vec![output_message("hello")]);

        let request = ModelRequest {
            system_instructions: None,
            input: Vec::new(),
            model_settings: crate::model::ModelSettings::default(),
            tools: Vec::new(),
            handoffs: Vec::new(),
            output_schema: None,
            prompt: None,
            previous_response_id: None,
        };

        let mut stream = model.stream_response(request).await.unwrap();
        let mut events = Vec::new();
        while let Some(ev) = stream.next().await {
            events.push(ev.unwrap());
        }

        for (i, ev) in events.iter().enumerate() {
            assert_eq!(ev.sequence_number(), i as u64);
        }
        assert!(events.last().is_some_and(ResponseStreamEvent::is_completed));
    }
}
