//! Wire events of a streaming model call.
//!
//! The event vocabulary is bit-compatible with responses-style streaming:
//! every event carries a monotonic `sequence_number` starting at 0 for the
//! first event of each model call, and the terminal
//! [`ResponseStreamEvent::Completed`] carries the full response so the
//! runtime can reconstruct a [`ModelResponse`](super::ModelResponse).

use serde::{Deserialize, Serialize};

use crate::items::{ContentPart, Item};
use crate::usage::Usage;

/// The payload of the terminal `response.completed` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedResponse {
    /// Provider-assigned response id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// All output items of the call, in model order.
    pub output: Vec<Item>,
    /// Token usage of the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// One wire event of a streaming model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseStreamEvent {
    /// The response has been created.
    #[serde(rename = "response.created")]
    Created {
        /// Monotonic event counter within the call.
        sequence_number: u64,
    },

    /// A new output item has started.
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        /// Monotonic event counter within the call.
        sequence_number: u64,
        /// Index of the item within the response output.
        output_index: usize,
        /// The item in its initial state.
        item: Item,
    },

    /// A new content part has started within an item.
    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        /// Monotonic event counter within the call.
        sequence_number: u64,
        /// Index of the item within the response output.
        output_index: usize,
        /// Index of the part within the item's content.
        content_index: usize,
        /// The part in its initial state.
        part: ContentPart,
    },

    /// An incremental text delta.
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        /// Monotonic event counter within the call.
        sequence_number: u64,
        /// Index of the item within the response output.
        output_index: usize,
        /// Index of the part within the item's content.
        content_index: usize,
        /// The appended text.
        delta: String,
    },

    /// An incremental refusal delta.
    #[serde(rename = "response.refusal.delta")]
    RefusalDelta {
        /// Monotonic event counter within the call.
        sequence_number: u64,
        /// Index of the item within the response output.
        output_index: usize,
        /// Index of the part within the item's content.
        content_index: usize,
        /// The appended refusal text.
        delta: String,
    },

    /// An incremental function-call arguments delta.
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        /// Monotonic event counter within the call.
        sequence_number: u64,
        /// Index of the item within the response output.
        output_index: usize,
        /// The appended argument JSON fragment.
        delta: String,
    },

    /// A content part is complete.
    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        /// Monotonic event counter within the call.
        sequence_number: u64,
        /// Index of the item within the response output.
        output_index: usize,
        /// Index of the part within the item's content.
        content_index: usize,
        /// The completed part.
        part: ContentPart,
    },

    /// An output item is complete.
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// Monotonic event counter within the call.
        sequence_number: u64,
        /// Index of the item within the response output.
        output_index: usize,
        /// The completed item.
        item: Item,
    },

    /// The response is complete. Terminal event of every successful call.
    #[serde(rename = "response.completed")]
    Completed {
        /// Monotonic event counter within the call.
        sequence_number: u64,
        /// The full response for reconstruction.
        response: CompletedResponse,
    },
}

impl ResponseStreamEvent {
    /// The event's monotonic sequence number.
    #[must_use]
    pub const fn sequence_number(&self) -> u64 {
        match self {
            Self::Created { sequence_number }
            | Self::OutputItemAdded {
                sequence_number, ..
            }
            | Self::ContentPartAdded {
                sequence_number, ..
            }
            | Self::OutputTextDelta {
                sequence_number, ..
            }
            | Self::RefusalDelta {
                sequence_number, ..
            }
            | Self::FunctionCallArgumentsDelta {
                sequence_number, ..
            }
            | Self::ContentPartDone {
                sequence_number, ..
            }
            | Self::OutputItemDone {
                sequence_number, ..
            }
            | Self::Completed {
                sequence_number, ..
            } => *sequence_number,
        }
    }

    /// Returns `true` if this is the terminal `response.completed` event.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_dotted_type_tags() {
        let ev = ResponseStreamEvent::Created { sequence_number: 0 };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "response.created");

        let ev = ResponseStreamEvent::OutputTextDelta {
            sequence_number: 3,
            output_index: 0,
            content_index: 0,
            delta: "hi".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "response.output_text.delta");
        assert_eq!(json["sequence_number"], 3);
        assert_eq!(json["delta"], "hi");
    }
}
