//! Conversation items exchanged between agents and the model.
//!
//! This module defines the tagged item model used for both model *input* and
//! model *output*, following the responses-API conventions: messages with
//! content parts, function calls and their outputs, reasoning traces, hosted
//! tool calls, and the MCP approval items.
//!
//! Every item can be projected to its input form with [`Item::to_input`],
//! which drops the fields the protocol marks as absent on input (server
//! assigned ids and status). Items generated during a run are wrapped in
//! [`RunItem`], which records the producing agent and how the runtime
//! classified the item (message output, tool call, handoff, ...).

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message.
    User,
    /// System message providing instructions.
    System,
    /// Developer message providing instructions.
    Developer,
    /// Assistant (model) message.
    Assistant,
}

/// Lifecycle status of a model-produced item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// The item is still being produced.
    InProgress,
    /// The item is complete.
    Completed,
    /// The item was cut off before completion.
    Incomplete,
}

/// A single content segment within a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text produced by the model.
    OutputText {
        /// The text content.
        text: String,
    },
    /// Text supplied as input.
    InputText {
        /// The text content.
        text: String,
    },
    /// An image supplied as input (URL or base64 data URL).
    InputImage {
        /// The image location or data.
        image_url: String,
    },
    /// A refusal produced by the model instead of text.
    Refusal {
        /// The refusal message.
        refusal: String,
    },
}

impl ContentPart {
    /// The text of this part, if it is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::OutputText { text } | Self::InputText { text } => Some(text),
            Self::InputImage { .. } | Self::Refusal { .. } => None,
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageItem {
    /// Server-assigned item id (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Role of the message author.
    pub role: Role,
    /// Ordered content segments.
    pub content: Vec<ContentPart>,
    /// Item status (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// A function tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallItem {
    /// Server-assigned item id (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Correlation id pairing this call with its output.
    pub call_id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Raw JSON argument string.
    pub arguments: String,
    /// Item status (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// The reply to a function tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallOutputItem {
    /// Correlation id of the originating call.
    pub call_id: String,
    /// The tool's printable output.
    pub output: String,
}

/// A reasoning trace emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningItem {
    /// Server-assigned item id (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Summarized reasoning segments.
    #[serde(default)]
    pub summary: Vec<String>,
}

/// A hosted file-search invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSearchCallItem {
    /// Server-assigned item id (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The queries issued against the vector stores.
    #[serde(default)]
    pub queries: Vec<String>,
    /// Item status (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// A hosted web-search invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchCallItem {
    /// Server-assigned item id (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item status (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// A hosted image-generation invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerationCallItem {
    /// Server-assigned item id (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item status (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// A hosted code-interpreter invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeInterpreterCallItem {
    /// Server-assigned item id (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The code being executed.
    #[serde(default)]
    pub code: String,
    /// Item status (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// A computer-use action requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputerAction {
    /// Click at the given coordinates.
    Click {
        /// X coordinate.
        x: i64,
        /// Y coordinate.
        y: i64,
        /// Mouse button ("left", "right", "middle", ...).
        button: String,
    },
    /// Double-click at the given coordinates.
    DoubleClick {
        /// X coordinate.
        x: i64,
        /// Y coordinate.
        y: i64,
    },
    /// Drag along a path of coordinates.
    Drag {
        /// The path as `[x, y]` pairs.
        path: Vec<[i64; 2]>,
    },
    /// Press a key combination.
    Keypress {
        /// The keys to press together.
        keys: Vec<String>,
    },
    /// Move the mouse to the given coordinates.
    Move {
        /// X coordinate.
        x: i64,
        /// Y coordinate.
        y: i64,
    },
    /// Take a screenshot.
    Screenshot,
    /// Scroll from the given position.
    Scroll {
        /// X coordinate.
        x: i64,
        /// Y coordinate.
        y: i64,
        /// Horizontal scroll delta.
        scroll_x: i64,
        /// Vertical scroll delta.
        scroll_y: i64,
    },
    /// Type a string of text.
    Type {
        /// The text to type.
        text: String,
    },
    /// Wait briefly.
    Wait,
}

/// A computer-use call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputerCallItem {
    /// Server-assigned item id (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Correlation id pairing this call with its output.
    pub call_id: String,
    /// The action to perform.
    pub action: ComputerAction,
    /// Item status (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// The reply to a computer-use call (a screenshot of the resulting state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputerCallOutputItem {
    /// Correlation id of the originating call.
    pub call_id: String,
    /// Screenshot as a base64 data URL.
    pub output: String,
}

/// The shell command requested by a local-shell call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalShellAction {
    /// The command and its arguments.
    pub command: Vec<String>,
    /// Optional timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Optional working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

/// A local-shell call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalShellCallItem {
    /// Server-assigned item id (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Correlation id pairing this call with its output.
    pub call_id: String,
    /// The command to execute.
    pub action: LocalShellAction,
    /// Item status (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// The reply to a local-shell call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalShellCallOutputItem {
    /// Correlation id of the originating call.
    pub call_id: String,
    /// Captured command output.
    pub output: String,
}

/// An MCP tool call executed server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpCallItem {
    /// Server-assigned item id (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Label of the MCP server that handled the call.
    pub server_label: String,
    /// Name of the MCP tool.
    pub name: String,
    /// Raw JSON argument string.
    pub arguments: String,
    /// The tool's output, once available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// A request for approval of an MCP tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpApprovalRequestItem {
    /// Server-assigned item id (absent on input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Label of the MCP server requesting approval.
    pub server_label: String,
    /// Name of the MCP tool awaiting approval.
    pub name: String,
    /// Raw JSON argument string of the pending call.
    pub arguments: String,
}

/// The caller's answer to an MCP approval request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpApprovalResponseItem {
    /// Id of the approval request being answered.
    pub approval_request_id: String,
    /// Whether the call is approved.
    pub approve: bool,
    /// Optional reason, mostly useful for rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A conversation item in either input or output form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    /// A chat message.
    Message(MessageItem),
    /// A function tool call.
    FunctionCall(FunctionCallItem),
    /// The reply to a function tool call.
    FunctionCallOutput(FunctionCallOutputItem),
    /// A reasoning trace.
    Reasoning(ReasoningItem),
    /// A hosted file-search call.
    FileSearchCall(FileSearchCallItem),
    /// A hosted web-search call.
    WebSearchCall(WebSearchCallItem),
    /// A hosted image-generation call.
    ImageGenerationCall(ImageGenerationCallItem),
    /// A hosted code-interpreter call.
    CodeInterpreterCall(CodeInterpreterCallItem),
    /// A computer-use call.
    ComputerCall(ComputerCallItem),
    /// The reply to a computer-use call.
    ComputerCallOutput(ComputerCallOutputItem),
    /// A local-shell call.
    LocalShellCall(LocalShellCallItem),
    /// The reply to a local-shell call.
    LocalShellCallOutput(LocalShellCallOutputItem),
    /// An MCP tool call.
    McpCall(McpCallItem),
    /// An MCP approval request.
    McpApprovalRequest(McpApprovalRequestItem),
    /// The reply to an MCP approval request.
    McpApprovalResponse(McpApprovalResponseItem),
}

impl Item {
    /// Build a user message from plain text.
    #[must_use]
    pub fn user_message(text: impl Into<String>) -> Self {
        Self::Message(MessageItem {
            id: None,
            role: Role::User,
            content: vec![ContentPart::InputText { text: text.into() }],
            status: None,
        })
    }

    /// Build a system message from plain text.
    #[must_use]
    pub fn system_message(text: impl Into<String>) -> Self {
        Self::Message(MessageItem {
            id: None,
            role: Role::System,
            content: vec![ContentPart::InputText { text: text.into() }],
            status: None,
        })
    }

    /// Build an assistant message with a single output-text segment.
    #[must_use]
    pub fn assistant_message(text: impl Into<String>) -> Self {
        Self::Message(MessageItem {
            id: None,
            role: Role::Assistant,
            content: vec![ContentPart::OutputText { text: text.into() }],
            status: Some(ItemStatus::Completed),
        })
    }

    /// Project this item to its input form, dropping the fields the protocol
    /// marks as absent on input (server-assigned `id` and `status`).
    #[must_use]
    pub fn to_input(&self) -> Self {
        let mut item = self.clone();
        match &mut item {
            Self::Message(m) => {
                m.id = None;
                m.status = None;
            }
            Self::FunctionCall(c) => {
                c.id = None;
                c.status = None;
            }
            Self::Reasoning(r) => r.id = None,
            Self::FileSearchCall(c) => {
                c.id = None;
                c.status = None;
            }
            Self::WebSearchCall(c) => {
                c.id = None;
                c.status = None;
            }
            Self::ImageGenerationCall(c) => {
                c.id = None;
                c.status = None;
            }
            Self::CodeInterpreterCall(c) => {
                c.id = None;
                c.status = None;
            }
            Self::ComputerCall(c) => {
                c.id = None;
                c.status = None;
            }
            Self::LocalShellCall(c) => {
                c.id = None;
                c.status = None;
            }
            Self::McpCall(c) => c.id = None,
            Self::McpApprovalRequest(r) => r.id = None,
            Self::FunctionCallOutput(_)
            | Self::ComputerCallOutput(_)
            | Self::LocalShellCallOutput(_)
            | Self::McpApprovalResponse(_) => {}
        }
        item
    }

    /// The message payload, if this item is a message.
    #[must_use]
    pub const fn as_message(&self) -> Option<&MessageItem> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Returns `true` if this item is a message.
    #[must_use]
    pub const fn is_message(&self) -> bool {
        matches!(self, Self::Message(_))
    }
}

/// The caller-supplied input of a run: either a bare string (wrapped as a
/// single user message) or an explicit list of input items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunInput {
    /// Plain text, treated as one user message.
    Text(String),
    /// An explicit item list.
    Items(Vec<Item>),
}

impl From<&str> for RunInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for RunInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<Item>> for RunInput {
    fn from(items: Vec<Item>) -> Self {
        Self::Items(items)
    }
}

/// How the runtime classified a generated item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunItemKind {
    /// A message produced by the agent.
    MessageOutput,
    /// A tool call (function or hosted).
    ToolCall,
    /// The output of a tool call.
    ToolCallOutput,
    /// A function call that targets a handoff.
    HandoffCall,
    /// The acknowledgment item of an executed handoff.
    HandoffOutput,
    /// A reasoning trace.
    Reasoning,
    /// An MCP approval request awaiting an answer.
    McpApprovalRequest,
    /// The answer to an MCP approval request.
    McpApprovalResponse,
}

/// An item generated during a run, annotated with the producing agent and
/// the runtime's classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunItem {
    /// Name of the agent that produced this item.
    pub agent: String,
    /// How the runtime classified the item.
    pub kind: RunItemKind,
    /// The underlying conversation item.
    pub raw: Item,
}

impl RunItem {
    /// Create a new run item.
    #[must_use]
    pub fn new(agent: impl Into<String>, kind: RunItemKind, raw: Item) -> Self {
        Self {
            agent: agent.into(),
            kind,
            raw,
        }
    }

    /// Project the underlying item to its input form.
    #[must_use]
    pub fn to_input(&self) -> Item {
        self.raw.to_input()
    }
}

/// Normalize a run input into a fresh list of input items.
///
/// A bare string becomes a single user message; an item list is shallow
/// copied so that mutation of the result never affects the caller's list.
#[must_use]
pub fn input_to_new_input_list(input: &RunInput) -> Vec<Item> {
    match input {
        RunInput::Text(text) => vec![Item::user_message(text.clone())],
        RunInput::Items(items) => items.clone(),
    }
}

/// The text (or refusal) of the last content segment of a message item.
///
/// Returns an empty string for non-message items and for messages whose last
/// segment carries no text.
#[must_use]
pub fn extract_last_content(item: &Item) -> String {
    let Some(message) = item.as_message() else {
        return String::new();
    };
    match message.content.last() {
        Some(ContentPart::OutputText { text } | ContentPart::InputText { text }) => text.clone(),
        Some(ContentPart::Refusal { refusal }) => refusal.clone(),
        Some(ContentPart::InputImage { .. }) | None => String::new(),
    }
}

/// The text of the last content segment of a message item, or `None` when
/// the last segment is a refusal, an image, or missing.
#[must_use]
pub fn extract_last_text(item: &Item) -> Option<String> {
    item.as_message()
        .and_then(|m| m.content.last())
        .and_then(ContentPart::as_text)
        .map(str::to_owned)
}

/// All text segments of a single message run item, concatenated.
#[must_use]
pub fn text_message_output(item: &RunItem) -> String {
    if item.kind != RunItemKind::MessageOutput {
        return String::new();
    }
    let Some(message) = item.raw.as_message() else {
        return String::new();
    };
    message
        .content
        .iter()
        .filter_map(ContentPart::as_text)
        .collect()
}

/// Concatenated text of all message items in `items`, ignoring tool calls,
/// reasoning traces, and other non-message items.
#[must_use]
pub fn text_message_outputs(items: &[RunItem]) -> String {
    items.iter().map(text_message_output).collect()
}

/// Build the function-call-output item replying to `call`.
#[must_use]
pub fn tool_call_output_item(call: &FunctionCallItem, output: impl Into<String>) -> Item {
    Item::FunctionCallOutput(FunctionCallOutputItem {
        call_id: call.call_id.clone(),
        output: output.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_input_becomes_user_message() {
        let items = input_to_new_input_list(&RunInput::from("hello"));
        assert_eq!(items.len(), 1);
        let Item::Message(m) = &items[0] else {
            panic!("expected a message");
        };
        assert_eq!(m.role, Role::User);
        assert_eq!(m.content[0].as_text(), Some("hello"));
    }

    #[test]
    fn item_list_input_is_copied() {
        let input = RunInput::from(vec![Item::user_message("a")]);
        let mut items = input_to_new_input_list(&input);
        items.push(Item::user_message("b"));

        // The original input is unaffected by mutation of the copy.
        assert_eq!(input_to_new_input_list(&input).len(), 1);
    }

    #[test]
    fn last_content_prefers_refusal_text() {
        let item = Item::Message(MessageItem {
            id: None,
            role: Role::Assistant,
            content: vec![
                ContentPart::OutputText { text: "ok".into() },
                ContentPart::Refusal {
                    refusal: "cannot help".into(),
                },
            ],
            status: None,
        });

        assert_eq!(extract_last_content(&item), "cannot help");
        assert_eq!(extract_last_text(&item), None);
    }

    #[test]
    fn last_content_of_non_message_is_empty() {
        let item = Item::FunctionCall(FunctionCallItem {
            id: None,
            call_id: "c1".into(),
            name: "foo".into(),
            arguments: "{}".into(),
            status: None,
        });
        assert_eq!(extract_last_content(&item), "");
    }

    #[test]
    fn text_outputs_skip_non_messages() {
        let items = vec![
            RunItem::new("a", RunItemKind::MessageOutput, Item::assistant_message("one")),
            RunItem::new(
                "a",
                RunItemKind::ToolCall,
                Item::FunctionCall(FunctionCallItem {
                    id: None,
                    call_id: "c1".into(),
                    name: "foo".into(),
                    arguments: "{}".into(),
                    status: None,
                }),
            ),
            RunItem::new("a", RunItemKind::MessageOutput, Item::assistant_message("two")),
        ];

        assert_eq!(text_message_outputs(&items), "onetwo");
    }

    #[test]
    fn to_input_drops_output_only_fields() {
        let item = Item::Message(MessageItem {
            id: Some("msg_1".into()),
            role: Role::Assistant,
            content: vec![ContentPart::OutputText { text: "hi".into() }],
            status: Some(ItemStatus::Completed),
        });

        let input = item.to_input();
        let Item::Message(m) = &input else {
            panic!("expected a message");
        };
        assert!(m.id.is_none());
        assert!(m.status.is_none());

        // Input-form items survive a serde round-trip unchanged.
        let json = serde_json::to_string(&input).unwrap();
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(back, input);
    }

    #[test]
    fn item_serde_uses_type_tags() {
        let json = serde_json::to_value(Item::user_message("x")).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["role"], "user");

        let call = Item::FunctionCall(FunctionCallItem {
            id: None,
            call_id: "c9".into(),
            name: "lookup".into(),
            arguments: "{\"q\":1}".into(),
            status: None,
        });
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["type"], "function_call");
        assert_eq!(json["call_id"], "c9");
    }

    #[test]
    fn tool_call_output_pairs_call_id() {
        let call = FunctionCallItem {
            id: None,
            call_id: "c42".into(),
            name: "foo".into(),
            arguments: "{}".into(),
            status: None,
        };
        let Item::FunctionCallOutput(out) = tool_call_output_item(&call, "result") else {
            panic!("expected a function call output");
        };
        assert_eq!(out.call_id, "c42");
        assert_eq!(out.output, "result");
    }
}
