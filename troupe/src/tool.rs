//! Tool descriptors and the capability surface the runtime drives.
//!
//! A [`Tool`] is a tagged variant rather than a trait hierarchy: the runtime
//! needs to tell function tools (invoked locally with a raw JSON argument
//! string) apart from hosted tools (executed provider-side and merely
//! observed here), from the computer-use and local-shell tools (which carry
//! local executors), and from hosted MCP tools (which may require approval
//! callbacks).
//!
//! # Function tool ABI
//!
//! A function tool receives the call's raw JSON argument string (already a
//! syntactically valid JSON object, enforced by the model against the tool's
//! schema) and returns a printable value or an error. Errors are surfaced
//! to the run loop, not fed back to the model, unless the tool elects to
//! return them as strings.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::items::{ComputerAction, LocalShellAction, McpApprovalRequestItem, RunItem};

/// Boxed async invocation function of a function tool.
pub type ToolInvokeFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Boxed async enable-predicate evaluated against the owning agent.
pub type EnabledFn = Arc<dyn Fn(Arc<Agent>) -> BoxFuture<'static, Result<bool>> + Send + Sync>;

/// The describe-form of a tool, as advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    /// Tool name, unique within an agent.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema of the tool's arguments.
    pub parameters: Value,
    /// Whether the schema is declared in strict mode.
    pub strict: bool,
}

/// A locally-invoked function tool.
#[derive(Clone)]
pub struct FunctionTool {
    /// Tool name, unique within an agent.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema of the tool's arguments.
    pub parameters: Value,
    /// Whether the schema is declared in strict mode.
    pub strict_json_schema: bool,
    on_invoke: ToolInvokeFn,
    is_enabled: Option<EnabledFn>,
}

impl FunctionTool {
    /// Create a function tool from a raw-JSON handler.
    #[must_use]
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        f: F,
    ) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            strict_json_schema: true,
            on_invoke: Arc::new(move |args| Box::pin(f(args))),
            is_enabled: None,
        }
    }

    /// Create a function tool whose arguments deserialize into `A`, with the
    /// schema derived from `A` via [`schemars`].
    #[must_use]
    pub fn typed<A, F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        A: DeserializeOwned + JsonSchema,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let parameters = serde_json::to_value(schemars::schema_for!(A))
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
        let name = name.into();
        let tool_name = name.clone();
        Self::new(name, description, parameters, move |args: String| {
            let tool_name = tool_name.clone();
            let parsed = serde_json::from_str::<A>(&args).map_err(|e| {
                Error::model_behavior(format!("invalid arguments for tool '{tool_name}': {e}"))
            });
            let fut = parsed.map(&f);
            async move { fut?.await }
        })
    }

    /// Attach a dynamic enable-predicate evaluated per run against the agent.
    #[must_use]
    pub fn with_enabled<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<Agent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        self.is_enabled = Some(Arc::new(move |agent| Box::pin(f(agent))));
        self
    }

    /// Disable strict-mode schema declaration.
    #[must_use]
    pub fn non_strict(mut self) -> Self {
        self.strict_json_schema = false;
        self
    }

    /// Invoke the tool with the call's raw JSON argument string.
    pub(crate) async fn invoke(&self, arguments: String) -> Result<String> {
        (self.on_invoke)(arguments).await
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
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            strict: self.strict_json_schema,
        }
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("strict", &self.strict_json_schema)
            .field("dynamic_enabled", &self.is_enabled.is_some())
            .finish_non_exhaustive()
    }
}

/// The result of one function tool invocation within a turn.
///
/// Passed to [`ToolUseDecider`](crate::agent::ToolUseDecider) implementations
/// so custom behaviors can inspect what ran.
#[derive(Debug, Clone)]
pub struct FunctionToolResult {
    /// Name of the tool that ran.
    pub tool_name: String,
    /// The tool's printable output.
    pub output: String,
    /// The function-call-output item appended to the conversation.
    pub item: RunItem,
}

/// An environment the computer-use tool drives.
///
/// Implementations wrap a browser, a VM, or any other controllable surface.
/// After every action the runtime captures a screenshot via
/// [`Computer::screenshot`] and feeds it back to the model.
#[async_trait::async_trait]
pub trait Computer: Send + Sync {
    /// Click at the given coordinates.
    async fn click(&self, x: i64, y: i64, button: &str) -> Result<()>;
    /// Double-click at the given coordinates.
    async fn double_click(&self, x: i64, y: i64) -> Result<()>;
    /// Drag along a path of coordinates.
    async fn drag(&self, path: &[[i64; 2]]) -> Result<()>;
    /// Press a key combination.
    async fn keypress(&self, keys: &[String]) -> Result<()>;
    /// Move the mouse to the given coordinates.
    async fn move_mouse(&self, x: i64, y: i64) -> Result<()>;
    /// Capture the current screen as a base64 data URL.
    async fn screenshot(&self) -> Result<String>;
    /// Scroll from the given position.
    async fn scroll(&self, x: i64, y: i64, scroll_x: i64, scroll_y: i64) -> Result<()>;
    /// Type a string of text.
    async fn type_text(&self, text: &str) -> Result<()>;
    /// Wait briefly.
    async fn wait(&self) -> Result<()>;
}

/// The computer-use tool, wrapping a [`Computer`] environment.
#[derive(Clone)]
pub struct ComputerTool {
    /// The controlled environment.
    pub computer: Arc<dyn Computer>,
}

impl ComputerTool {
    /// The fixed tool name advertised to the model.
    pub const NAME: &'static str = "computer_use";

    /// Wrap a [`Computer`] environment as a tool.
    #[must_use]
    pub fn new(computer: Arc<dyn Computer>) -> Self {
        Self { computer }
    }

    /// Perform one action and return the resulting screenshot.
    pub(crate) async fn perform(&self, action: &ComputerAction) -> Result<String> {
        match action {
            ComputerAction::Click { x, y, button } => self.computer.click(*x, *y, button).await?,
            ComputerAction::DoubleClick { x, y } => self.computer.double_click(*x, *y).await?,
            ComputerAction::Drag { path } => self.computer.drag(path).await?,
            ComputerAction::Keypress { keys } => self.computer.keypress(keys).await?,
            ComputerAction::Move { x, y } => self.computer.move_mouse(*x, *y).await?,
            ComputerAction::Screenshot => {}
            ComputerAction::Scroll {
                x,
                y,
                scroll_x,
                scroll_y,
            } => self.computer.scroll(*x, *y, *scroll_x, *scroll_y).await?,
            ComputerAction::Type { text } => self.computer.type_text(text).await?,
            ComputerAction::Wait => self.computer.wait().await?,
        }
        self.computer.screenshot().await
    }
}

impl std::fmt::Debug for ComputerTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputerTool").finish_non_exhaustive()
    }
}

/// Boxed async executor of local-shell commands.
pub type ShellExecFn =
    Arc<dyn Fn(LocalShellAction) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// The local-shell tool, wrapping a command executor.
#[derive(Clone)]
pub struct LocalShellTool {
    executor: ShellExecFn,
}

impl LocalShellTool {
    /// The fixed tool name advertised to the model.
    pub const NAME: &'static str = "local_shell";

    /// Wrap a command executor as a tool.
    #[must_use]
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(LocalShellAction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            executor: Arc::new(move |action| Box::pin(f(action))),
        }
    }

    pub(crate) async fn execute(&self, action: LocalShellAction) -> Result<String> {
        (self.executor)(action).await
    }
}

impl std::fmt::Debug for LocalShellTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalShellTool").finish_non_exhaustive()
    }
}

/// The hosted file-search tool (executed provider-side).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSearchTool {
    /// Vector stores to search.
    pub vector_store_ids: Vec<String>,
    /// Maximum number of results to return.
    pub max_num_results: Option<u32>,
}

impl FileSearchTool {
    /// The fixed tool name advertised to the model.
    pub const NAME: &'static str = "file_search";
}

/// The hosted web-search tool (executed provider-side).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebSearchTool {
    /// Approximate user location forwarded to the search backend.
    pub user_location: Option<String>,
    /// Search context size hint ("low", "medium", "high").
    pub search_context_size: Option<String>,
}

impl WebSearchTool {
    /// The fixed tool name advertised to the model.
    pub const NAME: &'static str = "web_search";
}

/// The caller's decision on an MCP approval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpApprovalDecision {
    /// Whether the pending call may proceed.
    pub approve: bool,
    /// Optional reason, mostly useful for rejections.
    pub reason: Option<String>,
}

impl McpApprovalDecision {
    /// Approve the pending call.
    #[must_use]
    pub const fn approve() -> Self {
        Self {
            approve: true,
            reason: None,
        }
    }

    /// Reject the pending call with a reason.
    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approve: false,
            reason: Some(reason.into()),
        }
    }
}

/// Boxed async approval callback for hosted MCP calls.
pub type McpApprovalFn = Arc<
    dyn Fn(McpApprovalRequestItem) -> BoxFuture<'static, Result<McpApprovalDecision>>
        + Send
        + Sync,
>;

/// A hosted MCP server exposed to the model as a tool.
#[derive(Clone)]
pub struct HostedMcpTool {
    /// Label identifying the MCP server.
    pub server_label: String,
    on_approval: Option<McpApprovalFn>,
}

impl HostedMcpTool {
    /// The fixed tool name advertised to the model.
    pub const NAME: &'static str = "hosted_mcp";

    /// Expose the MCP server with the given label.
    #[must_use]
    pub fn new(server_label: impl Into<String>) -> Self {
        Self {
            server_label: server_label.into(),
            on_approval: None,
        }
    }

    /// Attach an approval callback for calls the server gates on approval.
    #[must_use]
    pub fn with_approval<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(McpApprovalRequestItem) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<McpApprovalDecision>> + Send + 'static,
    {
        self.on_approval = Some(Arc::new(move |request| Box::pin(f(request))));
        self
    }

    pub(crate) async fn approve(
        &self,
        request: McpApprovalRequestItem,
    ) -> Result<McpApprovalDecision> {
        match &self.on_approval {
            Some(f) => f(request).await,
            None => Err(Error::user(format!(
                "MCP server '{}' requested approval but no approval callback is configured",
                self.server_label
            ))),
        }
    }
}

impl std::fmt::Debug for HostedMcpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedMcpTool")
            .field("server_label", &self.server_label)
            .field("has_approval", &self.on_approval.is_some())
            .finish_non_exhaustive()
    }
}

/// A tool an agent may use.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Tool {
    /// A locally-invoked function tool.
    Function(FunctionTool),
    /// The hosted file-search tool.
    FileSearch(FileSearchTool),
    /// The hosted web-search tool.
    WebSearch(WebSearchTool),
    /// The computer-use tool.
    Computer(ComputerTool),
    /// The local-shell tool.
    LocalShell(LocalShellTool),
    /// A hosted MCP server.
    HostedMcp(HostedMcpTool),
}

impl Tool {
    /// The tool's name as advertised to the model.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Function(t) => &t.name,
            Self::FileSearch(_) => FileSearchTool::NAME,
            Self::WebSearch(_) => WebSearchTool::NAME,
            Self::Computer(_) => ComputerTool::NAME,
            Self::LocalShell(_) => LocalShellTool::NAME,
            Self::HostedMcp(_) => HostedMcpTool::NAME,
        }
    }

    /// The describe-form advertised to the model.
    ///
    /// Hosted tools carry no caller-side argument schema; their parameters
    /// are defined provider-side.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        match self {
            Self::Function(t) => t.definition(),
            _ => ToolDefinition {
                name: self.name().to_owned(),
                description: String::new(),
                parameters: serde_json::json!({ "type": "object", "properties": {} }),
                strict: false,
            },
        }
    }

    /// Evaluate the tool's enable-predicate against the agent.
    ///
    /// Tools without a predicate are always enabled.
    pub(crate) async fn enabled_for(&self, agent: &Arc<Agent>) -> Result<bool> {
        match self {
            Self::Function(t) => t.enabled_for(agent).await,
            _ => Ok(true),
        }
    }
}

impl From<FunctionTool> for Tool {
    fn from(tool: FunctionTool) -> Self {
        Self::Function(tool)
    }
}
