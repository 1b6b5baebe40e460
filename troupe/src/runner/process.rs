//! Interpretation of a raw model response into an ordered execution plan.
//!
//! The processor walks the response's output items once, appending
//! conversation items in model order and sorting the executable calls into
//! buckets: function tools, handoffs, computer actions, local-shell calls,
//! and MCP approval requests. A call that names an unknown tool, or a
//! computer/shell call without the enabling tool, is a model-behavior
//! error.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::handoff::Handoff;
use crate::items::{
    ComputerCallItem, FunctionCallItem, Item, LocalShellCallItem, McpApprovalRequestItem,
    RunItem, RunItemKind, extract_last_text,
};
use crate::model::ModelResponse;
use crate::tool::{
    ComputerTool, FileSearchTool, FunctionTool, HostedMcpTool, LocalShellTool, Tool,
    WebSearchTool,
};

/// A function tool call paired with its resolved tool.
#[derive(Debug, Clone)]
pub(crate) struct ToolRunFunction {
    pub call: FunctionCallItem,
    pub tool: FunctionTool,
}

/// A handoff call paired with its resolved descriptor.
#[derive(Debug, Clone)]
pub(crate) struct ToolRunHandoff {
    pub call: FunctionCallItem,
    pub handoff: Handoff,
}

/// A computer action paired with the agent's computer tool.
#[derive(Debug, Clone)]
pub(crate) struct ToolRunComputer {
    pub call: ComputerCallItem,
    pub tool: ComputerTool,
}

/// A local-shell call paired with the agent's shell tool.
#[derive(Debug, Clone)]
pub(crate) struct ToolRunLocalShell {
    pub call: LocalShellCallItem,
    pub tool: LocalShellTool,
}

/// An MCP approval request paired with the matching hosted MCP tool.
#[derive(Debug, Clone)]
pub(crate) struct ToolRunMcpApproval {
    pub request: McpApprovalRequestItem,
    pub tool: HostedMcpTool,
}

/// The ordered plan extracted from one model response.
#[derive(Debug, Default)]
pub(crate) struct ProcessedResponse {
    /// Conversation items to append, in model order.
    pub new_items: Vec<RunItem>,
    /// Function tool calls to execute.
    pub functions: Vec<ToolRunFunction>,
    /// Handoff calls (only the first routes).
    pub handoffs: Vec<ToolRunHandoff>,
    /// Computer actions to perform.
    pub computer_actions: Vec<ToolRunComputer>,
    /// Local-shell calls to execute.
    pub local_shell_calls: Vec<ToolRunLocalShell>,
    /// MCP approval requests to answer.
    pub mcp_approvals: Vec<ToolRunMcpApproval>,
    /// Names of all tools the response used.
    pub tools_used: Vec<String>,
    /// Final-output candidate texts from assistant messages, in model order.
    pub message_texts: Vec<String>,
}

impl ProcessedResponse {
    /// Whether anything in the plan requires local execution before the
    /// next-step decision.
    pub fn has_tools_or_approvals_to_run(&self) -> bool {
        !(self.functions.is_empty()
            && self.handoffs.is_empty()
            && self.computer_actions.is_empty()
            && self.local_shell_calls.is_empty()
            && self.mcp_approvals.is_empty())
    }
}

/// Interpret `response` against the agent's effective tools and handoffs.
pub(crate) fn process_model_response(
    agent: &Arc<Agent>,
    tools: &[Tool],
    handoffs: &[Handoff],
    response: &ModelResponse,
) -> Result<ProcessedResponse> {
    let agent_name = agent.name();

    let function_map: HashMap<&str, &FunctionTool> = tools
        .iter()
        .filter_map(|tool| match tool {
            Tool::Function(function) => Some((function.name.as_str(), function)),
            _ => None,
        })
        .collect();
    let handoff_map: HashMap<&str, &Handoff> = handoffs
        .iter()
        .map(|handoff| (handoff.tool_name.as_str(), handoff))
        .collect();
    let computer_tool = tools.iter().find_map(|tool| match tool {
        Tool::Computer(computer) => Some(computer),
        _ => None,
    });
    let shell_tool = tools.iter().find_map(|tool| match tool {
        Tool::LocalShell(shell) => Some(shell),
        _ => None,
    });

    let mut processed = ProcessedResponse::default();
    let wants_structured = agent.output_schema().is_some();

    for item in &response.output {
        match item {
            Item::Message(message) => {
                processed.new_items.push(RunItem::new(
                    agent_name,
                    RunItemKind::MessageOutput,
                    item.clone(),
                ));
                // Track final-output candidates. Structured output requires
                // a single text segment; plain text takes the last segment.
                if wants_structured {
                    if message.content.len() == 1 {
                        if let Some(text) = extract_last_text(item) {
                            processed.message_texts.push(text);
                        }
                    }
                } else if let Some(text) = extract_last_text(item) {
                    processed.message_texts.push(text);
                }
            }

            Item::Reasoning(_) => {
                processed.new_items.push(RunItem::new(
                    agent_name,
                    RunItemKind::Reasoning,
                    item.clone(),
                ));
            }

            Item::FunctionCall(call) => {
                if let Some(handoff) = handoff_map.get(call.name.as_str()) {
                    processed.new_items.push(RunItem::new(
                        agent_name,
                        RunItemKind::HandoffCall,
                        item.clone(),
                    ));
                    processed.handoffs.push(ToolRunHandoff {
                        call: call.clone(),
                        handoff: (*handoff).clone(),
                    });
                    processed.tools_used.push(call.name.clone());
                } else if let Some(function) = function_map.get(call.name.as_str()) {
                    processed.new_items.push(RunItem::new(
                        agent_name,
                        RunItemKind::ToolCall,
                        item.clone(),
                    ));
                    processed.functions.push(ToolRunFunction {
                        call: call.clone(),
                        tool: (*function).clone(),
                    });
                    processed.tools_used.push(call.name.clone());
                } else {
                    return Err(Error::model_behavior(format!(
                        "model called tool '{}', which agent '{agent_name}' does not have",
                        call.name
                    )));
                }
            }

            Item::FileSearchCall(_) => {
                processed.new_items.push(RunItem::new(
                    agent_name,
                    RunItemKind::ToolCall,
                    item.clone(),
                ));
                processed.tools_used.push(FileSearchTool::NAME.to_owned());
            }
            Item::WebSearchCall(_) => {
                processed.new_items.push(RunItem::new(
                    agent_name,
                    RunItemKind::ToolCall,
                    item.clone(),
                ));
                processed.tools_used.push(WebSearchTool::NAME.to_owned());
            }
            Item::ImageGenerationCall(_) => {
                processed.new_items.push(RunItem::new(
                    agent_name,
                    RunItemKind::ToolCall,
                    item.clone(),
                ));
                processed.tools_used.push("image_generation".to_owned());
            }
            Item::CodeInterpreterCall(_) => {
                processed.new_items.push(RunItem::new(
                    agent_name,
                    RunItemKind::ToolCall,
                    item.clone(),
                ));
                processed.tools_used.push("code_interpreter".to_owned());
            }
            Item::McpCall(_) => {
                processed.new_items.push(RunItem::new(
                    agent_name,
                    RunItemKind::ToolCall,
                    item.clone(),
                ));
                processed.tools_used.push(HostedMcpTool::NAME.to_owned());
            }

            Item::ComputerCall(call) => {
                let Some(tool) = computer_tool else {
                    return Err(Error::model_behavior(format!(
                        "model produced a computer call but agent '{agent_name}' has no computer tool"
                    )));
                };
                processed.new_items.push(RunItem::new(
                    agent_name,
                    RunItemKind::ToolCall,
                    item.clone(),
                ));
                processed.computer_actions.push(ToolRunComputer {
                    call: call.clone(),
                    tool: tool.clone(),
                });
                processed.tools_used.push(ComputerTool::NAME.to_owned());
            }

            Item::LocalShellCall(call) => {
                let Some(tool) = shell_tool else {
                    return Err(Error::model_behavior(format!(
                        "model produced a local shell call but agent '{agent_name}' has no local shell tool"
                    )));
                };
                processed.new_items.push(RunItem::new(
                    agent_name,
                    RunItemKind::ToolCall,
                    item.clone(),
                ));
                processed.local_shell_calls.push(ToolRunLocalShell {
                    call: call.clone(),
                    tool: tool.clone(),
                });
                processed.tools_used.push(LocalShellTool::NAME.to_owned());
            }

            Item::McpApprovalRequest(request) => {
                let tool = tools.iter().find_map(|tool| match tool {
                    Tool::HostedMcp(mcp) if mcp.server_label == request.server_label => Some(mcp),
                    _ => None,
                });
                let Some(tool) = tool else {
                    return Err(Error::model_behavior(format!(
                        "MCP approval requested for unknown server '{}' on agent '{agent_name}'",
                        request.server_label
                    )));
                };
                processed.new_items.push(RunItem::new(
                    agent_name,
                    RunItemKind::McpApprovalRequest,
                    item.clone(),
                ));
                processed.mcp_approvals.push(ToolRunMcpApproval {
                    request: request.clone(),
                    tool: tool.clone(),
                });
            }

            // Output-side reply items are not expected from the model; pass
            // them through so nothing is silently lost.
            Item::FunctionCallOutput(_)
            | Item::ComputerCallOutput(_)
            | Item::LocalShellCallOutput(_)
            | Item::McpApprovalResponse(_) => {
                processed.new_items.push(RunItem::new(
                    agent_name,
                    RunItemKind::ToolCallOutput,
                    item.clone(),
                ));
            }
        }
    }

    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fake;
    use crate::schema::AgentOutputSchema;
    use crate::tool::FunctionTool;
    use crate::usage::Usage;
    use serde_json::json;

    fn response(output: Vec<Item>) -> ModelResponse {
        ModelResponse {
            output,
            usage: Usage::zero(),
            response_id: None,
        }
    }

    fn echo_tool(name: &str) -> Tool {
        FunctionTool::new(name, "", json!({"type": "object"}), |args: String| async move {
            Ok(args)
        })
        .into()
    }

    #[test]
    fn unknown_tool_is_model_behavior() {
        let agent = Agent::builder("A").build();
        let resp = response(vec![fake::function_call("missing", "{}")]);

        let err = process_model_response(&agent, &[], &[], &resp).unwrap_err();
        assert!(matches!(err, Error::ModelBehavior { .. }));
    }

    #[test]
    fn computer_call_without_tool_is_model_behavior() {
        let agent = Agent::builder("A").build();
        let resp = response(vec![Item::ComputerCall(ComputerCallItem {
            id: None,
            call_id: "c1".into(),
            action: crate::items::ComputerAction::Screenshot,
            status: None,
        })]);

        let err = process_model_response(&agent, &[], &[], &resp).unwrap_err();
        assert!(matches!(err, Error::ModelBehavior { .. }));
    }

    #[test]
    fn handoff_name_wins_over_function_bucket() {
        let peer = Agent::builder("Peer").build();
        let handoff = Handoff::from_agent(peer);
        let agent = Agent::builder("A").build();
        let tools = vec![echo_tool("other")];
        let resp = response(vec![
            fake::function_call("transfer_to_peer", "{}"),
            fake::function_call("other", "{}"),
        ]);

        let processed =
            process_model_response(&agent, &tools, std::slice::from_ref(&handoff), &resp).unwrap();
        assert_eq!(processed.handoffs.len(), 1);
        assert_eq!(processed.functions.len(), 1);
        assert_eq!(processed.new_items[0].kind, RunItemKind::HandoffCall);
        assert_eq!(processed.new_items[1].kind, RunItemKind::ToolCall);
        assert_eq!(processed.tools_used, ["transfer_to_peer", "other"]);
    }

    #[test]
    fn structured_candidates_require_single_segment() {
        let agent = Agent::builder("A")
            .output_schema(AgentOutputSchema::from_json_schema(
                "Out",
                json!({"type": "object"}),
            ))
            .build();

        let two_parts = Item::Message(crate::items::MessageItem {
            id: None,
            role: crate::items::Role::Assistant,
            content: vec![
                crate::items::ContentPart::OutputText { text: "{}".into() },
                crate::items::ContentPart::OutputText { text: "{}".into() },
            ],
            status: None,
        });
        let resp = response(vec![two_parts, fake::output_message("{\"a\":1}")]);

        let processed = process_model_response(&agent, &[], &[], &resp).unwrap();
        assert_eq!(processed.message_texts, ["{\"a\":1}"]);
    }
}
