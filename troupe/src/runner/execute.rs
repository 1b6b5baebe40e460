//! Execution of a processed plan and the next-step decision.
//!
//! Function tools run concurrently; computer actions, local-shell calls,
//! and MCP approvals run as concurrent groups alongside them. Outputs are
//! appended in the order of their originating calls, not completion order,
//! and concurrent failures are joined by priority with the losers kept as
//! sibling errors. Afterwards the agent's tool-use behavior is consulted
//! and exactly one of three next steps is chosen: final output, handoff,
//! or run again. A handoff takes precedence over a final-output-shaped
//! message in the same response.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{Instrument, info_span, warn};

use crate::agent::{Agent, ToolUseBehavior};
use crate::error::{Error, Result, try_join_prioritized};
use crate::handoff::{HandoffInputData, HandoffInputFilter};
use crate::hooks::HookPair;
use crate::items::{
    Item, LocalShellCallOutputItem, McpApprovalResponseItem, RunInput, RunItem, RunItemKind,
    tool_call_output_item,
};
use crate::model::ModelResponse;
use crate::tool::FunctionToolResult;

use super::process::{ProcessedResponse, ToolRunFunction};

/// The step the driver takes after a turn.
#[derive(Debug)]
pub(crate) enum NextStep {
    /// Invoke the model again with the new items.
    RunAgain,
    /// The run is complete with this value.
    FinalOutput(Value),
    /// Control transfers to this agent.
    Handoff(Arc<Agent>),
}

/// Everything a single turn produced.
#[derive(Debug)]
pub(crate) struct SingleStepResult {
    /// The raw response of this turn's model call.
    pub model_response: ModelResponse,
    /// The run input, possibly rewritten by a handoff filter.
    pub original_input: RunInput,
    /// Items that existed before this turn, possibly rewritten by a filter.
    pub pre_step_items: Vec<RunItem>,
    /// Items produced by this turn.
    pub new_step_items: Vec<RunItem>,
    /// The transition the driver applies next.
    pub next_step: NextStep,
}

impl SingleStepResult {
    /// The full generated-item list after this turn.
    pub fn generated_items(&self) -> Vec<RunItem> {
        let mut items = self.pre_step_items.clone();
        items.extend(self.new_step_items.iter().cloned());
        items
    }
}

/// One unit of concurrently-executed side-effect work within a turn.
enum SideEffect {
    /// A function tool invocation and its output item.
    Function(FunctionToolResult),
    /// Output items appended by a hosted-tool group.
    Items(Vec<RunItem>),
}

/// Run the plan's side effects and decide the next step.
pub(crate) async fn execute_tools_and_side_effects(
    agent: &Arc<Agent>,
    original_input: RunInput,
    pre_step_items: Vec<RunItem>,
    processed: ProcessedResponse,
    model_response: ModelResponse,
    hooks: &HookPair<'_>,
    run_handoff_filter: Option<&HandoffInputFilter>,
) -> Result<SingleStepResult> {
    let agent_name = agent.name();
    let had_local_runs = processed.has_tools_or_approvals_to_run();
    let mut new_items = processed.new_items;

    // Function tools in parallel; hosted side effects as concurrent groups.
    // Within each group the original call order is preserved, and the
    // prioritized join keeps every group's failure observable.
    let functions = &processed.functions;
    let computer_actions = &processed.computer_actions;
    let local_shell_calls = &processed.local_shell_calls;
    let mcp_approvals = &processed.mcp_approvals;

    let mut side_effects: Vec<BoxFuture<'_, Result<SideEffect>>> = Vec::new();

    for run in functions {
        side_effects.push(Box::pin(async move {
            Ok(SideEffect::Function(
                run_function_tool(agent, run, hooks).await?,
            ))
        }));
    }

    side_effects.push(Box::pin(async move {
        let mut items = Vec::with_capacity(computer_actions.len());
        for run in computer_actions {
            let screenshot = run.tool.perform(&run.call.action).await?;
            items.push(RunItem::new(
                agent_name,
                RunItemKind::ToolCallOutput,
                Item::ComputerCallOutput(crate::items::ComputerCallOutputItem {
                    call_id: run.call.call_id.clone(),
                    output: screenshot,
                }),
            ));
        }
        Ok(SideEffect::Items(items))
    }));

    side_effects.push(Box::pin(async move {
        let mut items = Vec::with_capacity(local_shell_calls.len());
        for run in local_shell_calls {
            let output = run.tool.execute(run.call.action.clone()).await?;
            items.push(RunItem::new(
                agent_name,
                RunItemKind::ToolCallOutput,
                Item::LocalShellCallOutput(LocalShellCallOutputItem {
                    call_id: run.call.call_id.clone(),
                    output,
                }),
            ));
        }
        Ok(SideEffect::Items(items))
    }));

    side_effects.push(Box::pin(async move {
        let mut items = Vec::with_capacity(mcp_approvals.len());
        for run in mcp_approvals {
            let decision = run.tool.approve(run.request.clone()).await?;
            items.push(RunItem::new(
                agent_name,
                RunItemKind::McpApprovalResponse,
                Item::McpApprovalResponse(McpApprovalResponseItem {
                    approval_request_id: run.request.id.clone().unwrap_or_default(),
                    approve: decision.approve,
                    reason: decision.reason,
                }),
            ));
        }
        Ok(SideEffect::Items(items))
    }));

    // Function results come back first (in call order), then the hosted
    // groups in their fixed order.
    let mut function_results = Vec::with_capacity(processed.functions.len());
    for effect in try_join_prioritized(side_effects).await? {
        match effect {
            SideEffect::Function(result) => {
                new_items.push(result.item.clone());
                function_results.push(result);
            }
            SideEffect::Items(items) => new_items.extend(items),
        }
    }

    // Tool-use behavior may turn a tool result into the final output.
    if let Some(final_output) = check_tool_use_behavior(agent, &function_results).await? {
        return Ok(SingleStepResult {
            model_response,
            original_input,
            pre_step_items,
            new_step_items: new_items,
            next_step: NextStep::FinalOutput(final_output),
        });
    }

    // A handoff beats a final-output-shaped message in the same response.
    let mut handoffs = processed.handoffs.into_iter();
    if let Some(first) = handoffs.next() {
        for extra in handoffs {
            new_items.push(RunItem::new(
                agent_name,
                RunItemKind::ToolCallOutput,
                tool_call_output_item(
                    &extra.call,
                    "Multiple handoffs detected, ignoring this one.",
                ),
            ));
        }

        let new_agent = first.handoff.invoke(first.call.arguments.clone()).await?;
        hooks.handoff(agent, &new_agent).await?;
        new_items.push(RunItem::new(
            agent_name,
            RunItemKind::HandoffOutput,
            tool_call_output_item(
                &first.call,
                format!("{{\"assistant\": \"{}\"}}", new_agent.name()),
            ),
        ));

        // A handoff-local filter takes precedence over the run-level one.
        let filter = first.handoff.input_filter().or(run_handoff_filter);
        let (original_input, pre_step_items, new_items) = match filter {
            Some(f) => {
                let data = f(HandoffInputData {
                    input_history: original_input,
                    pre_handoff_items: pre_step_items,
                    new_items,
                });
                (data.input_history, data.pre_handoff_items, data.new_items)
            }
            None => (original_input, pre_step_items, new_items),
        };

        return Ok(SingleStepResult {
            model_response,
            original_input,
            pre_step_items,
            new_step_items: new_items,
            next_step: NextStep::Handoff(new_agent),
        });
    }

    // A message-shaped final output only counts when nothing ran locally.
    let next_step = if had_local_runs {
        NextStep::RunAgain
    } else {
        match resolve_final_output(agent, &processed.message_texts)? {
            Some(value) => NextStep::FinalOutput(value),
            None => NextStep::RunAgain,
        }
    };

    Ok(SingleStepResult {
        model_response,
        original_input,
        pre_step_items,
        new_step_items: new_items,
        next_step,
    })
}

/// Invoke one function tool with its lifecycle hooks and tracing span.
async fn run_function_tool(
    agent: &Arc<Agent>,
    run: &ToolRunFunction,
    hooks: &HookPair<'_>,
) -> Result<FunctionToolResult> {
    let span = info_span!(
        "tool",
        tool.name = %run.call.name,
        tool.call_id = %run.call.call_id,
    );
    async {
        hooks.tool_start(agent, &run.call.name).await?;
        let output = run
            .tool
            .invoke(run.call.arguments.clone())
            .await
            .map_err(|error| {
                warn!(tool = %run.call.name, %error, "Tool execution failed");
                error
            })?;
        hooks.tool_end(agent, &run.call.name, &output).await?;

        let item = RunItem::new(
            agent.name(),
            RunItemKind::ToolCallOutput,
            tool_call_output_item(&run.call, output.clone()),
        );
        Ok(FunctionToolResult {
            tool_name: run.call.name.clone(),
            output,
            item,
        })
    }
    .instrument(span)
    .await
}

/// Apply the agent's tool-use behavior to this turn's function results.
async fn check_tool_use_behavior(
    agent: &Arc<Agent>,
    results: &[FunctionToolResult],
) -> Result<Option<Value>> {
    if results.is_empty() {
        return Ok(None);
    }
    match agent.tool_use_behavior() {
        ToolUseBehavior::RunLlmAgain => Ok(None),
        ToolUseBehavior::StopOnFirstTool => Ok(results
            .first()
            .map(|result| Value::String(result.output.clone()))),
        ToolUseBehavior::StopAtTools(names) => Ok(results
            .iter()
            .find(|result| names.contains(&result.tool_name))
            .map(|result| Value::String(result.output.clone()))),
        ToolUseBehavior::Custom(decider) => {
            let decision = decider.decide(agent, results).await?;
            if !decision.is_final_output {
                return Ok(None);
            }
            decision.final_output.map(Some).ok_or_else(|| {
                Error::user("custom tool-use behavior declared a final output without a value")
            })
        }
    }
}

/// Resolve the final-output candidates gathered by the processor.
///
/// With a schema, the last parseable candidate wins and a response whose
/// candidates all fail to parse is a model-behavior error. Without one, the
/// last message text wins.
fn resolve_final_output(agent: &Agent, candidates: &[String]) -> Result<Option<Value>> {
    if candidates.is_empty() {
        return Ok(None);
    }
    match agent.output_schema() {
        Some(schema) => {
            let mut first_error = None;
            for text in candidates.iter().rev() {
                match schema.validate_json(text) {
                    Ok(value) => return Ok(Some(value)),
                    Err(error) => {
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                }
            }
            Err(first_error
                .unwrap_or_else(|| Error::model_behavior("structured output did not parse")))
        }
        None => Ok(candidates.last().map(|text| Value::String(text.clone()))),
    }
}
