//! End-to-end scenarios for the blocking and streaming drivers, exercised
//! against the scripted [`FakeModel`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

use crate::agent::{Agent, ToolUseBehavior, ToolUseDecider, ToolsToFinalOutput};
use crate::error::{Error, Result};
use crate::guardrail::{
    GuardrailOutput, InputGuardrail, InputGuardrailCheck, OutputGuardrail, OutputGuardrailCheck,
};
use crate::hooks::RunHooks;
use crate::items::{
    Item, McpApprovalRequestItem, RunInput, RunItemKind,
};
use crate::model::fake::{self, FakeModel};
use crate::model::{Model, ModelSettings, ToolChoice};
use crate::result::StreamEvent;
use crate::schema::AgentOutputSchema;
use crate::tool::{
    FunctionTool, FunctionToolResult, HostedMcpTool, McpApprovalDecision, Tool,
};

use super::{RunConfig, Runner};

fn tool_returning(name: &str, output: &'static str) -> FunctionTool {
    FunctionTool::new(
        name,
        "",
        json!({"type": "object"}),
        move |_args: String| async move { Ok::<String, Error>(output.to_owned()) },
    )
}

fn sleepy_tool(name: &str, delay_ms: u64, output: &'static str) -> FunctionTool {
    FunctionTool::new(
        name,
        "",
        json!({"type": "object"}),
        move |_args: String| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok::<String, Error>(output.to_owned())
        },
    )
}

// S1: a single agent returning one text item.
#[tokio::test]
async fn single_agent_echo() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::output_message("first")]);

    let agent = Agent::builder("A").model_instance(model).build();
    let result = Runner::run(Arc::clone(&agent), "test").await.unwrap();

    assert_eq!(result.final_output, json!("first"));
    assert_eq!(result.new_items.len(), 1);
    assert_eq!(result.raw_responses.len(), 1);
    assert_eq!(result.last_agent().name(), "A");
    assert_eq!(result.usage.requests, 1);
}

// S2: a tool call turn followed by a final message, with item ordering
// message -> call -> call-output -> message.
#[tokio::test]
async fn tool_call_then_final() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![
        fake::output_message("a_message"),
        fake::function_call("foo", "{}"),
    ]);
    model.add_turn(vec![fake::output_message("done")]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .tool(tool_returning("foo", "tool_result"))
        .build();
    let result = Runner::run(agent, "test").await.unwrap();

    assert_eq!(result.final_output, json!("done"));
    assert_eq!(result.raw_responses.len(), 2);
    let kinds: Vec<RunItemKind> = result.new_items.iter().map(|i| i.kind).collect();
    assert_eq!(
        kinds,
        [
            RunItemKind::MessageOutput,
            RunItemKind::ToolCall,
            RunItemKind::ToolCallOutput,
            RunItemKind::MessageOutput,
        ]
    );
    let Item::FunctionCallOutput(output) = &result.new_items[2].raw else {
        panic!("expected a function call output");
    };
    assert_eq!(output.output, "tool_result");
}

// S3: tool turn, then a handoff, then the receiving agent finishes.
#[tokio::test]
async fn handoff_transfers_control() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::function_call("some_function", "{\"a\": \"b\"}")]);
    model.add_turn(vec![
        fake::output_message("a_message"),
        fake::function_call("transfer_to_a1", "{}"),
    ]);
    model.add_turn(vec![fake::output_message("done")]);

    let a1 = Agent::builder("A1")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .build();
    let a2 = Agent::builder("A2")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .build();
    let a3 = Agent::builder("A3")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .tool(tool_returning("some_function", "result"))
        .handoff_to(Arc::clone(&a1))
        .handoff_to(a2)
        .build();

    let result = Runner::run(a3, "user_message").await.unwrap();

    assert_eq!(result.last_agent().name(), "A1");
    assert_eq!(result.final_output, json!("done"));
    assert_eq!(result.raw_responses.len(), 3);
    // Original input plus six generated items.
    assert_eq!(result.to_input_list().len(), 7);
    let kinds: Vec<RunItemKind> = result.new_items.iter().map(|i| i.kind).collect();
    assert_eq!(
        kinds,
        [
            RunItemKind::ToolCall,
            RunItemKind::ToolCallOutput,
            RunItemKind::MessageOutput,
            RunItemKind::HandoffCall,
            RunItemKind::HandoffOutput,
            RunItemKind::MessageOutput,
        ]
    );
}

// S4: structured output parsed against the agent's schema.
#[tokio::test]
async fn structured_final_output() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::output_message("{\"bar\":\"baz\"}")]);

    let schema = AgentOutputSchema::from_json_schema(
        "Out",
        json!({
            "type": "object",
            "properties": { "bar": { "type": "string" } },
            "required": ["bar"],
        }),
    );
    let agent = Agent::builder("A")
        .model_instance(model)
        .output_schema(schema)
        .build();
    let result = Runner::run(agent, "test").await.unwrap();

    assert_eq!(result.final_output, json!({"bar": "baz"}));
}

// Structured output that never parses is a model-behavior error.
#[tokio::test]
async fn invalid_structured_output_is_model_behavior() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::output_message("not json")]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .output_schema(AgentOutputSchema::from_json_schema(
            "Out",
            json!({"type": "object"}),
        ))
        .build();

    let err = Runner::run(agent, "test").await.unwrap_err();
    assert!(matches!(err, Error::ModelBehavior { .. }));
}

struct AlwaysTrips;

#[async_trait::async_trait]
impl InputGuardrailCheck for AlwaysTrips {
    async fn check(&self, _agent: &Agent, _input: &RunInput) -> Result<GuardrailOutput> {
        Ok(GuardrailOutput::tripwire("blocked"))
    }
}

// S5: an input tripwire fails the run before any model data is exposed.
#[tokio::test]
async fn input_guardrail_tripwire() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::output_message("never seen")]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .input_guardrail(InputGuardrail::new("block-all", AlwaysTrips))
        .build();

    let err = Runner::run(agent, "test").await.unwrap_err();
    let Error::InputGuardrailTripwire {
        result, run_data, ..
    } = err
    else {
        panic!("expected an input tripwire, got {err}");
    };
    assert_eq!(result.guardrail_name, "block-all");
    let run_data = run_data.expect("tripwire carries partial run data");
    assert!(run_data.raw_responses.is_empty());
}

// S6: the turn ceiling fails the run with all prior responses attached.
#[tokio::test]
async fn max_turns_exceeded() {
    let model = Arc::new(FakeModel::new());
    for _ in 0..3 {
        model.add_turn(vec![fake::function_call("foo", "{}")]);
    }

    let agent = Agent::builder("A")
        .model_instance(model)
        .tool(tool_returning("foo", "out"))
        .build();
    let config = RunConfig::default().with_max_turns(3);

    let err = Runner::run_with_config(agent, "test", config)
        .await
        .unwrap_err();
    let Error::MaxTurnsExceeded { max_turns, run_data } = err else {
        panic!("expected max turns exceeded, got {err}");
    };
    assert_eq!(max_turns, 3);
    let run_data = run_data.expect("max turns carries partial run data");
    assert_eq!(run_data.raw_responses.len(), 3);
    assert!(!run_data.new_items.is_empty());
}

// S7: stop_at_tools turns the named tool's result into the final output
// without a further model call.
#[tokio::test]
async fn stop_at_tools() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![
        fake::function_call("t2", "{}"),
        fake::function_call("t1", "{}"),
    ]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .tool(tool_returning("t1", "t1_output"))
        .tool(tool_returning("t2", "t2_output"))
        .tool_use_behavior(ToolUseBehavior::StopAtTools(vec!["t1".to_owned()]))
        .build();

    let result = Runner::run(agent, "test").await.unwrap();
    assert_eq!(result.final_output, json!("t1_output"));
    assert_eq!(result.raw_responses.len(), 1);
}

struct FirstResultWins;

#[async_trait::async_trait]
impl ToolUseDecider for FirstResultWins {
    async fn decide(
        &self,
        _agent: &Agent,
        results: &[FunctionToolResult],
    ) -> Result<ToolsToFinalOutput> {
        Ok(ToolsToFinalOutput::done(json!({
            "from_tool": results[0].tool_name,
        })))
    }
}

#[tokio::test]
async fn custom_tool_use_behavior() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::function_call("foo", "{}")]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .tool(tool_returning("foo", "out"))
        .tool_use_behavior(ToolUseBehavior::Custom(Arc::new(FirstResultWins)))
        .build();

    let result = Runner::run(agent, "test").await.unwrap();
    assert_eq!(result.final_output, json!({"from_tool": "foo"}));
    assert_eq!(result.raw_responses.len(), 1);
}

// Invariant 2: outputs are ordered by the position of their call, not by
// completion time.
#[tokio::test]
async fn tool_outputs_preserve_call_order() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![
        fake::function_call("slow", "{}"),
        fake::function_call("fast", "{}"),
    ]);
    model.add_turn(vec![fake::output_message("done")]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .tool(sleepy_tool("slow", 50, "slow_out"))
        .tool(sleepy_tool("fast", 1, "fast_out"))
        .build();

    let result = Runner::run(agent, "test").await.unwrap();

    let calls: Vec<&Item> = result
        .new_items
        .iter()
        .filter(|i| i.kind == RunItemKind::ToolCall)
        .map(|i| &i.raw)
        .collect();
    let outputs: Vec<&Item> = result
        .new_items
        .iter()
        .filter(|i| i.kind == RunItemKind::ToolCallOutput)
        .map(|i| &i.raw)
        .collect();

    for (call, output) in calls.iter().zip(&outputs) {
        let Item::FunctionCall(call) = call else {
            panic!("expected a function call");
        };
        let Item::FunctionCallOutput(output) = output else {
            panic!("expected a function call output");
        };
        assert_eq!(call.call_id, output.call_id);
    }
    let Item::FunctionCallOutput(first) = outputs[0] else {
        panic!("expected a function call output");
    };
    assert_eq!(first.output, "slow_out");
}

// Invariant 3 (open question): only the first of several handoffs routes;
// the extras are acknowledged and discarded.
#[tokio::test]
async fn first_handoff_wins() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![
        fake::output_message("{\"looks\": \"final\"}"),
        fake::function_call("transfer_to_a1", "{}"),
        fake::function_call("transfer_to_a2", "{}"),
    ]);
    model.add_turn(vec![fake::output_message("done")]);

    let a1 = Agent::builder("A1")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .build();
    let a2 = Agent::builder("A2")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .build();
    let a3 = Agent::builder("A3")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .handoff_to(Arc::clone(&a1))
        .handoff_to(a2)
        .build();

    let result = Runner::run(a3, "test").await.unwrap();

    // Handoff beat the final-output-shaped message.
    assert_eq!(result.last_agent().name(), "A1");
    assert_eq!(result.final_output, json!("done"));

    let rejected = result.new_items.iter().any(|item| {
        matches!(
            &item.raw,
            Item::FunctionCallOutput(out)
                if out.output.contains("Multiple handoffs detected")
        )
    });
    assert!(rejected, "the extra handoff call is acknowledged");

    let handoff_outputs = result
        .new_items
        .iter()
        .filter(|i| i.kind == RunItemKind::HandoffOutput)
        .count();
    assert_eq!(handoff_outputs, 1);
}

// Invariant 4: a forced tool choice is cleared after the first tool use.
#[tokio::test]
async fn forced_tool_choice_resets_after_use() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::function_call("foo", "{}")]);
    model.add_turn(vec![fake::output_message("done")]);

    let agent = Agent::builder("A")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .tool(tool_returning("foo", "out"))
        .model_settings(ModelSettings {
            tool_choice: Some(ToolChoice::Required),
            ..ModelSettings::default()
        })
        .build();

    let result = Runner::run(agent, "test").await.unwrap();
    assert_eq!(result.final_output, json!("done"));

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].model_settings.tool_choice,
        Some(ToolChoice::Required)
    );
    assert_eq!(requests[1].model_settings.tool_choice, None);
}

#[tokio::test]
async fn forced_tool_choice_kept_when_reset_disabled() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::function_call("foo", "{}")]);
    model.add_turn(vec![fake::output_message("done")]);

    let agent = Agent::builder("A")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .tool(tool_returning("foo", "out"))
        .reset_tool_choice(false)
        .model_settings(ModelSettings {
            tool_choice: Some(ToolChoice::Required),
            ..ModelSettings::default()
        })
        .build();

    Runner::run(agent, "test").await.unwrap();

    let requests = model.requests();
    assert_eq!(
        requests[1].model_settings.tool_choice,
        Some(ToolChoice::Required)
    );
}

struct OutputTrips;

#[async_trait::async_trait]
impl OutputGuardrailCheck for OutputTrips {
    async fn check(&self, _agent: &Agent, _output: &serde_json::Value) -> Result<GuardrailOutput> {
        Ok(GuardrailOutput::tripwire("bad output"))
    }
}

#[tokio::test]
async fn output_guardrail_tripwire() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::output_message("final")]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .output_guardrail(OutputGuardrail::new("check-output", OutputTrips))
        .build();

    let err = Runner::run(agent, "test").await.unwrap_err();
    let Error::OutputGuardrailTripwire {
        result, run_data, ..
    } = err
    else {
        panic!("expected an output tripwire, got {err}");
    };
    assert_eq!(result.guardrail_name, "check-output");
    assert_eq!(run_data.expect("has partial data").raw_responses.len(), 1);
}

#[tokio::test]
async fn mcp_approval_flow() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![Item::McpApprovalRequest(McpApprovalRequestItem {
        id: Some("appr_1".into()),
        server_label: "srv".into(),
        name: "lookup".into(),
        arguments: "{}".into(),
    })]);
    model.add_turn(vec![fake::output_message("done")]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .tool(Tool::HostedMcp(
            HostedMcpTool::new("srv")
                .with_approval(|_request| async { Ok(McpApprovalDecision::approve()) }),
        ))
        .build();

    let result = Runner::run(agent, "test").await.unwrap();
    assert_eq!(result.final_output, json!("done"));

    let response = result.new_items.iter().find_map(|item| match &item.raw {
        Item::McpApprovalResponse(response) => Some(response),
        _ => None,
    });
    let response = response.expect("an approval response was appended");
    assert!(response.approve);
    assert_eq!(response.approval_request_id, "appr_1");
}

#[tokio::test]
async fn agent_as_tool_keeps_control() {
    let inner_model = Arc::new(FakeModel::new());
    inner_model.add_turn(vec![fake::output_message("summary!")]);
    let inner = Agent::builder("Summarizer")
        .model_instance(inner_model)
        .build();

    let outer_model = Arc::new(FakeModel::new());
    outer_model.add_turn(vec![fake::function_call(
        "summarize",
        "{\"input\": \"long text\"}",
    )]);
    outer_model.add_turn(vec![fake::output_message("done")]);

    let outer = Agent::builder("Outer")
        .model_instance(outer_model)
        .tool(inner.as_tool(Some("summarize".into()), None))
        .build();

    let result = Runner::run(outer, "test").await.unwrap();
    assert_eq!(result.final_output, json!("done"));
    assert_eq!(result.last_agent().name(), "Outer");

    let tool_output = result.new_items.iter().find_map(|item| match &item.raw {
        Item::FunctionCallOutput(out) => Some(out.output.clone()),
        _ => None,
    });
    assert_eq!(tool_output.as_deref(), Some("summary!"));
}

#[derive(Default)]
struct CountingHooks {
    starts: AtomicUsize,
    ends: AtomicUsize,
    handoffs: AtomicUsize,
    tool_starts: AtomicUsize,
    tool_ends: AtomicUsize,
}

#[async_trait::async_trait]
impl RunHooks for CountingHooks {
    async fn on_agent_start(&self, _agent: &Agent) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn on_agent_end(&self, _agent: &Agent, _output: &serde_json::Value) -> Result<()> {
        self.ends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn on_handoff(&self, _from: &Agent, _to: &Agent) -> Result<()> {
        self.handoffs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn on_tool_start(&self, _agent: &Agent, _tool: &str) -> Result<()> {
        self.tool_starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn on_tool_end(&self, _agent: &Agent, _tool: &str, _result: &str) -> Result<()> {
        self.tool_ends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn run_hooks_fire_across_handoffs() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::function_call("some_function", "{}")]);
    model.add_turn(vec![fake::function_call("transfer_to_a1", "{}")]);
    model.add_turn(vec![fake::output_message("done")]);

    let a1 = Agent::builder("A1")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .build();
    let a3 = Agent::builder("A3")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .tool(tool_returning("some_function", "result"))
        .handoff_to(a1)
        .build();

    let hooks = Arc::new(CountingHooks::default());
    let config = RunConfig::default().with_hooks(Arc::clone(&hooks) as Arc<dyn RunHooks>);
    Runner::run_with_config(a3, "test", config).await.unwrap();

    assert_eq!(hooks.starts.load(Ordering::SeqCst), 2);
    assert_eq!(hooks.handoffs.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.tool_starts.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.tool_ends.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.ends.load(Ordering::SeqCst), 1);
}

// Invariant 7: streamed runs emit AgentUpdated, then raw events before the
// run items they produce, then complete with empty queues.
#[tokio::test]
async fn streaming_completion_shape() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::output_message("first")]);

    let agent = Agent::builder("A").model_instance(model).build();
    let result = Runner::run_streamed(agent, "test");

    let mut events = Vec::new();
    result
        .stream_events(|event| events.push(event))
        .await
        .unwrap();

    assert!(matches!(events[0], StreamEvent::AgentUpdated(_)));
    let last_raw = events
        .iter()
        .rposition(|e| matches!(e, StreamEvent::RawResponse(_)))
        .expect("raw events present");
    let first_item = events
        .iter()
        .position(|e| matches!(e, StreamEvent::RunItem(_)))
        .expect("run item events present");
    assert!(last_raw < first_item, "raw events precede derived run items");

    assert!(result.is_complete());
    assert!(result.queues_empty());
    assert_eq!(result.final_output(), Some(json!("first")));
    assert_eq!(result.raw_responses().len(), 1);
}

#[tokio::test]
async fn streaming_handoff_emits_agent_updated() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::function_call("transfer_to_a1", "{}")]);
    model.add_turn(vec![fake::output_message("done")]);

    let a1 = Agent::builder("A1")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .build();
    let a3 = Agent::builder("A3")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .handoff_to(a1)
        .build();

    let result = Runner::run_streamed(a3, "test");
    let mut agent_updates = Vec::new();
    result
        .stream_events(|event| {
            if let StreamEvent::AgentUpdated(agent) = event {
                agent_updates.push(agent.name().to_owned());
            }
        })
        .await
        .unwrap();

    assert_eq!(agent_updates, ["A3", "A1"]);
    assert_eq!(result.current_agent().name(), "A1");
    assert_eq!(result.final_output(), Some(json!("done")));
}

// S8 / invariant 8: cancel from inside the sink discards pending events,
// completes the stream, and leaves partial data readable.
#[tokio::test]
async fn streaming_cancel_from_sink() {
    let model = Arc::new(FakeModel::new());
    for _ in 0..5 {
        model.add_turn(vec![fake::function_call("foo", "{}")]);
    }

    let agent = Agent::builder("A")
        .model_instance(model)
        .tool(tool_returning("foo", "out"))
        .build();

    let result = Runner::run_streamed(agent, "test");
    let handle = result.cancel_handle();
    let outcome = result
        .stream_events(|event| {
            if matches!(event, StreamEvent::RunItem(_)) {
                handle.cancel();
            }
        })
        .await;

    assert!(outcome.is_ok(), "a canceled run is not an error");
    assert!(result.is_complete());
    assert!(result.queues_empty());

    // Further event reads observe nothing.
    assert!(result.next_event().await.is_none());
}

#[tokio::test]
async fn streaming_error_carries_partial_data() {
    let model = Arc::new(FakeModel::new());
    for _ in 0..3 {
        model.add_turn(vec![fake::function_call("foo", "{}")]);
    }

    let agent = Agent::builder("A")
        .model_instance(model)
        .tool(tool_returning("foo", "out"))
        .build();
    let config = RunConfig::default().with_max_turns(3);

    let result = Runner::run_streamed_with_config(agent, "test", config);
    let err = result.stream_events(|_event| {}).await.unwrap_err();

    let Error::MaxTurnsExceeded { run_data, .. } = err else {
        panic!("expected max turns exceeded");
    };
    assert_eq!(run_data.expect("partial data").raw_responses.len(), 3);
    assert!(result.is_complete());
    assert_eq!(result.current_turn(), 4);
}

struct SleepyPass {
    delay_ms: u64,
}

#[async_trait::async_trait]
impl InputGuardrailCheck for SleepyPass {
    async fn check(&self, _agent: &Agent, _input: &RunInput) -> Result<GuardrailOutput> {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(GuardrailOutput::pass())
    }
}

// Invariant 5, streaming: guardrail results land in declaration order even
// when completion order is reversed.
#[tokio::test]
async fn streaming_guardrail_results_in_declaration_order() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::output_message("done")]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .input_guardrail(InputGuardrail::new("slow", SleepyPass { delay_ms: 40 }))
        .input_guardrail(InputGuardrail::new("fast", SleepyPass { delay_ms: 1 }))
        .build();

    let result = Runner::run_streamed(agent, "test");
    result.stream_events(|_event| {}).await.unwrap();

    let names: Vec<String> = result
        .input_guardrail_results()
        .into_iter()
        .map(|r| r.guardrail_name)
        .collect();
    assert_eq!(names, ["slow", "fast"]);
}

#[tokio::test]
async fn streaming_input_tripwire_fails_run() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::function_call("foo", "{}")]);
    model.add_turn(vec![fake::output_message("done")]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .tool(tool_returning("foo", "out"))
        .input_guardrail(InputGuardrail::new("block-all", AlwaysTrips))
        .build();

    let result = Runner::run_streamed(agent, "test");
    let err = result.stream_events(|_event| {}).await.unwrap_err();

    assert!(matches!(err, Error::InputGuardrailTripwire { .. }));
    assert!(result.is_complete());
}

struct StubComputer;

#[async_trait::async_trait]
impl crate::tool::Computer for StubComputer {
    async fn click(&self, _x: i64, _y: i64, _button: &str) -> Result<()> {
        Ok(())
    }
    async fn double_click(&self, _x: i64, _y: i64) -> Result<()> {
        Ok(())
    }
    async fn drag(&self, _path: &[[i64; 2]]) -> Result<()> {
        Ok(())
    }
    async fn keypress(&self, _keys: &[String]) -> Result<()> {
        Ok(())
    }
    async fn move_mouse(&self, _x: i64, _y: i64) -> Result<()> {
        Ok(())
    }
    async fn screenshot(&self) -> Result<String> {
        Ok("data:image/png;base64,xyz".to_owned())
    }
    async fn scroll(&self, _x: i64, _y: i64, _sx: i64, _sy: i64) -> Result<()> {
        Ok(())
    }
    async fn type_text(&self, _text: &str) -> Result<()> {
        Ok(())
    }
    async fn wait(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn computer_actions_append_screenshots() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![Item::ComputerCall(crate::items::ComputerCallItem {
        id: None,
        call_id: "comp_1".into(),
        action: crate::items::ComputerAction::Click {
            x: 10,
            y: 20,
            button: "left".into(),
        },
        status: None,
    })]);
    model.add_turn(vec![fake::output_message("done")]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .tool(Tool::Computer(crate::tool::ComputerTool::new(Arc::new(
            StubComputer,
        ))))
        .build();

    let result = Runner::run(agent, "test").await.unwrap();
    assert_eq!(result.final_output, json!("done"));

    let screenshot = result.new_items.iter().find_map(|item| match &item.raw {
        Item::ComputerCallOutput(out) => Some(out),
        _ => None,
    });
    let screenshot = screenshot.expect("a screenshot output was appended");
    assert_eq!(screenshot.call_id, "comp_1");
    assert!(screenshot.output.starts_with("data:image/png"));
}

#[tokio::test]
async fn local_shell_calls_execute() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![Item::LocalShellCall(crate::items::LocalShellCallItem {
        id: None,
        call_id: "sh_1".into(),
        action: crate::items::LocalShellAction {
            command: vec!["echo".into(), "hi".into()],
            timeout_ms: None,
            working_directory: None,
        },
        status: None,
    })]);
    model.add_turn(vec![fake::output_message("done")]);

    let agent = Agent::builder("A")
        .model_instance(model)
        .tool(Tool::LocalShell(crate::tool::LocalShellTool::new(
            |action: crate::items::LocalShellAction| async move {
                Ok::<String, Error>(format!("ran: {}", action.command.join(" ")))
            },
        )))
        .build();

    let result = Runner::run(agent, "test").await.unwrap();
    assert_eq!(result.final_output, json!("done"));

    let output = result.new_items.iter().find_map(|item| match &item.raw {
        Item::LocalShellCallOutput(out) => Some(out),
        _ => None,
    });
    let output = output.expect("a shell output was appended");
    assert_eq!(output.call_id, "sh_1");
    assert_eq!(output.output, "ran: echo hi");
}

// Follow-up runs continue the conversation through to_input_list.
#[tokio::test]
async fn to_input_list_seeds_a_follow_up_run() {
    let model = Arc::new(FakeModel::new());
    model.add_turn(vec![fake::output_message("first answer")]);
    model.add_turn(vec![fake::output_message("second answer")]);

    let agent = Agent::builder("A")
        .model_instance(Arc::clone(&model) as Arc<dyn Model>)
        .build();

    let first = Runner::run(Arc::clone(&agent), "question one").await.unwrap();
    let mut follow_up = first.to_input_list();
    follow_up.push(Item::user_message("question two"));

    let second = Runner::run(agent, follow_up).await.unwrap();
    assert_eq!(second.final_output, json!("second answer"));

    // The second request carried the whole prior conversation.
    let last = model.last_request().expect("request recorded");
    assert_eq!(last.input.len(), 3);
}
