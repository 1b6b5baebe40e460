//! Guardrails — safety checks that can halt a run with a tripwire.
//!
//! An [`InputGuardrail`] validates the run's initial input and executes on
//! the first turn only, concurrently with the first model call. An
//! [`OutputGuardrail`] validates the final output once one is produced.
//! Each check returns a [`GuardrailOutput`] carrying a `tripwire_triggered`
//! flag; any triggered tripwire aborts the run with an
//! [`Error::InputGuardrailTripwire`] or [`Error::OutputGuardrailTripwire`]
//! and cancels the remaining checks.
//!
//! Result lists are always in declaration order, regardless of the order in
//! which the concurrent checks complete.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::agent::Agent;
use crate::error::{Error, Result, try_join_prioritized};
use crate::items::RunInput;

/// The output of a guardrail check.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailOutput {
    /// Whether the tripwire was triggered. If `true`, the run is halted.
    pub tripwire_triggered: bool,

    /// Optional structured information about the check, included in the
    /// resulting error for observability.
    pub output_info: Value,
}

impl GuardrailOutput {
    /// A passing output (tripwire not triggered).
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            tripwire_triggered: false,
            output_info: Value::Null,
        }
    }

    /// A failing output (tripwire triggered) with diagnostic info.
    #[must_use]
    pub fn tripwire(info: impl Into<Value>) -> Self {
        Self {
            tripwire_triggered: true,
            output_info: info.into(),
        }
    }

    /// A passing output with diagnostic info.
    #[must_use]
    pub fn pass_with_info(info: impl Into<Value>) -> Self {
        Self {
            tripwire_triggered: false,
            output_info: info.into(),
        }
    }
}

/// Check logic of an input guardrail.
#[async_trait]
pub trait InputGuardrailCheck: Send + Sync {
    /// Inspect the run's initial input for the given agent.
    async fn check(&self, agent: &Agent, input: &RunInput) -> Result<GuardrailOutput>;
}

/// An input guardrail, validated against the initial input on turn 1.
#[derive(Clone)]
pub struct InputGuardrail {
    name: String,
    check: Arc<dyn InputGuardrailCheck>,
}

impl InputGuardrail {
    /// Create an input guardrail with the given name and check logic.
    #[must_use]
    pub fn new(name: impl Into<String>, check: impl InputGuardrailCheck + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// The guardrail's name, used in tracing and error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute the check and wrap its output in a result record.
    pub async fn run(&self, agent: &Agent, input: &RunInput) -> Result<InputGuardrailResult> {
        let output = self.check.check(agent, input).await?;
        Ok(InputGuardrailResult {
            guardrail_name: self.name.clone(),
            output,
        })
    }
}

impl std::fmt::Debug for InputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputGuardrail")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The result of running one input guardrail.
#[derive(Debug, Clone, PartialEq)]
pub struct InputGuardrailResult {
    /// Name of the guardrail that produced this result.
    pub guardrail_name: String,
    /// The check output.
    pub output: GuardrailOutput,
}

/// Check logic of an output guardrail.
#[async_trait]
pub trait OutputGuardrailCheck: Send + Sync {
    /// Inspect the agent's final output.
    async fn check(&self, agent: &Agent, output: &Value) -> Result<GuardrailOutput>;
}

/// An output guardrail, validated once a final output has been produced.
#[derive(Clone)]
pub struct OutputGuardrail {
    name: String,
    check: Arc<dyn OutputGuardrailCheck>,
}

impl OutputGuardrail {
    /// Create an output guardrail with the given name and check logic.
    #[must_use]
    pub fn new(name: impl Into<String>, check: impl OutputGuardrailCheck + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// The guardrail's name, used in tracing and error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute the check and wrap its output in a result record.
    pub async fn run(&self, agent: &Agent, output: &Value) -> Result<OutputGuardrailResult> {
        let guardrail_output = self.check.check(agent, output).await?;
        Ok(OutputGuardrailResult {
            guardrail_name: self.name.clone(),
            output: guardrail_output,
        })
    }
}

impl std::fmt::Debug for OutputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputGuardrail")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The result of running one output guardrail.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputGuardrailResult {
    /// Name of the guardrail that produced this result.
    pub guardrail_name: String,
    /// The check output.
    pub output: GuardrailOutput,
}

/// Run all input guardrails concurrently against the initial input.
///
/// A tripwire cancels the remaining checks and fails the evaluation; a
/// failing check lets its siblings finish so that a slower tripwire is not
/// masked. Concurrent failures are joined by priority with the losers kept
/// as sibling errors. When `progress` is set, each completed result is
/// forwarded as it arrives, in completion order rather than declaration
/// order; the returned list is in declaration order.
pub(crate) async fn evaluate_input_guardrails(
    guardrails: Vec<InputGuardrail>,
    agent: Arc<Agent>,
    input: RunInput,
    progress: Option<UnboundedSender<InputGuardrailResult>>,
) -> Result<Vec<InputGuardrailResult>> {
    if guardrails.is_empty() {
        return Ok(Vec::new());
    }
    let futures: Vec<_> = guardrails
        .iter()
        .map(|guardrail| {
            let agent = Arc::clone(&agent);
            let input = input.clone();
            let progress = progress.clone();
            async move {
                let result = guardrail.run(&agent, &input).await?;
                if let Some(tx) = progress {
                    let _ = tx.send(result.clone());
                }
                if result.output.tripwire_triggered {
                    return Err(Error::InputGuardrailTripwire {
                        result,
                        run_data: None,
                        sibling_errors: Vec::new(),
                    });
                }
                Ok(result)
            }
        })
        .collect();
    try_join_prioritized(futures).await
}

/// Run all output guardrails concurrently against the final output.
///
/// Same failure semantics as [`evaluate_input_guardrails`]; the returned
/// list is in declaration order.
pub(crate) async fn evaluate_output_guardrails(
    guardrails: Vec<OutputGuardrail>,
    agent: Arc<Agent>,
    output: Value,
) -> Result<Vec<OutputGuardrailResult>> {
    if guardrails.is_empty() {
        return Ok(Vec::new());
    }
    let futures: Vec<_> = guardrails
        .iter()
        .map(|guardrail| {
            let agent = Arc::clone(&agent);
            let output = output.clone();
            async move {
                let result = guardrail.run(&agent, &output).await?;
                if result.output.tripwire_triggered {
                    return Err(Error::OutputGuardrailTripwire {
                        result,
                        run_data: None,
                        sibling_errors: Vec::new(),
                    });
                }
                Ok(result)
            }
        })
        .collect();
    try_join_prioritized(futures).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use std::time::Duration;

    struct Sleepy {
        delay_ms: u64,
        label: &'static str,
    }

    #[async_trait]
    impl InputGuardrailCheck for Sleepy {
        async fn check(&self, _agent: &Agent, _input: &RunInput) -> Result<GuardrailOutput> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            Ok(GuardrailOutput::pass_with_info(self.label))
        }
    }

    struct AlwaysTrips;

    #[async_trait]
    impl InputGuardrailCheck for AlwaysTrips {
        async fn check(&self, _agent: &Agent, _input: &RunInput) -> Result<GuardrailOutput> {
            Ok(GuardrailOutput::tripwire("blocked"))
        }
    }

    struct SlowTrips {
        delay_ms: u64,
    }

    #[async_trait]
    impl InputGuardrailCheck for SlowTrips {
        async fn check(&self, _agent: &Agent, _input: &RunInput) -> Result<GuardrailOutput> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            Ok(GuardrailOutput::tripwire("slow block"))
        }
    }

    struct BrokenCheck;

    #[async_trait]
    impl InputGuardrailCheck for BrokenCheck {
        async fn check(&self, _agent: &Agent, _input: &RunInput) -> Result<GuardrailOutput> {
            Err(Error::user("check exploded"))
        }
    }

    struct SlowBrokenBackend {
        delay_ms: u64,
    }

    #[async_trait]
    impl InputGuardrailCheck for SlowBrokenBackend {
        async fn check(&self, _agent: &Agent, _input: &RunInput) -> Result<GuardrailOutput> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            Err(Error::provider("backend down"))
        }
    }

    #[tokio::test]
    async fn results_keep_declaration_order_under_skewed_completion() {
        let agent = Agent::builder("a").build();
        let guardrails = vec![
            InputGuardrail::new(
                "slow",
                Sleepy {
                    delay_ms: 40,
                    label: "slow",
                },
            ),
            InputGuardrail::new(
                "fast",
                Sleepy {
                    delay_ms: 1,
                    label: "fast",
                },
            ),
        ];

        let results = evaluate_input_guardrails(guardrails, agent, RunInput::from("x"), None)
            .await
            .unwrap();

        assert_eq!(results[0].guardrail_name, "slow");
        assert_eq!(results[1].guardrail_name, "fast");
    }

    #[tokio::test]
    async fn tripwire_fails_the_evaluation() {
        let agent = Agent::builder("a").build();
        let guardrails = vec![
            InputGuardrail::new(
                "slow",
                Sleepy {
                    delay_ms: 1000,
                    label: "slow",
                },
            ),
            InputGuardrail::new("trip", AlwaysTrips),
        ];

        let err = evaluate_input_guardrails(guardrails, agent, RunInput::from("x"), None)
            .await
            .unwrap_err();
        let Error::InputGuardrailTripwire { result, .. } = err else {
            panic!("expected a tripwire error");
        };
        assert_eq!(result.guardrail_name, "trip");
        assert_eq!(result.output.output_info, "blocked");
    }

    // A slower tripwire outranks a faster check failure of a lower kind;
    // the loser stays attached for diagnostics.
    #[tokio::test]
    async fn slower_tripwire_outranks_faster_check_failure() {
        let agent = Agent::builder("a").build();
        let guardrails = vec![
            InputGuardrail::new("trips-late", SlowTrips { delay_ms: 30 }),
            InputGuardrail::new("broken", BrokenCheck),
        ];

        let err = evaluate_input_guardrails(guardrails, agent, RunInput::from("x"), None)
            .await
            .unwrap_err();
        let Error::InputGuardrailTripwire {
            result,
            sibling_errors,
            ..
        } = err
        else {
            panic!("expected the tripwire to win, got {err}");
        };
        assert_eq!(result.guardrail_name, "trips-late");
        assert_eq!(sibling_errors.len(), 1);
        assert!(matches!(sibling_errors[0], Error::User { .. }));
    }

    // Without a tripwire, concurrent failures of mixed kinds are joined by
    // priority (provider > user), not by completion order.
    #[tokio::test]
    async fn concurrent_failures_join_by_priority() {
        let agent = Agent::builder("a").build();
        let guardrails = vec![
            InputGuardrail::new("broken-fast", BrokenCheck),
            InputGuardrail::new("broken-slow", SlowBrokenBackend { delay_ms: 20 }),
        ];

        let err = evaluate_input_guardrails(guardrails, agent, RunInput::from("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider { .. }), "got {err}");
        assert_eq!(err.sibling_errors().len(), 1);
        assert!(matches!(err.sibling_errors()[0], Error::User { .. }));
    }
}
