//! Error types for the troupe runtime.
//!
//! The taxonomy distinguishes caller misconfiguration ([`Error::User`]),
//! model output the loop cannot honor ([`Error::ModelBehavior`]), structural
//! limits ([`Error::MaxTurnsExceeded`]), guardrail tripwires, cancellation,
//! and wrapped backend failures ([`Error::Provider`]).
//!
//! Errors that terminate a run carry an optional [`RunErrorDetails`] record
//! with everything observed up to the failure point. The driver attaches it
//! once at the loop exit via [`Error::with_run_data`].
//!
//! When a concurrent fan-out fails on several siblings at once, the
//! highest-priority error is surfaced (tripwire > provider > user >
//! model-behavior) and the rest are kept on it, readable through
//! [`Error::sibling_errors`].

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;

use crate::agent::Agent;
use crate::guardrail::{InputGuardrailResult, OutputGuardrailResult};
use crate::items::{RunInput, RunItem};
use crate::model::ModelResponse;

/// A type alias for `Result<T, troupe::Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Partial-run data attached to run-terminating errors for diagnostics.
#[derive(Debug, Clone)]
pub struct RunErrorDetails {
    /// The (possibly handoff-filtered) original input of the run.
    pub input: RunInput,
    /// Items generated before the failure.
    pub new_items: Vec<RunItem>,
    /// Raw model responses received before the failure.
    pub raw_responses: Vec<ModelResponse>,
    /// The agent that was active when the run failed.
    pub last_agent: Arc<Agent>,
    /// Input guardrail results collected before the failure.
    pub input_guardrail_results: Vec<InputGuardrailResult>,
    /// Output guardrail results collected before the failure.
    pub output_guardrail_results: Vec<OutputGuardrailResult>,
}

/// The error type for agent runs.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration or API usage by the caller.
    #[error("invalid configuration or input: {message}")]
    User {
        /// Description of the misuse.
        message: String,
        /// Errors from concurrently-failed siblings, for diagnostics.
        sibling_errors: Vec<Error>,
    },

    /// The model produced output the runtime cannot honor.
    #[error("model produced unexpected output: {message}")]
    ModelBehavior {
        /// Description of the offending output.
        message: String,
        /// Data observed up to the failure point.
        run_data: Option<Box<RunErrorDetails>>,
        /// Errors from concurrently-failed siblings, for diagnostics.
        sibling_errors: Vec<Error>,
    },

    /// Wrapped error from the model backend or a tool.
    #[error("provider error: {message}")]
    Provider {
        /// The underlying error message.
        message: String,
        /// Data observed up to the failure point.
        run_data: Option<Box<RunErrorDetails>>,
        /// Errors from concurrently-failed siblings, for diagnostics.
        sibling_errors: Vec<Error>,
    },

    /// The run exceeded its turn ceiling.
    #[error("max turns ({max_turns}) exceeded")]
    MaxTurnsExceeded {
        /// The configured ceiling.
        max_turns: usize,
        /// Data observed up to the failure point.
        run_data: Option<Box<RunErrorDetails>>,
    },

    /// An input guardrail triggered its tripwire.
    #[error("input guardrail '{}' tripwire triggered", .result.guardrail_name)]
    InputGuardrailTripwire {
        /// The first triggered guardrail result.
        result: InputGuardrailResult,
        /// Data observed up to the failure point.
        run_data: Option<Box<RunErrorDetails>>,
        /// Errors from concurrently-failed siblings, for diagnostics.
        sibling_errors: Vec<Error>,
    },

    /// An output guardrail triggered its tripwire.
    #[error("output guardrail '{}' tripwire triggered", .result.guardrail_name)]
    OutputGuardrailTripwire {
        /// The first triggered guardrail result.
        result: OutputGuardrailResult,
        /// Data observed up to the failure point.
        run_data: Option<Box<RunErrorDetails>>,
        /// Errors from concurrently-failed siblings, for diagnostics.
        sibling_errors: Vec<Error>,
    },

    /// An internal background task was canceled and the run cannot continue.
    #[error("the run was canceled")]
    Canceled,
}

impl Error {
    /// Create a new user error.
    #[must_use]
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
            sibling_errors: Vec::new(),
        }
    }

    /// Create a new model-behavior error.
    #[must_use]
    pub fn model_behavior(message: impl Into<String>) -> Self {
        Self::ModelBehavior {
            message: message.into(),
            run_data: None,
            sibling_errors: Vec::new(),
        }
    }

    /// Create a new provider error.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            run_data: None,
            sibling_errors: Vec::new(),
        }
    }

    /// Attach partial-run data to this error, if it carries a slot for it
    /// and none has been attached yet.
    #[must_use]
    pub(crate) fn with_run_data(mut self, details: RunErrorDetails) -> Self {
        match &mut self {
            Self::ModelBehavior { run_data, .. }
            | Self::Provider { run_data, .. }
            | Self::MaxTurnsExceeded { run_data, .. }
            | Self::InputGuardrailTripwire { run_data, .. }
            | Self::OutputGuardrailTripwire { run_data, .. } => {
                if run_data.is_none() {
                    *run_data = Some(Box::new(details));
                }
            }
            Self::User { .. } | Self::Canceled => {}
        }
        self
    }

    /// Partial-run data attached to this error, if any.
    #[must_use]
    pub fn run_data(&self) -> Option<&RunErrorDetails> {
        match self {
            Self::ModelBehavior { run_data, .. }
            | Self::Provider { run_data, .. }
            | Self::MaxTurnsExceeded { run_data, .. }
            | Self::InputGuardrailTripwire { run_data, .. }
            | Self::OutputGuardrailTripwire { run_data, .. } => run_data.as_deref(),
            Self::User { .. } | Self::Canceled => None,
        }
    }

    /// Returns `true` if this error is a guardrail tripwire.
    #[must_use]
    pub const fn is_tripwire(&self) -> bool {
        matches!(
            self,
            Self::InputGuardrailTripwire { .. } | Self::OutputGuardrailTripwire { .. }
        )
    }

    /// Errors from siblings that failed in the same concurrent fan-out.
    #[must_use]
    pub fn sibling_errors(&self) -> &[Error] {
        match self {
            Self::User { sibling_errors, .. }
            | Self::ModelBehavior { sibling_errors, .. }
            | Self::Provider { sibling_errors, .. }
            | Self::InputGuardrailTripwire { sibling_errors, .. }
            | Self::OutputGuardrailTripwire { sibling_errors, .. } => sibling_errors,
            Self::MaxTurnsExceeded { .. } | Self::Canceled => &[],
        }
    }

    /// Attach concurrently-failed sibling errors to this error.
    #[must_use]
    pub(crate) fn with_sibling_errors(mut self, siblings: Vec<Error>) -> Self {
        if siblings.is_empty() {
            return self;
        }
        match &mut self {
            Self::User { sibling_errors, .. }
            | Self::ModelBehavior { sibling_errors, .. }
            | Self::Provider { sibling_errors, .. }
            | Self::InputGuardrailTripwire { sibling_errors, .. }
            | Self::OutputGuardrailTripwire { sibling_errors, .. } => {
                sibling_errors.extend(siblings);
            }
            Self::MaxTurnsExceeded { .. } | Self::Canceled => {}
        }
        self
    }

    /// Surfacing priority among concurrently-failed siblings:
    /// tripwire > provider > user > model-behavior > the rest.
    pub(crate) const fn priority(&self) -> u8 {
        match self {
            Self::InputGuardrailTripwire { .. } | Self::OutputGuardrailTripwire { .. } => 4,
            Self::Provider { .. } => 3,
            Self::User { .. } => 2,
            Self::ModelBehavior { .. } => 1,
            Self::MaxTurnsExceeded { .. } | Self::Canceled => 0,
        }
    }
}

/// Pick the highest-priority error among concurrent failures and attach the
/// rest to it as sibling errors. Completion order breaks priority ties.
pub(crate) fn join_concurrent_errors(mut errors: Vec<Error>) -> Error {
    errors.sort_by_key(|error| std::cmp::Reverse(error.priority()));
    let mut errors = errors.into_iter();
    match errors.next() {
        Some(winner) => winner.with_sibling_errors(errors.collect()),
        None => Error::Canceled,
    }
}

/// Drive independent fallible futures concurrently, joining failures by
/// priority.
///
/// A tripwire failure cancels the siblings still in flight (only results
/// already available are kept); any other failure lets the remaining
/// siblings finish so that a late tripwire is never masked by a faster,
/// lower-priority error. Among all observed failures the highest-priority
/// one is surfaced, carrying the rest as sibling errors. Successes are
/// returned in input order.
pub(crate) async fn try_join_prioritized<T, F>(futures: Vec<F>) -> Result<Vec<T>>
where
    F: Future<Output = Result<T>>,
{
    let total = futures.len();
    let mut pending: FuturesUnordered<_> = futures
        .into_iter()
        .enumerate()
        .map(|(index, future)| future.map(move |result| (index, result)))
        .collect();

    let mut values: Vec<Option<T>> = Vec::new();
    values.resize_with(total, || None);
    let mut errors: Vec<Error> = Vec::new();

    while let Some((index, result)) = pending.next().await {
        match result {
            Ok(value) => values[index] = Some(value),
            Err(error) => {
                let cancel_rest = error.is_tripwire();
                errors.push(error);
                if cancel_rest {
                    while let Some(Some((_, result))) = pending.next().now_or_never() {
                        if let Err(error) = result {
                            errors.push(error);
                        }
                    }
                    break;
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(values.into_iter().flatten().collect())
    } else {
        Err(join_concurrent_errors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_picks_highest_priority_and_keeps_losers() {
        let joined = join_concurrent_errors(vec![
            Error::model_behavior("bad output"),
            Error::provider("backend down"),
            Error::user("misconfigured"),
        ]);

        assert!(matches!(joined, Error::Provider { .. }));
        assert_eq!(joined.sibling_errors().len(), 2);
        assert!(matches!(joined.sibling_errors()[0], Error::User { .. }));
        assert!(matches!(
            joined.sibling_errors()[1],
            Error::ModelBehavior { .. }
        ));
    }

    #[tokio::test]
    async fn prioritized_join_preserves_input_order_on_success() {
        let futures = vec![
            Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok::<u32, Error>(1)
            }) as futures::future::BoxFuture<'static, Result<u32>>,
            Box::pin(async { Ok(2) }),
        ];

        let values = try_join_prioritized(futures).await.unwrap();
        assert_eq!(values, [1, 2]);
    }
}
