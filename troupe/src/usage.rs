//! Token usage tracking for model calls.
//!
//! A [`Usage`] record accompanies every [`ModelResponse`](crate::model::ModelResponse)
//! and is accumulated across the turns of a run.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Token usage statistics from one or more model calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of requests made to the model.
    #[serde(default)]
    pub requests: u32,

    /// Number of tokens in the input/prompt.
    #[serde(default, alias = "prompt_tokens")]
    pub input_tokens: u64,

    /// Number of tokens in the output/completion.
    #[serde(default, alias = "completion_tokens")]
    pub output_tokens: u64,

    /// Total tokens used (input + output).
    #[serde(default)]
    pub total_tokens: u64,
}

impl Usage {
    /// Create a usage record for a single request.
    #[must_use]
    pub const fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            requests: 1,
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }

    /// Create an empty usage record.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            requests: 0,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
        }
    }

    /// Returns `true` if no requests have been recorded.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.requests == 0 && self.total_tokens == 0
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            requests: self.requests + rhs.requests,
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_calls() {
        let mut total = Usage::zero();
        total += Usage::new(100, 50);
        total += Usage::new(10, 5);

        assert_eq!(total.requests, 2);
        assert_eq!(total.input_tokens, 110);
        assert_eq!(total.output_tokens, 55);
        assert_eq!(total.total_tokens, 165);
    }

    #[test]
    fn zero_is_zero() {
        assert!(Usage::zero().is_zero());
        assert!(!Usage::new(1, 1).is_zero());
    }
}
