//! Lifecycle hooks for observing agent runs.
//!
//! Two hook layers exist, mirroring the run/agent split:
//!
//! - [`RunHooks`] — run-level hooks that observe **all** agents in a run.
//! - [`AgentHooks`] — per-agent hooks bound to one agent configuration.
//!
//! Every method has a default no-op implementation, so implementors only
//! override the events they care about. At each event point both layers fire
//! concurrently; a hook error aborts the run.

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::Agent;
use crate::error::Result;

/// Run-level lifecycle hooks observing every agent in a run.
#[async_trait]
pub trait RunHooks: Send + Sync {
    /// Called before an agent takes its first turn (and again after each
    /// handoff, for the receiving agent).
    async fn on_agent_start(&self, _agent: &Agent) -> Result<()> {
        Ok(())
    }

    /// Called after an agent produces the run's final output.
    async fn on_agent_end(&self, _agent: &Agent, _output: &Value) -> Result<()> {
        Ok(())
    }

    /// Called when control is handed off from one agent to another.
    async fn on_handoff(&self, _from: &Agent, _to: &Agent) -> Result<()> {
        Ok(())
    }

    /// Called immediately before a function tool is invoked.
    async fn on_tool_start(&self, _agent: &Agent, _tool_name: &str) -> Result<()> {
        Ok(())
    }

    /// Called immediately after a function tool completes.
    async fn on_tool_end(&self, _agent: &Agent, _tool_name: &str, _result: &str) -> Result<()> {
        Ok(())
    }
}

/// Per-agent lifecycle hooks bound to a specific agent configuration.
///
/// Unlike [`RunHooks`], the observed agent is implicit; `on_handoff` receives
/// the agent control came *from*.
#[async_trait]
pub trait AgentHooks: Send + Sync {
    /// Called before this agent takes its first turn.
    async fn on_start(&self, _agent: &Agent) -> Result<()> {
        Ok(())
    }

    /// Called after this agent produces the run's final output.
    async fn on_end(&self, _agent: &Agent, _output: &Value) -> Result<()> {
        Ok(())
    }

    /// Called when this agent receives control through a handoff.
    async fn on_handoff(&self, _agent: &Agent, _from: &Agent) -> Result<()> {
        Ok(())
    }

    /// Called immediately before a function tool is invoked.
    async fn on_tool_start(&self, _agent: &Agent, _tool_name: &str) -> Result<()> {
        Ok(())
    }

    /// Called immediately after a function tool completes.
    async fn on_tool_end(&self, _agent: &Agent, _tool_name: &str, _result: &str) -> Result<()> {
        Ok(())
    }
}

/// A [`RunHooks`] implementation that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRunHooks;

#[async_trait]
impl RunHooks for NoopRunHooks {}

/// Dispatches one lifecycle event to both hook layers concurrently.
pub(crate) struct HookPair<'a> {
    run: &'a dyn RunHooks,
    agent: Option<&'a dyn AgentHooks>,
}

impl<'a> HookPair<'a> {
    pub fn new(run: &'a dyn RunHooks, agent: Option<&'a dyn AgentHooks>) -> Self {
        Self { run, agent }
    }

    pub async fn agent_start(&self, agent: &Agent) -> Result<()> {
        if let Some(hooks) = self.agent {
            tokio::try_join!(self.run.on_agent_start(agent), hooks.on_start(agent))?;
        } else {
            self.run.on_agent_start(agent).await?;
        }
        Ok(())
    }

    pub async fn agent_end(&self, agent: &Agent, output: &Value) -> Result<()> {
        if let Some(hooks) = self.agent {
            tokio::try_join!(
                self.run.on_agent_end(agent, output),
                hooks.on_end(agent, output)
            )?;
        } else {
            self.run.on_agent_end(agent, output).await?;
        }
        Ok(())
    }

    /// Fires the run-level handoff hook together with the *receiving*
    /// agent's `on_handoff`.
    pub async fn handoff(&self, from: &Agent, to: &Agent) -> Result<()> {
        if let Some(hooks) = to.hooks() {
            tokio::try_join!(self.run.on_handoff(from, to), hooks.on_handoff(to, from))?;
        } else {
            self.run.on_handoff(from, to).await?;
        }
        Ok(())
    }

    pub async fn tool_start(&self, agent: &Agent, tool_name: &str) -> Result<()> {
        if let Some(hooks) = self.agent {
            tokio::try_join!(
                self.run.on_tool_start(agent, tool_name),
                hooks.on_tool_start(agent, tool_name)
            )?;
        } else {
            self.run.on_tool_start(agent, tool_name).await?;
        }
        Ok(())
    }

    pub async fn tool_end(&self, agent: &Agent, tool_name: &str, result: &str) -> Result<()> {
        if let Some(hooks) = self.agent {
            tokio::try_join!(
                self.run.on_tool_end(agent, tool_name, result),
                hooks.on_tool_end(agent, tool_name, result)
            )?;
        } else {
            self.run.on_tool_end(agent, tool_name, result).await?;
        }
        Ok(())
    }
}
