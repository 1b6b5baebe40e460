//! Resolution of an agent's effective tools and handoffs.
//!
//! Declared tools and handoffs may carry dynamic enable-predicates. Both
//! lists are filtered by evaluating every predicate concurrently; failed
//! evaluations fail the whole resolution, joined by priority with the
//! losers kept as sibling errors. Order is preserved, so resolution is
//! deterministic.

use std::sync::Arc;

use crate::agent::Agent;
use crate::error::{Result, try_join_prioritized};
use crate::handoff::Handoff;
use crate::tool::Tool;

/// The agent's declared tools, filtered by their enable-predicates.
pub(crate) async fn effective_tools(agent: &Arc<Agent>) -> Result<Vec<Tool>> {
    let checks: Vec<_> = agent
        .tools()
        .iter()
        .map(|tool| async move {
            Ok::<_, crate::error::Error>(tool.enabled_for(agent).await?.then(|| tool.clone()))
        })
        .collect();
    Ok(try_join_prioritized(checks)
        .await?
        .into_iter()
        .flatten()
        .collect())
}

/// The agent's effective handoffs: explicit descriptors first, then peers
/// lifted with default tool naming, all filtered by their enable-predicates.
pub(crate) async fn effective_handoffs(agent: &Arc<Agent>) -> Result<Vec<Handoff>> {
    let mut declared: Vec<Handoff> = agent.handoffs().to_vec();
    declared.extend(
        agent
            .agent_handoffs()
            .iter()
            .map(|peer| Handoff::from_agent(Arc::clone(peer))),
    );

    let checks: Vec<_> = declared
        .into_iter()
        .map(|handoff| async move {
            Ok::<_, crate::error::Error>(handoff.enabled_for(agent).await?.then_some(handoff))
        })
        .collect();
    Ok(try_join_prioritized(checks)
        .await?
        .into_iter()
        .flatten()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::tool::FunctionTool;
    use serde_json::json;

    fn noop_tool(name: &str) -> FunctionTool {
        FunctionTool::new(name, "", json!({"type": "object"}), |_args: String| async {
            Ok(String::new())
        })
    }

    #[tokio::test]
    async fn disabled_tools_are_filtered_in_order() {
        let agent = Agent::builder("A")
            .tool(noop_tool("first"))
            .tool(noop_tool("second").with_enabled(|_agent| async { Ok(false) }))
            .tool(noop_tool("third"))
            .build();

        let tools = effective_tools(&agent).await.unwrap();
        let names: Vec<&str> = tools.iter().map(Tool::name).collect();
        assert_eq!(names, ["first", "third"]);
    }

    #[tokio::test]
    async fn predicate_failure_fails_resolution() {
        let agent = Agent::builder("A")
            .tool(noop_tool("ok"))
            .tool(
                noop_tool("broken")
                    .with_enabled(|_agent| async { Err(Error::user("predicate failed")) }),
            )
            .build();

        assert!(effective_tools(&agent).await.is_err());
    }

    #[tokio::test]
    async fn explicit_handoffs_precede_lifted_peers() {
        let peer = Agent::builder("Peer").build();
        let custom = Handoff::from_agent(Arc::clone(&peer)).with_tool_name("escalate");
        let agent = Agent::builder("A")
            .handoff(custom)
            .handoff_to(Arc::clone(&peer))
            .build();

        let handoffs = effective_handoffs(&agent).await.unwrap();
        assert_eq!(handoffs.len(), 2);
        assert_eq!(handoffs[0].tool_name, "escalate");
        assert_eq!(handoffs[1].tool_name, "transfer_to_peer");
    }

    #[tokio::test]
    async fn disabled_handoffs_are_filtered() {
        let peer = Agent::builder("Peer").build();
        let gated =
            Handoff::from_agent(Arc::clone(&peer)).with_enabled(|_agent| async { Ok(false) });
        let agent = Agent::builder("A").handoff(gated).build();

        let handoffs = effective_handoffs(&agent).await.unwrap();
        assert!(handoffs.is_empty());
    }
}
