//! Per-run tracking of tool use, driving the forced-tool-choice reset.
//!
//! A model forced to call a tool on every turn can never produce a final
//! message after the tool answers. The tracker records which tools each
//! agent has used this run; once any tool has run, a forced tool choice in
//! the resolved settings is cleared (unless the agent opts out via
//! `reset_tool_choice = false`).

use std::collections::{HashMap, HashSet};

use crate::agent::Agent;
use crate::model::{ModelSettings, ToolChoice};

#[derive(Debug, Default)]
pub(crate) struct ToolUseTracker {
    used: HashMap<String, HashSet<String>>,
}

impl ToolUseTracker {
    /// Record tool names used by the named agent this turn.
    pub fn add_tool_use(&mut self, agent_name: &str, tools: &[String]) {
        if tools.is_empty() {
            return;
        }
        self.used
            .entry(agent_name.to_owned())
            .or_default()
            .extend(tools.iter().cloned());
    }

    /// Whether the named agent has used any tool this run.
    pub fn has_used_tools(&self, agent_name: &str) -> bool {
        self.used
            .get(agent_name)
            .is_some_and(|tools| !tools.is_empty())
    }

    /// Clear a forced tool choice once the agent has used any tool.
    pub fn maybe_reset_tool_choice(
        &self,
        agent: &Agent,
        mut settings: ModelSettings,
    ) -> ModelSettings {
        let forced = settings
            .tool_choice
            .as_ref()
            .is_some_and(ToolChoice::is_forced);
        if agent.reset_tool_choice() && forced && self.has_used_tools(agent.name()) {
            settings.tool_choice = None;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolChoice;

    fn forced_settings() -> ModelSettings {
        ModelSettings {
            tool_choice: Some(ToolChoice::Required),
            ..ModelSettings::default()
        }
    }

    #[test]
    fn resets_forced_choice_after_tool_use() {
        let agent = Agent::builder("A").build();
        let mut tracker = ToolUseTracker::default();
        tracker.add_tool_use("A", &["foo".to_owned()]);

        let resolved = tracker.maybe_reset_tool_choice(&agent, forced_settings());
        assert!(resolved.tool_choice.is_none());
    }

    #[test]
    fn keeps_choice_without_tool_use() {
        let agent = Agent::builder("A").build();
        let tracker = ToolUseTracker::default();

        let resolved = tracker.maybe_reset_tool_choice(&agent, forced_settings());
        assert_eq!(resolved.tool_choice, Some(ToolChoice::Required));
    }

    #[test]
    fn keeps_choice_when_reset_disabled() {
        let agent = Agent::builder("A").reset_tool_choice(false).build();
        let mut tracker = ToolUseTracker::default();
        tracker.add_tool_use("A", &["foo".to_owned()]);

        let resolved = tracker.maybe_reset_tool_choice(&agent, forced_settings());
        assert_eq!(resolved.tool_choice, Some(ToolChoice::Required));
    }

    #[test]
    fn auto_choice_is_never_touched() {
        let agent = Agent::builder("A").build();
        let mut tracker = ToolUseTracker::default();
        tracker.add_tool_use("A", &["foo".to_owned()]);

        let settings = ModelSettings {
            tool_choice: Some(ToolChoice::Auto),
            ..ModelSettings::default()
        };
        let resolved = tracker.maybe_reset_tool_choice(&agent, settings);
        assert_eq!(resolved.tool_choice, Some(ToolChoice::Auto));
    }

    #[test]
    fn usage_is_tracked_per_agent() {
        let mut tracker = ToolUseTracker::default();
        tracker.add_tool_use("A", &["foo".to_owned()]);

        assert!(tracker.has_used_tools("A"));
        assert!(!tracker.has_used_tools("B"));
    }
}
