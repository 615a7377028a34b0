//! `@mention` routing across a named set of agents (§4.11).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;

use crate::agent::Agent;
use crate::error::AgentError;

/// Maps short role names (`@planner`, `@reviewer`, ...) to the agent that
/// answers for them, and routes `@mention` tokens in a message to the right
/// agent's `send`.
pub struct Room {
    members: RwLock<HashMap<String, Arc<Agent>>>,
}

impl Room {
    pub fn new() -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
        }
    }

    pub fn join(&self, role: impl Into<String>, agent: Arc<Agent>) {
        self.members.write().insert(role.into(), agent);
    }

    pub fn leave(&self, role: &str) -> Option<Arc<Agent>> {
        self.members.write().remove(role)
    }

    pub fn members(&self) -> Vec<String> {
        self.members.read().keys().cloned().collect()
    }

    pub fn get(&self, role: &str) -> Option<Arc<Agent>> {
        self.members.read().get(role).cloned()
    }

    /// Parses `@role` tokens out of `text` and enqueues it (via `send`) on
    /// every mentioned agent that is a member of the room. Returns the
    /// roles that were actually mentioned and resolved.
    pub fn say(&self, from_role: &str, text: &str) -> Result<Vec<String>, AgentError> {
        let mentions = mention_pattern()
            .captures_iter(text)
            .map(|c| c[1].to_string())
            .collect::<Vec<_>>();

        let members = self.members.read();
        let mut routed = Vec::new();
        for role in mentions {
            if role == from_role {
                continue;
            }
            if let Some(agent) = members.get(&role) {
                agent.send(text);
                routed.push(role);
            }
        }
        Ok(routed)
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

fn mention_pattern() -> &'static Regex {
    static PATTERN: once_cell::sync::Lazy<Regex> =
        once_cell::sync::Lazy::new(|| Regex::new(r"@([a-zA-Z0-9_-]+)").unwrap());
    &PATTERN
}
