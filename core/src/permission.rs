//! Static per-tool policy evaluation (§4.3).

use agent_protocol::snapshot::{PermissionMode, PermissionPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow,
    Deny,
    Ask,
}

/// Tools considered "writers" for the `readonly` mode's implicit ask rule.
/// Grounded on the pipeline's FilePool side effects (§4.7 step 9): any tool
/// recorded via `recordEdit` is a writer.
fn is_writer_tool(tool_name: &str) -> bool {
    matches!(tool_name, "fs_write" | "fs_edit" | "fs_multi_edit") || tool_name.ends_with("_write")
}

/// Evaluates `policy` against `tool_name`. Precedence: `deny_tools` >
/// `allow_tools` > `readonly` implicit ask-for-writers > mode handler >
/// `auto` implicit allow.
pub fn evaluate(policy: &PermissionPolicy, tool_name: &str) -> PermissionDecision {
    if policy.deny_tools.iter().any(|t| t == tool_name) {
        return PermissionDecision::Deny;
    }
    if policy.allow_tools.iter().any(|t| t == tool_name) {
        return PermissionDecision::Allow;
    }
    if policy.mode == PermissionMode::Readonly && is_writer_tool(tool_name) {
        return PermissionDecision::Ask;
    }
    if policy.require_approval_tools.iter().any(|t| t == tool_name) {
        return PermissionDecision::Ask;
    }
    match policy.mode {
        PermissionMode::Auto => PermissionDecision::Allow,
        PermissionMode::Approval => PermissionDecision::Ask,
        PermissionMode::Readonly => PermissionDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(mode: PermissionMode) -> PermissionPolicy {
        PermissionPolicy {
            mode,
            allow_tools: vec![],
            deny_tools: vec![],
            require_approval_tools: vec![],
        }
    }

    #[test]
    fn deny_tools_wins_over_everything() {
        let mut p = policy(PermissionMode::Auto);
        p.deny_tools.push("fs_write".into());
        p.allow_tools.push("fs_write".into());
        assert_eq!(evaluate(&p, "fs_write"), PermissionDecision::Deny);
    }

    #[test]
    fn readonly_asks_for_writers_but_allows_readers() {
        let p = policy(PermissionMode::Readonly);
        assert_eq!(evaluate(&p, "fs_write"), PermissionDecision::Ask);
        assert_eq!(evaluate(&p, "fs_read"), PermissionDecision::Allow);
    }

    #[test]
    fn approval_mode_asks_by_default() {
        let p = policy(PermissionMode::Approval);
        assert_eq!(evaluate(&p, "fs_read"), PermissionDecision::Ask);
    }

    #[test]
    fn auto_mode_allows_by_default() {
        let p = policy(PermissionMode::Auto);
        assert_eq!(evaluate(&p, "fs_read"), PermissionDecision::Allow);
    }
}
