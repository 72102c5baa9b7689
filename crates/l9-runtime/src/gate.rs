//! The tool gate: governance check, then approval check.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use l9_approval::{ApprovalManager, ApprovalRequest};
use l9_governance::{Finding, RuleEngine, Verdict};

/// What an agent gets back when it asks for a tool.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// The call may run now.
    Allowed,
    /// A human must decide first. Nothing has been queued.
    PendingApproval(ApprovalRequest),
    /// Governance refused the call.
    Blocked {
        /// Rules that fired.
        findings: Vec<Finding>,
    },
}

impl GateOutcome {
    /// Whether the call may run now.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Entry point for every agent tool call.
#[derive(Debug, Clone)]
pub struct ToolGate {
    rules: Arc<RuleEngine>,
    approvals: Arc<ApprovalManager>,
}

impl ToolGate {
    /// Gate over the given rule engine and approval manager.
    #[must_use]
    pub fn new(rules: Arc<RuleEngine>, approvals: Arc<ApprovalManager>) -> Self {
        Self { rules, approvals }
    }

    /// Decide whether `tool_id` may run with `arguments`.
    ///
    /// Every string in the arguments is checked against the rule table.
    /// A block wins over any approval. Otherwise a high-risk tool without a
    /// covering approval yields a new pending request.
    pub async fn invoke(
        &self,
        tool_id: &str,
        agent_id: &str,
        task_id: &str,
        arguments: Map<String, Value>,
    ) -> GateOutcome {
        let text = argument_text(&arguments);
        match self.rules.evaluate(&text) {
            Verdict::Block { findings } => {
                warn!(
                    tool = tool_id,
                    agent = agent_id,
                    task = task_id,
                    rules = ?findings.iter().map(|f| f.rule_id.as_str()).collect::<Vec<_>>(),
                    "tool call blocked by governance"
                );
                return GateOutcome::Blocked { findings };
            },
            Verdict::Warn { findings } => {
                for finding in &findings {
                    warn!(tool = tool_id, rule = %finding.rule_id, "{}", finding.message);
                }
            },
            Verdict::Allow => {},
        }

        if let Some(decision) = self.approvals.check_tool_approved(tool_id, task_id).await {
            debug!(tool = tool_id, task = task_id, scope = %decision.scope, "covered by approval");
            return GateOutcome::Allowed;
        }
        if !self.approvals.requires_approval(tool_id).await {
            return GateOutcome::Allowed;
        }

        let request = self
            .approvals
            .request_approval(tool_id, agent_id, task_id, arguments)
            .await;
        info!(request_id = %request.request_id, tool = tool_id, "tool call awaiting approval");
        GateOutcome::PendingApproval(request)
    }
}

/// Every string value in `arguments`, one per line.
fn argument_text(arguments: &Map<String, Value>) -> String {
    fn collect<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
        match value {
            Value::String(s) => out.push(s),
            Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
            Value::Object(map) => map.values().for_each(|v| collect(v, out)),
            Value::Null | Value::Bool(_) | Value::Number(_) => {},
        }
    }

    let mut parts = Vec::new();
    arguments.values().for_each(|v| collect(v, &mut parts));
    parts.join("\n")
}
