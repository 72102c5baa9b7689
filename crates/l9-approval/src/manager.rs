//! Approval manager: pending requests, decisions, and standing approvals.
//!
//! # Lifecycle
//!
//! 1. [`request_approval`](ApprovalManager::request_approval) creates a
//!    `Pending` request with a TTL and notifies sinks and the notifier
//! 2. A human calls [`approve`](ApprovalManager::approve) or
//!    [`reject`](ApprovalManager::reject)
//! 3. Undecided requests become `Expired` once their TTL passes
//!
//! Expiry is applied lazily: every accessor first moves expired pending
//! requests into the resolved history. Resolved requests, decisions, and
//! unused single-scope grants are kept for one TTL after they resolve.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use l9_core::{Clock, SystemClock, Timestamp};
use l9_governance::ToolRiskTable;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{ApprovalError, ApprovalResult};
use crate::request::{ApprovalDecision, ApprovalRequest, ApprovalScope, ApprovalStatus, RequestId};
use crate::sink::{ApprovalEvent, ApprovalNotifier, ApprovalSink};

/// Default lifetime of a pending request (1 hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct Resolved {
    request: ApprovalRequest,
    resolved_at: Timestamp,
}

#[derive(Debug, Default)]
struct ApprovalState {
    pending: HashMap<RequestId, ApprovalRequest>,
    resolved: HashMap<RequestId, Resolved>,
    decisions: Vec<ApprovalDecision>,
    /// Single-scope approvals not yet used by a call or a dispatch.
    grants: Vec<ApprovalDecision>,
    session: HashMap<String, ApprovalDecision>,
    permanent: HashMap<String, ApprovalDecision>,
}

impl ApprovalState {
    /// Expire overdue pending requests, then drop history older than
    /// `retention`. Returns the newly expired requests.
    fn sweep_expired(&mut self, now: Timestamp, retention: TimeDelta) -> Vec<ApprovalRequest> {
        let expired_ids: Vec<RequestId> = self
            .pending
            .values()
            .filter(|r| r.is_expired_at(now))
            .map(|r| r.request_id)
            .collect();

        let mut expired = Vec::with_capacity(expired_ids.len());
        for id in expired_ids {
            if let Some(mut request) = self.pending.remove(&id) {
                request.status = ApprovalStatus::Expired;
                self.resolve(request.clone(), now);
                expired.push(request);
            }
        }

        let live = |at: Timestamp| at.saturating_add(retention) > now;
        self.resolved.retain(|_, r| live(r.resolved_at));
        self.decisions.retain(|d| live(d.decided_at));
        self.grants.retain(|g| live(g.decided_at));
        expired
    }

    fn resolve(&mut self, request: ApprovalRequest, now: Timestamp) {
        self.resolved.insert(
            request.request_id,
            Resolved {
                request,
                resolved_at: now,
            },
        );
    }

    /// Take a request out of `pending` for a decision, or explain why not.
    fn take_pending(&mut self, request_id: RequestId) -> ApprovalResult<ApprovalRequest> {
        if let Some(request) = self.pending.remove(&request_id) {
            return Ok(request);
        }
        match self.resolved.get(&request_id).map(|r| r.request.status) {
            Some(ApprovalStatus::Expired) => Err(ApprovalError::Expired(request_id)),
            Some(status) => Err(ApprovalError::AlreadyResolved { request_id, status }),
            None => Err(ApprovalError::NotFound(request_id)),
        }
    }
}

/// Owns the pending-request map and every decision made on it.
pub struct ApprovalManager {
    state: RwLock<ApprovalState>,
    risk_table: ToolRiskTable,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    sinks: RwLock<Vec<Arc<dyn ApprovalSink>>>,
    notifier: RwLock<Option<Arc<dyn ApprovalNotifier>>>,
}

impl std::fmt::Debug for ApprovalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalManager")
            .field("ttl", &self.ttl)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Default for ApprovalManager {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ApprovalManager {
    /// Create a manager with the built-in tool risk table and a 1 hour TTL.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(ApprovalState::default()),
            risk_table: ToolRiskTable::builtin(),
            ttl: to_delta(DEFAULT_TTL),
            clock,
            sinks: RwLock::new(Vec::new()),
            notifier: RwLock::new(None),
        }
    }

    /// Set the lifetime of new requests. Clamped to at least one second.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = to_delta(ttl.max(Duration::from_secs(1)));
        self
    }

    /// Replace the tool risk table.
    #[must_use]
    pub fn with_risk_table(mut self, table: ToolRiskTable) -> Self {
        self.risk_table = table;
        self
    }

    /// Register a sink that records every lifecycle event.
    pub async fn add_sink(&self, sink: Arc<dyn ApprovalSink>) {
        self.sinks.write().await.push(sink);
    }

    /// Register the notifier for new requests, replacing any previous one.
    pub async fn set_notifier(&self, notifier: Arc<dyn ApprovalNotifier>) {
        *self.notifier.write().await = Some(notifier);
    }

    /// The tool risk table in use.
    #[must_use]
    pub fn risk_table(&self) -> &ToolRiskTable {
        &self.risk_table
    }

    /// Create a pending request. Always succeeds.
    ///
    /// Sinks and the notifier are awaited, but their failures are only
    /// logged.
    pub async fn request_approval(
        &self,
        tool_id: impl Into<String>,
        agent_id: impl Into<String>,
        task_id: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> ApprovalRequest {
        let tool_id = tool_id.into();
        let now = self.clock.now();
        let request = ApprovalRequest {
            request_id: RequestId::new(),
            risk_level: self.risk_table.risk_of(&tool_id),
            tool_id,
            agent_id: agent_id.into(),
            task_id: task_id.into(),
            arguments,
            created_at: now,
            expires_at: now.saturating_add(self.ttl),
            status: ApprovalStatus::Pending,
        };

        let expired = {
            let mut state = self.state.write().await;
            let expired = state.sweep_expired(now, self.ttl);
            state.pending.insert(request.request_id, request.clone());
            expired
        };

        info!(
            request_id = %request.request_id,
            tool = %request.tool_id,
            agent = %request.agent_id,
            task = %request.task_id,
            risk = %request.risk_level,
            "approval requested"
        );

        self.emit_expired(expired).await;
        self.emit(&ApprovalEvent::Requested {
            request: request.clone(),
        })
        .await;
        self.notify(&request).await;
        request
    }

    /// Approve a pending request.
    ///
    /// With [`ApprovalScope::Permanent`] the tool stays approved until
    /// [`revoke_permanent`](Self::revoke_permanent); with
    /// [`ApprovalScope::Session`] until [`end_session`](Self::end_session).
    ///
    /// # Errors
    ///
    /// [`ApprovalError::NotFound`] for an unknown id,
    /// [`ApprovalError::Expired`] if the TTL passed, and
    /// [`ApprovalError::AlreadyResolved`] if a decision was already made.
    pub async fn approve(
        &self,
        request_id: RequestId,
        approved_by: impl Into<String>,
        scope: ApprovalScope,
    ) -> ApprovalResult<ApprovalDecision> {
        let approved_by = approved_by.into();
        let (decision, expired) = {
            let mut state = self.state.write().await;
            let now = self.clock.now();
            let expired = state.sweep_expired(now, self.ttl);
            let result = state.take_pending(request_id).map(|mut request| {
                request.status = ApprovalStatus::Approved;
                let decision = ApprovalDecision {
                    request_id,
                    tool_id: request.tool_id.clone(),
                    task_id: request.task_id.clone(),
                    approved: true,
                    decided_by: approved_by,
                    scope,
                    reason: None,
                    decided_at: now,
                };
                match scope {
                    ApprovalScope::Single => state.grants.push(decision.clone()),
                    ApprovalScope::Session => {
                        state.session.insert(request.tool_id.clone(), decision.clone());
                    },
                    ApprovalScope::Permanent => {
                        state
                            .permanent
                            .insert(request.tool_id.clone(), decision.clone());
                    },
                }
                state.decisions.push(decision.clone());
                state.resolve(request, now);
                decision
            });
            (result, expired)
        };

        self.emit_expired(expired).await;
        let decision = decision?;
        info!(
            request_id = %request_id,
            tool = %decision.tool_id,
            by = %decision.decided_by,
            scope = %decision.scope,
            "approval granted"
        );
        self.emit(&ApprovalEvent::Decided {
            decision: decision.clone(),
        })
        .await;
        Ok(decision)
    }

    /// Reject a pending request.
    ///
    /// # Errors
    ///
    /// Same as [`approve`](Self::approve).
    pub async fn reject(
        &self,
        request_id: RequestId,
        reason: impl Into<String>,
    ) -> ApprovalResult<ApprovalDecision> {
        self.reject_as(request_id, "operator", reason).await
    }

    /// Reject a pending request, recording who rejected it.
    ///
    /// # Errors
    ///
    /// Same as [`approve`](Self::approve).
    pub async fn reject_as(
        &self,
        request_id: RequestId,
        rejected_by: impl Into<String>,
        reason: impl Into<String>,
    ) -> ApprovalResult<ApprovalDecision> {
        let rejected_by = rejected_by.into();
        let reason = reason.into();
        let (decision, expired) = {
            let mut state = self.state.write().await;
            let now = self.clock.now();
            let expired = state.sweep_expired(now, self.ttl);
            let result = state.take_pending(request_id).map(|mut request| {
                request.status = ApprovalStatus::Rejected;
                let decision = ApprovalDecision {
                    request_id,
                    tool_id: request.tool_id.clone(),
                    task_id: request.task_id.clone(),
                    approved: false,
                    decided_by: rejected_by,
                    scope: ApprovalScope::Single,
                    reason: Some(reason),
                    decided_at: now,
                };
                state.decisions.push(decision.clone());
                state.resolve(request, now);
                decision
            });
            (result, expired)
        };

        self.emit_expired(expired).await;
        let decision = decision?;
        info!(
            request_id = %request_id,
            tool = %decision.tool_id,
            reason = decision.reason.as_deref().unwrap_or_default(),
            "approval rejected"
        );
        self.emit(&ApprovalEvent::Decided {
            decision: decision.clone(),
        })
        .await;
        Ok(decision)
    }

    /// Find an approval that covers `tool_id` for `task_id`.
    ///
    /// Checks standing permanent approvals, then session approvals, then an
    /// unused single-scope grant on this exact tool and task. A single-scope
    /// grant is consumed by the call that finds it.
    pub async fn check_tool_approved(
        &self,
        tool_id: &str,
        task_id: &str,
    ) -> Option<ApprovalDecision> {
        let (found, expired) = {
            let mut state = self.state.write().await;
            let expired = state.sweep_expired(self.clock.now(), self.ttl);
            let standing = state
                .permanent
                .get(tool_id)
                .or_else(|| state.session.get(tool_id))
                .cloned();
            let found = standing.or_else(|| {
                let index = state
                    .grants
                    .iter()
                    .position(|g| g.tool_id == tool_id && g.task_id == task_id)?;
                let grant = state.grants.remove(index);
                debug!(request_id = %grant.request_id, tool = tool_id, task = task_id, "single approval used");
                Some(grant)
            });
            (found, expired)
        };
        self.emit_expired(expired).await;
        found
    }

    /// Use up the single-scope grant left by `request_id`, if it is still
    /// unused. Returns whether one was found.
    pub async fn consume_grant(&self, request_id: RequestId) -> bool {
        let mut state = self.state.write().await;
        let before = state.grants.len();
        state.grants.retain(|g| g.request_id != request_id);
        state.grants.len() < before
    }

    /// Current state of a request that is pending or resolved within the
    /// last TTL.
    pub async fn check_approval(&self, request_id: RequestId) -> Option<ApprovalRequest> {
        let (found, expired) = {
            let mut state = self.state.write().await;
            let expired = state.sweep_expired(self.clock.now(), self.ttl);
            let found = state
                .pending
                .get(&request_id)
                .or_else(|| state.resolved.get(&request_id).map(|r| &r.request))
                .cloned();
            (found, expired)
        };
        self.emit_expired(expired).await;
        found
    }

    /// All pending requests, oldest first.
    pub async fn get_pending_requests(&self) -> Vec<ApprovalRequest> {
        let (mut pending, expired) = {
            let mut state = self.state.write().await;
            let expired = state.sweep_expired(self.clock.now(), self.ttl);
            let pending: Vec<ApprovalRequest> = state.pending.values().cloned().collect();
            (pending, expired)
        };
        self.emit_expired(expired).await;
        pending.sort_by_key(|r| r.created_at);
        pending
    }

    /// Whether calling `tool_id` needs a human decision.
    ///
    /// High-risk tools need approval unless a permanent approval stands.
    pub async fn requires_approval(&self, tool_id: &str) -> bool {
        if !self.risk_table.requires_approval(tool_id) {
            return false;
        }
        !self.state.read().await.permanent.contains_key(tool_id)
    }

    /// Drop a standing permanent approval. Returns whether one existed.
    pub async fn revoke_permanent(&self, tool_id: &str) -> bool {
        let removed = self.state.write().await.permanent.remove(tool_id).is_some();
        if removed {
            info!(tool = tool_id, "permanent approval revoked");
        }
        removed
    }

    /// Drop every session-scoped approval.
    pub async fn end_session(&self) {
        let mut state = self.state.write().await;
        let count = state.session.len();
        state.session.clear();
        debug!(count, "session approvals cleared");
    }

    /// Decisions made within the last TTL, oldest first.
    pub async fn decisions(&self) -> Vec<ApprovalDecision> {
        self.state.read().await.decisions.clone()
    }

    /// Tools with a standing permanent approval, sorted.
    pub async fn permanent_approvals(&self) -> Vec<String> {
        let mut tools: Vec<String> = self.state.read().await.permanent.keys().cloned().collect();
        tools.sort();
        tools
    }

    async fn emit_expired(&self, expired: Vec<ApprovalRequest>) {
        for request in expired {
            info!(request_id = %request.request_id, tool = %request.tool_id, "approval request expired");
            self.emit(&ApprovalEvent::Expired { request }).await;
        }
    }

    async fn emit(&self, event: &ApprovalEvent) {
        let sinks = self.sinks.read().await.clone();
        for sink in sinks {
            if let Err(e) = sink.record(event).await {
                warn!(sink = sink.name(), event = event.kind(), error = %e, "approval sink failed");
            }
        }
    }

    async fn notify(&self, request: &ApprovalRequest) {
        let notifier = self.notifier.read().await.clone();
        if let Some(notifier) = notifier
            && let Err(e) = notifier.notify(request).await
        {
            warn!(request_id = %request.request_id, error = %e, "approval notification failed");
        }
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
