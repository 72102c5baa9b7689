use super::*;
use async_trait::async_trait;
use l9_core::{ManualClock, RiskLevel};
use std::sync::Mutex;

struct CollectingSink {
    events: Mutex<Vec<ApprovalEvent>>,
}

impl CollectingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(ApprovalEvent::kind).collect()
    }
}

#[async_trait]
impl ApprovalSink for CollectingSink {
    fn name(&self) -> &str {
        "collecting"
    }

    async fn record(&self, event: &ApprovalEvent) -> ApprovalResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct BrokenSink;

#[async_trait]
impl ApprovalSink for BrokenSink {
    fn name(&self) -> &str {
        "broken"
    }

    async fn record(&self, _event: &ApprovalEvent) -> ApprovalResult<()> {
        Err(ApprovalError::Sink {
            sink: "broken".into(),
            message: "disk full".into(),
        })
    }
}

struct BrokenNotifier;

#[async_trait]
impl ApprovalNotifier for BrokenNotifier {
    async fn notify(&self, _request: &ApprovalRequest) -> ApprovalResult<()> {
        Err(ApprovalError::Notify("webhook unreachable".into()))
    }
}

fn manager() -> (ApprovalManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let manager = ApprovalManager::new(clock.clone());
    (manager, clock)
}

async fn gmp_request(manager: &ApprovalManager, task: &str) -> ApprovalRequest {
    manager
        .request_approval("gmp_run", "l-cto", task, Map::new())
        .await
}

#[tokio::test]
async fn test_request_is_pending_with_default_ttl() {
    let (manager, _clock) = manager();
    let request = gmp_request(&manager, "t-1").await;

    assert_eq!(request.status, ApprovalStatus::Pending);
    assert_eq!(request.risk_level, RiskLevel::High);
    assert_eq!(
        request.expires_at.millis_since(&request.created_at),
        3_600_000
    );
    assert!(request.expires_at > request.created_at);

    let pending = manager.get_pending_requests().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request_id, request.request_id);
}

#[tokio::test]
async fn test_approve_unknown_is_not_found() {
    let (manager, _clock) = manager();
    let result = manager
        .approve(RequestId::new(), "igor", ApprovalScope::Single)
        .await;
    assert!(matches!(result, Err(ApprovalError::NotFound(_))));
}

#[tokio::test]
async fn test_approve_removes_from_pending() {
    let (manager, _clock) = manager();
    let request = gmp_request(&manager, "t-1").await;

    let decision = manager
        .approve(request.request_id, "igor", ApprovalScope::Single)
        .await
        .unwrap();
    assert!(decision.approved);
    assert_eq!(decision.decided_by, "igor");
    assert!(manager.get_pending_requests().await.is_empty());

    let current = manager.check_approval(request.request_id).await.unwrap();
    assert_eq!(current.status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn test_second_decision_is_already_resolved() {
    let (manager, _clock) = manager();
    let request = gmp_request(&manager, "t-1").await;
    manager
        .reject(request.request_id, "not today")
        .await
        .unwrap();

    let result = manager
        .approve(request.request_id, "igor", ApprovalScope::Single)
        .await;
    assert!(matches!(
        result,
        Err(ApprovalError::AlreadyResolved {
            status: ApprovalStatus::Rejected,
            ..
        })
    ));
}

#[tokio::test]
async fn test_request_expires_after_ttl() {
    let (manager, clock) = manager();
    let request = gmp_request(&manager, "t-1").await;

    clock.advance(TimeDelta::minutes(61));

    let current = manager.check_approval(request.request_id).await.unwrap();
    assert_eq!(current.status, ApprovalStatus::Expired);
    assert!(manager.get_pending_requests().await.is_empty());

    let result = manager
        .approve(request.request_id, "igor", ApprovalScope::Single)
        .await;
    assert!(matches!(result, Err(ApprovalError::Expired(_))));
}

#[tokio::test]
async fn test_expired_on_approve_without_prior_read() {
    let (manager, clock) = manager();
    let request = gmp_request(&manager, "t-1").await;
    clock.advance(TimeDelta::hours(2));
    let result = manager.reject(request.request_id, "late").await;
    assert!(matches!(result, Err(ApprovalError::Expired(_))));
}

#[tokio::test]
async fn test_custom_ttl() {
    let clock = Arc::new(ManualClock::starting_now());
    let manager = ApprovalManager::new(clock.clone()).with_ttl(Duration::from_secs(60));
    let request = gmp_request(&manager, "t-1").await;
    clock.advance(TimeDelta::seconds(59));
    assert!(manager.check_approval(request.request_id).await.unwrap().is_pending());
    clock.advance(TimeDelta::seconds(1));
    assert_eq!(
        manager.check_approval(request.request_id).await.unwrap().status,
        ApprovalStatus::Expired
    );
}

#[tokio::test]
async fn test_check_tool_approved_exact_pair() {
    let (manager, _clock) = manager();
    let request = gmp_request(&manager, "t-1").await;
    assert!(manager.check_tool_approved("gmp_run", "t-1").await.is_none());

    manager
        .approve(request.request_id, "igor", ApprovalScope::Single)
        .await
        .unwrap();
    assert!(manager.check_tool_approved("gmp_run", "t-2").await.is_none());
    assert!(manager.check_tool_approved("gmp_run", "t-1").await.is_some());
    assert!(manager.requires_approval("gmp_run").await);
}

#[tokio::test]
async fn test_single_scope_covers_one_call() {
    let (manager, _clock) = manager();
    let request = gmp_request(&manager, "t-1").await;
    manager
        .approve(request.request_id, "igor", ApprovalScope::Single)
        .await
        .unwrap();

    let used = manager.check_tool_approved("gmp_run", "t-1").await.unwrap();
    assert_eq!(used.request_id, request.request_id);
    assert!(manager.check_tool_approved("gmp_run", "t-1").await.is_none());
    assert!(!manager.consume_grant(request.request_id).await);
}

#[tokio::test]
async fn test_consume_grant_spends_single_approval() {
    let (manager, _clock) = manager();
    let request = gmp_request(&manager, "t-1").await;
    manager
        .approve(request.request_id, "igor", ApprovalScope::Single)
        .await
        .unwrap();

    assert!(manager.consume_grant(request.request_id).await);
    assert!(manager.check_tool_approved("gmp_run", "t-1").await.is_none());
}

#[tokio::test]
async fn test_resolved_history_pruned_after_ttl() {
    let (manager, clock) = manager();
    let approved = gmp_request(&manager, "t-1").await;
    let rejected = gmp_request(&manager, "t-2").await;
    manager
        .approve(approved.request_id, "igor", ApprovalScope::Single)
        .await
        .unwrap();
    manager.reject(rejected.request_id, "no").await.unwrap();

    clock.advance(TimeDelta::minutes(59));
    assert!(manager.check_approval(approved.request_id).await.is_some());
    assert_eq!(manager.decisions().await.len(), 2);

    clock.advance(TimeDelta::minutes(2));
    let later = gmp_request(&manager, "t-3").await;
    assert!(manager.check_approval(approved.request_id).await.is_none());
    assert!(manager.check_approval(rejected.request_id).await.is_none());
    assert!(manager.decisions().await.is_empty());
    assert!(manager.check_tool_approved("gmp_run", "t-1").await.is_none());
    assert!(manager.check_approval(later.request_id).await.unwrap().is_pending());

    let result = manager
        .approve(approved.request_id, "igor", ApprovalScope::Single)
        .await;
    assert!(matches!(result, Err(ApprovalError::NotFound(_))));
}

#[tokio::test]
async fn test_rejection_does_not_approve_tool() {
    let (manager, _clock) = manager();
    let request = gmp_request(&manager, "t-1").await;
    manager.reject(request.request_id, "no").await.unwrap();
    assert!(manager.check_tool_approved("gmp_run", "t-1").await.is_none());
}

#[tokio::test]
async fn test_permanent_scope_and_revoke() {
    let (manager, _clock) = manager();
    assert!(manager.requires_approval("git_push").await);
    let request = manager
        .request_approval("git_push", "l-cto", "t-9", Map::new())
        .await;
    manager
        .approve(request.request_id, "igor", ApprovalScope::Permanent)
        .await
        .unwrap();

    assert!(!manager.requires_approval("git_push").await);
    assert!(manager.check_tool_approved("git_push", "any-task").await.is_some());
    assert_eq!(manager.permanent_approvals().await, vec!["git_push"]);

    assert!(manager.revoke_permanent("git_push").await);
    assert!(!manager.revoke_permanent("git_push").await);
    assert!(manager.requires_approval("git_push").await);
    assert!(manager.check_tool_approved("git_push", "any-task").await.is_none());
}

#[tokio::test]
async fn test_session_scope_until_end_session() {
    let (manager, _clock) = manager();
    let request = gmp_request(&manager, "t-1").await;
    manager
        .approve(request.request_id, "igor", ApprovalScope::Session)
        .await
        .unwrap();
    assert!(manager.check_tool_approved("gmp_run", "t-other").await.is_some());
    // Session approvals do not lift the approval requirement.
    assert!(manager.requires_approval("gmp_run").await);

    manager.end_session().await;
    assert!(manager.check_tool_approved("gmp_run", "t-other").await.is_none());
}

#[tokio::test]
async fn test_low_risk_tool_needs_no_approval() {
    let (manager, _clock) = manager();
    assert!(!manager.requires_approval("file_read").await);
    let request = manager
        .request_approval("file_read", "l-cto", "t-1", Map::new())
        .await;
    assert_eq!(request.risk_level, RiskLevel::Low);
}

#[tokio::test]
async fn test_extra_high_risk_tools() {
    let clock = Arc::new(ManualClock::starting_now());
    let manager = ApprovalManager::new(clock)
        .with_risk_table(ToolRiskTable::builtin().with_high_risk(["deploy_prod"]));
    assert!(manager.requires_approval("deploy_prod").await);
}

#[tokio::test]
async fn test_pending_sorted_by_creation() {
    let (manager, clock) = manager();
    let first = gmp_request(&manager, "t-1").await;
    clock.advance(TimeDelta::seconds(5));
    let second = gmp_request(&manager, "t-2").await;
    clock.advance(TimeDelta::seconds(5));
    let third = gmp_request(&manager, "t-3").await;

    let ids: Vec<RequestId> = manager
        .get_pending_requests()
        .await
        .into_iter()
        .map(|r| r.request_id)
        .collect();
    assert_eq!(ids, vec![first.request_id, second.request_id, third.request_id]);
}

#[tokio::test]
async fn test_sinks_see_every_event() {
    let (manager, clock) = manager();
    let sink = CollectingSink::new();
    manager.add_sink(sink.clone()).await;

    let approved = gmp_request(&manager, "t-1").await;
    let stale = gmp_request(&manager, "t-2").await;
    manager
        .approve(approved.request_id, "igor", ApprovalScope::Single)
        .await
        .unwrap();

    clock.advance(TimeDelta::hours(2));
    assert_eq!(
        manager.check_approval(stale.request_id).await.unwrap().status,
        ApprovalStatus::Expired
    );

    assert_eq!(
        sink.kinds(),
        vec![
            "approval_requested",
            "approval_requested",
            "approval_decided",
            "approval_expired"
        ]
    );
}

#[tokio::test]
async fn test_side_effect_failures_never_propagate() {
    let (manager, _clock) = manager();
    manager.add_sink(Arc::new(BrokenSink)).await;
    manager.set_notifier(Arc::new(BrokenNotifier)).await;

    let request = gmp_request(&manager, "t-1").await;
    assert!(request.is_pending());
    let decision = manager
        .approve(request.request_id, "igor", ApprovalScope::Single)
        .await;
    assert!(decision.is_ok());
}

#[tokio::test]
async fn test_decisions_history() {
    let (manager, _clock) = manager();
    let a = gmp_request(&manager, "t-1").await;
    let b = gmp_request(&manager, "t-2").await;
    manager
        .approve(a.request_id, "igor", ApprovalScope::Single)
        .await
        .unwrap();
    manager
        .reject_as(b.request_id, "igor", "scope creep")
        .await
        .unwrap();

    let decisions = manager.decisions().await;
    assert_eq!(decisions.len(), 2);
    assert!(decisions[0].approved);
    assert!(!decisions[1].approved);
    assert_eq!(decisions[1].reason.as_deref(), Some("scope creep"));
    assert_eq!(decisions[1].scope, ApprovalScope::Single);
}
