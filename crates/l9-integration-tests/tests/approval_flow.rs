//! Integration tests for the gate → approval → queue → worker path.

mod common;

use chrono::TimeDelta;
use serde_json::json;

use l9_approval::{ApprovalError, ApprovalScope, ApprovalStatus};
use l9_queue::QueuedTask;
use l9_runtime::{GateOutcome, RuntimeError, WorkerOutcome};
use l9_storage::packet_types;
use l9_test::{RecordingNotifier, args};

use common::RuntimeTestHarness;

/// A high-risk call waits for a human, then runs exactly once.
#[tokio::test]
async fn test_gate_approve_dispatch_execute() {
    let h = RuntimeTestHarness::new().await;
    let gate = h.runtime.gate();

    let outcome = gate
        .invoke(
            "git_push",
            "l-cto",
            "t-1",
            args(json!({"args": ["push", "origin", "main"]})),
        )
        .await;
    let GateOutcome::PendingApproval(request) = outcome else {
        panic!("expected a pending approval, got {outcome:?}");
    };
    assert_eq!(h.runtime.approvals().get_pending_requests().await.len(), 1);
    assert!(h.runtime.queue().is_empty().await.unwrap());

    let task_id = h
        .runtime
        .approve_and_dispatch(request.request_id, "igor", ApprovalScope::Single, "git")
        .await
        .unwrap();
    assert!(h.runtime.approvals().get_pending_requests().await.is_empty());

    let (worker, executors) = h.worker(&["git"]);
    let WorkerOutcome::Executed(report) = worker.run_once().await.unwrap() else {
        panic!("expected the approved task to run");
    };
    assert_eq!(report.task_id, task_id);
    assert!(report.success);
    assert_eq!(executors[0].executed().len(), 1);
    assert_eq!(worker.run_once().await.unwrap(), WorkerOutcome::Empty);

    assert_eq!(
        h.sink.kinds(),
        vec!["approval_requested", "approval_decided"]
    );
    assert_eq!(h.packet_count(packet_types::APPROVAL_REQUESTED).await, 1);
    assert_eq!(h.packet_count(packet_types::APPROVAL_DECIDED).await, 1);
    assert_eq!(h.packet_count(packet_types::EXECUTION_REPORT).await, 1);

    let direct = gate
        .invoke(
            "git_push",
            "l-cto",
            "t-1",
            args(json!({"args": ["push", "origin", "main"]})),
        )
        .await;
    assert!(matches!(direct, GateOutcome::PendingApproval(_)));
}

/// Low-risk tools pass straight through.
#[tokio::test]
async fn test_low_risk_tool_allowed_without_request() {
    let h = RuntimeTestHarness::new().await;
    let outcome = h
        .runtime
        .gate()
        .invoke("file_read", "l-cto", "t-1", args(json!({"path": "README.md"})))
        .await;
    assert_eq!(outcome, GateOutcome::Allowed);
    assert!(h.sink.events().is_empty());
}

/// A permanent approval covers later calls until revoked.
#[tokio::test]
async fn test_permanent_approval_until_revoked() {
    let h = RuntimeTestHarness::new().await;
    let gate = h.runtime.gate();
    let approvals = h.runtime.approvals();

    let GateOutcome::PendingApproval(request) =
        gate.invoke("shell_exec", "l-cto", "t-1", args(json!({"cmd": "ls"}))).await
    else {
        panic!("shell_exec should need approval");
    };
    approvals
        .approve(request.request_id, "igor", ApprovalScope::Permanent)
        .await
        .unwrap();

    assert!(!approvals.requires_approval("shell_exec").await);
    let again = gate.invoke("shell_exec", "l-ops", "t-2", args(json!({"cmd": "pwd"}))).await;
    assert_eq!(again, GateOutcome::Allowed);

    assert!(approvals.revoke_permanent("shell_exec").await);
    let after = gate.invoke("shell_exec", "l-ops", "t-3", args(json!({"cmd": "pwd"}))).await;
    assert!(matches!(after, GateOutcome::PendingApproval(_)));
}

/// A session approval lasts until the session ends.
#[tokio::test]
async fn test_session_approval_ends_with_session() {
    let h = RuntimeTestHarness::new().await;
    let gate = h.runtime.gate();
    let approvals = h.runtime.approvals();

    let GateOutcome::PendingApproval(request) =
        gate.invoke("file_delete", "l-cto", "t-1", args(json!({"path": "tmp/a"}))).await
    else {
        panic!("file_delete should need approval");
    };
    approvals
        .approve(request.request_id, "igor", ApprovalScope::Session)
        .await
        .unwrap();

    let covered = gate.invoke("file_delete", "l-cto", "t-2", args(json!({"path": "tmp/b"}))).await;
    assert_eq!(covered, GateOutcome::Allowed);

    approvals.end_session().await;
    let after = gate.invoke("file_delete", "l-cto", "t-3", args(json!({"path": "tmp/c"}))).await;
    assert!(matches!(after, GateOutcome::PendingApproval(_)));
}

/// Governance blocks even a permanently approved tool.
#[tokio::test]
async fn test_governance_block_beats_approval() {
    let h = RuntimeTestHarness::new().await;
    let gate = h.runtime.gate();
    let request = h
        .runtime
        .approvals()
        .request_approval("shell_exec", "l-cto", "t-1", args(json!({})))
        .await;
    h.runtime
        .approvals()
        .approve(request.request_id, "igor", ApprovalScope::Permanent)
        .await
        .unwrap();

    let outcome = gate
        .invoke("shell_exec", "l-cto", "t-2", args(json!({"cmd": "rm -rf /"})))
        .await;
    let GateOutcome::Blocked { findings } = outcome else {
        panic!("expected a governance block");
    };
    assert!(findings.iter().any(|f| f.rule_id == "rm-root"));
}

/// Requests past their TTL cannot be approved and are recorded as expired.
#[tokio::test]
async fn test_expired_request_cannot_be_dispatched() {
    let h = RuntimeTestHarness::new().await;
    let approvals = h.runtime.approvals();
    let request = approvals
        .request_approval("git_push", "l-cto", "t-1", args(json!({})))
        .await;
    assert!(!request.is_expired(h.clock.as_ref()));

    h.clock.advance(TimeDelta::seconds(3601));
    assert!(request.is_expired(h.clock.as_ref()));

    let err = h
        .runtime
        .approve_and_dispatch(request.request_id, "igor", ApprovalScope::Single, "git")
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Approval(ApprovalError::Expired(_))));

    let stored = approvals.check_approval(request.request_id).await.unwrap();
    assert_eq!(stored.status, ApprovalStatus::Expired);
    assert!(h.sink.kinds().contains(&"approval_expired"));
    assert_eq!(h.packet_count(packet_types::APPROVAL_EXPIRED).await, 1);
    assert!(h.runtime.queue().is_empty().await.unwrap());
}

/// Deciding twice is refused.
#[tokio::test]
async fn test_second_decision_rejected() {
    let h = RuntimeTestHarness::new().await;
    let request = h
        .runtime
        .approvals()
        .request_approval("git_push", "l-cto", "t-1", args(json!({})))
        .await;
    h.runtime
        .reject(request.request_id, "igor", "not today")
        .await
        .unwrap();

    let err = h
        .runtime
        .approve_and_dispatch(request.request_id, "igor", ApprovalScope::Single, "git")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Approval(ApprovalError::AlreadyResolved { .. })
    ));
    assert!(h.runtime.queue().is_empty().await.unwrap());
}

/// A failing notifier does not stop the request from being created.
#[tokio::test]
async fn test_notifier_failure_is_not_fatal() {
    let h = RuntimeTestHarness::new().await;
    let notifier = RecordingNotifier::failing();
    h.runtime.approvals().set_notifier(notifier.clone()).await;

    let outcome = h
        .runtime
        .gate()
        .invoke("git_push", "l-cto", "t-1", args(json!({})))
        .await;
    assert!(matches!(outcome, GateOutcome::PendingApproval(_)));
    assert_eq!(notifier.notified().len(), 1);
    assert_eq!(h.runtime.approvals().get_pending_requests().await.len(), 1);
}

/// Work that bypassed the approval workflow never reaches an executor.
#[tokio::test]
async fn test_worker_refuses_unapproved_work() {
    let h = RuntimeTestHarness::new().await;
    let task = QueuedTask::new("sneaky push", "git", args(json!({"args": ["push"]})));
    let task_id = h.runtime.queue().enqueue_task(task).await.unwrap();

    let (worker, executors) = h.worker(&["git"]);
    assert_eq!(
        worker.run_once().await.unwrap(),
        WorkerOutcome::Unapproved(task_id)
    );
    assert!(executors[0].executed().is_empty());
    assert_eq!(h.packet_count(packet_types::EXECUTION_REPORT).await, 0);
}
