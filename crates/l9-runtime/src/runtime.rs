//! The runtime context: every long-lived component, built once at startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use l9_approval::{ApprovalDecision, ApprovalManager, ApprovalScope, RequestId};
use l9_config::{Config, QueueBackendKind};
use l9_core::{Clock, SystemClock, TaskId};
use l9_governance::{CredentialScanner, RuleEngine, RuleTable};
use l9_kernel::{KernelActivation, KernelStack};
use l9_queue::{APPROVAL_FLAG, DEFAULT_PRIORITY, QueueState, QueuedTask, TaskQueue, validate_priority};
use l9_storage::{MemoryPacketStore, PacketStore};

use crate::config_bridge;
use crate::error::{RuntimeError, RuntimeResult};
use crate::executor::{GitExecutor, GmpExecutor};
use crate::gate::ToolGate;
use crate::sink::PacketApprovalSink;
use crate::worker::Worker;

/// Status given to tasks enqueued after approval.
pub const APPROVED_STATUS: &str = "approved";

/// Shared handles to every runtime component.
///
/// Built by [`Runtime::from_config`] or [`RuntimeBuilder`] and passed to
/// whatever needs it. Nothing here is a process global.
pub struct Runtime {
    config: Config,
    workspace: PathBuf,
    kernels: Arc<KernelStack>,
    activation: KernelActivation,
    rules: Arc<RuleEngine>,
    approvals: Arc<ApprovalManager>,
    queue: Arc<TaskQueue>,
    packets: Arc<dyn PacketStore>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("workspace", &self.workspace)
            .field("activation", &self.activation)
            .field("queue", &self.queue)
            .field("packets", &self.packets.name())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Assemble every component from `config` for `workspace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the governance rule file is invalid. Unreachable
    /// Redis or Postgres only degrade to in-memory backends.
    pub async fn from_config(config: Config, workspace: impl Into<PathBuf>) -> RuntimeResult<Self> {
        RuntimeBuilder::new(config).workspace(workspace).build().await
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Workspace root.
    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Loaded kernel stack.
    #[must_use]
    pub fn kernels(&self) -> &Arc<KernelStack> {
        &self.kernels
    }

    /// Kernel activation state.
    #[must_use]
    pub fn activation(&self) -> &KernelActivation {
        &self.activation
    }

    /// Governance rule engine.
    #[must_use]
    pub fn rules(&self) -> &Arc<RuleEngine> {
        &self.rules
    }

    /// Approval manager.
    #[must_use]
    pub fn approvals(&self) -> &Arc<ApprovalManager> {
        &self.approvals
    }

    /// Task queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    /// Packet store.
    #[must_use]
    pub fn packets(&self) -> &Arc<dyn PacketStore> {
        &self.packets
    }

    /// Tool gate over this runtime's rules and approvals.
    #[must_use]
    pub fn gate(&self) -> ToolGate {
        ToolGate::new(Arc::clone(&self.rules), Arc::clone(&self.approvals))
    }

    /// Worker with the `gmp` and `git` executors configured.
    #[must_use]
    pub fn worker(&self) -> Worker {
        let timeout = config_bridge::gmp_timeout(&self.config);
        let gmp = GmpExecutor::new(
            self.config.worker.cursor_cli_path.clone(),
            self.workspace.clone(),
            timeout,
        );
        let git = GitExecutor::new(self.workspace.clone(), timeout);
        Worker::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.packets),
            config_bridge::poll_interval(&self.config),
        )
        .with_executor(Arc::new(gmp))
        .with_executor(Arc::new(git))
    }

    /// Approve a pending request and enqueue its work for `handler`.
    ///
    /// The request's arguments become the task payload, stamped with
    /// `approved_by_igor = true`. An optional integer `priority` argument in
    /// `1..=10` sets the task priority. A single-scope approval is used up
    /// by the dispatch, so the gate will not also admit a direct call.
    ///
    /// # Errors
    ///
    /// Returns the approval error if the request is unknown, expired, or
    /// already decided. Nothing is enqueued in that case.
    pub async fn approve_and_dispatch(
        &self,
        request_id: RequestId,
        approved_by: &str,
        scope: ApprovalScope,
        handler: &str,
    ) -> RuntimeResult<TaskId> {
        let decision = self.approvals.approve(request_id, approved_by, scope).await?;
        // A single-scope approval is spent on the queued task.
        self.approvals.consume_grant(request_id).await;
        let request = self
            .approvals
            .check_approval(request_id)
            .await
            .ok_or_else(|| RuntimeError::RequestLost(request_id.to_string()))?;

        let priority = request
            .arguments
            .get("priority")
            .and_then(Value::as_u64)
            .and_then(|p| u8::try_from(p).ok())
            .and_then(|p| validate_priority(p).ok())
            .unwrap_or(DEFAULT_PRIORITY);

        let mut payload = request.arguments;
        payload.insert(APPROVAL_FLAG.to_owned(), Value::Bool(true));
        payload.insert("request_id".to_owned(), Value::String(request_id.to_string()));
        payload.insert("approved_by".to_owned(), Value::String(decision.decided_by));
        payload.insert("agent_id".to_owned(), Value::String(request.agent_id.clone()));

        let mut task = QueuedTask::new(request.tool_id.clone(), handler, payload)
            .with_agent(request.agent_id)
            .with_priority(priority)
            .with_tags(vec![request.tool_id, format!("task:{}", request.task_id)]);
        task.status = APPROVED_STATUS.to_owned();

        let task_id = self.queue.enqueue_task(task).await?;
        info!(%request_id, %task_id, handler, priority, "approved work dispatched");
        Ok(task_id)
    }

    /// Reject a pending request.
    ///
    /// # Errors
    ///
    /// Same as [`ApprovalManager::reject_as`].
    pub async fn reject(
        &self,
        request_id: RequestId,
        rejected_by: &str,
        reason: &str,
    ) -> RuntimeResult<ApprovalDecision> {
        Ok(self.approvals.reject_as(request_id, rejected_by, reason).await?)
    }
}

/// Builds a [`Runtime`], with optional component overrides for tests.
pub struct RuntimeBuilder {
    config: Config,
    workspace: PathBuf,
    clock: Option<Arc<dyn Clock>>,
    queue: Option<Arc<TaskQueue>>,
    packets: Option<Arc<dyn PacketStore>>,
}

impl RuntimeBuilder {
    /// Builder over `config`, with the current directory as workspace.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: PathBuf::from("."),
            clock: None,
            queue: None,
            packets: None,
        }
    }

    /// Set the workspace root.
    #[must_use]
    pub fn workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Use `clock` for approval TTLs.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use `queue` instead of the configured backend.
    #[must_use]
    pub fn queue(mut self, queue: Arc<TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Use `packets` instead of the configured store.
    #[must_use]
    pub fn packets(mut self, packets: Arc<dyn PacketStore>) -> Self {
        self.packets = Some(packets);
        self
    }

    /// Assemble the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the governance rule file is invalid.
    pub async fn build(self) -> RuntimeResult<Runtime> {
        let Self {
            config,
            workspace,
            clock,
            queue,
            packets,
        } = self;

        let kernels = Arc::new(load_kernels(&config, &workspace));
        let activation = KernelActivation::resolve(config.kernels.enabled, &kernels);
        if let KernelActivation::Degraded { missing } = &activation {
            warn!(missing = ?missing, "kernel stack degraded");
        }

        let rules = Arc::new(build_rule_engine(&config, &workspace)?);

        let packets = match packets {
            Some(p) => p,
            None => open_packet_store(&config).await,
        };

        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock));
        let approvals = Arc::new(
            ApprovalManager::new(clock)
                .with_ttl(config_bridge::approval_ttl(&config))
                .with_risk_table(config_bridge::to_risk_table(&config)),
        );
        approvals
            .add_sink(Arc::new(PacketApprovalSink::new(Arc::clone(&packets))))
            .await;

        let queue = match queue {
            Some(q) => q,
            None => Arc::new(open_queue(&config).await),
        };

        info!(
            workspace = %workspace.display(),
            kernels = %activation,
            rules = rules.table().len(),
            packets = packets.name(),
            "runtime ready"
        );

        Ok(Runtime {
            config,
            workspace,
            kernels,
            activation,
            rules,
            approvals,
            queue,
            packets,
        })
    }
}

/// Load the default kernel sequence, or an empty stack when disabled.
#[must_use]
pub fn load_kernels(config: &Config, workspace: &Path) -> KernelStack {
    let root = config_bridge::kernel_root(config, workspace);
    if config.kernels.enabled {
        KernelStack::load(root)
    } else {
        KernelStack::load_sequence(root, &[])
    }
}

/// Builtin rules, overlaid with the configured rule file, plus credential
/// scanning.
///
/// # Errors
///
/// Returns an error if the rule file cannot be read or compiled.
pub fn build_rule_engine(config: &Config, workspace: &Path) -> RuntimeResult<RuleEngine> {
    let mut table = RuleTable::builtin_mistakes()?;
    if let Some(path) = config_bridge::rules_path(config, workspace) {
        let overlay = RuleTable::from_file(&path)?;
        info!(path = %path.display(), rules = overlay.len(), "governance rules loaded");
        table = table.merged_with(overlay);
    }
    Ok(RuleEngine::new(table).with_credential_scan(CredentialScanner::new()))
}

/// Open the configured queue.
///
/// `memory` never touches Redis. `redis` keeps an unreachable server as a
/// degraded primary so [`TaskQueue::reconcile`] can recover it; `auto`
/// drops it and runs memory-only.
pub async fn open_queue(config: &Config) -> TaskQueue {
    let section = &config.queue;
    match section.backend {
        QueueBackendKind::Memory => TaskQueue::memory(),
        QueueBackendKind::Redis => {
            TaskQueue::connect_redis(&section.redis_url(), &section.key_prefix).await
        },
        QueueBackendKind::Auto => {
            let queue = TaskQueue::connect_redis(&section.redis_url(), &section.key_prefix).await;
            if matches!(queue.health().await.state, QueueState::Degraded { .. }) {
                info!("redis unreachable, queue running in memory");
                TaskQueue::memory()
            } else {
                queue
            }
        },
    }
}

/// Open the configured packet store, falling back to memory.
pub async fn open_packet_store(config: &Config) -> Arc<dyn PacketStore> {
    let Some(url) = config.storage.database_url.as_deref() else {
        return Arc::new(MemoryPacketStore::new());
    };
    connect_postgres(url).await
}

#[cfg(feature = "postgres")]
async fn connect_postgres(url: &str) -> Arc<dyn PacketStore> {
    match l9_storage::PgPacketStore::connect(url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "postgres unavailable, packets kept in memory");
            Arc::new(MemoryPacketStore::new())
        },
    }
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_url: &str) -> Arc<dyn PacketStore> {
    warn!("DATABASE_URL set but postgres support is not built in, packets kept in memory");
    Arc::new(MemoryPacketStore::new())
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
