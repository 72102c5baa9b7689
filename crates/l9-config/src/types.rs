//! Configuration types for the L9 runtime.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration.

use std::path::PathBuf;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

/// Root configuration for the L9 runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider selection and credentials.
    pub llm: LlmSection,
    /// Kernel stack loading.
    pub kernels: KernelsSection,
    /// Approval workflow settings.
    pub approvals: ApprovalsSection,
    /// Task queue backend selection.
    pub queue: QueueSection,
    /// GMP/Git worker settings.
    pub worker: WorkerSection,
    /// Memory substrate connection.
    pub storage: StorageSection,
    /// Governance rule sources.
    pub governance: GovernanceSection,
    /// Logging level and format.
    pub logging: LoggingSection,
}

/// LLM provider settings. Only presence of the key is consulted here;
/// provider integration lives outside this workspace.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Provider identifier (e.g. `"openai"`).
    pub provider: String,
    /// Model name.
    pub model: String,
    /// API key. Prefer `OPENAI_API_KEY` over storing this in a file.
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_owned(),
            model: "gpt-4o".to_owned(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for LlmSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSection")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl Serialize for LlmSection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LlmSection", 2)?;
        state.serialize_field("provider", &self.provider)?;
        state.serialize_field("model", &self.model)?;
        state.end()
    }
}

/// Kernel stack settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelsSection {
    /// Whether agents should trust kernel-derived behavior (`L9_USE_KERNELS`).
    pub enabled: bool,
    /// Directory that kernel paths are resolved against.
    pub root: PathBuf,
    /// Optional integrity manifest to verify hashes against.
    pub manifest: Option<PathBuf>,
}

impl Default for KernelsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from("."),
            manifest: None,
        }
    }
}

/// Approval workflow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalsSection {
    /// Lifetime of a pending approval request, in seconds.
    pub ttl_secs: u64,
    /// Tools treated as high-risk in addition to the built-in table.
    pub extra_high_risk_tools: Vec<String>,
}

impl Default for ApprovalsSection {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            extra_high_risk_tools: Vec::new(),
        }
    }
}

/// Which task queue backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackendKind {
    /// Redis if reachable, memory otherwise.
    #[default]
    Auto,
    /// In-memory only.
    Memory,
    /// Redis primary with memory fallback.
    Redis,
}

impl std::fmt::Display for QueueBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Memory => write!(f, "memory"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

/// Task queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    /// Backend selection.
    pub backend: QueueBackendKind,
    /// Redis host (`REDIS_HOST`).
    pub redis_host: String,
    /// Redis port (`REDIS_PORT`).
    pub redis_port: u16,
    /// Key namespace for every queue key.
    pub key_prefix: String,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            backend: QueueBackendKind::Auto,
            redis_host: "localhost".to_owned(),
            redis_port: 6379,
            key_prefix: "l9-shared".to_owned(),
        }
    }
}

impl QueueSection {
    /// Connection URL for the configured Redis instance.
    #[must_use]
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }
}

/// GMP/Git worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Editor CLI used to run GMP tasks (`CURSOR_CLI_PATH`).
    pub cursor_cli_path: String,
    /// Per-task timeout in seconds (`GMP_TIMEOUT_SECONDS`).
    pub gmp_timeout_secs: u64,
    /// Queue poll interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            cursor_cli_path: "cursor".to_owned(),
            gmp_timeout_secs: 600,
            poll_interval_ms: 2000,
        }
    }
}

/// Memory substrate connection.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Postgres URL (`DATABASE_URL`). In-memory packet store when unset.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for StorageSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSection")
            .field("has_database_url", &self.database_url.is_some())
            .finish()
    }
}

impl Serialize for StorageSection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StorageSection", 1)?;
        state.serialize_field("has_database_url", &self.database_url.is_some())?;
        state.end()
    }
}

/// Governance rule sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceSection {
    /// YAML rule table merged on top of the built-in rules.
    pub rules_file: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level (`L9_LOG`).
    pub level: String,
    /// `pretty`, `compact`, or `json`.
    pub format: String,
    /// Per-target directives such as `l9_queue=debug`.
    pub directives: Vec<String>,
    /// Write daily rolling files here instead of stderr.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
            directory: None,
        }
    }
}
