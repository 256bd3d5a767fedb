use serde::Deserialize;
use std::collections::HashMap;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CADENCE_ENGINE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub draft: DraftConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Read-through contact/company cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
}

/// External draft generation service. Without a `url` the local template
/// renderer is used.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_draft_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_tone")]
    pub default_tone: String,
}

/// External contact/company directory. Without a `url` an empty in-memory
/// directory is used and every lookup is "unknown".
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_directory_timeout_ms")]
    pub timeout_ms: u64,
}

/// Per-user CRM domains used as call-step context.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrmConfig {
    #[serde(default)]
    pub default_domain: Option<String>,
    #[serde(default)]
    pub domains: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_execute_due_limit")]
    pub execute_due_limit: usize,
}

// Default functions
fn default_node_id() -> String {
    "cadence-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_ttl_secs() -> u64 {
    300
}
fn default_max_entries() -> usize {
    10_000
}
fn default_maintenance_interval_secs() -> u64 {
    60
}
fn default_draft_timeout_ms() -> u64 {
    15_000
}
fn default_tone() -> String {
    "professional".to_string()
}
fn default_directory_timeout_ms() -> u64 {
    3_000
}
fn default_execute_due_limit() -> usize {
    100
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
        }
    }
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_draft_timeout_ms(),
            default_tone: default_tone(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_directory_timeout_ms(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            execute_due_limit: default_execute_due_limit(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            cache: CacheConfig::default(),
            draft: DraftConfig::default(),
            directory: DirectoryConfig::default(),
            crm: CrmConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl CrmConfig {
    /// CRM domain for the given user, falling back to the default.
    pub fn domain_for(&self, user_id: &str) -> Option<String> {
        self.domains
            .get(user_id)
            .cloned()
            .or_else(|| self.default_domain.clone())
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CADENCE_ENGINE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
