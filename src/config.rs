use crate::core::{Result, TtlError};
use crate::reconcile::{ReconcilerSettings, RetryPolicy};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Command-line flags, each with an environment fallback.
#[derive(Debug, Clone, Parser)]
#[command(name = "resource-ttl-controller")]
#[command(about = "Deletes workload resources once their ResourceTTL policy expires")]
pub struct ControllerArgs {
    /// API group of the policy custom resource
    #[arg(long, env = "TTL_CONTROLLER_POLICY_GROUP", default_value = "cleanup.example.com")]
    pub policy_group: String,

    #[arg(long, env = "TTL_CONTROLLER_POLICY_VERSION", default_value = "v1")]
    pub policy_version: String,

    #[arg(long, env = "TTL_CONTROLLER_POLICY_PLURAL", default_value = "resourcettls")]
    pub policy_plural: String,

    /// Only watch policies in this namespace (default: all namespaces)
    #[arg(long, env = "TTL_CONTROLLER_POLICY_NAMESPACE")]
    pub policy_namespace: Option<String>,

    /// Seconds between full re-evaluations of every policy; 0 disables
    #[arg(long, env = "TTL_CONTROLLER_RESYNC_SECS", default_value_t = 300)]
    pub resync_secs: u64,

    /// Deadline in seconds for each list/delete call
    #[arg(long, env = "TTL_CONTROLLER_CALL_TIMEOUT_SECS", default_value_t = 30)]
    pub call_timeout_secs: u64,

    #[arg(long, env = "TTL_CONTROLLER_MAX_CONCURRENT_PASSES", default_value_t = 8)]
    pub max_concurrent_passes: usize,

    /// Attempts per list/delete call, including the first
    #[arg(long, env = "TTL_CONTROLLER_RETRY_MAX_ATTEMPTS", default_value_t = 1)]
    pub retry_max_attempts: u32,

    #[arg(long, env = "TTL_CONTROLLER_RETRY_INITIAL_BACKOFF_MS", default_value_t = 200)]
    pub retry_initial_backoff_ms: u64,

    #[arg(long, env = "TTL_CONTROLLER_RETRY_MAX_BACKOFF_MS", default_value_t = 5_000)]
    pub retry_max_backoff_ms: u64,

    /// Log expired resources instead of deleting them
    #[arg(long, env = "TTL_CONTROLLER_DRY_RUN")]
    pub dry_run: bool,

    /// Serve /healthz and /metrics on this address
    #[arg(long, env = "TTL_CONTROLLER_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Filter used when RUST_LOG is unset
    #[arg(long, env = "TTL_CONTROLLER_LOG", default_value = "resource_ttl=info")]
    pub log_filter: String,

    #[arg(long, env = "TTL_CONTROLLER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Validated controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub policy_group: String,
    pub policy_version: String,
    pub policy_plural: String,
    pub policy_namespace: Option<String>,
    /// `None` disables periodic resync.
    pub resync_interval: Option<Duration>,
    pub call_timeout: Duration,
    pub max_concurrent_passes: usize,
    pub retry: RetryPolicy,
    pub dry_run: bool,
    pub metrics_addr: Option<SocketAddr>,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            policy_group: "cleanup.example.com".to_string(),
            policy_version: "v1".to_string(),
            policy_plural: "resourcettls".to_string(),
            policy_namespace: None,
            resync_interval: Some(Duration::from_secs(300)),
            call_timeout: Duration::from_secs(30),
            max_concurrent_passes: 8,
            retry: RetryPolicy::default(),
            dry_run: false,
            metrics_addr: None,
            log_filter: "resource_ttl=info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ControllerConfig {
    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// [`TtlError::Config`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        for (flag, value) in [
            ("policy-group", &self.policy_group),
            ("policy-version", &self.policy_version),
            ("policy-plural", &self.policy_plural),
        ] {
            if value.trim().is_empty() {
                return Err(TtlError::Config(format!("--{} must not be empty", flag)));
            }
        }
        if self.policy_namespace.as_deref() == Some("") {
            return Err(TtlError::Config(
                "--policy-namespace must not be empty when set".to_string(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(TtlError::Config("--call-timeout-secs must be > 0".to_string()));
        }
        if self.max_concurrent_passes == 0 {
            return Err(TtlError::Config(
                "--max-concurrent-passes must be > 0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(TtlError::Config(
                "--retry-max-attempts must be >= 1".to_string(),
            ));
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(TtlError::Config(format!(
                "--retry-max-backoff-ms ({}) must be >= --retry-initial-backoff-ms ({})",
                self.retry.max_backoff_ms, self.retry.initial_backoff_ms
            )));
        }
        Ok(())
    }

    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            call_timeout: self.call_timeout,
            retry: self.retry.clone(),
            dry_run: self.dry_run,
        }
    }
}

impl TryFrom<ControllerArgs> for ControllerConfig {
    type Error = TtlError;

    fn try_from(args: ControllerArgs) -> Result<Self> {
        let config = Self {
            policy_group: args.policy_group,
            policy_version: args.policy_version,
            policy_plural: args.policy_plural,
            policy_namespace: args.policy_namespace,
            resync_interval: (args.resync_secs > 0).then(|| Duration::from_secs(args.resync_secs)),
            call_timeout: Duration::from_secs(args.call_timeout_secs),
            max_concurrent_passes: args.max_concurrent_passes,
            retry: RetryPolicy::new(
                args.retry_max_attempts,
                args.retry_initial_backoff_ms,
                args.retry_max_backoff_ms,
            ),
            dry_run: args.dry_run,
            metrics_addr: args.metrics_addr,
            log_filter: args.log_filter,
            log_format: args.log_format,
        };
        config.validate()?;
        Ok(config)
    }
}
