//! Service configuration loaded from environment variables.
//!
//! Configuration is loaded once at startup and validated before any worker
//! starts.
//!
//! ## Required Variables
//!
//! - `QUEUE_ENDPOINT` - `memory` for the in-process queue, or a SurrealDB
//!   endpoint such as `mem://` or `rocksdb://path`
//!
//! ## Optional Variables
//!
//! - `SERVICE_MODE` - `combined`, `intake` or `processor` (default: `combined`)
//! - `LISTEN` - Bind address (default: `0.0.0.0:8080`)
//! - `WORKER_COUNT` - Number of workers (default: 1)
//! - `PAYMENT_CAPACITY` - Concurrent payments allowed (default: 1)
//! - `PAYMENT_LATENCY_MS` - Simulated payment latency (default: 3000)
//! - `BATCH_SIZE` - Messages per pull, 1 to 10 (default: 10)
//! - `WAIT_SECONDS` - Long-poll budget (default: 20)
//! - `VISIBILITY_TIMEOUT_SECONDS` - Lease length (default: 30)
//! - `RETRY_BACKOFF_SECONDS` - Pause after a failed pull (default: 5)
//! - `STATS_INTERVAL_SECONDS` - Stats report period (default: 30)
//! - `RUST_LOG` - Log filter (default: `info`)

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use processor::{OrchestratorSettings, PollSettings, PoolSettings};

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("the memory queue requires SERVICE_MODE=combined, got '{0}'")]
    MemoryQueueNeedsCombinedMode(ServiceMode),
}

/// Which halves of the service run in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceMode {
    /// HTTP intake and the queue processor.
    #[default]
    Combined,
    /// HTTP intake only.
    Intake,
    /// Queue processor only.
    Processor,
}

impl ServiceMode {
    pub fn runs_processor(&self) -> bool {
        matches!(self, ServiceMode::Combined | ServiceMode::Processor)
    }

    pub fn serves_http(&self) -> bool {
        matches!(self, ServiceMode::Combined | ServiceMode::Intake)
    }
}

impl FromStr for ServiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "combined" => Ok(ServiceMode::Combined),
            "intake" => Ok(ServiceMode::Intake),
            "processor" => Ok(ServiceMode::Processor),
            _ => Err("expected combined, intake or processor".to_string()),
        }
    }
}

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceMode::Combined => write!(f, "combined"),
            ServiceMode::Intake => write!(f, "intake"),
            ServiceMode::Processor => write!(f, "processor"),
        }
    }
}

/// Queue implementation selected by `QUEUE_ENDPOINT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueBackend {
    /// In-process queue.
    Memory,
    /// SurrealDB table at the given endpoint.
    Surreal(String),
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub queue: QueueBackend,
    pub mode: ServiceMode,
    pub listen_addr: String,
    pub workers: usize,
    pub payment_capacity: usize,
    pub payment_latency: Duration,
    pub poll: PollSettings,
    pub stats_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("QUEUE_ENDPOINT")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("QUEUE_ENDPOINT"))?;
        let queue = if endpoint.eq_ignore_ascii_case("memory") {
            QueueBackend::Memory
        } else {
            QueueBackend::Surreal(endpoint)
        };

        let mode = parse_or(&lookup, "SERVICE_MODE", ServiceMode::Combined)?;
        if queue == QueueBackend::Memory && mode != ServiceMode::Combined {
            return Err(ConfigError::MemoryQueueNeedsCombinedMode(mode));
        }

        let listen_addr = lookup("LISTEN").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        if !listen_addr.contains(':') {
            return Err(invalid("LISTEN", &listen_addr, "expected host:port"));
        }

        let workers: usize = parse_or(&lookup, "WORKER_COUNT", 1)?;
        positive("WORKER_COUNT", workers as u64)?;

        let payment_capacity: usize = parse_or(&lookup, "PAYMENT_CAPACITY", 1)?;
        positive("PAYMENT_CAPACITY", payment_capacity as u64)?;

        let payment_latency_ms: u64 = parse_or(&lookup, "PAYMENT_LATENCY_MS", 3000)?;

        let batch_size: usize = parse_or(&lookup, "BATCH_SIZE", 10)?;
        if !(1..=10).contains(&batch_size) {
            return Err(invalid(
                "BATCH_SIZE",
                &batch_size.to_string(),
                "must be between 1 and 10",
            ));
        }

        let wait_seconds: u64 = parse_or(&lookup, "WAIT_SECONDS", 20)?;

        let visibility_seconds: u64 = parse_or(&lookup, "VISIBILITY_TIMEOUT_SECONDS", 30)?;
        positive("VISIBILITY_TIMEOUT_SECONDS", visibility_seconds)?;

        let backoff_seconds: u64 = parse_or(&lookup, "RETRY_BACKOFF_SECONDS", 5)?;

        let stats_seconds: u64 = parse_or(&lookup, "STATS_INTERVAL_SECONDS", 30)?;
        positive("STATS_INTERVAL_SECONDS", stats_seconds)?;

        Ok(Self {
            queue,
            mode,
            listen_addr,
            workers,
            payment_capacity,
            payment_latency: Duration::from_millis(payment_latency_ms),
            poll: PollSettings {
                batch_size,
                wait: Duration::from_secs(wait_seconds),
                visibility_timeout: Duration::from_secs(visibility_seconds),
                retry_backoff: Duration::from_secs(backoff_seconds),
            },
            stats_interval: Duration::from_secs(stats_seconds),
        })
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            workers: self.workers,
            poll: self.poll,
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            report_interval: self.stats_interval,
        }
    }
}

fn invalid(name: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn positive(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(invalid(name, "0", "must be greater than zero"));
    }
    Ok(())
}

fn parse_or<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(name, &raw, e.to_string())),
        None => Ok(default),
    }
}
