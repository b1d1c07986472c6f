//! Semaphore and worker pool configuration structures.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default interval between worker pool shrink checks.
pub const DEFAULT_SHRINK_INTERVAL_SECS: u64 = 5 * 60;

/// Counting semaphore configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaphoreConfig {
    /// Number of permits. Zero is treated as one.
    pub size: usize,
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self { size: 1 }
    }
}

impl SemaphoreConfig {
    /// Permit count after applying the zero-means-one rule.
    #[must_use]
    pub const fn effective_size(&self) -> usize {
        if self.size == 0 {
            1
        } else {
            self.size
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Workers spawned at start, also the queue capacity and the shrink floor.
    pub initial: usize,
    /// Workers added on a full queue and removed per shrink.
    pub increase_by: usize,
    /// Seconds between shrink checks.
    pub shrink_interval_secs: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            initial: num_cpus::get(),
            increase_by: 1,
            shrink_interval_secs: DEFAULT_SHRINK_INTERVAL_SECS,
        }
    }
}

impl WorkerPoolConfig {
    /// Defaults: one worker per CPU, grow by one, shrink check every 5 minutes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial worker count and queue capacity.
    #[must_use]
    pub const fn with_initial(mut self, initial: usize) -> Self {
        self.initial = initial;
        self
    }

    /// Set the grow/shrink step.
    #[must_use]
    pub const fn with_increase_by(mut self, increase_by: usize) -> Self {
        self.increase_by = increase_by;
        self
    }

    /// Set the shrink check interval.
    #[must_use]
    pub const fn with_shrink_interval(mut self, interval: Duration) -> Self {
        self.shrink_interval_secs = interval.as_secs();
        self
    }

    /// Shrink check interval as a [`Duration`].
    #[must_use]
    pub const fn shrink_interval(&self) -> Duration {
        Duration::from_secs(self.shrink_interval_secs)
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.initial == 0 {
            return Err("initial must be greater than 0".into());
        }
        if self.increase_by == 0 {
            return Err("increase_by must be greater than 0".into());
        }
        if self.shrink_interval_secs == 0 {
            return Err("shrink_interval_secs must be greater than 0".into());
        }
        Ok(())
    }
}

/// Root toolkit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Semaphore settings.
    pub semaphore: SemaphoreConfig,
    /// Worker pool settings.
    pub pool: WorkerPoolConfig,
}

impl ToolkitConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns a description prefixed with the failing section.
    pub fn validate(&self) -> Result<(), String> {
        self.pool.validate().map_err(|e| format!("pool invalid: {e}"))
    }

    /// Parse toolkit configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by environment variables.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    /// Recognised variables: `LIFECYCLE_SEM_SIZE`, `LIFECYCLE_POOL_INITIAL`,
    /// `LIFECYCLE_POOL_INCREASE_BY`, `LIFECYCLE_POOL_SHRINK_SECS`.
    ///
    /// # Errors
    ///
    /// Returns a description of a malformed variable or invalid result.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(size) = env_number("LIFECYCLE_SEM_SIZE")? {
            cfg.semaphore.size = size;
        }
        if let Some(initial) = env_number("LIFECYCLE_POOL_INITIAL")? {
            cfg.pool.initial = initial;
        }
        if let Some(step) = env_number("LIFECYCLE_POOL_INCREASE_BY")? {
            cfg.pool.increase_by = step;
        }
        if let Some(secs) = env_number("LIFECYCLE_POOL_SHRINK_SECS")? {
            cfg.pool.shrink_interval_secs = secs;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{key}: {e}")),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("{key}: {e}")),
    }
}
