use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RETRY_LIMIT: u32 = 2;
pub const DEFAULT_THREAD_NAME: &str = "cadence";

/// Top-level config (cadence.toml + CADENCE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Settings for the periodic task scheduler and its worker thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Consecutive failures tolerated before a task is evicted.
    /// A task failing `retry_limit + 1` times in a row is removed.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Name given to the worker thread and passed to the started hook.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
    #[serde(default)]
    pub hooks: HookBundle,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            hooks: HookBundle::default(),
        }
    }
}

/// Fixed set of bootstrap hook bundles for the worker thread.
///
/// Signals are blocked on the worker by default so that process-directed
/// signals are delivered to application threads instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookBundle {
    /// No hooks at all.
    None,
    /// Only set the OS-level thread name.
    NameOnly,
    /// Block all signals while the worker runs, restore them on exit.
    #[default]
    BlockSignalsOnly,
    BlockSignalsAndName,
}

impl HookBundle {
    pub fn blocks_signals(self) -> bool {
        matches!(self, HookBundle::BlockSignalsOnly | HookBundle::BlockSignalsAndName)
    }

    pub fn names_thread(self) -> bool {
        matches!(self, HookBundle::NameOnly | HookBundle::BlockSignalsAndName)
    }
}

impl std::fmt::Display for HookBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HookBundle::None => "none",
            HookBundle::NameOnly => "name-only",
            HookBundle::BlockSignalsOnly => "block-signals-only",
            HookBundle::BlockSignalsAndName => "block-signals-and-name",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for HookBundle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(HookBundle::None),
            "name-only" => Ok(HookBundle::NameOnly),
            "block-signals-only" => Ok(HookBundle::BlockSignalsOnly),
            "block-signals-and-name" => Ok(HookBundle::BlockSignalsAndName),
            other => Err(format!("unknown hook bundle: {other}")),
        }
    }
}

fn default_retry_limit() -> u32 {
    DEFAULT_RETRY_LIMIT
}

fn default_thread_name() -> String {
    DEFAULT_THREAD_NAME.to_string()
}

impl CadenceConfig {
    /// Load config: explicit path > CADENCE_CONFIG env > ~/.cadence/cadence.toml.
    ///
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("CADENCE_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        tracing::debug!(%path, "loading cadence config");
        Self::from_figment(Self::figment(&path))
    }

    /// Provider stack used by [`CadenceConfig::load`]. Nested keys in the
    /// environment are separated by `__`, e.g. `CADENCE_SCHEDULER__RETRY_LIMIT=5`.
    pub fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("CADENCE_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        figment
            .extract()
            .map_err(|e| crate::error::CadenceError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cadence/cadence.toml", home)
}
