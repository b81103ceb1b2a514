use std::sync::Arc;
use std::thread::ThreadId;

use cadence_core::config::HookBundle;

use crate::error::Result;

/// Native identifier of a spawned thread, as handed to the `started` hook.
#[cfg(unix)]
pub type NativeHandle = std::os::unix::thread::RawPthread;

/// Native identifier of a spawned thread, as handed to the `started` hook.
#[cfg(not(unix))]
pub type NativeHandle = ();

/// Identity of a freshly spawned worker thread.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    /// Human-readable display name (e.g. `"cadence"`).
    pub name: String,
    pub id: ThreadId,
    pub native: NativeHandle,
}

/// Which point in the worker's lifetime a hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    PreStart,
    Started,
    PostStart,
}

impl std::fmt::Display for HookStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HookStage::PreStart => "pre-start",
            HookStage::Started => "started",
            HookStage::PostStart => "post-start",
        };
        write!(f, "{s}")
    }
}

pub type PreStartFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;
pub type StartedFn = Arc<dyn Fn(&ThreadInfo) -> Result<()> + Send + Sync>;
pub type PostStartFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Fully custom hook set. Any slot may be left empty.
#[derive(Clone, Default)]
pub struct CustomHooks {
    pub pre_start: Option<PreStartFn>,
    pub started: Option<StartedFn>,
    pub post_start: Option<PostStartFn>,
}

impl CustomHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pre_start<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.pre_start = Some(Arc::new(f));
        self
    }

    pub fn with_started<F>(mut self, f: F) -> Self
    where
        F: Fn(&ThreadInfo) -> Result<()> + Send + Sync + 'static,
    {
        self.started = Some(Arc::new(f));
        self
    }

    pub fn with_post_start<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.post_start = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for CustomHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomHooks")
            .field("pre_start", &self.pre_start.is_some())
            .field("started", &self.started.is_some())
            .field("post_start", &self.post_start.is_some())
            .finish()
    }
}

/// The hook set installed on the scheduler: a fixed bundle, or the custom
/// escape hatch. Cloning is cheap (bundles are `Copy`, custom slots are `Arc`).
#[derive(Debug, Clone)]
pub enum ThreadHooks {
    Bundle(HookBundle),
    Custom(CustomHooks),
}

impl ThreadHooks {
    pub fn none() -> Self {
        ThreadHooks::Bundle(HookBundle::None)
    }

    pub fn custom(hooks: CustomHooks) -> Self {
        ThreadHooks::Custom(hooks)
    }
}

impl Default for ThreadHooks {
    fn default() -> Self {
        ThreadHooks::Bundle(HookBundle::default())
    }
}

impl From<HookBundle> for ThreadHooks {
    fn from(bundle: HookBundle) -> Self {
        ThreadHooks::Bundle(bundle)
    }
}

impl From<CustomHooks> for ThreadHooks {
    fn from(hooks: CustomHooks) -> Self {
        ThreadHooks::Custom(hooks)
    }
}
