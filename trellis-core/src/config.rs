//! Engine configuration.
//!
//! Configuration is held per thread, like the reactive context stack, so
//! independent reactive worlds on different threads never see each other's
//! settings.
//!
//! ```rust
//! use trellis_core::config::{self, ArrayStrategy, Config};
//!
//! let cfg = Config::from_json(r#"{ "diagnostics": false, "array_strategy": "copied" }"#).unwrap();
//! assert_eq!(cfg.array_strategy, ArrayStrategy::Copied);
//! config::set(cfg);
//! assert!(!config::current().diagnostics);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ObserveError, Warning};

/// Callback receiving diagnostics instead of the log.
pub type WarnHandler = Arc<dyn Fn(&Warning) + Send + Sync>;

/// How an observed array receives its intercepted method table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayStrategy {
    /// Point the array at the single shared intercepted table.
    #[default]
    Shared,
    /// Give the array its own copy of the intercepted table.
    Copied,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Emit warnings and run development-time setter hooks.
    pub diagnostics: bool,
    pub array_strategy: ArrayStrategy,
    /// Receives warnings instead of `tracing`. Not serialized.
    #[serde(skip)]
    pub warn_handler: Option<WarnHandler>,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ObserveError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_warn_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Warning) + Send + Sync + 'static,
    {
        self.warn_handler = Some(Arc::new(handler));
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            diagnostics: cfg!(debug_assertions),
            array_strategy: ArrayStrategy::default(),
            warn_handler: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("diagnostics", &self.diagnostics)
            .field("array_strategy", &self.array_strategy)
            .field("warn_handler", &self.warn_handler.is_some())
            .finish()
    }
}

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// The current thread's configuration.
pub fn current() -> Config {
    CONFIG.with(|cfg| cfg.borrow().clone())
}

/// Replace the current thread's configuration, returning the previous one.
pub fn set(config: Config) -> Config {
    CONFIG.with(|cfg| std::mem::replace(&mut *cfg.borrow_mut(), config))
}

/// Modify the current thread's configuration in place.
pub fn update(f: impl FnOnce(&mut Config)) {
    CONFIG.with(|cfg| f(&mut cfg.borrow_mut()));
}

pub(crate) fn diagnostics_enabled() -> bool {
    CONFIG.with(|cfg| cfg.borrow().diagnostics)
}

pub(crate) fn array_strategy() -> ArrayStrategy {
    CONFIG.with(|cfg| cfg.borrow().array_strategy)
}

/// Report a diagnostic, unless diagnostics are disabled.
pub(crate) fn warn(warning: Warning) {
    let (enabled, handler) = CONFIG.with(|cfg| {
        let cfg = cfg.borrow();
        (cfg.diagnostics, cfg.warn_handler.clone())
    });
    if !enabled {
        return;
    }
    match handler {
        Some(handler) => handler(&warning),
        None => tracing::warn!(target: "trellis::observer", "{warning}"),
    }
}
