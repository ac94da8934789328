use std::path::Path;

use tracing::debug;

use super::{CacheDuration, FileCache};
use crate::error::{PluginError, PluginResult};
use crate::plugin::model::AvailableHookResultItem;

/// Store file under the plugin directory
pub const CACHE_FILE: &str = ".available.cache";

const KEY_SEPARATOR: &str = "##";
const EMPTY_KEY: &str = "empty";

/// Memoizes the `Available` hook per argument list
pub struct AvailabilityCache {
    duration: CacheDuration,
    store: Option<FileCache>,
}

impl AvailabilityCache {
    /// A cache whose store could not be opened behaves as disabled
    pub fn new(plugin_dir: &Path, duration: CacheDuration) -> Self {
        let store = if duration.is_disabled() {
            None
        } else {
            match FileCache::open(plugin_dir.join(CACHE_FILE)) {
                Ok(store) => Some(store),
                Err(e) => {
                    debug!(dir = %plugin_dir.display(), error = %e, "availability cache unavailable");
                    None
                }
            }
        };
        Self { duration, store }
    }

    pub fn duration(&self) -> CacheDuration {
        self.duration
    }

    pub fn key(args: &[String]) -> String {
        if args.is_empty() {
            EMPTY_KEY.to_string()
        } else {
            args.join(KEY_SEPARATOR)
        }
    }

    /// Serve `args` from the store, or run `invoke` and record its outcome
    ///
    /// Both a list and the no-result sentinel are recorded; other errors are not.
    pub fn get_or_invoke<F>(&self, args: &[String], invoke: F) -> PluginResult<Vec<AvailableHookResultItem>>
    where
        F: FnOnce() -> PluginResult<Vec<AvailableHookResultItem>>,
    {
        let Some(store) = &self.store else {
            return invoke();
        };

        let key = Self::key(args);
        if let Some(bytes) = store.get(&key) {
            match serde_json::from_slice::<Option<Vec<AvailableHookResultItem>>>(&bytes) {
                Ok(Some(items)) => {
                    debug!(%key, count = items.len(), "availability cache hit");
                    return Ok(items);
                }
                Ok(None) => {
                    debug!(%key, "availability cache hit, no result");
                    return Err(PluginError::NoResultProvided);
                }
                Err(e) => debug!(%key, error = %e, "discarding unreadable cache entry"),
            }
        }
        debug!(%key, "availability cache miss");

        let outcome = invoke();
        let recorded = match &outcome {
            Ok(items) => Some(serde_json::to_vec(&Some(items))),
            Err(e) if e.is_no_result() => {
                Some(serde_json::to_vec(&None::<&Vec<AvailableHookResultItem>>))
            }
            Err(_) => None,
        };
        match recorded {
            Some(Ok(bytes)) => store.set(key, bytes, self.duration.expire_time()),
            Some(Err(e)) => debug!(%key, error = %e, "failed to encode availability result"),
            None => {}
        }
        outcome
    }

    /// Persist the store
    pub fn close(self) {
        if let Some(store) = self.store {
            let path = store.path().to_path_buf();
            if let Err(e) = store.close() {
                debug!(path = %path.display(), error = %e, "failed to write availability cache");
            }
        }
    }
}
