//! Caching
//!
//! [`FileCache`] is a process-local key/value store guarded by a read/write
//! lock and snapshotted to a single bincode file. [`AvailabilityCache`]
//! memoizes the `Available` hook on top of it.

mod available;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use available::{AvailabilityCache, CACHE_FILE};

/// Expiry marker of an item that never expires
pub const NEVER_EXPIRE: i64 = -1;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Durations
// ─────────────────────────────────────────────────────────────────────────────

/// Caching policy of a cached hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDuration {
    /// `0`: never cache
    Disabled,
    /// `-1`: cache forever
    NeverExpire,
    Ttl(Duration),
}

impl Default for CacheDuration {
    fn default() -> Self {
        CacheDuration::Ttl(Duration::from_secs(12 * 60 * 60))
    }
}

impl CacheDuration {
    /// Integer form: `0`, negative, or nanoseconds
    pub fn from_nanos(nanos: i64) -> Self {
        match nanos {
            0 => CacheDuration::Disabled,
            n if n < 0 => CacheDuration::NeverExpire,
            n => CacheDuration::Ttl(Duration::from_nanos(n as u64)),
        }
    }

    pub fn is_disabled(self) -> bool {
        self == CacheDuration::Disabled
    }

    pub fn expire_time(self) -> ExpireTime {
        match self {
            CacheDuration::Ttl(ttl) => ExpireTime::After(ttl),
            CacheDuration::NeverExpire => ExpireTime::Never,
            CacheDuration::Disabled => ExpireTime::After(Duration::ZERO),
        }
    }
}

impl FromStr for CacheDuration {
    type Err = humantime::DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(CacheDuration::Disabled),
            "-1" => Ok(CacheDuration::NeverExpire),
            text => humantime::parse_duration(text).map(|ttl| {
                if ttl.is_zero() {
                    CacheDuration::Disabled
                } else {
                    CacheDuration::Ttl(ttl)
                }
            }),
        }
    }
}

impl fmt::Display for CacheDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheDuration::Disabled => f.write_str("0"),
            CacheDuration::NeverExpire => f.write_str("-1"),
            CacheDuration::Ttl(ttl) => write!(f, "{}", humantime::format_duration(*ttl)),
        }
    }
}

impl Serialize for CacheDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CacheDuration::Disabled => serializer.serialize_i64(0),
            CacheDuration::NeverExpire => serializer.serialize_i64(NEVER_EXPIRE),
            CacheDuration::Ttl(_) => serializer.collect_str(self),
        }
    }
}

impl<'de> Deserialize<'de> for CacheDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Nanos(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Nanos(nanos) => Ok(CacheDuration::from_nanos(nanos)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// When a stored item stops being served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireTime {
    Never,
    After(Duration),
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// File Cache
// ─────────────────────────────────────────────────────────────────────────────

/// One stored value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheItem {
    pub value: Vec<u8>,
    /// Unix nanoseconds, or [`NEVER_EXPIRE`]
    pub expire: i64,
}

impl CacheItem {
    fn is_expired(&self, now: i64) -> bool {
        self.expire != NEVER_EXPIRE && now > self.expire
    }
}

/// Key/value store snapshotted to one file
///
/// Concurrent processes writing the same file race; the last writer wins.
pub struct FileCache {
    path: PathBuf,
    items: RwLock<HashMap<String, CacheItem>>,
}

impl FileCache {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let items = match fs::read(&path) {
            Ok(bytes) => bincode::deserialize(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            items: RwLock::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored value, unless absent or expired (expired items are removed)
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = now_nanos();
        {
            let items = self.items.read();
            match items.get(key) {
                None => return None,
                Some(item) if !item.is_expired(now) => return Some(item.value.clone()),
                Some(_) => {}
            }
        }

        let mut items = self.items.write();
        if items.get(key).is_some_and(|item| item.is_expired(now)) {
            items.remove(key);
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, value: Vec<u8>, expire: ExpireTime) {
        let expire = match expire {
            ExpireTime::Never => NEVER_EXPIRE,
            ExpireTime::After(ttl) => {
                let ttl = i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX);
                now_nanos().saturating_add(ttl)
            }
        };
        self.items
            .write()
            .insert(key.into(), CacheItem { value, expire });
    }

    pub fn remove(&self, key: &str) {
        self.items.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the current snapshot to disk
    pub fn flush(&self) -> Result<(), CacheError> {
        let items = self.items.write();
        let bytes = bincode::serialize(&*items)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    pub fn close(self) -> Result<(), CacheError> {
        self.flush()
    }
}
