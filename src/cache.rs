//! Time-bounded frame cache.
//!
//! Every cached aggregate is keyed by `(operation, year, sorted pollutant
//! set)` and carries an expiry deadline picked from its tier. Expiry is
//! purely time-based: the backing dataset file is treated as immutable for
//! the process lifetime, so entries are never invalidated by writes and a
//! stale window up to the tier TTL is accepted.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use polars::prelude::DataFrame;
use tracing::debug;

use crate::error::AqError;

/// Cache tier, by how static the underlying data is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Reference data (world country table). Effectively process-lifetime.
    Static,
    /// The base dataset load.
    Base,
    /// Per `(year, pollutant-set)` derived frames.
    View,
}

/// Per-tier time-to-live configuration.
#[derive(Debug, Clone, Copy)]
pub struct TierTtls {
    pub static_data: Duration,
    pub base: Duration,
    pub view: Duration,
}

impl Default for TierTtls {
    fn default() -> Self {
        Self {
            static_data: Duration::from_secs(24 * 3600),
            base: Duration::from_secs(3600),
            view: Duration::from_secs(600),
        }
    }
}

impl TierTtls {
    fn ttl(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Static => self.static_data,
            Tier::Base => self.base,
            Tier::View => self.view,
        }
    }
}

/// Composite cache key.
///
/// The pollutant filter is stored sorted and deduplicated so equivalent
/// sets hit the same entry regardless of insertion order; an empty filter
/// is normalized to `None` ("no filter selected" and "empty explicit
/// filter" are the same state).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    op: &'static str,
    year: Option<i32>,
    pollutants: Option<Vec<String>>,
}

impl CacheKey {
    /// Key for an operation with no parameters.
    pub fn op(op: &'static str) -> Self {
        Self {
            op,
            year: None,
            pollutants: None,
        }
    }

    /// Key for an operation parameterized by year only.
    pub fn for_year(op: &'static str, year: i32) -> Self {
        Self {
            op,
            year: Some(year),
            pollutants: None,
        }
    }

    /// Key for an operation parameterized by year and pollutant filter.
    pub fn for_view(op: &'static str, year: i32, pollutants: Option<&[String]>) -> Self {
        let normalized = pollutants.and_then(|names| {
            if names.is_empty() {
                return None;
            }
            let mut sorted: Vec<String> = names.to_vec();
            sorted.sort();
            sorted.dedup();
            Some(sorted)
        });
        Self {
            op,
            year: Some(year),
            pollutants: normalized,
        }
    }
}

struct Entry {
    frame: DataFrame,
    deadline: Instant,
}

/// Mutex-protected frame cache shared across sessions.
///
/// The lock covers only the map lookups and inserts, never a build: builds
/// routinely re-enter the cache for their prerequisites (a view build pulls
/// the base frame through the same cache), and holding the lock across one
/// would self-deadlock. Concurrent misses on the same key may build twice;
/// the last insert wins, which is harmless for pure builders.
pub struct FrameCache {
    ttls: TierTtls,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(TierTtls::default())
    }
}

impl FrameCache {
    pub fn new(ttls: TierTtls) -> Self {
        Self {
            ttls,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached frame for `key` if its deadline has not passed,
    /// otherwise build, store, and return a fresh one. Build failures are
    /// propagated and nothing is stored.
    pub fn get_or_try_build<F>(
        &self,
        key: CacheKey,
        tier: Tier,
        build: F,
    ) -> Result<DataFrame, AqError>
    where
        F: FnOnce() -> Result<DataFrame, AqError>,
    {
        let now = Instant::now();
        {
            let entries = self.lock()?;
            if let Some(entry) = entries.get(&key) {
                if entry.deadline > now {
                    return Ok(entry.frame.clone());
                }
                debug!(op = key.op, "cache entry expired, rebuilding");
            }
        }

        // Built without the lock so the closure can pull its prerequisites
        // through this same cache.
        let frame = build()?;

        let mut entries = self.lock()?;
        entries.insert(
            key,
            Entry {
                frame: frame.clone(),
                deadline: now + self.ttls.ttl(tier),
            },
        );
        Ok(frame)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<CacheKey, Entry>>, AqError> {
        self.entries
            .lock()
            .map_err(|_| AqError::General("frame cache lock poisoned".to_string()))
    }

    /// Number of live and expired entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry regardless of deadline.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
