//! Query cache with group invalidation
//!
//! Server data is cached per query key. Keys belong to a `QueryGroup`, and
//! each group carries a generation counter. An entry remembers the
//! generation it was fetched under; once the group's generation moves past
//! it, the entry is stale and the next read refetches.
//!
//! Because a fetch records the generation at the moment it *starts*, a
//! read that was in flight when a mutation invalidated its group lands
//! already stale. Mutations therefore never leave fresh-looking data behind.
//!
//! `clear()` additionally bumps an epoch: results of fetches that started
//! before a clear are handed back to their caller but never stored.

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Logical grouping of cached queries, the unit of invalidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryGroup {
    Transactions,
    Analytics,
    Budgets,
    User,
    Receipts,
}

impl QueryGroup {
    pub const ALL: [QueryGroup; 5] = [
        Self::Transactions,
        Self::Analytics,
        Self::Budgets,
        Self::User,
        Self::Receipts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::Analytics => "analytics",
            Self::Budgets => "budgets",
            Self::User => "user",
            Self::Receipts => "receipts",
        }
    }
}

impl FromStr for QueryGroup {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transactions" => Ok(Self::Transactions),
            "analytics" => Ok(Self::Analytics),
            "budgets" => Ok(Self::Budgets),
            "user" => Ok(Self::User),
            "receipts" => Ok(Self::Receipts),
            _ => Err(format!("Unknown query group: {}", s)),
        }
    }
}

impl std::fmt::Display for QueryGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies one cached query: its group plus canonical parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub group: QueryGroup,
    pub params: String,
}

impl QueryKey {
    pub fn new(group: QueryGroup, params: impl Into<String>) -> Self {
        Self {
            group,
            params: params.into(),
        }
    }

    /// Key with no parameters
    pub fn group(group: QueryGroup) -> Self {
        Self::new(group, "")
    }

    /// Key from query pairs, joined `k=v&k=v` in the given order
    pub fn with_query(group: QueryGroup, query: &[(String, String)]) -> Self {
        let params = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        Self::new(group, params)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.group)
        } else {
            write!(f, "{}?{}", self.group, self.params)
        }
    }
}

/// Server-side writes and the query groups they make stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Login,
    Logout,
    CreateTransaction,
    DeleteTransaction,
    UpsertBudget,
    DeleteBudget,
    IngestReceipt,
}

impl Mutation {
    /// Groups to invalidate once the mutation's response is observed
    ///
    /// `Logout` lists every group; `QueryCache::invalidate_for` clears the
    /// whole cache for it instead.
    pub fn invalidates(&self) -> &'static [QueryGroup] {
        use QueryGroup::*;
        match self {
            Self::Login => &[User],
            Self::Logout => &QueryGroup::ALL,
            Self::CreateTransaction | Self::DeleteTransaction => &[Transactions, Analytics],
            Self::UpsertBudget | Self::DeleteBudget => &[Budgets, Analytics],
            Self::IngestReceipt => &[Transactions, Analytics, Receipts],
        }
    }
}

struct Entry {
    value: serde_json::Value,
    generation: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, Entry>,
    generations: HashMap<QueryGroup, u64>,
    invalidations: HashMap<QueryGroup, u64>,
    epoch: u64,
}

impl CacheState {
    fn generation(&self, group: QueryGroup) -> u64 {
        self.generations.get(&group).copied().unwrap_or(0)
    }

    fn is_fresh(&self, key: &QueryKey, entry: &Entry) -> bool {
        entry.generation >= self.generation(key.group)
    }
}

/// Read-through cache of backend query results
#[derive(Default)]
pub struct QueryCache {
    state: Mutex<CacheState>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("query cache lock poisoned")))
    }

    /// Return the cached value for `key` if fresh, otherwise run `fetcher`
    ///
    /// The lock is released while `fetcher` runs. Fetch errors are not
    /// cached.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (generation, epoch) = {
            let state = self.lock()?;
            if let Some(entry) = state.entries.get(&key) {
                if state.is_fresh(&key, entry) {
                    if let Ok(value) = serde_json::from_value(entry.value.clone()) {
                        debug!("Cache hit: {}", key);
                        return Ok(value);
                    }
                }
            }
            (state.generation(key.group), state.epoch)
        };

        debug!("Cache miss: {}", key);
        let value = fetcher().await?;

        let mut state = self.lock()?;
        if state.epoch == epoch {
            let stored = serde_json::to_value(&value)?;
            state.entries.insert(
                key,
                Entry {
                    value: stored,
                    generation,
                },
            );
        }
        Ok(value)
    }

    /// Mark every entry of `group` stale
    pub fn invalidate(&self, group: QueryGroup) {
        if let Ok(mut state) = self.state.lock() {
            *state.generations.entry(group).or_insert(0) += 1;
            *state.invalidations.entry(group).or_insert(0) += 1;
            debug!("Invalidated query group {}", group);
        }
    }

    /// Apply the invalidation table for a completed mutation
    pub fn invalidate_for(&self, mutation: Mutation) {
        if mutation == Mutation::Logout {
            self.clear();
            return;
        }
        for group in mutation.invalidates() {
            self.invalidate(*group);
        }
    }

    /// Drop every entry; in-flight fetches will not be stored
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.clear();
            state.epoch += 1;
            for group in QueryGroup::ALL {
                *state.generations.entry(group).or_insert(0) += 1;
            }
            debug!("Query cache cleared");
        }
    }

    /// `None` when nothing is cached for `key`
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        let state = self.state.lock().ok()?;
        let entry = state.entries.get(key)?;
        Some(!state.is_fresh(key, entry))
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.is_stale(key).is_some()
    }

    /// How many times `group` has been invalidated (clears not counted)
    pub fn invalidation_count(&self, group: QueryGroup) -> u64 {
        self.state
            .lock()
            .map(|s| s.invalidations.get(&group).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
