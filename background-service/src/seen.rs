use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::fmt;

/// Bounded set of post ids already handled by this process.
///
/// Backed by an LRU [`moka`] cache, so the least recently inserted ids are
/// evicted once `capacity` is reached. A capacity of zero disables tracking.
#[derive(Clone)]
pub struct SeenPosts {
    capacity: u64,
    ids: Option<Cache<String, ()>>,
}

impl SeenPosts {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity as u64;
        let ids = (capacity > 0).then(|| {
            Cache::builder()
                .max_capacity(capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build()
        });
        Self { capacity, ids }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.ids.is_some()
    }

    pub fn contains(&self, post_id: &str) -> bool {
        self.ids
            .as_ref()
            .is_some_and(|ids| ids.contains_key(post_id))
    }

    /// Records `post_id` as most recent. Returns false if it was already present.
    pub fn insert(&mut self, post_id: &str) -> bool {
        let Some(ids) = &self.ids else {
            return false;
        };
        let is_new = !ids.contains_key(post_id);
        ids.insert(post_id.to_string(), ());
        is_new
    }

    /// Number of remembered ids once pending evictions have been applied.
    pub fn len(&self) -> usize {
        match &self.ids {
            Some(ids) => {
                ids.run_pending_tasks();
                ids.entry_count() as usize
            }
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SeenPosts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeenPosts")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
