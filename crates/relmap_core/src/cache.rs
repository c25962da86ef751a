//! Optional shared object cache.
//!
//! A read-through row-image cache layered beneath the per-transaction
//! identity maps. The cache is deliberately decoupled from the identity
//! map: embeddings may omit it entirely (thread-local, no-shared-cache
//! configurations) without changing any core algorithm. Entries are
//! invalidated when a transaction that wrote them commits.

use crate::identity::Identity;
use parking_lot::RwLock;
use relmap_store::RowImage;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

const SHARD_COUNT: usize = 16;

/// Shared read-through cache of committed row images.
///
/// Sharded by identity hash so concurrent transactions reading unrelated
/// identities do not serialize on one lock.
#[derive(Debug)]
pub struct ObjectCache {
    shards: Vec<RwLock<HashMap<Identity, RowImage>>>,
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, identity: &Identity) -> &RwLock<HashMap<Identity, RowImage>> {
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Returns the cached image of an identity, if present.
    #[must_use]
    pub fn get(&self, identity: &Identity) -> Option<RowImage> {
        self.shard(identity).read().get(identity).cloned()
    }

    /// Inserts or replaces the cached image of an identity.
    pub fn put(&self, identity: Identity, image: RowImage) {
        self.shard(&identity).write().insert(identity, image);
    }

    /// Removes an identity from the cache.
    pub fn invalidate(&self, identity: &Identity) {
        self.shard(identity).write().remove(identity);
    }

    /// Removes every entry.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
    }

    /// Returns the number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
