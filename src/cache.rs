// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Composite type cache
//!
//! Maps a [`CompositionKey`] to the descriptor built for it. Entries are never
//! evicted: components are declared up front and the set of combinations in
//! use stays small.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::composite::{CompositeDescriptor, CompositionKey};

/// Thread-safe memo of composite descriptors
#[derive(Default)]
pub struct CompositeCache {
    entries: DashMap<CompositionKey, Arc<CompositeDescriptor>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CompositeCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the descriptor for `key`, building it with `build` on first use
    ///
    /// `build` runs at most once per key: concurrent first callers serialize
    /// on the entry and all observe the same descriptor.
    pub fn get_or_create<F>(&self, key: CompositionKey, build: F) -> Arc<CompositeDescriptor>
    where
        F: FnOnce() -> CompositeDescriptor,
    {
        // Fast path: already built
        if let Some(existing) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(&existing);
        }

        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let descriptor = Arc::new(build());
                log::debug!(
                    "built composite '{}' ({} components)",
                    descriptor.name(),
                    descriptor.key().len()
                );
                entry.insert(Arc::clone(&descriptor));
                descriptor
            }
        }
    }

    /// Look up a descriptor without building it
    pub fn get(&self, key: &CompositionKey) -> Option<Arc<CompositeDescriptor>> {
        self.entries.get(key).map(|entry| Arc::clone(&entry))
    }

    /// Number of cached descriptors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get statistics about cache usage
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached descriptor (for tests and tools)
    ///
    /// Subjects already carrying a cached descriptor keep it. The next
    /// assignment rebuilds the combination, and the new descriptor is not
    /// identical to the one those subjects hold. Do not call this while such
    /// subjects are live.
    pub fn clear(&self) {
        log::debug!("clearing composite cache ({} entries)", self.entries.len());
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Statistics about composite cache usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of distinct composites built
    pub entries: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that built a new composite
    pub misses: u64,
}

/// Process-wide composite cache
static GLOBAL_CACHE: Lazy<CompositeCache> = Lazy::new(CompositeCache::new);

/// Get the process-wide composite cache
pub fn global_cache() -> &'static CompositeCache {
    &GLOBAL_CACHE
}
