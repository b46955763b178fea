//! Memoization of generated images.
//!
//! The cache keys on the node itself (hashed by its structural hash, verified
//! by structural equality) and on the size-affecting part of the options.
//! Package identity is not part of the key, so one cache serves one package
//! context; call [`GenerationCache::invalidate_all`] when packages change.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use image::RgbaImage;

use crate::error::GenerateResult;
use crate::node::GeneratedImageRef;
use crate::options::{Options, PreserveAspect};

// ============================================================================
// CacheKey
// ============================================================================

/// The options that change the pixels a node produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    width: u32,
    height: u32,
    preserve_aspect: PreserveAspect,
    saturate: bool,
}

impl CacheKey {
    pub fn new(width: u32, height: u32, preserve_aspect: PreserveAspect, saturate: bool) -> Self {
        Self {
            width,
            height,
            preserve_aspect,
            saturate,
        }
    }

    pub fn from_options(opt: &Options) -> Self {
        Self::new(opt.width, opt.height, opt.preserve_aspect, opt.saturate)
    }
}

// ============================================================================
// GenerationCache
// ============================================================================

type EntryKey = (GeneratedImageRef, CacheKey);

#[derive(Default)]
struct Entries {
    map: HashMap<EntryKey, RgbaImage>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<EntryKey>,
}

/// Thread-safe cache of generated rasters.
///
/// Generation runs outside the lock, so two threads missing on the same key
/// may both generate; the later insert wins and both results are identical.
///
/// By default the cache is unbounded and keeps one raster per distinct tree
/// and size until [`invalidate_all`](Self::invalidate_all). Use
/// [`with_capacity`](Self::with_capacity) to evict the oldest entries instead.
#[derive(Default)]
pub struct GenerationCache {
    entries: Mutex<Entries>,
    capacity: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl GenerationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache holding at most `capacity` rasters.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Maximum number of entries, if bounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Returns the cached raster for `node`, or generates and stores it.
    pub fn get_or_generate(
        &self,
        node: &GeneratedImageRef,
        opt: &Options,
    ) -> GenerateResult<RgbaImage> {
        if let Some(img) = self.get(node, opt) {
            return Ok(img);
        }
        let img = node.generate(opt)?;
        self.insert(node, opt, img.clone());
        Ok(img)
    }

    /// Looks up a cached raster, counting the hit or miss.
    pub fn get(&self, node: &GeneratedImageRef, opt: &Options) -> Option<RgbaImage> {
        let key = (GeneratedImageRef::clone(node), CacheKey::from_options(opt));
        let found = self.lock().map.get(&key).cloned();
        match found {
            Some(img) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(hash = node.structural_hash(), "cache hit");
                Some(img)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(hash = node.structural_hash(), "cache miss");
                None
            }
        }
    }

    /// Stores a raster, evicting the oldest entries past the capacity.
    pub fn insert(&self, node: &GeneratedImageRef, opt: &Options, image: RgbaImage) {
        if self.capacity == Some(0) {
            return;
        }
        let key = (GeneratedImageRef::clone(node), CacheKey::from_options(opt));
        let mut entries = self.lock();
        if entries.map.insert(key.clone(), image).is_none() {
            entries.order.push_back(key);
        }

        let Some(capacity) = self.capacity else {
            return;
        };
        while entries.map.len() > capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
            tracing::trace!(hash = oldest.0.structural_hash(), "cache evict");
        }
    }

    /// Drops every entry. Counters are kept.
    pub fn invalidate_all(&self) {
        let mut entries = self.lock();
        if !entries.map.is_empty() {
            tracing::debug!(entries = entries.map.len(), "invalidating generation cache");
        }
        entries.map.clear();
        entries.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for GenerationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}
