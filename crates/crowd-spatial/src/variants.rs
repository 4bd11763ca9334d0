//! Cache of alternate routes keyed by quantized endpoints.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crowd_core::GeoPoint;

use crate::route::Route;

/// `(origin, destination, k)` with both coordinates quantized to 1e-5°, so
/// nearby requests share one entry and the cache cannot grow per float.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub origin:      (i64, i64),
    pub destination: (i64, i64),
    pub k:           usize,
}

impl VariantKey {
    pub fn new(origin: GeoPoint, destination: GeoPoint, k: usize) -> Self {
        Self {
            origin:      origin.quantized(),
            destination: destination.quantized(),
            k,
        }
    }
}

/// Thread-safe variant store.  Only non-empty results are cached, so a
/// failed computation is retried on the next request.
#[derive(Default)]
pub struct VariantCache {
    inner: Mutex<FxHashMap<VariantKey, Arc<[Route]>>>,
}

impl VariantCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &VariantKey) -> Option<Arc<[Route]>> {
        self.lock().get(key).cloned()
    }

    /// Store `variants` unless another caller won the race; returns the
    /// entry that ends up cached.
    pub fn insert(&self, key: VariantKey, variants: Vec<Route>) -> Arc<[Route]> {
        let variants: Arc<[Route]> = variants.into();
        self.lock().entry(key).or_insert(variants).clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FxHashMap<VariantKey, Arc<[Route]>>> {
        // A poisoned cache still holds valid entries.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
