//! Bounded cache of compiled templates keyed by canonical file path.

use super::CompiledTemplate;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Nominal number of compiled templates kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// LRU cache shared by concurrent renders.
///
/// Lookups and inserts take the lock briefly; compilation happens outside of
/// it, so two renders racing on the same path may both compile and the last
/// insert wins.
pub struct TemplateCache {
    entries: Mutex<LruCache<PathBuf, Arc<CompiledTemplate>>>,
}

impl TemplateCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(&self, path: &Path) -> Option<Arc<CompiledTemplate>> {
        self.entries.lock().await.get(path).cloned()
    }

    pub async fn insert(&self, path: PathBuf, template: Arc<CompiledTemplate>) {
        self.entries.lock().await.put(path, template);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, path: &Path) -> bool {
        self.entries.lock().await.contains(path)
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Component;

    fn compiled(source: &str) -> Arc<CompiledTemplate> {
        Arc::new(CompiledTemplate::compile(source, Component::Text).unwrap())
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let cache = TemplateCache::new(2);
        cache.insert(PathBuf::from("/t/a.hbs"), compiled("a")).await;
        cache.insert(PathBuf::from("/t/b.hbs"), compiled("b")).await;

        // touch `a` so `b` becomes the eviction candidate
        assert!(cache.get(Path::new("/t/a.hbs")).await.is_some());
        cache.insert(PathBuf::from("/t/c.hbs"), compiled("c")).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.contains(Path::new("/t/a.hbs")).await);
        assert!(!cache.contains(Path::new("/t/b.hbs")).await);
        assert!(cache.contains(Path::new("/t/c.hbs")).await);
    }

    #[tokio::test]
    async fn test_last_insert_wins() {
        let cache = TemplateCache::default();
        let path = PathBuf::from("/t/same.hbs");
        cache.insert(path.clone(), compiled("first")).await;
        cache.insert(path.clone(), compiled("second")).await;

        let hit = cache.get(&path).await.unwrap();
        assert_eq!(hit.render(&serde_json::json!({})).unwrap(), "second");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_zero_capacity_still_holds_one_entry() {
        let cache = TemplateCache::new(0);
        cache.insert(PathBuf::from("/t/a.hbs"), compiled("a")).await;
        assert!(!cache.is_empty().await);
    }
}
