//! Directory-entry cache.
//!
//! Maps `(parent, name)` to the identifier of the object the name resolved to.
//! Path lookups populate it, enumeration does not, and removal or rename
//! invalidates the affected names. The cache is bounded, so a name can drop out
//! of it at any time; callers must treat a miss as "unknown", never as "absent".

use moka::sync::Cache;

use super::inode::Ino;

/// Default number of cached names.
pub const DEFAULT_DCACHE_CAPACITY: u64 = 16_384;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DentryKey {
    parent: Ino,
    name: String,
}

impl DentryKey {
    fn new(parent: Ino, name: &str) -> Self {
        Self {
            parent,
            name: name.to_owned(),
        }
    }
}

/// Bounded, thread-safe name cache backed by Moka.
///
/// Cloning is cheap and yields a handle to the same cache.
#[derive(Clone)]
pub struct DentryCache {
    entries: Cache<DentryKey, Ino>,
}

impl DentryCache {
    /// Creates a cache holding at most `capacity` names.
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::new(capacity),
        }
    }

    /// Records that `name` in `parent` resolves to `ino`.
    pub fn insert(&self, parent: Ino, name: &str, ino: Ino) {
        self.entries.insert(DentryKey::new(parent, name), ino);
    }

    /// Looks up `name` in `parent`.
    pub fn lookup(&self, parent: Ino, name: &str) -> Option<Ino> {
        self.entries.get(&DentryKey::new(parent, name))
    }

    /// Forgets `name` in `parent`.
    pub fn invalidate(&self, parent: Ino, name: &str) {
        self.entries.invalidate(&DentryKey::new(parent, name));
    }

    /// Forgets every cached name.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }
}

impl Default for DentryCache {
    fn default() -> Self {
        Self::new(DEFAULT_DCACHE_CAPACITY)
    }
}

impl std::fmt::Debug for DentryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DentryCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let cache = DentryCache::default();
        cache.insert(1, "secret.txt", 42);

        assert_eq!(cache.lookup(1, "secret.txt"), Some(42));
        assert_eq!(cache.lookup(2, "secret.txt"), None);
        assert_eq!(cache.lookup(1, "other.txt"), None);
    }

    #[test]
    fn test_invalidate_single_name() {
        let cache = DentryCache::default();
        cache.insert(1, "a", 10);
        cache.insert(1, "b", 11);

        cache.invalidate(1, "a");

        assert_eq!(cache.lookup(1, "a"), None);
        assert_eq!(cache.lookup(1, "b"), Some(11));
    }

    #[test]
    fn test_invalidate_all() {
        let cache = DentryCache::default();
        cache.insert(1, "a", 10);
        cache.insert(3, "b", 11);

        cache.invalidate_all();

        assert_eq!(cache.lookup(1, "a"), None);
        assert_eq!(cache.lookup(3, "b"), None);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = DentryCache::default();
        let handle = cache.clone();
        cache.insert(1, "shared", 5);
        assert_eq!(handle.lookup(1, "shared"), Some(5));
    }

    #[test]
    fn test_reinsert_overwrites() {
        let cache = DentryCache::default();
        cache.insert(1, "name", 5);
        cache.insert(1, "name", 9);
        assert_eq!(cache.lookup(1, "name"), Some(9));
    }
}
