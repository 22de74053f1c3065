//! Mapped-file cache for static content.
//!
//! Files below the configured size cap are memory-mapped once and shared
//! read-only across connections. Entries are keyed by path and invalidated
//! when the file's modification time no longer matches the caller's
//! expectation. Capacity eviction only ever reclaims entries that no
//! connection currently references.

use memmap2::Mmap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

const MIME_TEXTHTML: &str = "text/html";

/// One memory-mapped file. Shared between the cache table and any
/// connections currently streaming it; the mapping lives until the last
/// holder drops it, even if the table entry is invalidated meanwhile.
pub struct MapEntry {
    path: PathBuf,
    mtime: SystemTime,
    mime: String,
    map: Mmap,
}

impl MapEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn len(&self) -> u64 {
        self.map.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }
}

struct Slot {
    entry: Arc<MapEntry>,
    refs: usize,
}

#[derive(Default)]
struct CacheInner {
    table: HashMap<PathBuf, Slot>,
    /// Paths whose refcount reached zero, newest first. Eviction consumes
    /// from the head.
    unref: Vec<PathBuf>,
}

pub struct MapCache {
    max_entries: usize,
    max_file_size: u64,
    inner: Mutex<CacheInner>,
}

/// A live reference into the cache. Dropping it releases the entry; once
/// no references remain the entry becomes reclaimable.
pub struct MapRef {
    cache: Arc<MapCache>,
    entry: Arc<MapEntry>,
}

impl MapRef {
    pub fn mime(&self) -> &str {
        self.entry.mime()
    }

    pub fn bytes(&self) -> &[u8] {
        self.entry.bytes()
    }

    pub fn len(&self) -> u64 {
        self.entry.len()
    }
}

impl Drop for MapRef {
    fn drop(&mut self) {
        self.cache.release(&self.entry);
    }
}

impl MapCache {
    /// Zero for either limit means unlimited, as in the config format.
    pub fn new(max_entries: usize, max_file_size: u64) -> Self {
        Self {
            max_entries,
            max_file_size,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Looks up or creates the mapping for `path`.
    ///
    /// Fails when the file cannot be statted or mapped, when it is at or
    /// above the per-file size cap, when the cache is full and nothing is
    /// reclaimable, or when the cached modification time disagrees with
    /// `mtime` (the entry is dropped from the table in that case so the
    /// caller re-serves the file by streaming it).
    pub fn find(self: &Arc<Self>, path: &Path, mtime: SystemTime) -> Option<MapRef> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if !inner.table.contains_key(path) {
            let meta = std::fs::metadata(path).ok()?;

            if self.max_file_size != 0 && meta.len() >= self.max_file_size {
                return None;
            }

            if self.max_entries != 0 && inner.table.len() >= self.max_entries {
                if inner.unref.is_empty() {
                    return None;
                }
                let victim = inner.unref.remove(0);
                inner.table.remove(&victim);
            }

            let file = std::fs::File::open(path).ok()?;
            let map = unsafe { Mmap::map(&file) }.ok()?;

            let entry = Arc::new(MapEntry {
                path: path.to_owned(),
                mtime: meta.modified().ok()?,
                mime: guess_mime(path),
                map,
            });

            inner.table.insert(path.to_owned(), Slot { entry, refs: 0 });
        }

        let stale = match inner.table.get(path) {
            Some(slot) => slot.entry.mtime != mtime,
            None => return None,
        };

        if stale {
            inner.unref.retain(|p| p.as_path() != path);
            inner.table.remove(path);
            return None;
        }

        let slot = inner.table.get_mut(path)?;
        slot.refs += 1;
        let entry = slot.entry.clone();
        inner.unref.retain(|p| p.as_path() != path);

        Some(MapRef {
            cache: self.clone(),
            entry,
        })
    }

    fn release(&self, entry: &Arc<MapEntry>) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        // The table entry may have been invalidated (and even replaced)
        // while this reference was alive; only the slot it came from is
        // accounted.
        let Some(slot) = inner.table.get_mut(entry.path()) else {
            return;
        };
        if !Arc::ptr_eq(&slot.entry, entry) {
            return;
        }

        slot.refs = slot.refs.saturating_sub(1);

        if slot.refs == 0 && !inner.unref.iter().any(|p| p.as_path() == entry.path()) {
            inner.unref.insert(0, entry.path().to_owned());
        }
    }

    /// Number of cached mappings.
    pub fn len(&self) -> usize {
        self.inner.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refcount of a cached path, if present.
    pub fn ref_count(&self, path: &Path) -> Option<usize> {
        self.inner.lock().table.get(path).map(|s| s.refs)
    }
}

/// Short suffix table first, generic guesser second, text/html as the
/// last resort.
fn guess_mime(path: &Path) -> String {
    let name = path.to_string_lossy();

    let mime = if name.ends_with(".html") || name.ends_with(".htm") {
        MIME_TEXTHTML
    } else if name.ends_with(".css") {
        "text/css"
    } else if name.ends_with(".png") {
        "image/png"
    } else if name.ends_with(".js") {
        "application/javascript"
    } else {
        mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(MIME_TEXTHTML)
    };

    mime.to_string()
}
