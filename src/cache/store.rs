//! Cache storage.
//!
//! Two stores share one design: a `RwLock`-guarded map per namespace, lookups
//! that clone cheaply, and add-only mutation. A populated entry is never
//! replaced; the only in-place update allowed is attaching a derived
//! representation that was not computed on first write.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;

use crate::application::render::CompiledTemplate;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

// ============================================================================
// File store: raw and compressed bytes per path
// ============================================================================

/// One cached file. `compressed` is derived lazily from `raw` on the first
/// request that asks for it.
#[derive(Clone)]
struct FileEntry {
    raw: Bytes,
    compressed: Option<Bytes>,
}

/// Byte cache keyed by the path string exactly as the caller supplied it.
///
/// Keys are not canonicalized: two spellings of the same file are two
/// entries. The entry for a key lives until process exit.
#[derive(Default)]
pub struct FileStore {
    entries: RwLock<HashMap<String, FileEntry>>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached raw bytes, if present.
    pub fn raw(&self, key: &str) -> Option<Bytes> {
        rw_read(&self.entries, SOURCE, "file.raw")
            .get(key)
            .map(|entry| entry.raw.clone())
    }

    /// Cached compressed bytes, if that representation has been derived.
    pub fn compressed(&self, key: &str) -> Option<Bytes> {
        rw_read(&self.entries, SOURCE, "file.compressed")
            .get(key)
            .and_then(|entry| entry.compressed.clone())
    }

    /// Whether any entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        rw_read(&self.entries, SOURCE, "file.contains").contains_key(key)
    }

    /// Store a freshly computed entry. First write wins: an existing `raw`
    /// representation is immutable, so a concurrent loser's insert only
    /// fills in a compressed representation the winner did not produce.
    pub fn insert(&self, key: &str, raw: Bytes, compressed: Option<Bytes>) {
        let mut entries = rw_write(&self.entries, SOURCE, "file.insert");
        match entries.get_mut(key) {
            Some(existing) => {
                if existing.compressed.is_none() {
                    existing.compressed = compressed;
                }
            }
            None => {
                entries.insert(key.to_string(), FileEntry { raw, compressed });
            }
        }
    }

    /// Attach the compressed representation to an already-cached entry.
    /// A no-op when the entry is absent or already holds one.
    pub fn attach_compressed(&self, key: &str, compressed: Bytes) {
        let mut entries = rw_write(&self.entries, SOURCE, "file.attach_compressed");
        if let Some(entry) = entries.get_mut(key)
            && entry.compressed.is_none()
        {
            entry.compressed = Some(compressed);
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "file.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Template store: first-pass output and second-pass compiled pages
// ============================================================================

/// Rendered-output cache keyed by resource identity (logical name with the
/// default extension applied).
///
/// The two passes get separate namespaces on purpose: a rendered markup
/// string and a compiled page for the same name coexist instead of
/// overwriting one another.
#[derive(Default)]
pub struct TemplateStore {
    markup: RwLock<HashMap<String, String>>,
    pages: RwLock<HashMap<String, Arc<dyn CompiledTemplate>>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markup(&self, key: &str) -> Option<String> {
        rw_read(&self.markup, SOURCE, "template.markup")
            .get(key)
            .cloned()
    }

    /// Store first-pass output. First write wins.
    pub fn insert_markup(&self, key: &str, html: String) {
        rw_write(&self.markup, SOURCE, "template.insert_markup")
            .entry(key.to_string())
            .or_insert(html);
    }

    pub fn page(&self, key: &str) -> Option<Arc<dyn CompiledTemplate>> {
        rw_read(&self.pages, SOURCE, "template.page")
            .get(key)
            .cloned()
    }

    /// Store a compiled second-pass page. First write wins.
    pub fn insert_page(&self, key: &str, page: Arc<dyn CompiledTemplate>) {
        rw_write(&self.pages, SOURCE, "template.insert_page")
            .entry(key.to_string())
            .or_insert(page);
    }
}
