pub mod migration;

use crate::entry::JournalEntry;
use chrono::{DateTime, TimeZone};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read saved entries: {0}")]
    Read(String),
    #[error("Saved entries could not be parsed: {0}")]
    Parse(String),
    #[error("Saved entries use schema version {0}, which this build does not understand")]
    UnsupportedVersion(u64),
    #[error("Failed to save entries: {0}")]
    Write(String),
    #[error("An entry with id {0} already exists")]
    DuplicateId(String),
}

/// Single named slot holding the whole serialized history.
pub trait BlobStore: Send {
    fn get(&self) -> io::Result<Option<String>>;
    fn set(&mut self, blob: &str) -> io::Result<()>;
    fn remove(&mut self) -> io::Result<()>;
}

/// Slot backed by one JSON file. Writes go to a sibling temp file first and
/// are renamed into place so a reader never sees a half-written history.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    path: PathBuf,
}

impl FileBlobStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&mut self, blob: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let temp = self.temp_path();
        std::fs::write(&temp, blob)?;
        std::fs::rename(&temp, &self.path)
    }

    fn remove(&mut self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// In-process slot. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: &str) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(blob.to_string()))),
        }
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.slot
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "blob slot lock poisoned"))
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self) -> io::Result<Option<String>> {
        Ok(self.lock()?.clone())
    }

    fn set(&mut self, blob: &str) -> io::Result<()> {
        *self.lock()? = Some(blob.to_string());
        Ok(())
    }

    fn remove(&mut self) -> io::Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreSummary {
    pub total: usize,
    pub concerning: usize,
    pub by_sentiment: BTreeMap<String, usize>,
}

/// Ordered, newest-first history of committed entries.
pub struct EntryStore {
    port: Box<dyn BlobStore>,
    entries: Vec<JournalEntry>,
    load_warnings: Vec<String>,
}

impl EntryStore {
    pub fn new(port: Box<dyn BlobStore>) -> Self {
        Self {
            port,
            entries: Vec::new(),
            load_warnings: Vec::new(),
        }
    }

    /// Create a store and load whatever history the slot holds.
    pub fn open(port: Box<dyn BlobStore>) -> Self {
        let mut store = Self::new(port);
        store.load();
        store
    }

    /// Replace the in-memory history with the persisted one.
    ///
    /// Never fails: an absent, unreadable or unparseable blob yields an empty
    /// history, and the problem is kept in [`EntryStore::load_warnings`].
    pub fn load(&mut self) -> &[JournalEntry] {
        self.load_warnings.clear();
        self.entries = match self.port.get() {
            Ok(Some(blob)) => match migration::decode(&blob) {
                Ok(decoded) => {
                    for reason in decoded.dropped {
                        log::warn!("Skipped saved entry: {reason}");
                        self.load_warnings.push(reason);
                    }
                    decoded.entries
                }
                Err(e) => {
                    log::warn!("{e}; starting with an empty history");
                    self.load_warnings.push(e.to_string());
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                let e = StoreError::Read(e.to_string());
                log::warn!("{e}; starting with an empty history");
                self.load_warnings.push(e.to_string());
                Vec::new()
            }
        };
        log::debug!("Loaded {} journal entries", self.entries.len());
        &self.entries
    }

    pub fn load_warnings(&self) -> &[String] {
        &self.load_warnings
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&JournalEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Time-derived id that sorts after, and differs from, every id held.
    pub fn next_id<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> String {
        let mut candidate = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        if let Some(max) = self
            .entries
            .iter()
            .filter_map(|e| e.id.parse::<u64>().ok())
            .max()
        {
            if candidate <= max {
                candidate = max.saturating_add(1);
            }
        }
        while self.get(&candidate.to_string()).is_some() {
            candidate = candidate.saturating_add(1);
        }
        candidate.to_string()
    }

    /// Prepend `entry` and persist the whole history in one write.
    ///
    /// A write failure is returned as [`StoreError::Write`], but the entry
    /// stays in the in-memory history so the session can keep going.
    pub fn commit(&mut self, entry: JournalEntry) -> Result<&[JournalEntry], StoreError> {
        if self.get(&entry.id).is_some() {
            return Err(StoreError::DuplicateId(entry.id));
        }

        let id = entry.id.clone();
        self.entries.insert(0, entry);
        self.persist()?;
        log::info!(
            "Committed journal entry {id} ({} entries total)",
            self.entries.len()
        );
        Ok(&self.entries)
    }

    /// Drop every entry and erase the persisted slot. Irreversible; callers
    /// confirm intent first.
    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        self.port
            .remove()
            .map_err(|e| StoreError::Write(e.to_string()))?;
        let cleared = self.entries.len();
        self.entries.clear();
        log::info!("Cleared {cleared} journal entries");
        Ok(())
    }

    pub fn summary(&self) -> StoreSummary {
        let mut summary = StoreSummary {
            total: self.entries.len(),
            ..Default::default()
        };
        for entry in &self.entries {
            if entry.is_concerning {
                summary.concerning += 1;
            }
            let label = entry
                .sentiment
                .as_deref()
                .map(str::to_lowercase)
                .unwrap_or_else(|| "unset".to_string());
            *summary.by_sentiment.entry(label).or_insert(0) += 1;
        }
        summary
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let blob = migration::encode(&self.entries).map_err(|e| StoreError::Write(e.to_string()))?;
        self.port.set(&blob).map_err(|e| {
            log::error!("Failed to persist journal entries: {e}");
            StoreError::Write(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{IconKey, SuggestedAction, MISSING_RESPONSE};
    use chrono::Utc;

    fn entry(id: &str, content: &str, concerning: bool) -> JournalEntry {
        JournalEntry {
            id: id.to_string(),
            content: content.to_string(),
            created_at: "Saturday, October 18, 2026".to_string(),
            sentiment: Some("neutral".to_string()),
            is_concerning: concerning,
            ai_response: "Thanks for sharing".to_string(),
            suggestions: vec![SuggestedAction::new("Breathe", "Slowly", IconKey::Meditate)],
        }
    }

    struct ReadOnlyBlobStore;

    impl BlobStore for ReadOnlyBlobStore {
        fn get(&self) -> io::Result<Option<String>> {
            Ok(None)
        }

        fn set(&mut self, _blob: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "quota exceeded"))
        }

        fn remove(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct LockedBlobStore(MemoryBlobStore);

    impl BlobStore for LockedBlobStore {
        fn get(&self) -> io::Result<Option<String>> {
            self.0.get()
        }

        fn set(&mut self, blob: &str) -> io::Result<()> {
            self.0.set(blob)
        }

        fn remove(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
        }
    }

    struct UnreadableBlobStore;

    impl BlobStore for UnreadableBlobStore {
        fn get(&self) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }

        fn set(&mut self, _blob: &str) -> io::Result<()> {
            Ok(())
        }

        fn remove(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_commit_then_load_round_trip() {
        let slot = MemoryBlobStore::new();
        let mut store = EntryStore::open(Box::new(slot.clone()));
        let e = entry("100", "First", true);
        store.commit(e.clone()).unwrap();

        let mut reopened = EntryStore::new(Box::new(slot));
        let loaded = reopened.load();
        assert_eq!(loaded[0].id, e.id);
        assert_eq!(loaded[0].content, e.content);
        assert!(loaded[0].is_concerning);
    }

    #[test]
    fn test_newest_first_ordering() {
        let mut store = EntryStore::open(Box::new(MemoryBlobStore::new()));
        store.commit(entry("1", "one", false)).unwrap();
        store.commit(entry("2", "two", false)).unwrap();
        store.commit(entry("3", "three", false)).unwrap();

        let ids: Vec<&str> = store.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let slot = MemoryBlobStore::new();
        let mut store = EntryStore::open(Box::new(slot.clone()));
        store.commit(entry("1", "one", false)).unwrap();
        let result = store.commit(entry("1", "again", false));

        assert!(matches!(result, Err(StoreError::DuplicateId(id)) if id == "1"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.entries()[0].content, "one");
    }

    #[test]
    fn test_persisted_blob_is_whole_versioned_snapshot() {
        let slot = MemoryBlobStore::new();
        let mut store = EntryStore::open(Box::new(slot.clone()));
        store.commit(entry("1", "one", false)).unwrap();
        store.commit(entry("2", "two", false)).unwrap();

        let blob = slot.get().unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(value["version"], migration::CURRENT_VERSION);
        assert_eq!(value["entries"].as_array().unwrap().len(), 2);
        assert_eq!(value["entries"][0]["id"], "2");
    }

    #[test]
    fn test_clear_all_erases_slot() {
        let slot = MemoryBlobStore::new();
        let mut store = EntryStore::open(Box::new(slot.clone()));
        store.commit(entry("1", "one", false)).unwrap();

        store.clear_all().unwrap();
        assert!(store.load().is_empty());
        assert!(slot.get().unwrap().is_none());
    }

    #[test]
    fn test_failed_clear_keeps_history() {
        let slot = MemoryBlobStore::new();
        let mut store = EntryStore::open(Box::new(LockedBlobStore(slot.clone())));
        store.commit(entry("1", "one", false)).unwrap();

        assert!(matches!(store.clear_all(), Err(StoreError::Write(_))));
        assert_eq!(store.len(), 1);
        assert!(slot.get().unwrap().is_some());
    }

    #[test]
    fn test_corrupt_blob_loads_empty_with_warning() {
        let mut store = EntryStore::new(Box::new(MemoryBlobStore::with_blob("{not json")));
        assert!(store.load().is_empty());
        assert_eq!(store.load_warnings().len(), 1);
    }

    #[test]
    fn test_unreadable_slot_loads_empty_with_warning() {
        let store = EntryStore::open(Box::new(UnreadableBlobStore));
        assert!(store.is_empty());
        assert!(store.load_warnings()[0].contains("denied"));
    }

    #[test]
    fn test_legacy_blob_is_migrated_on_load() {
        let legacy = r#"[{"id": "5", "content": "old", "date": "4/14/2025",
                          "sentiment": "Negative", "isConcerning": true}]"#;
        let store = EntryStore::open(Box::new(MemoryBlobStore::with_blob(legacy)));
        let e = &store.entries()[0];
        assert_eq!(e.ai_response, MISSING_RESPONSE);
        assert!(e.suggestions.is_empty());
        assert_eq!(e.created_at, "4/14/2025");
        assert!(store.load_warnings().is_empty());
    }

    #[test]
    fn test_write_failure_keeps_entry_in_memory() {
        let mut store = EntryStore::open(Box::new(ReadOnlyBlobStore));
        let result = store.commit(entry("1", "one", false));

        assert!(matches!(result, Err(StoreError::Write(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_next_id_is_unique_and_increasing() {
        let mut store = EntryStore::open(Box::new(MemoryBlobStore::new()));
        let now = Utc::now();
        let first = store.next_id(&now);
        store.commit(entry(&first, "one", false)).unwrap();
        let second = store.next_id(&now);

        assert_ne!(first, second);
        assert!(second.parse::<u64>().unwrap() > first.parse::<u64>().unwrap());
    }

    #[test]
    fn test_summary_counts() {
        let mut store = EntryStore::open(Box::new(MemoryBlobStore::new()));
        store.commit(entry("1", "one", true)).unwrap();
        let mut unset = entry("2", "two", false);
        unset.sentiment = None;
        store.commit(unset).unwrap();

        let summary = store.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.concerning, 1);
        assert_eq!(summary.by_sentiment.get("neutral"), Some(&1));
        assert_eq!(summary.by_sentiment.get("unset"), Some(&1));
    }

    #[test]
    fn test_file_blob_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("journal_entries.json");
        let mut slot = FileBlobStore::new(&path);

        assert!(slot.get().unwrap().is_none());
        slot.set("[]").unwrap();
        assert_eq!(slot.get().unwrap().as_deref(), Some("[]"));
        assert!(!slot.temp_path().exists());

        slot.remove().unwrap();
        assert!(!path.exists());
        slot.remove().unwrap();
    }
}
