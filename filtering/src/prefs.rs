//! Backing key-value stores for packed favorites.

use crate::codec::PackedRecord;
use crate::error::PrefsError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Namespace -> key -> record.
type PreferenceDocument = BTreeMap<String, BTreeMap<String, PackedRecord>>;

const TMP_SUFFIX: &str = ".tmp";

/// Preference storage scoped by namespace. Reads may suspend; writes do not.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored under the key yet.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<PackedRecord>, PrefsError>;

    fn set(&self, namespace: &str, key: &str, record: &PackedRecord) -> Result<(), PrefsError>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    document: Mutex<PreferenceDocument>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value without going through the async read path.
    pub fn snapshot(&self, namespace: &str, key: &str) -> Option<PackedRecord> {
        self.lock()
            .get(namespace)
            .and_then(|records| records.get(key))
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PreferenceDocument> {
        match self.document.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<PackedRecord>, PrefsError> {
        Ok(self.snapshot(namespace, key))
    }

    fn set(&self, namespace: &str, key: &str, record: &PackedRecord) -> Result<(), PrefsError> {
        self.lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), record.clone());
        Ok(())
    }
}

/// Single JSON document on disk, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: PathBuf) -> Self {
        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    fn read_document(&self) -> Result<PreferenceDocument, PrefsError> {
        match std::fs::read(&self.path) {
            Ok(data) => parse_document(&data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(PreferenceDocument::new())
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn parse_document(data: &[u8]) -> Result<PreferenceDocument, PrefsError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(PreferenceDocument::new());
    }
    Ok(serde_json::from_slice(data)?)
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<PackedRecord>, PrefsError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut document = parse_document(&data)?;
        Ok(document
            .remove(namespace)
            .and_then(|mut records| records.remove(key)))
    }

    fn set(&self, namespace: &str, key: &str, record: &PackedRecord) -> Result<(), PrefsError> {
        let mut document = self.read_document()?;
        document
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), record.clone());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&document)?;
        std::fs::write(&self.tmp_path, data)?;
        std::fs::rename(&self.tmp_path, &self.path)?;
        Ok(())
    }
}
