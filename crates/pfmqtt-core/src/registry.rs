// ── Identity registry ──
//
// Bidirectional descriptor <-> device identifier relation, persisted as a
// JSON array of `[descriptor, identifier]` pairs in allocation order.
// Every allocation rewrites the whole file (temp file + rename) before the
// new identifier is handed out.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::DeviceId;

#[derive(Debug, Default)]
struct Mappings {
    /// descriptor -> identifier, in allocation order.
    forward: IndexMap<String, DeviceId>,
    /// identifier -> descriptor.
    reverse: HashMap<DeviceId, String>,
}

impl Mappings {
    /// Insert a pair unless either side is already taken.
    fn insert(&mut self, descriptor: String, id: DeviceId) -> bool {
        if self.forward.contains_key(&descriptor) || self.reverse.contains_key(&id) {
            return false;
        }
        self.reverse.insert(id.clone(), descriptor.clone());
        self.forward.insert(descriptor, id);
        true
    }

    fn snapshot(&self) -> Vec<(&str, &str)> {
        self.forward
            .iter()
            .map(|(descriptor, id)| (descriptor.as_str(), id.as_str()))
            .collect()
    }
}

/// Durable one-to-one mapping between rule descriptors and device ids.
///
/// Lookups and allocation are atomic under an internal lock, so two
/// concurrent `get_or_create` calls for the same descriptor always agree.
/// File writes are serialized separately and always write the latest
/// snapshot, so a slow write can never overwrite a newer one.
pub struct IdentityRegistry {
    path: PathBuf,
    mappings: Mutex<Mappings>,
    write_lock: tokio::sync::Mutex<()>,
}

impl IdentityRegistry {
    /// An empty registry that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mappings: Mutex::new(Mappings::default()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Seed a registry with known pairs without touching disk.
    ///
    /// Pairs that would break the one-to-one relation are dropped.
    pub fn with_pairs<I, D, K>(path: impl Into<PathBuf>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (D, K)>,
        D: Into<String>,
        K: Into<DeviceId>,
    {
        let registry = Self::new(path);
        {
            let mut mappings = registry.lock();
            for (descriptor, id) in pairs {
                let (descriptor, id) = (descriptor.into(), id.into());
                if !mappings.insert(descriptor.clone(), id.clone()) {
                    warn!(descriptor = %descriptor, %id, "dropping conflicting identity entry");
                }
            }
        }
        registry
    }

    /// Load the registry from `path`.
    ///
    /// A missing, unreadable or malformed file yields an empty registry.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let pairs = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<Vec<(String, DeviceId)>>(&raw) {
                Ok(pairs) => pairs,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "identity file is malformed, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no identity file yet");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read identity file, starting empty");
                Vec::new()
            }
        };

        let registry = Self::with_pairs(path, pairs);
        info!(
            path = %registry.path.display(),
            entries = registry.len(),
            "identity registry loaded"
        );
        registry
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifier for `descriptor`, if one was ever allocated.
    pub fn lookup(&self, descriptor: &str) -> Option<DeviceId> {
        self.lock().forward.get(descriptor).cloned()
    }

    /// Descriptor owning `id`.
    pub fn reverse_lookup(&self, id: &DeviceId) -> Option<String> {
        self.lock().reverse.get(id).cloned()
    }

    /// Return the identifier for `descriptor`, allocating and persisting a
    /// new one on first use.
    ///
    /// A failed write is logged; the in-memory mapping is still returned
    /// and stays valid for the rest of the process lifetime.
    pub async fn get_or_create(&self, descriptor: &str) -> DeviceId {
        let id = {
            let mut mappings = self.lock();
            if let Some(id) = mappings.forward.get(descriptor) {
                return id.clone();
            }
            let mut id = DeviceId::generate();
            while mappings.reverse.contains_key(&id) {
                id = DeviceId::generate();
            }
            mappings.insert(descriptor.to_owned(), id.clone());
            id
        };

        info!(descriptor, %id, "allocated device identifier");

        if let Err(e) = self.persist().await {
            warn!(descriptor, %id, error = %e, "identifier is not durable until the next successful write");
        }
        id
    }

    /// Rewrite the identity file with the current relation.
    pub async fn persist(&self) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;

        let json = {
            let mappings = self.lock();
            serde_json::to_string(&mappings.snapshot())
                .map_err(|e| CoreError::Internal(format!("cannot encode identity file: {e}")))?
        };

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, json.as_bytes()))
            .await
            .map_err(|e| CoreError::Internal(format!("identity write task failed: {e}")))??;

        debug!(path = %self.path.display(), "identity file saved");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Mappings> {
        self.mappings.lock().expect("identity registry lock poisoned")
    }
}

/// Write `contents` to a sibling temp file, fsync it, then rename over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CoreError> {
    let to_err = |reason: String| CoreError::Persistence {
        path: path.to_path_buf(),
        reason,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| to_err(e.to_string()))?;
    temp.write_all(contents).map_err(|e| to_err(e.to_string()))?;
    temp.as_file().sync_all().map_err(|e| to_err(e.to_string()))?;
    temp.persist(path).map_err(|e| to_err(e.error.to_string()))?;
    Ok(())
}
