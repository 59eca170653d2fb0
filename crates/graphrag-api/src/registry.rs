//! Document registry backends.
//!
//! The registry is the only state the kernel persists itself; graph and
//! vector persistence belongs to the backend collaborators.

use graphrag_types::{DocumentMeta, DocumentRegistry, RegistryError};
use tokio::io::AsyncWriteExt;

/// In-memory registry (process lifetime only).
pub struct InMemoryDocumentRegistry {
    docs: tokio::sync::RwLock<Vec<DocumentMeta>>,
}

impl InMemoryDocumentRegistry {
    pub fn new() -> Self {
        Self {
            docs: tokio::sync::RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryDocumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DocumentRegistry for InMemoryDocumentRegistry {
    async fn append(&self, doc: DocumentMeta) -> Result<(), RegistryError> {
        self.docs.write().await.push(doc);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DocumentMeta>, RegistryError> {
        Ok(self.docs.read().await.clone())
    }

    async fn remove(&self, id: &str) -> Result<Option<DocumentMeta>, RegistryError> {
        let mut guard = self.docs.write().await;
        match guard.iter().position(|d| d.id == id) {
            Some(pos) => Ok(Some(guard.remove(pos))),
            None => Ok(None),
        }
    }
}

/// JSONL file-backed registry (persists across restarts). Removal rewrites
/// the whole file; the document list is small enough that this is fine.
pub struct JsonlDocumentRegistry {
    path: std::path::PathBuf,
    file_lock: tokio::sync::Mutex<()>,
}

impl JsonlDocumentRegistry {
    pub fn new(path: impl AsRef<std::path::Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<DocumentMeta>, RegistryError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RegistryError::Other(e.to_string())),
        };
        let mut out = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(doc) => out.push(doc),
                Err(e) => tracing::warn!(error = %e, "skipping malformed registry line"),
            }
        }
        Ok(out)
    }

    async fn write_all(&self, docs: &[DocumentMeta]) -> Result<(), RegistryError> {
        let mut buf = String::new();
        for doc in docs {
            let line =
                serde_json::to_string(doc).map_err(|e| RegistryError::Other(e.to_string()))?;
            buf.push_str(&line);
            buf.push('\n');
        }
        tokio::fs::write(&self.path, buf)
            .await
            .map_err(|e| RegistryError::Other(e.to_string()))
    }
}

#[async_trait::async_trait]
impl DocumentRegistry for JsonlDocumentRegistry {
    async fn append(&self, doc: DocumentMeta) -> Result<(), RegistryError> {
        let _guard = self.file_lock.lock().await;
        let line = serde_json::to_string(&doc).map_err(|e| RegistryError::Other(e.to_string()))?;
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| RegistryError::Other(e.to_string()))?;
        f.write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| RegistryError::Other(e.to_string()))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DocumentMeta>, RegistryError> {
        let _guard = self.file_lock.lock().await;
        self.read_all().await
    }

    async fn remove(&self, id: &str) -> Result<Option<DocumentMeta>, RegistryError> {
        let _guard = self.file_lock.lock().await;
        let mut docs = self.read_all().await?;
        match docs.iter().position(|d| d.id == id) {
            Some(pos) => {
                let removed = docs.remove(pos);
                self.write_all(&docs).await?;
                Ok(Some(removed))
            }
            None => Ok(None),
        }
    }
}
