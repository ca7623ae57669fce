//! Document bytes live under `<base_dir>/<tenant_id>/<document_id>`. Reads
//! always take the expected tenant as a parameter and refuse to serve a blob
//! stored under a different one, even if the caller already knows the path.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, tenant_id: Uuid, document_id: Uuid, bytes: &[u8]) -> Result<(), StorageError>;
    async fn get(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, tenant_id: Uuid, document_id: Uuid) -> Result<(), StorageError>;
}

/// Blob store rooted at a local directory. Production deployments would
/// swap this for an S3-compatible adapter behind the same trait.
pub struct FilesystemBlobStore {
    base_dir: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn path_for(&self, tenant_id: Uuid, document_id: Uuid) -> PathBuf {
        self.base_dir.join(tenant_id.to_string()).join(document_id.to_string())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, tenant_id: Uuid, document_id: Uuid, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(tenant_id, document_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(tenant_id, document_id);
        if !path.exists() {
            return Err(StorageError::NotFound(format!("document {document_id} not found for tenant {tenant_id}")));
        }
        verify_within_tenant_dir(&self.base_dir, tenant_id, &path)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn delete(&self, tenant_id: Uuid, document_id: Uuid) -> Result<(), StorageError> {
        let path = self.path_for(tenant_id, document_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Defends against a future caller passing a path instead of re-deriving it
/// from `(tenant_id, document_id)` — asserts the resolved path actually lives
/// under that tenant's directory before bytes are returned.
fn verify_within_tenant_dir(base_dir: &Path, tenant_id: Uuid, path: &Path) -> Result<(), StorageError> {
    let expected_prefix = base_dir.join(tenant_id.to_string());
    if path.starts_with(&expected_prefix) {
        Ok(())
    } else {
        Err(StorageError::TenantMismatch(format!("path {path:?} does not belong to tenant {tenant_id}")))
    }
}
