use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{CoordError, Result};
use crate::store::job::ObjectRef;

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, location: &ObjectRef, bytes: Vec<u8>) -> Result<()>;

    /// Fetch a blob. `NotFound` when the object does not exist — under
    /// duplicate archive processing that is a benign signal, not an
    /// error.
    async fn get(&self, location: &ObjectRef) -> Result<Vec<u8>>;

    async fn delete(&self, location: &ObjectRef) -> Result<()>;

    /// Time-limited read URL handed to the owner for direct download.
    async fn presigned_get_url(&self, location: &ObjectRef, expires_in: Duration)
        -> Result<String>;
}

/// In-process object store keyed by bucket+key.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<ObjectRef, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, location: &ObjectRef) -> bool {
        self.objects.read().contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, location: &ObjectRef, bytes: Vec<u8>) -> Result<()> {
        self.objects.write().insert(location.clone(), bytes);
        Ok(())
    }

    async fn get(&self, location: &ObjectRef) -> Result<Vec<u8>> {
        self.objects
            .read()
            .get(location)
            .cloned()
            .ok_or_else(|| CoordError::NotFound(format!("object {location}")))
    }

    async fn delete(&self, location: &ObjectRef) -> Result<()> {
        self.objects.write().remove(location);
        Ok(())
    }

    async fn presigned_get_url(
        &self,
        location: &ObjectRef,
        expires_in: Duration,
    ) -> Result<String> {
        if !self.contains(location) {
            return Err(CoordError::NotFound(format!("object {location}")));
        }
        // Shape mirrors a real signed URL; the token is not verifiable.
        Ok(format!(
            "https://{}.objects.local/{}?expires_in={}&token={}",
            location.bucket,
            location.key,
            expires_in.as_secs(),
            Uuid::new_v4().simple()
        ))
    }
}
