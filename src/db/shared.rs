use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::*;

use super::{DeviceRepository, InMemoryDeviceRepository};

/// Repository handle safe to share across tasks.
///
/// A single reader/writer lock guards the whole backend: reads run
/// concurrently, while add/update/delete hold exclusive access so the primary
/// store and its indexes change as one unit. Clones share the same store.
pub struct SharedDeviceRepository<R = InMemoryDeviceRepository> {
    inner: Arc<RwLock<R>>,
}

impl<R> Clone for SharedDeviceRepository<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Default for SharedDeviceRepository<InMemoryDeviceRepository> {
    fn default() -> Self {
        Self::new(InMemoryDeviceRepository::new())
    }
}

impl<R: DeviceRepository> SharedDeviceRepository<R> {
    pub fn new(repo: R) -> Self {
        Self {
            inner: Arc::new(RwLock::new(repo)),
        }
    }

    pub async fn add(&self, data: DeviceCreate) -> Result<Device> {
        self.inner.write().await.add(data)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Device>> {
        self.inner.read().await.get_by_id(id)
    }

    pub async fn get_by_hostname(&self, hostname: &str) -> Result<Option<Device>> {
        self.inner.read().await.get_by_hostname(hostname)
    }

    pub async fn get_all(&self) -> Result<Vec<Device>> {
        self.inner.read().await.get_all()
    }

    pub async fn update(&self, id: Uuid, data: DeviceUpdate) -> Result<Option<Device>> {
        self.inner.write().await.update(id, data)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        self.inner.write().await.delete(id)
    }

    pub async fn filter_by(&self, filter: &DeviceFilter) -> Result<Vec<Device>> {
        self.inner.read().await.filter_by(filter)
    }

    pub async fn len(&self) -> Result<usize> {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> Result<bool> {
        self.inner.read().await.is_empty()
    }
}
