mod clock;
mod memory;
pub mod seeds;
mod shared;

use anyhow::Result;
use uuid::Uuid;

use crate::models::*;

pub use clock::{Clock, SystemClock};
pub use memory::InMemoryDeviceRepository;
pub use shared::SharedDeviceRepository;

/// Typed error for a hostname or management IP already owned by another
/// device. Enables reliable downcast by callers instead of string matching.
/// Always means no state was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKeyError {
    pub field: String,
    pub value: String,
}

impl DuplicateKeyError {
    pub fn new(field: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn hostname(value: &str) -> Self {
        Self::new("hostname", value)
    }

    pub fn management_ip(value: &str) -> Self {
        Self::new("management_ip", value)
    }
}

impl std::fmt::Display for DuplicateKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Device with {}='{}' already exists", self.field, self.value)
    }
}

impl std::error::Error for DuplicateKeyError {}

/// Storage contract for device inventory backends.
///
/// Mutating operations are all-or-nothing: on error nothing was written.
/// "Not found" is a normal outcome and is reported as `None` / `false`,
/// never as an error. Uniqueness violations surface as [`DuplicateKeyError`]
/// inside the returned `anyhow::Error`.
pub trait DeviceRepository: Send + Sync {
    /// Store a new device, generating its identity and timestamps.
    fn add(&mut self, data: DeviceCreate) -> Result<Device>;

    fn get_by_id(&self, id: Uuid) -> Result<Option<Device>>;

    fn get_by_hostname(&self, hostname: &str) -> Result<Option<Device>>;

    /// Every stored device, ordered by hostname
    fn get_all(&self) -> Result<Vec<Device>>;

    /// Apply a partial update. Returns `None` if no device has this id.
    /// An empty update returns the stored device unchanged.
    fn update(&mut self, id: Uuid, data: DeviceUpdate) -> Result<Option<Device>>;

    /// Returns false if no device has this id.
    fn delete(&mut self, id: Uuid) -> Result<bool>;

    /// Devices matching every criterion set on `filter`, ordered by hostname
    fn filter_by(&self, filter: &DeviceFilter) -> Result<Vec<Device>>;

    fn len(&self) -> Result<usize> {
        Ok(self.get_all()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
