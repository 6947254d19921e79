//! Network device inventory.
//!
//! Devices (hostname, management IP, platform, role, site) are held by a
//! [`db::DeviceRepository`] backend that keeps hostname and management IP
//! unique across the inventory.

pub mod config;
pub mod db;
pub mod models;
pub mod utils;

pub use db::{
    DeviceRepository, DuplicateKeyError, InMemoryDeviceRepository, SharedDeviceRepository,
};
pub use models::{
    CreateDeviceRequest, Device, DeviceCreate, DeviceFilter, DevicePlatform, DeviceRole,
    DeviceUpdate, UpdateDeviceRequest, ValidationError,
};
