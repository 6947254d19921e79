use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

use crate::utils::{canonical_ip, normalize_hostname, normalize_site, parse_management_ip};

use super::ValidationError;

/// Network operating system running on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePlatform {
    IosXe,
    IosXr,
    Nxos,
    Eos,
    Junos,
}

impl DevicePlatform {
    pub const ALL: &'static [DevicePlatform] = &[
        DevicePlatform::IosXe,
        DevicePlatform::IosXr,
        DevicePlatform::Nxos,
        DevicePlatform::Eos,
        DevicePlatform::Junos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DevicePlatform::IosXe => "ios_xe",
            DevicePlatform::IosXr => "ios_xr",
            DevicePlatform::Nxos => "nxos",
            DevicePlatform::Eos => "eos",
            DevicePlatform::Junos => "junos",
        }
    }
}

impl fmt::Display for DevicePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DevicePlatform {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                ValidationError::new(
                    "platform",
                    "must be one of: ios_xe, ios_xr, nxos, eos, junos",
                )
            })
    }
}

/// Role of a device in the network topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Spine,
    Leaf,
    Border,
    Core,
    Access,
    Wan,
}

impl DeviceRole {
    pub const ALL: &'static [DeviceRole] = &[
        DeviceRole::Spine,
        DeviceRole::Leaf,
        DeviceRole::Border,
        DeviceRole::Core,
        DeviceRole::Access,
        DeviceRole::Wan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRole::Spine => "spine",
            DeviceRole::Leaf => "leaf",
            DeviceRole::Border => "border",
            DeviceRole::Core => "core",
            DeviceRole::Access => "access",
            DeviceRole::Wan => "wan",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                ValidationError::new(
                    "role",
                    "must be one of: spine, leaf, border, core, access, wan",
                )
            })
    }
}

/// Device represents a network device held in inventory.
///
/// A Device is never modified in place: updates build a replacement through
/// [`Device::apply`], keeping `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    id: Uuid,
    hostname: String,
    management_ip: IpAddr,
    platform: DevicePlatform,
    role: DeviceRole,
    site: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Device {
    /// Build a new device with a fresh identity; both timestamps are `now`.
    pub fn create(data: DeviceCreate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            hostname: data.hostname,
            management_ip: data.management_ip,
            platform: data.platform,
            role: data.role,
            site: data.site,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy of this device with every field set in `update` applied
    pub fn apply(&self, update: &DeviceUpdate, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: self.id,
            hostname: update.hostname.clone().unwrap_or_else(|| self.hostname.clone()),
            management_ip: update.management_ip.unwrap_or(self.management_ip),
            platform: update.platform.unwrap_or(self.platform),
            role: update.role.unwrap_or(self.role),
            site: update.site.clone().unwrap_or_else(|| self.site.clone()),
            created_at: self.created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn management_ip(&self) -> IpAddr {
        self.management_ip
    }

    /// Canonical string form of the management address
    pub fn canonical_ip(&self) -> String {
        canonical_ip(&self.management_ip)
    }

    pub fn platform(&self) -> DevicePlatform {
        self.platform
    }

    pub fn role(&self) -> DeviceRole {
        self.role
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// CreateDeviceRequest is the raw, unvalidated shape of a new device
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeviceRequest {
    pub hostname: String,
    pub management_ip: String,
    pub platform: String,
    pub role: String,
    pub site: String,
}

/// Validated data for creating a device (no identity, no timestamps)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCreate {
    hostname: String,
    management_ip: IpAddr,
    platform: DevicePlatform,
    role: DeviceRole,
    site: String,
}

impl DeviceCreate {
    pub fn new(
        hostname: &str,
        management_ip: IpAddr,
        platform: DevicePlatform,
        role: DeviceRole,
        site: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            hostname: normalize_hostname(hostname)?,
            management_ip,
            platform,
            role,
            site: normalize_site(site)?,
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn management_ip(&self) -> IpAddr {
        self.management_ip
    }

    pub fn platform(&self) -> DevicePlatform {
        self.platform
    }

    pub fn role(&self) -> DeviceRole {
        self.role
    }

    pub fn site(&self) -> &str {
        &self.site
    }
}

impl TryFrom<CreateDeviceRequest> for DeviceCreate {
    type Error = ValidationError;

    fn try_from(req: CreateDeviceRequest) -> Result<Self, Self::Error> {
        Self::new(
            &req.hostname,
            parse_management_ip(&req.management_ip)?,
            req.platform.parse()?,
            req.role.parse()?,
            &req.site,
        )
    }
}

/// UpdateDeviceRequest is the raw shape of a partial update.
/// A missing key and an explicit `null` both mean "leave unchanged".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDeviceRequest {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub management_ip: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
}

/// Validated partial update. `None` means the field is not touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceUpdate {
    hostname: Option<String>,
    management_ip: Option<IpAddr>,
    platform: Option<DevicePlatform>,
    role: Option<DeviceRole>,
    site: Option<String>,
}

impl DeviceUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hostname(mut self, hostname: &str) -> Result<Self, ValidationError> {
        self.hostname = Some(normalize_hostname(hostname)?);
        Ok(self)
    }

    pub fn with_management_ip(mut self, ip: IpAddr) -> Self {
        self.management_ip = Some(ip);
        self
    }

    pub fn with_platform(mut self, platform: DevicePlatform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_role(mut self, role: DeviceRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_site(mut self, site: &str) -> Result<Self, ValidationError> {
        self.site = Some(normalize_site(site)?);
        Ok(self)
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.hostname.is_none()
            && self.management_ip.is_none()
            && self.platform.is_none()
            && self.role.is_none()
            && self.site.is_none()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn management_ip(&self) -> Option<IpAddr> {
        self.management_ip
    }

    pub fn platform(&self) -> Option<DevicePlatform> {
        self.platform
    }

    pub fn role(&self) -> Option<DeviceRole> {
        self.role
    }

    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }
}

impl TryFrom<UpdateDeviceRequest> for DeviceUpdate {
    type Error = ValidationError;

    fn try_from(req: UpdateDeviceRequest) -> Result<Self, Self::Error> {
        let mut update = DeviceUpdate::new();
        if let Some(hostname) = req.hostname {
            update = update.with_hostname(&hostname)?;
        }
        if let Some(ip) = req.management_ip {
            update = update.with_management_ip(parse_management_ip(&ip)?);
        }
        if let Some(platform) = req.platform {
            update = update.with_platform(platform.parse()?);
        }
        if let Some(role) = req.role {
            update = update.with_role(role.parse()?);
        }
        if let Some(site) = req.site {
            update = update.with_site(&site)?;
        }
        Ok(update)
    }
}

/// DeviceFilter selects devices by exact platform, role and site.
/// Unset criteria match every device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeviceFilter {
    #[serde(default)]
    pub platform: Option<DevicePlatform>,
    #[serde(default)]
    pub role: Option<DeviceRole>,
    #[serde(default)]
    pub site: Option<String>,
}

impl DeviceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn platform(mut self, platform: DevicePlatform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn role(mut self, role: DeviceRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn matches(&self, device: &Device) -> bool {
        if let Some(platform) = self.platform {
            if device.platform != platform {
                return false;
            }
        }
        if let Some(role) = self.role {
            if device.role != role {
                return false;
            }
        }
        if let Some(ref site) = self.site {
            if device.site != *site {
                return false;
            }
        }
        true
    }
}
