use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::*;
use crate::utils::canonical_ip;

use super::{Clock, DeviceRepository, DuplicateKeyError, SystemClock};

/// In-memory device store.
///
/// Devices live in a map keyed by id, with two secondary indexes
/// (hostname -> id, management IP -> id). Every mutating method validates
/// first and then writes all three maps together, so the indexes never
/// drift from the primary store.
///
/// Not synchronized: wrap it in [`super::SharedDeviceRepository`] for
/// concurrent use.
pub struct InMemoryDeviceRepository {
    devices: HashMap<Uuid, Device>,
    hostname_index: HashMap<String, Uuid>,
    ip_index: HashMap<IpAddr, Uuid>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryDeviceRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDeviceRepository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store that takes timestamps from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            devices: HashMap::new(),
            hostname_index: HashMap::new(),
            ip_index: HashMap::new(),
            clock,
        }
    }

    /// Fails if `hostname` is indexed to a device other than `owner`.
    fn check_hostname(&self, hostname: &str, owner: Option<Uuid>) -> Result<(), DuplicateKeyError> {
        match self.hostname_index.get(hostname) {
            Some(id) if Some(*id) != owner => Err(DuplicateKeyError::hostname(hostname)),
            _ => Ok(()),
        }
    }

    /// Fails if `ip` is indexed to a device other than `owner`.
    fn check_ip(&self, ip: &IpAddr, owner: Option<Uuid>) -> Result<(), DuplicateKeyError> {
        match self.ip_index.get(ip) {
            Some(id) if Some(*id) != owner => Err(DuplicateKeyError::management_ip(&canonical_ip(ip))),
            _ => Ok(()),
        }
    }

    /// Next `updated_at` for a record last stamped at `previous`.
    /// Always strictly after `previous`, even if the clock stalls or steps back.
    fn next_timestamp(&self, previous: DateTime<Utc>) -> DateTime<Utc> {
        let now = self.clock.now();
        if now > previous {
            now
        } else {
            previous + Duration::nanoseconds(1)
        }
    }

    fn sorted(mut devices: Vec<Device>) -> Vec<Device> {
        devices.sort_by(|a, b| a.hostname().cmp(b.hostname()));
        devices
    }
}

impl DeviceRepository for InMemoryDeviceRepository {
    fn add(&mut self, data: DeviceCreate) -> Result<Device> {
        if let Err(e) = self
            .check_hostname(data.hostname(), None)
            .and_then(|_| self.check_ip(&data.management_ip(), None))
        {
            tracing::warn!("Rejected new device: {}", e);
            return Err(e.into());
        }

        let device = Device::create(data, self.clock.now());

        self.hostname_index.insert(device.hostname().to_string(), device.id());
        self.ip_index.insert(device.management_ip(), device.id());
        self.devices.insert(device.id(), device.clone());

        tracing::info!(
            "Added device {} ({}, {}) id={}",
            device.hostname(),
            device.canonical_ip(),
            device.site(),
            device.id()
        );
        Ok(device)
    }

    fn get_by_id(&self, id: Uuid) -> Result<Option<Device>> {
        Ok(self.devices.get(&id).cloned())
    }

    fn get_by_hostname(&self, hostname: &str) -> Result<Option<Device>> {
        Ok(self
            .hostname_index
            .get(hostname)
            .and_then(|id| self.devices.get(id))
            .cloned())
    }

    fn get_all(&self) -> Result<Vec<Device>> {
        Ok(Self::sorted(self.devices.values().cloned().collect()))
    }

    fn update(&mut self, id: Uuid, data: DeviceUpdate) -> Result<Option<Device>> {
        let existing = match self.devices.get(&id) {
            Some(device) => device.clone(),
            None => {
                tracing::debug!("Update skipped, no device with id={}", id);
                return Ok(None);
            }
        };

        if data.is_empty() {
            return Ok(Some(existing));
        }

        if let Some(hostname) = data.hostname() {
            if let Err(e) = self.check_hostname(hostname, Some(id)) {
                tracing::warn!("Rejected update of {}: {}", existing.hostname(), e);
                return Err(e.into());
            }
        }
        if let Some(ip) = data.management_ip() {
            if let Err(e) = self.check_ip(&ip, Some(id)) {
                tracing::warn!("Rejected update of {}: {}", existing.hostname(), e);
                return Err(e.into());
            }
        }

        let updated = existing.apply(&data, self.next_timestamp(existing.updated_at()));

        if updated.hostname() != existing.hostname() {
            self.hostname_index.remove(existing.hostname());
            self.hostname_index.insert(updated.hostname().to_string(), id);
        }
        if updated.management_ip() != existing.management_ip() {
            self.ip_index.remove(&existing.management_ip());
            self.ip_index.insert(updated.management_ip(), id);
        }
        self.devices.insert(id, updated.clone());

        tracing::info!("Updated device {} id={}", updated.hostname(), id);
        Ok(Some(updated))
    }

    fn delete(&mut self, id: Uuid) -> Result<bool> {
        let device = match self.devices.remove(&id) {
            Some(device) => device,
            None => return Ok(false),
        };

        self.hostname_index.remove(device.hostname());
        self.ip_index.remove(&device.management_ip());

        tracing::info!("Deleted device {} id={}", device.hostname(), id);
        Ok(true)
    }

    fn filter_by(&self, filter: &DeviceFilter) -> Result<Vec<Device>> {
        Ok(Self::sorted(
            self.devices
                .values()
                .filter(|d| filter.matches(d))
                .cloned()
                .collect(),
        ))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.devices.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::clock::FixedClock;
    use std::collections::HashSet;
    use tokio_test::{assert_err, assert_ok};

    fn create(hostname: &str, ip: &str, platform: DevicePlatform, role: DeviceRole, site: &str) -> DeviceCreate {
        DeviceCreate::new(hostname, ip.parse().unwrap(), platform, role, site).unwrap()
    }

    fn spine1() -> DeviceCreate {
        create("spine1", "10.0.0.1", DevicePlatform::Eos, DeviceRole::Spine, "dc1")
    }

    fn duplicate_of(err: &anyhow::Error) -> &DuplicateKeyError {
        err.downcast_ref::<DuplicateKeyError>()
            .expect("expected DuplicateKeyError")
    }

    /// Primary store and both indexes describe the same set of devices.
    fn assert_consistent(repo: &InMemoryDeviceRepository) {
        assert_eq!(repo.hostname_index.len(), repo.devices.len());
        assert_eq!(repo.ip_index.len(), repo.devices.len());
        for (id, device) in &repo.devices {
            assert_eq!(device.id(), *id);
            assert_eq!(repo.hostname_index.get(device.hostname()), Some(id));
            assert_eq!(repo.ip_index.get(&device.management_ip()), Some(id));
        }
    }

    #[test]
    fn test_add_returns_device_with_id_and_timestamps() {
        let mut repo = InMemoryDeviceRepository::new();
        let device = assert_ok!(repo.add(spine1()));

        assert_eq!(device.hostname(), "spine1");
        assert_eq!(device.canonical_ip(), "10.0.0.1");
        assert_eq!(device.platform(), DevicePlatform::Eos);
        assert_eq!(device.role(), DeviceRole::Spine);
        assert_eq!(device.created_at(), device.updated_at());
        assert_consistent(&repo);
    }

    #[test]
    fn test_added_device_is_visible_everywhere() {
        let mut repo = InMemoryDeviceRepository::new();
        let device = repo.add(spine1()).unwrap();

        assert_eq!(repo.get_by_id(device.id()).unwrap(), Some(device.clone()));
        assert_eq!(repo.get_by_hostname("spine1").unwrap(), Some(device.clone()));
        assert_eq!(repo.get_all().unwrap(), vec![device]);
    }

    #[test]
    fn test_add_duplicate_hostname() {
        let mut repo = InMemoryDeviceRepository::new();
        repo.add(spine1()).unwrap();

        let err = assert_err!(repo.add(create(
            "spine1",
            "10.0.0.99",
            DevicePlatform::Eos,
            DeviceRole::Spine,
            "dc1"
        )));
        assert_eq!(duplicate_of(&err), &DuplicateKeyError::hostname("spine1"));
        assert_eq!(repo.len().unwrap(), 1);
        assert!(repo.ip_index.get(&"10.0.0.99".parse::<IpAddr>().unwrap()).is_none());
        assert_consistent(&repo);
    }

    #[test]
    fn test_add_duplicate_ip_keeps_only_first() {
        let mut repo = InMemoryDeviceRepository::new();
        let a = repo.add(spine1()).unwrap();

        let err = assert_err!(repo.add(create(
            "spine2",
            "10.0.0.1",
            DevicePlatform::Eos,
            DeviceRole::Spine,
            "dc1"
        )));
        assert_eq!(duplicate_of(&err), &DuplicateKeyError::management_ip("10.0.0.1"));
        assert_eq!(err.to_string(), "Device with management_ip='10.0.0.1' already exists");
        assert_eq!(repo.get_all().unwrap(), vec![a]);
        assert!(repo.get_by_hostname("spine2").unwrap().is_none());
        assert_consistent(&repo);
    }

    #[test]
    fn test_add_duplicate_ip_equivalent_text() {
        let mut repo = InMemoryDeviceRepository::new();
        repo.add(create("r1", "2001:db8::1", DevicePlatform::IosXr, DeviceRole::Wan, "edge"))
            .unwrap();

        let err = repo
            .add(create("r2", "2001:DB8:0:0::0001", DevicePlatform::IosXr, DeviceRole::Wan, "edge"))
            .unwrap_err();
        assert_eq!(duplicate_of(&err), &DuplicateKeyError::management_ip("2001:db8::1"));
    }

    #[test]
    fn test_hostname_check_wins_when_both_collide() {
        let mut repo = InMemoryDeviceRepository::new();
        repo.add(spine1()).unwrap();

        let err = repo.add(spine1()).unwrap_err();
        assert_eq!(duplicate_of(&err).field, "hostname");
    }

    #[test]
    fn test_get_missing() {
        let repo = InMemoryDeviceRepository::new();
        assert!(repo.get_by_id(Uuid::new_v4()).unwrap().is_none());
        assert!(repo.get_by_hostname("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_empty_repository() {
        let mut repo = InMemoryDeviceRepository::new();
        assert!(repo.get_all().unwrap().is_empty());
        assert!(repo.is_empty().unwrap());
        assert!(!repo.delete(Uuid::new_v4()).unwrap());
        assert!(repo.get_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_get_all_ordered_by_hostname() {
        let mut repo = InMemoryDeviceRepository::new();
        for (i, name) in ["leaf3", "leaf1", "leaf2"].iter().enumerate() {
            repo.add(create(name, &format!("10.0.1.{}", i + 1), DevicePlatform::Eos, DeviceRole::Leaf, "dc1"))
                .unwrap();
        }

        let names: Vec<String> = repo
            .get_all()
            .unwrap()
            .iter()
            .map(|d| d.hostname().to_string())
            .collect();
        assert_eq!(names, vec!["leaf1", "leaf2", "leaf3"]);
    }

    #[test]
    fn test_update_missing_returns_none() {
        let mut repo = InMemoryDeviceRepository::new();
        let update = DeviceUpdate::new().with_role(DeviceRole::Core);
        assert!(repo.update(Uuid::new_v4(), update).unwrap().is_none());
        assert!(repo.is_empty().unwrap());
    }

    #[test]
    fn test_empty_update_is_noop() {
        let mut repo = InMemoryDeviceRepository::new();
        let device = repo.add(spine1()).unwrap();

        let result = repo.update(device.id(), DeviceUpdate::new()).unwrap();
        assert_eq!(result, Some(device.clone()));
        assert_eq!(repo.get_by_id(device.id()).unwrap(), Some(device));
    }

    #[test]
    fn test_rename_moves_hostname_index() {
        let mut repo = InMemoryDeviceRepository::new();
        let a = repo.add(spine1()).unwrap();

        let update = DeviceUpdate::new().with_hostname("spine1-renamed").unwrap();
        let renamed = repo.update(a.id(), update).unwrap().unwrap();

        assert_eq!(renamed.hostname(), "spine1-renamed");
        assert_eq!(renamed.id(), a.id());
        assert_eq!(renamed.management_ip(), a.management_ip());
        assert!(renamed.updated_at() > a.updated_at());
        assert!(repo.get_by_hostname("spine1").unwrap().is_none());
        assert_eq!(repo.get_by_hostname("spine1-renamed").unwrap(), Some(renamed));
        assert_consistent(&repo);
    }

    #[test]
    fn test_update_changes_ip_and_frees_old() {
        let mut repo = InMemoryDeviceRepository::new();
        let a = repo.add(spine1()).unwrap();

        let update = DeviceUpdate::new().with_management_ip("10.0.0.50".parse().unwrap());
        repo.update(a.id(), update).unwrap().unwrap();
        assert_consistent(&repo);

        // old address is free again
        repo.add(create("spine2", "10.0.0.1", DevicePlatform::Eos, DeviceRole::Spine, "dc1"))
            .unwrap();
        assert_consistent(&repo);
    }

    #[test]
    fn test_update_to_other_devices_hostname_fails() {
        let mut repo = InMemoryDeviceRepository::new();
        let a = repo.add(spine1()).unwrap();
        let b = repo
            .add(create("spine2", "10.0.0.2", DevicePlatform::Eos, DeviceRole::Spine, "dc1"))
            .unwrap();

        let update = DeviceUpdate::new()
            .with_hostname("spine1")
            .unwrap()
            .with_role(DeviceRole::Border);
        let err = repo.update(b.id(), update).unwrap_err();

        assert_eq!(duplicate_of(&err), &DuplicateKeyError::hostname("spine1"));
        assert_eq!(repo.get_by_id(b.id()).unwrap(), Some(b));
        assert_eq!(repo.get_by_hostname("spine1").unwrap(), Some(a));
        assert_consistent(&repo);
    }

    #[test]
    fn test_update_to_other_devices_ip_fails() {
        let mut repo = InMemoryDeviceRepository::new();
        repo.add(spine1()).unwrap();
        let b = repo
            .add(create("spine2", "10.0.0.2", DevicePlatform::Eos, DeviceRole::Spine, "dc1"))
            .unwrap();

        let update = DeviceUpdate::new()
            .with_hostname("spine2-new")
            .unwrap()
            .with_management_ip("10.0.0.1".parse().unwrap());
        let err = repo.update(b.id(), update).unwrap_err();

        assert_eq!(duplicate_of(&err), &DuplicateKeyError::management_ip("10.0.0.1"));
        // hostname part of the rejected update was not applied either
        assert!(repo.get_by_hostname("spine2-new").unwrap().is_none());
        assert_eq!(repo.get_by_hostname("spine2").unwrap(), Some(b));
        assert_consistent(&repo);
    }

    #[test]
    fn test_update_with_own_keys_succeeds() {
        let mut repo = InMemoryDeviceRepository::new();
        let a = repo.add(spine1()).unwrap();

        let update = DeviceUpdate::new()
            .with_hostname("spine1")
            .unwrap()
            .with_management_ip("10.0.0.1".parse().unwrap())
            .with_platform(DevicePlatform::Nxos);
        let updated = repo.update(a.id(), update).unwrap().unwrap();

        assert_eq!(updated.platform(), DevicePlatform::Nxos);
        assert!(updated.updated_at() > a.updated_at());
        assert_consistent(&repo);
    }

    #[test]
    fn test_update_preserves_untouched_fields() {
        let mut repo = InMemoryDeviceRepository::new();
        let a = repo.add(spine1()).unwrap();

        let update = DeviceUpdate::new().with_site("dc9").unwrap();
        let updated = repo.update(a.id(), update).unwrap().unwrap();

        assert_eq!(updated.site(), "dc9");
        assert_eq!(updated.hostname(), a.hostname());
        assert_eq!(updated.management_ip(), a.management_ip());
        assert_eq!(updated.platform(), a.platform());
        assert_eq!(updated.role(), a.role());
        assert_eq!(updated.created_at(), a.created_at());
    }

    #[test]
    fn test_updated_at_strictly_increases_with_frozen_clock() {
        let instant = Utc::now();
        let mut repo = InMemoryDeviceRepository::with_clock(Arc::new(FixedClock(instant)));
        let a = repo.add(spine1()).unwrap();
        assert_eq!(a.updated_at(), instant);

        let mut previous = a;
        for role in [DeviceRole::Leaf, DeviceRole::Core, DeviceRole::Access] {
            let update = DeviceUpdate::new().with_role(role);
            let next = repo.update(previous.id(), update).unwrap().unwrap();
            assert!(next.updated_at() > previous.updated_at());
            assert_eq!(next.created_at(), instant);
            assert_eq!(next.id(), previous.id());
            previous = next;
        }
    }

    #[test]
    fn test_delete_removes_from_all_indexes() {
        let mut repo = InMemoryDeviceRepository::new();
        let a = repo.add(spine1()).unwrap();

        assert!(repo.delete(a.id()).unwrap());
        assert!(repo.get_by_id(a.id()).unwrap().is_none());
        assert!(repo.get_by_hostname("spine1").unwrap().is_none());
        assert!(repo.get_all().unwrap().is_empty());
        assert_consistent(&repo);

        // second delete is a miss
        assert!(!repo.delete(a.id()).unwrap());
    }

    #[test]
    fn test_delete_then_add_reuses_keys_with_new_id() {
        let mut repo = InMemoryDeviceRepository::new();
        let a = repo.add(spine1()).unwrap();
        repo.delete(a.id()).unwrap();

        let b = assert_ok!(repo.add(spine1()));
        assert_ne!(a.id(), b.id());
        assert_eq!(repo.get_by_hostname("spine1").unwrap(), Some(b));
        assert_consistent(&repo);
    }

    fn populated() -> InMemoryDeviceRepository {
        let mut repo = InMemoryDeviceRepository::new();
        let rows = [
            ("spine1", "10.0.0.1", DevicePlatform::Eos, DeviceRole::Spine, "dc1"),
            ("spine2", "10.0.0.2", DevicePlatform::Eos, DeviceRole::Spine, "dc2"),
            ("leaf1", "10.0.1.1", DevicePlatform::Nxos, DeviceRole::Leaf, "dc1"),
            ("leaf2", "10.0.1.2", DevicePlatform::Eos, DeviceRole::Leaf, "dc1"),
            ("border1", "10.0.2.1", DevicePlatform::Junos, DeviceRole::Border, "dc2"),
        ];
        for (hostname, ip, platform, role, site) in rows {
            repo.add(create(hostname, ip, platform, role, site)).unwrap();
        }
        repo
    }

    fn hostnames(devices: &[Device]) -> HashSet<String> {
        devices.iter().map(|d| d.hostname().to_string()).collect()
    }

    #[test]
    fn test_filter_without_criteria_returns_all() {
        let repo = populated();
        let all = repo.get_all().unwrap();
        let filtered = repo.filter_by(&DeviceFilter::new()).unwrap();
        assert_eq!(hostnames(&filtered), hostnames(&all));
        assert_eq!(filtered.len(), 5);
    }

    #[test]
    fn test_filter_conjunction() {
        let repo = populated();
        let filter = DeviceFilter::new().role(DeviceRole::Spine).site("dc1");
        let filtered = repo.filter_by(&filter).unwrap();

        let expected: Vec<Device> = repo
            .get_all()
            .unwrap()
            .into_iter()
            .filter(|d| d.role() == DeviceRole::Spine && d.site() == "dc1")
            .collect();
        assert_eq!(filtered, expected);
        assert_eq!(hostnames(&filtered), HashSet::from(["spine1".to_string()]));
    }

    #[test]
    fn test_filter_single_criteria() {
        let repo = populated();

        let eos = repo.filter_by(&DeviceFilter::new().platform(DevicePlatform::Eos)).unwrap();
        assert_eq!(
            hostnames(&eos),
            HashSet::from(["spine1".to_string(), "spine2".to_string(), "leaf2".to_string()])
        );

        let dc2 = repo.filter_by(&DeviceFilter::new().site("dc2")).unwrap();
        assert_eq!(
            hostnames(&dc2),
            HashSet::from(["spine2".to_string(), "border1".to_string()])
        );
    }

    #[test]
    fn test_filter_no_match_is_empty() {
        let repo = populated();
        let filter = DeviceFilter::new()
            .platform(DevicePlatform::IosXe)
            .role(DeviceRole::Access);
        assert!(repo.filter_by(&filter).unwrap().is_empty());

        // site matching is exact
        assert!(repo.filter_by(&DeviceFilter::new().site("DC1")).unwrap().is_empty());
    }

    #[test]
    fn test_indexes_stay_consistent_across_mixed_operations() {
        let mut repo = populated();
        let leaf1 = repo.get_by_hostname("leaf1").unwrap().unwrap();
        let spine2 = repo.get_by_hostname("spine2").unwrap().unwrap();

        repo.update(leaf1.id(), DeviceUpdate::new().with_hostname("leaf1a").unwrap())
            .unwrap();
        let _ = repo.update(spine2.id(), DeviceUpdate::new().with_hostname("leaf2").unwrap());
        repo.delete(spine2.id()).unwrap();
        repo.add(create("spine2", "10.0.0.2", DevicePlatform::Eos, DeviceRole::Spine, "dc2"))
            .unwrap();

        assert_eq!(repo.len().unwrap(), 5);
        assert_consistent(&repo);
    }
}
