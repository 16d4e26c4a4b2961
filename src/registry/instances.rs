//! Registry of virtual device instances

use std::sync::Arc;

use super::DeviceId;
use crate::device::{DeviceType, VirtualDevice};
use crate::error::{Result, VInputError};

#[derive(Debug, Default)]
pub struct InstanceRegistry {
    devices: Vec<Arc<VirtualDevice>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    pub fn insert(&mut self, device: Arc<VirtualDevice>) {
        self.devices.push(device);
    }

    /// Remove by identity. Returns whether it was present.
    pub fn remove(&mut self, device: &Arc<VirtualDevice>) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| !Arc::ptr_eq(d, device));
        self.devices.len() != before
    }

    pub fn find(&self, id: DeviceId) -> Result<Arc<VirtualDevice>> {
        self.devices
            .iter()
            .find(|d| d.id() == id)
            .cloned()
            .ok_or_else(|| VInputError::no_device(id))
    }

    /// Ids of the instances of `kind`, or of every instance when `None`
    pub fn ids_of(&self, kind: Option<&Arc<DeviceType>>) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|d| kind.map_or(true, |k| Arc::ptr_eq(d.kind(), k)))
            .map(|d| d.id())
            .collect();
        ids.sort();
        ids
    }

    pub fn devices(&self) -> &[Arc<VirtualDevice>] {
        &self.devices
    }

    pub fn count(&self) -> usize {
        self.devices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::echo::Echo;

    fn device(raw: usize, kind: &Arc<DeviceType>) -> Arc<VirtualDevice> {
        Arc::new(VirtualDevice::new(
            DeviceId::new(raw).unwrap(),
            Arc::clone(kind),
            "vinput",
        ))
    }

    #[test]
    fn test_insert_find_remove() {
        let kind = DeviceType::new("echo", Echo);
        let mut reg = InstanceRegistry::new();
        let a = device(0, &kind);
        let b = device(5, &kind);
        reg.insert(Arc::clone(&a));
        reg.insert(Arc::clone(&b));

        assert!(Arc::ptr_eq(&reg.find(DeviceId::new(5).unwrap()).unwrap(), &b));
        assert_eq!(
            reg.find(DeviceId::new(6).unwrap()).unwrap_err(),
            VInputError::NoDevice(6)
        );

        assert!(reg.remove(&a));
        assert!(!reg.remove(&a));
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn test_ids_of_filters_by_type() {
        let echo = DeviceType::new("echo", Echo);
        let other = DeviceType::new("other", Echo);
        let mut reg = InstanceRegistry::new();
        reg.insert(device(3, &echo));
        reg.insert(device(1, &other));
        reg.insert(device(0, &echo));

        let raw = |ids: Vec<DeviceId>| ids.into_iter().map(DeviceId::get).collect::<Vec<_>>();
        assert_eq!(raw(reg.ids_of(Some(&echo))), vec![0, 3]);
        assert_eq!(raw(reg.ids_of(Some(&other))), vec![1]);
        assert_eq!(raw(reg.ids_of(None)), vec![0, 1, 3]);
    }
}
