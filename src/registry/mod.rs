//! Device registry
//!
//! Holds the shared bookkeeping (id allocator, type registry, instance
//! registry) behind one lock. The lock is never exposed: callers get
//! operation-level methods that each take the lock, do one consistent update
//! and release it, so nobody can observe a half-applied change (an id
//! reserved with no instance, or the reverse).
//!
//! The lock is never held while a collaborator runs; the lifecycle manager
//! calls in here before and after provider and host calls, not around them.

pub mod ids;
pub mod instances;
pub mod types;

pub use ids::{DeviceId, IdAllocator, CAPACITY};
pub use instances::InstanceRegistry;
pub use types::TypeRegistry;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::DuplicatePolicy;
use crate::device::{DeviceType, VirtualDevice};
use crate::error::{Result, VInputError};

#[derive(Debug, Default)]
struct Tables {
    ids: IdAllocator,
    types: TypeRegistry,
    devices: InstanceRegistry,
}

/// Summary of one registered instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub type_name: String,
    pub node: String,
    pub live: bool,
}

/// Consistent copy of the registry taken under the lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub types: Vec<String>,
    pub devices: Vec<DeviceSummary>,
    pub reserved: Vec<DeviceId>,
}

impl RegistrySnapshot {
    /// Ids of registered instances, ascending
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.id).collect()
    }

    /// Ids of live instances, ascending
    pub fn live_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().filter(|d| d.live).map(|d| d.id).collect()
    }
}

/// The lock-owning registry.
#[derive(Debug, Default)]
pub struct Registry {
    tables: Mutex<Tables>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&self, kind: Arc<DeviceType>, policy: DuplicatePolicy) -> Result<()> {
        if kind.name().is_empty() {
            return Err(VInputError::InvalidArgument(
                "device type name must not be empty".to_string(),
            ));
        }
        let mut tables = self.tables.lock();
        if tables.types.contains(&kind) {
            return Err(VInputError::AlreadyRegistered(kind.name().to_string()));
        }
        if policy == DuplicatePolicy::Reject {
            if let Some(existing) = tables.types.conflicting(kind.name()) {
                return Err(VInputError::AlreadyRegistered(existing.name().to_string()));
            }
        }
        tables.types.register(kind);
        Ok(())
    }

    pub fn unregister_type(&self, kind: &Arc<DeviceType>) -> bool {
        self.tables.lock().types.unregister(kind)
    }

    pub fn resolve(&self, request: &str) -> Result<Arc<DeviceType>> {
        self.tables.lock().types.resolve(request)
    }

    /// Reserve an id and register a new, not yet live, instance of `kind`.
    ///
    /// Either both happen or neither does.
    pub fn admit(&self, kind: &Arc<DeviceType>, node_prefix: &str) -> Result<Arc<VirtualDevice>> {
        let mut tables = self.tables.lock();
        let id = tables.ids.reserve()?;
        let device = Arc::new(VirtualDevice::new(id, Arc::clone(kind), node_prefix));
        tables.devices.insert(Arc::clone(&device));
        Ok(device)
    }

    /// Unregister an instance and release its id.
    pub fn evict(&self, device: &Arc<VirtualDevice>) {
        let mut tables = self.tables.lock();
        if tables.devices.remove(device) {
            tables.ids.release(device.id());
        } else {
            log::warn!("vinput: evict of unregistered device {}", device.id());
        }
    }

    /// Mark `device` live, provided its type is still registered.
    ///
    /// The check and the phase change happen under the registry lock, so a
    /// concurrent `unregister_type` either sees the instance live (and can
    /// tear it down) or makes this return `false`.
    pub fn activate(&self, device: &VirtualDevice) -> bool {
        let tables = self.tables.lock();
        if !tables.types.contains(device.kind()) {
            return false;
        }
        device.go_live();
        true
    }

    pub fn find(&self, id: DeviceId) -> Result<Arc<VirtualDevice>> {
        self.tables.lock().devices.find(id)
    }

    /// Ids of instances of `kind` (all instances for `None`)
    pub fn device_ids(&self, kind: Option<&Arc<DeviceType>>) -> Vec<DeviceId> {
        self.tables.lock().devices.ids_of(kind)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let tables = self.tables.lock();
        let mut devices: Vec<DeviceSummary> = tables
            .devices
            .devices()
            .iter()
            .map(|d| DeviceSummary {
                id: d.id(),
                type_name: d.type_name().to_string(),
                node: d.node_name().to_string(),
                live: d.is_live(),
            })
            .collect();
        devices.sort_by_key(|d| d.id);
        RegistrySnapshot {
            types: tables.types.names(),
            devices,
            reserved: tables.ids.reserved(),
        }
    }
}
