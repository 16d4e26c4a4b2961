//! Lifecycle manager
//!
//! [`VInput`] owns the registry and drives the host collaborators. It creates
//! instances in stages, each undone in reverse order if a later stage fails:
//!
//! 1. resolve the requested type
//! 2. reserve an id and register the (not yet live) instance
//! 3. allocate the host input handle
//! 4. run the provider's `init`
//! 5. publish the instance's I/O node
//! 6. publish the input handle to the host
//! 7. go live, if the type is still registered
//!
//! Destruction closes the instance (waiting for in-flight I/O), withdraws it
//! from the node table and the host, unregisters it and releases its id, and
//! finally drops its handle and provider state.
//!
//! The registry lock is taken only inside `Registry` calls; no collaborator is
//! ever called with it held.

mod rollback;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::config::{Options, TeardownScope};
use crate::device::DeviceType;
use crate::error::{Result, Stage, VInputError};
use crate::host::Host;
use crate::registry::{DeviceId, Registry, RegistrySnapshot};

use rollback::Rollback;

/// The virtual input subsystem.
#[derive(Debug)]
pub struct VInput {
    registry: Registry,
    host: Host,
    options: Options,
}

impl VInput {
    /// Bring the subsystem up with default options.
    pub fn new(host: Host) -> Self {
        Self::with_options(host, Options::default())
    }

    pub fn with_options(host: Host, options: Options) -> Self {
        log::info!("vinput: Loading virtual input driver");
        Self {
            registry: Registry::new(),
            host,
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a device type provider.
    pub fn register_type(&self, kind: Arc<DeviceType>) -> Result<()> {
        let name = kind.name().to_string();
        self.registry.register_type(kind, self.options.duplicates)?;
        log::info!("vinput: registered new virtual input device '{}'", name);
        Ok(())
    }

    /// Unregister a device type provider and tear down instances per the
    /// configured [`TeardownScope`].
    pub fn unregister_type(&self, kind: &Arc<DeviceType>) {
        if !self.registry.unregister_type(kind) {
            log::warn!("vinput: device type '{}' is not registered", kind.name());
            return;
        }

        let victims = match self.options.teardown {
            TeardownScope::All => self.registry.device_ids(None),
            TeardownScope::Owned => self.registry.device_ids(Some(kind)),
        };
        for id in victims {
            if let Err(e) = self.destroy(id) {
                log::debug!("vinput: skipping vinput{} during teardown: {}", id, e);
            }
        }

        log::info!("vinput: unregistered virtual input device '{}'", kind.name());
    }

    /// Create an instance of the type answering to `type_name`.
    pub fn create(&self, type_name: &str) -> Result<DeviceId> {
        let kind = self.registry.resolve(type_name).inspect_err(|_| {
            log::info!("vinput: This virtual device isn't registered");
        })?;

        let device = self.registry.admit(&kind, &self.options.node_prefix)?;
        let id = device.id();

        let mut rollback = Rollback::new();
        rollback.defer("registry entry", || self.registry.evict(&device));

        let handle = self.host.input.create_handle().map_err(|e| {
            log::error!("vinput: Cannot allocate vinput input device");
            VInputError::collaborator(Stage::InputHandle, e)
        })?;
        device.attach_handle(handle);
        rollback.defer("input handle", || device.discard_resources());

        device.initialize()?;
        rollback.defer("provider state", || device.clear_state());

        self.host
            .nodes
            .publish(&device.node_info())
            .map_err(|e| VInputError::collaborator(Stage::PublishNode, e))?;
        rollback.defer("node", || self.host.nodes.unpublish(id));

        device.publish_input()?;
        rollback.defer("input publish", || device.unpublish_input());

        // The type may have been unregistered while this instance was being
        // set up; its teardown could not see a starting instance.
        if !self.registry.activate(&device) {
            log::info!(
                "vinput: device type '{}' went away during create",
                kind.name()
            );
            return Err(VInputError::UnknownType(kind.name().to_string()));
        }
        rollback.commit();

        log::info!(
            "{}: Registered virtual input {} {}",
            device.node_name(),
            kind.name(),
            id
        );
        Ok(id)
    }

    /// Tear down the live instance `id`.
    pub fn destroy(&self, id: DeviceId) -> Result<()> {
        let device = self.registry.find(id).inspect_err(|_| {
            log::error!("vinput: No such vinput device {}", id);
        })?;

        // Losing this race to another destroy, or to a create still in
        // progress, is a plain "no such device".
        let mut resources = device.close().ok_or_else(|| VInputError::no_device(id))?;

        self.host.nodes.unpublish(id);
        resources.unpublish_input();

        self.registry.evict(&device);

        drop(resources);
        log::debug!("vinput: released {}.", device.node_name());
        Ok(())
    }

    /// Tear down every live instance. Types stay registered.
    pub fn shutdown(&self) {
        log::info!("vinput: Unloading virtual input driver");
        self.destroy_all();
    }

    fn destroy_all(&self) {
        for id in self.registry.device_ids(None) {
            if let Err(e) = self.destroy(id) {
                log::debug!("vinput: skipping vinput{} during shutdown: {}", id, e);
            }
        }
    }

    /// Consistent copy of the registered types and instances.
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }
}

impl Drop for VInput {
    fn drop(&mut self) {
        self.destroy_all();
    }
}
