//! Host collaborator interfaces
//!
//! The core never talks to a concrete input stack. It consumes two
//! collaborators through the traits defined here:
//!
//! - an [`InputBackend`], which hands out [`InputHandle`]s that receive the
//!   decoded events of one virtual device and can be published to (and
//!   withdrawn from) the host's input-event delivery mechanism;
//! - a [`NodePublisher`], which exposes each live instance as an addressable
//!   I/O node (`vinput<id>`).
//!
//! [`memory`] provides in-process implementations of both.

pub mod memory;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::CollaboratorError;
use crate::registry::DeviceId;

/// Bus reported in the device metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    Virtual,
}

/// Input event classes, matching the host's event type numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Syn = 0x00,
    Key = 0x01,
    Rel = 0x02,
    Abs = 0x03,
}

/// One decoded input event as delivered to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: EventKind,
    pub code: u16,
    pub value: i32,
}

impl InputEvent {
    /// Key press (`pressed == true`) or release
    pub fn key(code: u16, pressed: bool) -> Self {
        Self {
            kind: EventKind::Key,
            code,
            value: i32::from(pressed),
        }
    }

    /// Relative axis motion
    pub fn rel(code: u16, delta: i32) -> Self {
        Self {
            kind: EventKind::Rel,
            code,
            value: delta,
        }
    }

    /// End-of-frame marker
    pub fn sync() -> Self {
        Self {
            kind: EventKind::Syn,
            code: 0,
            value: 0,
        }
    }
}

/// Identity and capabilities handed to the host when an instance is published.
///
/// The lifecycle manager fills in the defaults; a provider's `init` may adjust
/// names and declare the event classes and key codes it will emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputMetadata {
    pub name: String,
    pub phys: String,
    pub bus: BusType,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
    pub events: BTreeSet<EventKind>,
    pub keys: BTreeSet<u16>,
}

impl InputMetadata {
    /// Default metadata for the instance exposed as `node`
    pub fn for_node(node: &str) -> Self {
        Self {
            name: "vinput".to_string(),
            phys: format!("{}/input0", node),
            bus: BusType::Virtual,
            vendor: 0x0000,
            product: 0x0000,
            version: 0x0000,
            events: BTreeSet::new(),
            keys: BTreeSet::new(),
        }
    }

    /// Declare an event class
    pub fn enable(&mut self, kind: EventKind) {
        self.events.insert(kind);
    }

    /// Declare a key code (implies `EventKind::Key`)
    pub fn enable_key(&mut self, code: u16) {
        self.events.insert(EventKind::Key);
        self.keys.insert(code);
    }
}

/// Source of input handles (`createHandle`).
pub trait InputBackend: Send + Sync {
    fn create_handle(&self) -> Result<Box<dyn InputHandle>, CollaboratorError>;
}

/// One device's connection to the host input subsystem.
///
/// Dropping the handle destroys it.
pub trait InputHandle: Send {
    /// Make the device visible to the host.
    fn publish(&mut self, metadata: &InputMetadata) -> Result<(), CollaboratorError>;

    /// Withdraw a published device. No-op when not published.
    fn unpublish(&mut self);

    /// Deliver one decoded event.
    fn emit(&mut self, event: InputEvent) -> Result<(), CollaboratorError>;
}

/// Description of the I/O node of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: DeviceId,
    pub name: String,
    pub type_name: String,
}

/// Exposes instances as addressable I/O nodes.
pub trait NodePublisher: Send + Sync {
    fn publish(&self, node: &NodeInfo) -> Result<(), CollaboratorError>;

    fn unpublish(&self, id: DeviceId);
}

/// The pair of collaborators the lifecycle manager drives.
#[derive(Clone)]
pub struct Host {
    pub input: Arc<dyn InputBackend>,
    pub nodes: Arc<dyn NodePublisher>,
}

impl Host {
    pub fn new(input: Arc<dyn InputBackend>, nodes: Arc<dyn NodePublisher>) -> Self {
        Self { input, nodes }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
