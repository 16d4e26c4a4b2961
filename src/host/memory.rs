//! In-process host collaborators
//!
//! `MemoryInput` plays the role of the host input subsystem and `NodeTable`
//! the role of the character-device node table. Both record everything they
//! are asked to do so callers can inspect it, and both accept one-shot fault
//! injection so failure paths of the lifecycle manager can be driven.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{InputBackend, InputEvent, InputHandle, InputMetadata, NodeInfo, NodePublisher};
use crate::error::CollaboratorError;
use crate::registry::DeviceId;

/// A collaborator call that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFault {
    CreateHandle,
    Publish,
}

#[derive(Debug, Clone, Default)]
struct HandleRecord {
    metadata: Option<InputMetadata>,
    events: Vec<InputEvent>,
}

#[derive(Debug, Default)]
struct InputState {
    next_serial: u64,
    handles: BTreeMap<u64, HandleRecord>,
    faults: Vec<InputFault>,
}

impl InputState {
    fn take_fault(&mut self, fault: InputFault) -> bool {
        match self.faults.iter().position(|f| *f == fault) {
            Some(pos) => {
                self.faults.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Loopback input subsystem.
#[derive(Debug, Default)]
pub struct MemoryInput {
    state: Arc<Mutex<InputState>>,
}

impl MemoryInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next matching call fail.
    pub fn inject(&self, fault: InputFault) {
        self.state.lock().faults.push(fault);
    }

    /// Number of handles that exist (published or not)
    pub fn handle_count(&self) -> usize {
        self.state.lock().handles.len()
    }

    /// Metadata of every published device
    pub fn published(&self) -> Vec<InputMetadata> {
        self.state
            .lock()
            .handles
            .values()
            .filter_map(|r| r.metadata.clone())
            .collect()
    }

    /// Events delivered to the published device with the given `phys`
    pub fn events(&self, phys: &str) -> Vec<InputEvent> {
        self.state
            .lock()
            .handles
            .values()
            .find(|r| r.metadata.as_ref().is_some_and(|m| m.phys == phys))
            .map(|r| r.events.clone())
            .unwrap_or_default()
    }
}

impl InputBackend for MemoryInput {
    fn create_handle(&self) -> Result<Box<dyn InputHandle>, CollaboratorError> {
        let mut state = self.state.lock();
        if state.take_fault(InputFault::CreateHandle) {
            return Err(CollaboratorError::OutOfMemory);
        }
        let serial = state.next_serial;
        state.next_serial += 1;
        state.handles.insert(serial, HandleRecord::default());
        Ok(Box::new(MemoryHandle {
            serial,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryHandle {
    serial: u64,
    state: Arc<Mutex<InputState>>,
}

impl InputHandle for MemoryHandle {
    fn publish(&mut self, metadata: &InputMetadata) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock();
        if state.take_fault(InputFault::Publish) {
            return Err(CollaboratorError::failed("input device registration refused"));
        }
        let record = state
            .handles
            .get_mut(&self.serial)
            .ok_or_else(|| CollaboratorError::failed("stale input handle"))?;
        record.metadata = Some(metadata.clone());
        Ok(())
    }

    fn unpublish(&mut self) {
        if let Some(record) = self.state.lock().handles.get_mut(&self.serial) {
            record.metadata = None;
        }
    }

    fn emit(&mut self, event: InputEvent) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock();
        match state.handles.get_mut(&self.serial) {
            Some(record) if record.metadata.is_some() => {
                record.events.push(event);
                Ok(())
            }
            _ => Err(CollaboratorError::failed("input device not registered")),
        }
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.state.lock().handles.remove(&self.serial);
    }
}

#[derive(Debug, Default)]
struct NodeState {
    nodes: BTreeMap<DeviceId, NodeInfo>,
    fail_next: bool,
}

/// Table of published I/O nodes.
#[derive(Debug, Default)]
pub struct NodeTable {
    state: Mutex<NodeState>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `publish` fail.
    pub fn fail_next_publish(&self) {
        self.state.lock().fail_next = true;
    }

    pub fn get(&self, id: DeviceId) -> Option<NodeInfo> {
        self.state.lock().nodes.get(&id).cloned()
    }

    /// Node names in id order
    pub fn names(&self) -> Vec<String> {
        self.state
            .lock()
            .nodes
            .values()
            .map(|n| n.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NodePublisher for NodeTable {
    fn publish(&self, node: &NodeInfo) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next) {
            return Err(CollaboratorError::Busy);
        }
        if state.nodes.contains_key(&node.id) {
            return Err(CollaboratorError::failed(format!(
                "node {} already exists",
                node.name
            )));
        }
        state.nodes.insert(node.id, node.clone());
        Ok(())
    }

    fn unpublish(&self, id: DeviceId) {
        if self.state.lock().nodes.remove(&id).is_none() {
            log::warn!("vinput: unpublish of unknown node {}", id);
        }
    }
}
