//! Device types and virtual device instances
//!
//! A [`DeviceType`] is what a provider registers: a name plus an
//! implementation of [`DeviceOps`]. A [`VirtualDevice`] is one live instance
//! of a type, created by the lifecycle manager.
//!
//! # Thread Safety
//!
//! Every instance carries its own lock over the provider state, the input
//! handle and the instance's lifecycle state. Provider operations always run
//! with that lock held, so a provider never sees concurrent calls for the
//! same instance, while calls for different instances proceed in parallel.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{CollaboratorError, Result, Stage, VInputError};
use crate::host::{InputEvent, InputHandle, InputMetadata, NodeInfo};
use crate::registry::DeviceId;

/// Operations a device type provider implements.
pub trait DeviceOps: Send + Sync {
    /// Prepare a freshly created instance: declare capabilities, set up state.
    fn init(&self, dev: &mut DeviceContext<'_>) -> std::result::Result<(), CollaboratorError>;

    /// Decode `payload` and deliver it. Returns the number of bytes consumed.
    fn send(
        &self,
        dev: &mut DeviceContext<'_>,
        payload: &[u8],
    ) -> std::result::Result<usize, CollaboratorError>;

    /// Render the instance's representation into `buf`. Returns bytes produced.
    fn read(
        &self,
        dev: &mut DeviceContext<'_>,
        buf: &mut [u8],
    ) -> std::result::Result<usize, CollaboratorError>;
}

/// A registered device type.
pub struct DeviceType {
    name: String,
    ops: Box<dyn DeviceOps>,
}

impl DeviceType {
    pub fn new(name: impl Into<String>, ops: impl DeviceOps + 'static) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            ops: Box::new(ops),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ops(&self) -> &dyn DeviceOps {
        self.ops.as_ref()
    }

    /// Prefix-match resolution: this type answers to any request that starts
    /// with its own name, so trailing data in the request is ignored.
    pub fn answers_to(&self, request: &str) -> bool {
        request.as_bytes().starts_with(self.name.as_bytes())
    }
}

impl std::fmt::Debug for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceType")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// What a provider sees of an instance while one of its operations runs.
pub struct DeviceContext<'a> {
    id: DeviceId,
    metadata: &'a mut InputMetadata,
    handle: Option<&'a mut (dyn InputHandle + 'static)>,
    state: &'a mut Option<Box<dyn Any + Send>>,
}

impl<'a> DeviceContext<'a> {
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Metadata that will be (or was) handed to the host on publish.
    pub fn metadata(&mut self) -> &mut InputMetadata {
        &mut *self.metadata
    }

    /// Deliver one event to the host input subsystem.
    pub fn emit(&mut self, event: InputEvent) -> std::result::Result<(), CollaboratorError> {
        match self.handle.as_deref_mut() {
            Some(handle) => handle.emit(event),
            None => Err(CollaboratorError::failed("instance has no input handle")),
        }
    }

    /// Provider state, if set and of type `T`.
    pub fn state<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.state.as_mut().and_then(|s| s.downcast_mut::<T>())
    }

    /// Replace the provider state.
    pub fn set_state<T: Any + Send>(&mut self, value: T) {
        *self.state = Some(Box::new(value));
    }

    /// Provider state, creating it with `f` when absent or of another type.
    pub fn state_or_insert_with<T: Any + Send>(&mut self, f: impl FnOnce() -> T) -> &mut T {
        let fresh = !matches!(self.state.as_ref(), Some(s) if s.is::<T>());
        if fresh {
            *self.state = Some(Box::new(f()));
        }
        match self.state.as_mut().and_then(|s| s.downcast_mut::<T>()) {
            Some(value) => value,
            None => unreachable!("provider state was just set"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Being created; not reachable for I/O or destroy yet.
    Starting,
    Live,
    /// Torn down; outstanding handles see `NoDevice`.
    Closed,
}

struct DeviceInner {
    phase: Phase,
    metadata: InputMetadata,
    handle: Option<Box<dyn InputHandle>>,
    state: Option<Box<dyn Any + Send>>,
}

impl DeviceInner {
    fn context(&mut self, id: DeviceId) -> DeviceContext<'_> {
        DeviceContext {
            id,
            metadata: &mut self.metadata,
            handle: self.handle.as_deref_mut(),
            state: &mut self.state,
        }
    }
}

/// Resources taken out of a closed instance, released on drop.
pub(crate) struct DetachedResources {
    handle: Option<Box<dyn InputHandle>>,
    _state: Option<Box<dyn Any + Send>>,
}

impl DetachedResources {
    /// Withdraw the input handle from the host.
    pub(crate) fn unpublish_input(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.unpublish();
        }
    }
}

/// One virtual device instance.
pub struct VirtualDevice {
    id: DeviceId,
    kind: Arc<DeviceType>,
    node_name: String,
    /// Mirrors `phase == Live` so status queries never take the instance lock.
    live: AtomicBool,
    inner: Mutex<DeviceInner>,
}

impl VirtualDevice {
    pub(crate) fn new(id: DeviceId, kind: Arc<DeviceType>, node_prefix: &str) -> Self {
        let node_name = format!("{}{}", node_prefix, id);
        let metadata = InputMetadata::for_node(&node_name);
        Self {
            id,
            kind,
            node_name,
            live: AtomicBool::new(false),
            inner: Mutex::new(DeviceInner {
                phase: Phase::Starting,
                metadata,
                handle: None,
                state: None,
            }),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn kind(&self) -> &Arc<DeviceType> {
        &self.kind
    }

    pub fn type_name(&self) -> &str {
        self.kind.name()
    }

    /// Name of the I/O node, e.g. `vinput3`
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Snapshot of the metadata handed to the host
    pub fn metadata(&self) -> InputMetadata {
        self.inner.lock().metadata.clone()
    }

    pub(crate) fn node_info(&self) -> NodeInfo {
        NodeInfo {
            id: self.id,
            name: self.node_name.clone(),
            type_name: self.kind.name().to_string(),
        }
    }

    pub(crate) fn attach_handle(&self, handle: Box<dyn InputHandle>) {
        self.inner.lock().handle = Some(handle);
    }

    /// Drop the handle and provider state of an instance that never went live.
    pub(crate) fn discard_resources(&self) {
        let mut inner = self.inner.lock();
        inner.state = None;
        inner.handle = None;
    }

    pub(crate) fn clear_state(&self) {
        self.inner.lock().state = None;
    }

    /// Run the provider's `init`.
    pub(crate) fn initialize(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut ctx = inner.context(self.id);
        self.kind
            .ops()
            .init(&mut ctx)
            .map_err(|e| VInputError::collaborator(Stage::Init, e))
    }

    /// Publish the input handle with the (provider-adjusted) metadata.
    pub(crate) fn publish_input(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let DeviceInner {
            metadata, handle, ..
        } = &mut *inner;
        match handle.as_mut() {
            Some(handle) => handle
                .publish(metadata)
                .map_err(|e| VInputError::collaborator(Stage::PublishInput, e)),
            None => Err(VInputError::collaborator(
                Stage::PublishInput,
                CollaboratorError::failed("instance has no input handle"),
            )),
        }
    }

    /// Withdraw the input handle of an instance that never went live.
    pub(crate) fn unpublish_input(&self) {
        if let Some(handle) = self.inner.lock().handle.as_mut() {
            handle.unpublish();
        }
    }

    pub(crate) fn go_live(&self) {
        let mut inner = self.inner.lock();
        inner.phase = Phase::Live;
        self.live.store(true, Ordering::Release);
    }

    /// Close a live instance and take its resources out.
    ///
    /// Waits for any in-flight provider call, since those hold the instance
    /// lock. Returns `None` if the instance is not live, so two racing
    /// teardowns cannot both succeed.
    pub(crate) fn close(&self) -> Option<DetachedResources> {
        let mut inner = self.inner.lock();
        if inner.phase != Phase::Live {
            return None;
        }
        inner.phase = Phase::Closed;
        self.live.store(false, Ordering::Release);
        Some(DetachedResources {
            handle: inner.handle.take(),
            _state: inner.state.take(),
        })
    }

    /// Run `f` against a live instance with its lock held.
    pub(crate) fn with_context<R>(
        &self,
        f: impl FnOnce(&dyn DeviceOps, &mut DeviceContext<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut inner = self.inner.lock();
        if inner.phase != Phase::Live {
            return Err(VInputError::no_device(self.id));
        }
        let mut ctx = inner.context(self.id);
        f(self.kind.ops(), &mut ctx)
    }
}

impl std::fmt::Debug for VirtualDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDevice")
            .field("id", &self.id)
            .field("type", &self.kind.name())
            .field("node", &self.node_name)
            .finish_non_exhaustive()
    }
}
