//! Error types for the virtual input core
//!
//! Every failure surfaced by the registry, the lifecycle manager and the I/O
//! dispatch layer is a [`VInputError`]. Failures reported by collaborators
//! (type providers, the host input subsystem, the node publisher) are carried
//! as a [`CollaboratorError`] tagged with the [`Stage`] that produced them.

use crate::registry::DeviceId;

/// Failure reported by a collaborator outside the core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("out of memory")]
    OutOfMemory,

    #[error("device busy")]
    Busy,

    #[error("malformed payload: {0}")]
    BadPayload(String),

    #[error("{0}")]
    Failed(String),
}

impl CollaboratorError {
    /// Shorthand for a free-form failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        CollaboratorError::Failed(msg.into())
    }
}

/// The collaborator call a [`CollaboratorError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Allocating the host input handle
    InputHandle,
    /// Provider `init`
    Init,
    /// Publishing the per-instance I/O node
    PublishNode,
    /// Publishing the handle to the host input subsystem
    PublishInput,
    /// Provider `send`
    Send,
    /// Provider `read`
    Read,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::InputHandle => "input handle allocation",
            Stage::Init => "provider init",
            Stage::PublishNode => "node publish",
            Stage::PublishInput => "input publish",
            Stage::Send => "provider send",
            Stage::Read => "provider read",
        };
        f.write_str(name)
    }
}

/// Errors returned by the virtual input core
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VInputError {
    #[error("no such virtual device type: {0:?}")]
    UnknownType(String),

    #[error("no such virtual device: {0}")]
    NoDevice(i64),

    #[error("all {capacity} virtual device ids are in use")]
    Exhausted { capacity: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("virtual device type {0:?} is already registered")]
    AlreadyRegistered(String),

    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: CollaboratorError,
    },
}

impl VInputError {
    pub(crate) fn no_device(id: DeviceId) -> Self {
        VInputError::NoDevice(id.get() as i64)
    }

    pub(crate) fn collaborator(stage: Stage, source: CollaboratorError) -> Self {
        VInputError::Collaborator { stage, source }
    }

    /// True for both flavours of "not found" (unknown type name, unknown id).
    pub fn is_not_found(&self) -> bool {
        matches!(self, VInputError::UnknownType(_) | VInputError::NoDevice(_))
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, VInputError>;
