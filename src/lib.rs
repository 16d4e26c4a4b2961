// vinput library
// Virtual input device registry, lifecycle manager and I/O dispatch

pub mod cli;
pub mod config;
pub mod control;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod logging;
pub mod providers;
pub mod registry;
pub mod shell;

pub use cli::Cli;
pub use config::{DuplicatePolicy, Options, TeardownScope};
pub use control::ControlCommand;
pub use device::{DeviceContext, DeviceOps, DeviceType, VirtualDevice};
pub use dispatch::{DeviceFile, VINPUT_MAX_LEN};
pub use error::{CollaboratorError, Result, Stage, VInputError};
pub use host::{Host, InputBackend, InputEvent, InputHandle, InputMetadata, NodePublisher};
pub use lifecycle::VInput;
pub use logging::LogLevel;
pub use registry::{DeviceId, RegistrySnapshot, CAPACITY};
pub use shell::Shell;
