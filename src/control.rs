//! Control-plane commands
//!
//! The control surface takes two write-only text attributes: `export`
//! (create an instance of the named type) and `unexport` (destroy the
//! instance with the given id). Both report the full input length as
//! accepted on success.

use crate::error::{Result, VInputError};
use crate::lifecycle::VInput;
use crate::registry::DeviceId;

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// `export <type-name>` / `create <type-name>`
    Export(String),
    /// `unexport <id>` / `destroy <id>`
    Unexport(String),
}

impl ControlCommand {
    /// Split a `<verb> <argument>` line. The argument is kept verbatim.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_start();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim_start()),
            None => (line.trim_end(), ""),
        };
        match verb {
            "export" | "create" => Ok(ControlCommand::Export(arg.to_string())),
            "unexport" | "destroy" => Ok(ControlCommand::Unexport(arg.to_string())),
            other => Err(VInputError::InvalidArgument(format!(
                "unknown control command '{}'",
                other
            ))),
        }
    }
}

/// Parse an `unexport` argument into an instance id.
///
/// Whitespace and a trailing newline are tolerated. Numbers that parse but
/// cannot name an instance are `NoDevice`, not `InvalidArgument`.
pub fn parse_id(buf: &str) -> Result<DeviceId> {
    let text = buf.trim();
    let raw: i64 = text
        .parse()
        .map_err(|_| VInputError::InvalidArgument(format!("'{}' is not a device id", text)))?;
    usize::try_from(raw)
        .ok()
        .and_then(DeviceId::new)
        .ok_or(VInputError::NoDevice(raw))
}

impl VInput {
    /// Handle a write to the `export` attribute.
    pub fn export(&self, buf: &str) -> Result<usize> {
        self.create(buf)?;
        Ok(buf.len())
    }

    /// Handle a write to the `unexport` attribute.
    pub fn unexport(&self, buf: &str) -> Result<usize> {
        let id = parse_id(buf).inspect_err(|e| {
            if let VInputError::NoDevice(raw) = e {
                log::error!("vinput: No such vinput device {}", raw);
            }
        })?;
        self.destroy(id)?;
        Ok(buf.len())
    }

    /// Dispatch a parsed command.
    pub fn control(&self, command: &ControlCommand) -> Result<usize> {
        match command {
            ControlCommand::Export(name) => self.export(name),
            ControlCommand::Unexport(id) => self.unexport(id),
        }
    }
}
