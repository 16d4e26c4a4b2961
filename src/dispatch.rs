//! I/O dispatch
//!
//! A [`DeviceFile`] is an open endpoint bound to one instance. Reads and writes
//! go through a bounded staging buffer to the instance's provider, under the
//! instance lock only; the registry lock is taken once, at open.
//!
//! The file holds the instance alive. After the instance is destroyed every
//! call on the file fails with `NoDevice`.

use std::sync::Arc;

use crate::device::VirtualDevice;
use crate::error::{Result, Stage, VInputError};
use crate::host::InputMetadata;
use crate::lifecycle::VInput;
use crate::registry::DeviceId;

/// Largest message a single write may carry, and the most a read can produce.
pub const VINPUT_MAX_LEN: usize = 128;

/// An open per-instance endpoint.
#[derive(Debug)]
pub struct DeviceFile {
    device: Arc<VirtualDevice>,
    pos: usize,
}

impl DeviceFile {
    pub fn id(&self) -> DeviceId {
        self.device.id()
    }

    pub fn node_name(&self) -> &str {
        self.device.node_name()
    }

    /// Metadata the instance was published with
    pub fn metadata(&self) -> InputMetadata {
        self.device.metadata()
    }

    /// Read cursor
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Hand `bytes` to the provider's `send`. Returns the bytes consumed.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        let len = bytes.len();
        if len > VINPUT_MAX_LEN {
            log::warn!(
                "{}: write of {} bytes exceeds {}",
                self.device.node_name(),
                len,
                VINPUT_MAX_LEN
            );
            return Err(VInputError::InvalidArgument(format!(
                "message of {} bytes exceeds the {} byte limit",
                len, VINPUT_MAX_LEN
            )));
        }

        let mut staging = [0u8; VINPUT_MAX_LEN + 1];
        staging[..len].copy_from_slice(bytes);

        let sent = self.device.with_context(|ops, ctx| {
            ops.send(ctx, &staging[..len])
                .map_err(|e| VInputError::collaborator(Stage::Send, e))
        })?;
        Ok(sent.min(len))
    }

    /// Read up to `max_len` bytes at the cursor and advance it.
    pub fn read(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let data = self.read_at(self.pos, max_len)?;
        self.pos += data.len();
        Ok(data)
    }

    /// Render the instance and return bytes `[offset, offset + max_len)` of it.
    ///
    /// Past the end of what the provider produced the result is empty.
    pub fn read_at(&self, offset: usize, max_len: usize) -> Result<Vec<u8>> {
        let mut staging = [0u8; VINPUT_MAX_LEN];
        let produced = self.device.with_context(|ops, ctx| {
            ops.read(ctx, &mut staging)
                .map_err(|e| VInputError::collaborator(Stage::Read, e))
        })?;
        let produced = produced.min(VINPUT_MAX_LEN);

        if offset >= produced {
            return Ok(Vec::new());
        }
        let end = produced.min(offset.saturating_add(max_len));
        Ok(staging[offset..end].to_vec())
    }
}

impl VInput {
    /// Open the endpoint of live instance `id`.
    pub fn open(&self, id: DeviceId) -> Result<DeviceFile> {
        let device = self.registry().find(id)?;
        if !device.is_live() {
            return Err(VInputError::no_device(id));
        }
        Ok(DeviceFile { device, pos: 0 })
    }

    /// One-shot write to instance `id`.
    pub fn write(&self, id: DeviceId, bytes: &[u8]) -> Result<usize> {
        self.open(id)?.write(bytes)
    }

    /// One-shot read from instance `id`.
    pub fn read(&self, id: DeviceId, offset: usize, max_len: usize) -> Result<Vec<u8>> {
        self.open(id)?.read_at(offset, max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryInput, NodeTable};
    use crate::host::Host;
    use crate::providers;

    fn vinput() -> VInput {
        let host = Host::new(Arc::new(MemoryInput::new()), Arc::new(NodeTable::new()));
        let vinput = VInput::new(host);
        for kind in providers::builtin() {
            vinput.register_type(kind).unwrap();
        }
        vinput
    }

    #[test]
    fn test_write_limit_boundary() {
        let vinput = vinput();
        let id = vinput.create("echo").unwrap();
        let file = vinput.open(id).unwrap();

        let max = vec![b'x'; VINPUT_MAX_LEN];
        assert_eq!(file.write(&max).unwrap(), VINPUT_MAX_LEN);

        let over = vec![b'x'; VINPUT_MAX_LEN + 1];
        assert!(matches!(file.write(&over), Err(VInputError::InvalidArgument(_))));
        assert_eq!(file.read_at(0, VINPUT_MAX_LEN).unwrap(), max);
    }

    #[test]
    fn test_read_window_is_clamped() {
        let vinput = vinput();
        let id = vinput.create("echo").unwrap();
        vinput.write(id, b"hello world").unwrap();

        assert_eq!(vinput.read(id, 0, 5).unwrap(), b"hello");
        assert_eq!(vinput.read(id, 6, 100).unwrap(), b"world");
        assert_eq!(vinput.read(id, 11, 4).unwrap(), b"");
        assert_eq!(vinput.read(id, 500, 4).unwrap(), b"");
        assert_eq!(vinput.read(id, 3, usize::MAX).unwrap(), b"lo world");
    }

    #[test]
    fn test_cursor_advances_and_seeks() {
        let vinput = vinput();
        let id = vinput.create("echo").unwrap();
        let mut file = vinput.open(id).unwrap();
        file.write(b"abcdef").unwrap();

        assert_eq!(file.read(4).unwrap(), b"abcd");
        assert_eq!(file.position(), 4);
        assert_eq!(file.read(4).unwrap(), b"ef");
        assert_eq!(file.read(4).unwrap(), b"");
        file.seek(0);
        assert_eq!(file.read(2).unwrap(), b"ab");
    }

    #[test]
    fn test_open_unknown_id() {
        let vinput = vinput();
        let id = DeviceId::new(5).unwrap();
        assert_eq!(vinput.open(id).unwrap_err(), VInputError::NoDevice(5));
    }

    #[test]
    fn test_file_outlives_destroy() {
        let vinput = vinput();
        let id = vinput.create("echo").unwrap();
        let file = vinput.open(id).unwrap();
        vinput.destroy(id).unwrap();

        assert_eq!(file.write(b"late").unwrap_err(), VInputError::NoDevice(id.get() as i64));
        assert_eq!(file.read_at(0, 4).unwrap_err(), VInputError::NoDevice(id.get() as i64));
    }

    #[test]
    fn test_bad_payload_leaves_instance_usable() {
        let vinput = vinput();
        let id = vinput.create("keyboard").unwrap();
        let err = vinput.write(id, b"+30 nonsense").unwrap_err();
        assert!(matches!(
            err,
            VInputError::Collaborator {
                stage: Stage::Send,
                ..
            }
        ));
        assert_eq!(vinput.write(id, b"+30 +42").unwrap(), 7);
        assert_eq!(vinput.read(id, 0, 64).unwrap(), b"30 42\n");
    }
}
