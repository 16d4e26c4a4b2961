//! Echo provider: `read` returns the last payload passed to `send`.

use crate::device::{DeviceContext, DeviceOps};
use crate::error::CollaboratorError;

pub const NAME: &str = "echo";

#[derive(Debug, Default, Clone, Copy)]
pub struct Echo;

#[derive(Debug, Default)]
struct LastPayload(Vec<u8>);

impl DeviceOps for Echo {
    fn init(&self, dev: &mut DeviceContext<'_>) -> Result<(), CollaboratorError> {
        dev.metadata().name = "vinput-echo".to_string();
        dev.set_state(LastPayload::default());
        Ok(())
    }

    fn send(&self, dev: &mut DeviceContext<'_>, payload: &[u8]) -> Result<usize, CollaboratorError> {
        let last = dev.state_or_insert_with(LastPayload::default);
        last.0.clear();
        last.0.extend_from_slice(payload);
        Ok(payload.len())
    }

    fn read(&self, dev: &mut DeviceContext<'_>, buf: &mut [u8]) -> Result<usize, CollaboratorError> {
        let Some(last) = dev.state::<LastPayload>() else {
            return Ok(0);
        };
        let n = last.0.len().min(buf.len());
        buf[..n].copy_from_slice(&last.0[..n]);
        Ok(n)
    }
}
