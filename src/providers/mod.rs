//! Reference device type providers
//!
//! - `echo`: remembers the last payload written and reads it back
//! - `keyboard`: decodes key tokens into key events

pub mod echo;
pub mod keyboard;

use std::sync::Arc;

use crate::device::DeviceType;

pub use echo::Echo;
pub use keyboard::Keyboard;

/// Fresh descriptors for all built-in providers, in registration order.
pub fn builtin() -> Vec<Arc<DeviceType>> {
    vec![
        DeviceType::new(echo::NAME, Echo),
        DeviceType::new(keyboard::NAME, Keyboard),
    ]
}
