//! Keyboard provider
//!
//! A payload is whitespace-separated key tokens:
//!
//! | token   | effect                    |
//! |---------|---------------------------|
//! | `+CODE` | press                     |
//! | `-CODE` | release                   |
//! | `CODE`  | tap (press, then release) |
//!
//! `CODE` is a key code in decimal or `0x` hex. Every payload is validated
//! as a whole before any event goes out, and ends with a sync event. `read`
//! reports the keys currently held, ascending, space separated.

use std::collections::BTreeSet;

use crate::device::{DeviceContext, DeviceOps};
use crate::error::CollaboratorError;
use crate::host::{EventKind, InputEvent};

pub const NAME: &str = "keyboard";

/// Highest key code the keyboard declares
pub const KEY_MAX: u16 = 0x2ff;

#[derive(Debug, Default, Clone, Copy)]
pub struct Keyboard;

#[derive(Debug, Default)]
struct HeldKeys(BTreeSet<u16>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Press(u16),
    Release(u16),
    Tap(u16),
}

fn parse_code(text: &str) -> Option<u16> {
    let code = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok()?,
        None => text.parse::<u16>().ok()?,
    };
    (1..=KEY_MAX).contains(&code).then_some(code)
}

fn parse_token(token: &str) -> Result<KeyAction, CollaboratorError> {
    let action = if let Some(code) = token.strip_prefix('+') {
        parse_code(code).map(KeyAction::Press)
    } else if let Some(code) = token.strip_prefix('-') {
        parse_code(code).map(KeyAction::Release)
    } else {
        parse_code(token).map(KeyAction::Tap)
    };
    action.ok_or_else(|| CollaboratorError::BadPayload(format!("bad key token '{}'", token)))
}

fn parse_payload(payload: &[u8]) -> Result<Vec<KeyAction>, CollaboratorError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| CollaboratorError::BadPayload("key tokens must be UTF-8".to_string()))?;
    text.split(|c: char| c.is_whitespace() || c == '\0')
        .filter(|t| !t.is_empty())
        .map(parse_token)
        .collect()
}

impl DeviceOps for Keyboard {
    fn init(&self, dev: &mut DeviceContext<'_>) -> Result<(), CollaboratorError> {
        let meta = dev.metadata();
        meta.name = "vinput-keyboard".to_string();
        meta.enable(EventKind::Syn);
        for code in 1..=KEY_MAX {
            meta.enable_key(code);
        }
        dev.set_state(HeldKeys::default());
        Ok(())
    }

    fn send(&self, dev: &mut DeviceContext<'_>, payload: &[u8]) -> Result<usize, CollaboratorError> {
        let actions = parse_payload(payload)?;
        if actions.is_empty() {
            return Ok(payload.len());
        }

        let mut events = Vec::with_capacity(actions.len() * 2 + 1);
        for action in &actions {
            match *action {
                KeyAction::Press(code) => events.push(InputEvent::key(code, true)),
                KeyAction::Release(code) => events.push(InputEvent::key(code, false)),
                KeyAction::Tap(code) => {
                    events.push(InputEvent::key(code, true));
                    events.push(InputEvent::key(code, false));
                }
            }
        }
        events.push(InputEvent::sync());

        for event in events {
            dev.emit(event)?;
        }

        let held = dev.state_or_insert_with(HeldKeys::default);
        for action in actions {
            match action {
                KeyAction::Press(code) => {
                    held.0.insert(code);
                }
                KeyAction::Release(code) | KeyAction::Tap(code) => {
                    held.0.remove(&code);
                }
            }
        }
        Ok(payload.len())
    }

    fn read(&self, dev: &mut DeviceContext<'_>, buf: &mut [u8]) -> Result<usize, CollaboratorError> {
        let Some(held) = dev.state::<HeldKeys>() else {
            return Ok(0);
        };
        if held.0.is_empty() {
            return Ok(0);
        }
        let codes: Vec<String> = held.0.iter().map(u16::to_string).collect();
        let text = format!("{}\n", codes.join(" "));
        let n = text.len().min(buf.len());
        buf[..n].copy_from_slice(&text.as_bytes()[..n]);
        Ok(n)
    }
}
