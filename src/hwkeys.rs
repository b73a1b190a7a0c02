/*!
 * Hardware Key Table
 *
 * Keys whose value comes from live logic (sensors, actuators) instead of
 * dictionary storage. READ and WRITE route through a handler pair per key,
 * with a default pair for unlisted keys.
 */

use crate::command::{Handler, Request};
use crate::error::Error;
use crate::server::Server;
use smol_str::SmolStr;

/// Read and write handlers for one key
#[derive(Clone, Copy)]
pub struct KeyHandlers {
    pub read: Handler,
    pub write: Handler,
}

pub struct HardwareKeys {
    entries: Vec<(SmolStr, KeyHandlers)>,
    default: KeyHandlers,
}

impl HardwareKeys {
    pub fn new(default: KeyHandlers) -> Self {
        Self {
            entries: Vec::new(),
            default,
        }
    }

    pub fn with(mut self, key: impl Into<SmolStr>, read: Handler, write: Handler) -> Self {
        self.entries.push((key.into(), KeyHandlers { read, write }));
        self
    }

    /// Handler pair for `key`, or the default pair
    pub fn lookup(&self, key: &[u8]) -> KeyHandlers {
        self.entries
            .iter()
            .find(|(k, _)| k.as_bytes() == key)
            .map_or(self.default, |(_, h)| *h)
    }
}

impl Default for HardwareKeys {
    /// No hardware keys; every READ/WRITE reports the key missing
    fn default() -> Self {
        Self::new(KeyHandlers {
            read: key_missing,
            write: key_missing,
        })
    }
}

/// Default for unlisted hardware keys
pub fn key_missing(_: &mut Server, req: &mut Request<'_>) {
    req.respond_error(&Error::KeyNotFound);
}
