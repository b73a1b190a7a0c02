/*!
 * Key Index
 *
 * Maps well-known key names to compact numeric ids so space-constrained
 * backends can store two bytes instead of the full name.
 */

use crate::error::{Error, Result};
use smol_str::SmolStr;

/// Largest id that fits the record header's compact form
pub const MAX_KEY_ID: u16 = 0x7FFF;

/// Ordered name -> id table; first match wins
#[derive(Debug, Default, Clone)]
pub struct KeyIndex {
    entries: Vec<(SmolStr, u16)>,
}

impl KeyIndex {
    /// Build an index, rejecting zero, oversized or duplicate ids
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u16)>,
        S: Into<SmolStr>,
    {
        let mut out: Vec<(SmolStr, u16)> = Vec::new();
        for (name, id) in entries {
            let name = name.into();
            if id == 0 || id > MAX_KEY_ID || out.iter().any(|(_, other)| *other == id) {
                return Err(Error::InvalidKeyIndex(name.to_string()));
            }
            out.push((name, id));
        }
        Ok(Self { entries: out })
    }

    /// Compact id for `key`, or `None` when the key has no mapping
    pub fn resolve(&self, key: &[u8]) -> Option<u16> {
        self.entries
            .iter()
            .find(|(name, _)| name.as_bytes() == key)
            .map(|(_, id)| *id)
    }

    /// Key name registered for `id`
    pub fn name_of(&self, id: u16) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, other)| *other == id)
            .map(|(name, _)| name.as_str())
    }
}
