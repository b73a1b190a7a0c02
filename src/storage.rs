/*!
 * Dictionary Storage
 *
 * The two storage behaviours a dictionary can have:
 *
 * - `Rom`: a fixed table of key/value pairs compiled into the firmware.
 * - `RamStore`: records packed into a byte-addressable `Backend`.
 *
 * RAM record layout, starting at position 0:
 *
 * ```text
 * header:u16be [key bytes] value_len:u16be [value bytes]
 *
 * header 0x0001..=0x7FFF   compact key id (see KeyIndex)
 * header 0x8000 | n        n inline key bytes follow (1..=255)
 * header 0x0000 | 0xFFFF   end of records
 * ```
 */

use crate::backend::{Backend, SENTINEL};
use crate::error::{Error, Result};
use crate::keyindex::KeyIndex;
use bytes::Bytes;

/// Header flag marking an inline key name
const INLINE_FLAG: u16 = 0x8000;
/// Fixed bytes per record: header + value length
const RECORD_OVERHEAD: usize = 4;

/// Longest key stored by name
pub const MAX_INLINE_KEY: usize = 255;
/// Longest value a record can hold
pub const MAX_VALUE: usize = u16::MAX as usize;

/// Read-only key/value table, scanned in order; first match wins
#[derive(Debug, Clone, Copy)]
pub struct Rom {
    pairs: &'static [(&'static str, &'static str)],
}

impl Rom {
    pub const fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Self { pairs }
    }

    pub fn get(&self, key: &[u8]) -> Option<&'static str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.as_bytes() == key)
            .map(|(_, v)| *v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pairs.iter().map(|(k, _)| *k)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyRef {
    Id(u16),
    Inline { pos: usize, len: usize },
}

/// Location of one record inside the backend
#[derive(Debug, Clone, Copy)]
struct Record {
    pos: usize,
    key: KeyRef,
    value_pos: usize,
    value_len: usize,
    end: usize,
}

impl Record {
    fn len(&self) -> usize {
        self.end - self.pos
    }

    fn is_key(&self, backend: &dyn Backend, key: &[u8], id: Option<u16>) -> bool {
        match self.key {
            KeyRef::Id(rid) => id == Some(rid),
            KeyRef::Inline { pos, len } => {
                len == key.len() && key.iter().enumerate().all(|(i, b)| backend.fetch(pos + i) == *b)
            }
        }
    }
}

/// Walks records from position 0; `pos` ends on the first free byte
struct Records<'a> {
    backend: &'a dyn Backend,
    pos: usize,
}

impl<'a> Records<'a> {
    fn new(backend: &'a dyn Backend) -> Self {
        Self { backend, pos: 0 }
    }
}

impl Iterator for Records<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let cap = self.backend.capacity();
        let pos = self.pos;
        if pos + RECORD_OVERHEAD > cap {
            return None;
        }

        let header = read_u16(self.backend, pos);
        if header == 0 || header == u16::MAX {
            return None;
        }

        let (key, key_len) = if header & INLINE_FLAG == 0 {
            (KeyRef::Id(header), 0)
        } else {
            let len = (header & !INLINE_FLAG) as usize;
            if len == 0 || len > MAX_INLINE_KEY {
                return None;
            }
            (KeyRef::Inline { pos: pos + 2, len }, len)
        };

        let len_pos = pos + 2 + key_len;
        if len_pos + 2 > cap {
            return None;
        }
        let value_len = read_u16(self.backend, len_pos) as usize;
        let value_pos = len_pos + 2;
        let end = value_pos + value_len;
        if end > cap {
            return None;
        }

        self.pos = end;
        Some(Record {
            pos,
            key,
            value_pos,
            value_len,
            end,
        })
    }
}

/// Key/value records over a `Backend`, keys compacted through a `KeyIndex`
///
/// Every byte goes through `Backend::fetch`/`Backend::store`.
pub struct RamStore<'a> {
    backend: &'a mut dyn Backend,
    index: &'a KeyIndex,
}

impl<'a> RamStore<'a> {
    pub fn new(backend: &'a mut dyn Backend, index: &'a KeyIndex) -> Self {
        Self { backend, index }
    }

    /// Value stored under `key`
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let rec = self.find(key)?;
        Some(
            (rec.value_pos..rec.value_pos + rec.value_len)
                .map(|p| self.backend.fetch(p))
                .collect(),
        )
    }

    /// Store `value` under `key`, replacing any previous value
    ///
    /// When the new record does not fit the previous value is kept.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let id = self.index.resolve(key);
        if key.is_empty() || (id.is_none() && key.len() > MAX_INLINE_KEY) {
            return Err(Error::InvalidKey);
        }
        if value.len() > MAX_VALUE {
            return Err(Error::StorageFull);
        }

        let key_len = if id.is_some() { 0 } else { key.len() };
        let need = RECORD_OVERHEAD + key_len + value.len();
        let existing = self.find(key);
        let used = self.used();
        let freed = existing.map_or(0, |r| r.len());
        if used - freed + need > self.backend.capacity() {
            return Err(Error::StorageFull);
        }

        if let Some(rec) = existing {
            self.remove(&rec, used);
        }

        let at = used - freed;
        match id {
            Some(id) => self.write_u16(at, id),
            None => {
                self.write_u16(at, INLINE_FLAG | key.len() as u16);
                self.write_bytes(at + 2, key);
            }
        }
        self.write_u16(at + 2 + key_len, value.len() as u16);
        self.write_bytes(at + RECORD_OVERHEAD + key_len, value);
        self.terminate(at + need);
        Ok(())
    }

    /// Remove `key`; `false` when it was not present
    pub fn del(&mut self, key: &[u8]) -> bool {
        match self.find(key) {
            Some(rec) => {
                let used = self.used();
                self.remove(&rec, used);
                true
            }
            None => false,
        }
    }

    /// Names of all stored keys in storage order
    ///
    /// Compact ids without a name in the index are listed as `#<id>`.
    pub fn keys(&self) -> Vec<Bytes> {
        Records::new(&*self.backend)
            .map(|rec| match rec.key {
                KeyRef::Id(id) => match self.index.name_of(id) {
                    Some(name) => Bytes::copy_from_slice(name.as_bytes()),
                    None => Bytes::from(format!("#{}", id)),
                },
                KeyRef::Inline { pos, len } => {
                    (pos..pos + len).map(|p| self.backend.fetch(p)).collect()
                }
            })
            .collect()
    }

    /// Bytes occupied by records
    pub fn used(&self) -> usize {
        let mut records = Records::new(&*self.backend);
        while records.next().is_some() {}
        records.pos
    }

    fn find(&self, key: &[u8]) -> Option<Record> {
        let id = self.index.resolve(key);
        Records::new(&*self.backend).find(|rec| rec.is_key(&*self.backend, key, id))
    }

    /// Shift the records after `rec` down over it
    fn remove(&mut self, rec: &Record, used: usize) {
        let len = rec.len();
        for p in rec.end..used {
            let b = self.backend.fetch(p);
            self.backend.store(p - len, b);
        }
        self.terminate(used - len);
    }

    /// Mark `pos` as the end of records when room remains
    fn terminate(&mut self, pos: usize) {
        let end = (pos + 2).min(self.backend.capacity());
        for p in pos..end {
            self.backend.store(p, SENTINEL);
        }
    }

    fn write_u16(&mut self, pos: usize, v: u16) {
        let [hi, lo] = v.to_be_bytes();
        self.backend.store(pos, hi);
        self.backend.store(pos + 1, lo);
    }

    fn write_bytes(&mut self, pos: usize, data: &[u8]) {
        for (i, b) in data.iter().enumerate() {
            self.backend.store(pos + i, *b);
        }
    }
}

fn read_u16(backend: &dyn Backend, pos: usize) -> u16 {
    u16::from_be_bytes([backend.fetch(pos), backend.fetch(pos + 1)])
}
