/*!
 * Dictionary Table
 *
 * Named dictionaries selectable at runtime. Each binds a storage behaviour
 * (ROM table or RAM-style backend) to a name. The table is fixed at
 * startup; only the selection changes.
 */

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::storage::Rom;
use smol_str::SmolStr;

/// Storage behaviour of a dictionary
pub enum Medium {
    /// Read-only fixed pairs
    Rom(Rom),
    /// Byte-addressable records through the Backend interface
    Ram(Box<dyn Backend>),
}

/// Which command behaviour governs a dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Rom,
    Ram,
}

pub struct Dictionary {
    pub name: SmolStr,
    pub medium: Medium,
}

impl Dictionary {
    pub fn rom(name: impl Into<SmolStr>, rom: Rom) -> Self {
        Self {
            name: name.into(),
            medium: Medium::Rom(rom),
        }
    }

    pub fn ram(name: impl Into<SmolStr>, backend: impl Backend + 'static) -> Self {
        Self {
            name: name.into(),
            medium: Medium::Ram(Box::new(backend)),
        }
    }

    pub fn kind(&self) -> Kind {
        match self.medium {
            Medium::Rom(_) => Kind::Rom,
            Medium::Ram(_) => Kind::Ram,
        }
    }
}

/// Ordered dictionaries plus the current selection (the first by default)
pub struct Dictionaries {
    entries: Vec<Dictionary>,
    selected: usize,
}

impl Dictionaries {
    /// # Panics
    /// When `entries` is empty; a server needs at least one dictionary.
    pub fn new(entries: Vec<Dictionary>) -> Self {
        assert!(!entries.is_empty(), "at least one dictionary is required");
        Self {
            entries,
            selected: 0,
        }
    }

    /// Names and kinds in declaration order
    pub fn list(&self) -> impl Iterator<Item = (&str, Kind)> + '_ {
        self.entries.iter().map(|d| (d.name.as_str(), d.kind()))
    }

    /// Select by exact name; the selection is unchanged on failure
    pub fn select(&mut self, name: &[u8]) -> Result<()> {
        let idx = self
            .entries
            .iter()
            .position(|d| d.name.as_bytes() == name)
            .ok_or(Error::DictionaryNotFound)?;
        if idx != self.selected {
            log::debug!("selected dictionary {}", self.entries[idx].name);
            self.selected = idx;
        }
        Ok(())
    }

    pub fn current(&self) -> &Dictionary {
        &self.entries[self.selected]
    }

    pub fn current_mut(&mut self) -> &mut Dictionary {
        &mut self.entries[self.selected]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockRam;

    fn table() -> Dictionaries {
        static ROM: &[(&str, &str)] = &[("vendor", "PatternAgents")];
        Dictionaries::new(vec![
            Dictionary::rom("ROM", Rom::new(ROM)),
            Dictionary::ram("RAM", MockRam::default()),
        ])
    }

    #[test]
    fn first_entry_is_default() {
        let dicts = table();
        assert_eq!(dicts.current().name.as_str(), "ROM");
        assert_eq!(dicts.current().kind(), Kind::Rom);
        assert_eq!(
            dicts.list().collect::<Vec<_>>(),
            vec![("ROM", Kind::Rom), ("RAM", Kind::Ram)]
        );
    }

    #[test]
    fn unknown_name_keeps_selection() {
        let mut dicts = table();
        dicts.select(b"RAM").unwrap();
        assert_eq!(dicts.select(b"FRAM"), Err(Error::DictionaryNotFound));
        assert_eq!(dicts.current().name.as_str(), "RAM");
        // case-sensitive
        assert!(dicts.select(b"rom").is_err());
    }
}
