/*!
 * Backend Access
 *
 * The byte-addressable storage interface every RAM-kind dictionary goes
 * through. Access is total: reads past the end return the erased sentinel
 * and writes past the end are dropped.
 */

/// Value returned by `fetch` for positions outside the medium
pub const SENTINEL: u8 = 0xFF;

/// A byte-addressable storage medium (RAM, EEPROM, FRAM, ...)
pub trait Backend: Send {
    /// Number of addressable bytes
    fn capacity(&self) -> usize;

    /// Read one byte; `SENTINEL` when `pos >= capacity()`
    fn fetch(&self, pos: usize) -> u8;

    /// Write one byte; ignored when `pos >= capacity()`
    fn store(&mut self, pos: usize, value: u8);
}

/// Volatile in-memory backend, useful for testing and bring-up
///
/// Starts erased (every byte `SENTINEL`) like a fresh EEPROM.
pub struct MockRam {
    cells: Vec<u8>,
}

impl MockRam {
    /// Default size of the mock RAM dictionary
    pub const DEFAULT_SIZE: usize = 64;

    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![SENTINEL; size],
        }
    }
}

impl Default for MockRam {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

impl Backend for MockRam {
    #[inline]
    fn capacity(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn fetch(&self, pos: usize) -> u8 {
        self.cells.get(pos).copied().unwrap_or(SENTINEL)
    }

    #[inline]
    fn store(&mut self, pos: usize, value: u8) {
        if let Some(cell) = self.cells.get_mut(pos) {
            *cell = value;
        }
    }
}
