/*!
 * File-backed EEPROM
 *
 * Emulates a non-volatile byte-addressable part with an image file. Reads
 * are served from an in-memory copy; every store is forwarded to a
 * background writer thread that patches the byte in place and syncs the
 * file at most once a second.
 */

use crate::backend::{Backend, SENTINEL};
use anyhow::*;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::result::Result::Ok;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How often pending writes are synced to disk
const SYNC_INTERVAL: Duration = Duration::from_millis(1000);

/// EEPROM image persisted to a file
pub struct FileEeprom {
    image: Vec<u8>,
    tx: Option<Sender<(usize, u8)>>,
    writer: Option<JoinHandle<()>>,
}

impl FileEeprom {
    /// Open (or create) the image at `path` holding `capacity` bytes
    ///
    /// A missing or short file is padded with erased bytes; bytes past
    /// `capacity` are ignored. Spawns the writer thread that applies every
    /// later `store` to the file.
    ///
    /// # Arguments
    /// * `path` - Image file path
    /// * `capacity` - Size of the emulated part in bytes
    ///
    /// # Returns
    /// * The backend, or an error when the file cannot be opened, read,
    ///   padded, or the writer thread cannot be spawned
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open eeprom image {}", path.display()))?;

        let mut image = Vec::with_capacity(capacity);
        f.read_to_end(&mut image)?;
        image.truncate(capacity);

        let loaded = image.len();
        if loaded < capacity {
            image.resize(capacity, SENTINEL);
            f.seek(SeekFrom::Start(loaded as u64))?;
            f.write_all(&image[loaded..])?;
            f.sync_data()?;
        }

        let (tx, rx) = unbounded::<(usize, u8)>();
        let name = path.display().to_string();
        let writer = std::thread::Builder::new()
            .name("eeprom-writer".into())
            .spawn(move || write_loop(f, rx, &name))?;

        log::info!("eeprom image {} loaded ({} bytes)", path.display(), capacity);
        Ok(Self {
            image,
            tx: Some(tx),
            writer: Some(writer),
        })
    }
}

/// Apply queued stores until every sender is gone
fn write_loop(mut f: File, rx: Receiver<(usize, u8)>, name: &str) {
    let mut last = Instant::now();
    let mut dirty = false;

    while let Ok((pos, value)) = rx.recv() {
        let res = f
            .seek(SeekFrom::Start(pos as u64))
            .and_then(|_| f.write_all(&[value]));
        if let Err(e) = res {
            log::error!("eeprom {}: write at {} failed: {}", name, pos, e);
            continue;
        }
        dirty = true;

        if last.elapsed() >= SYNC_INTERVAL {
            if let Err(e) = f.sync_data() {
                log::error!("eeprom {}: sync failed: {}", name, e);
            }
            dirty = false;
            last = Instant::now();
        }
    }

    if dirty {
        if let Err(e) = f.sync_data() {
            log::error!("eeprom {}: final sync failed: {}", name, e);
        }
    }
}

impl Backend for FileEeprom {
    fn capacity(&self) -> usize {
        self.image.len()
    }

    fn fetch(&self, pos: usize) -> u8 {
        self.image.get(pos).copied().unwrap_or(SENTINEL)
    }

    fn store(&mut self, pos: usize, value: u8) {
        let Some(cell) = self.image.get_mut(pos) else {
            return;
        };
        if *cell == value {
            return;
        }
        *cell = value;
        if let Some(tx) = &self.tx {
            // Send only fails once the writer is gone; the image stays current
            let _ = tx.send((pos, value));
        }
    }
}

impl Drop for FileEeprom {
    /// Flush queued writes before the image goes away
    fn drop(&mut self) {
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}
