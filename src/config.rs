/*!
 * Deployment Configuration
 *
 * Runtime settings read from the environment, and the tables wiring
 * commands, dictionaries, compact keys, hardware keys and channels into a
 * server. Adjust the tables here to customise a deployment.
 */

use crate::backend::MockRam;
use crate::command::Request;
use crate::dictionary::{Dictionaries, Dictionary};
use crate::eeprom::FileEeprom;
use crate::hwkeys::HardwareKeys;
use crate::keyindex::KeyIndex;
use crate::pubsub::PubSub;
use crate::server::{builtin_commands, Server};
use crate::storage::Rom;
use anyhow::*;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

/// Default listen address
pub const DEFAULT_ADDR: &str = "0.0.0.0:7379";
/// Default size of a file-backed EEPROM image
pub const DEFAULT_EEPROM_SIZE: usize = 1024;

/// Device information served by the ROM dictionary
pub static VENDOR_INFO: &[(&str, &str)] = &[("vendor", "PatternAgents")];

/// Well-known keys stored by compact id
pub const KEY_IDS: &[(&str, u16)] = &[("asset_identification", 1000)];

/// Publish/subscribe channels
pub const CHANNELS: &[&str] = &["temperature", "humidity"];

#[derive(Debug, Clone)]
pub struct Settings {
    pub addr: SocketAddr,
    /// Image file for the "EEPROM" dictionary; no EEPROM when unset
    pub eeprom: Option<PathBuf>,
    pub eeprom_size: usize,
}

impl Settings {
    /// Read `EMBEDIS_ADDR`, `EMBEDIS_EEPROM` and `EMBEDIS_EEPROM_SIZE`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let addr_str = get("EMBEDIS_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_str
            .to_socket_addrs()
            .with_context(|| format!("EMBEDIS_ADDR={}", addr_str))?
            .next()
            .ok_or_else(|| anyhow!("EMBEDIS_ADDR={} resolves to nothing", addr_str))?;

        let eeprom = get("EMBEDIS_EEPROM").filter(|p| !p.is_empty()).map(PathBuf::from);
        let eeprom_size = match get("EMBEDIS_EEPROM_SIZE") {
            Some(s) => s
                .parse()
                .with_context(|| format!("EMBEDIS_EEPROM_SIZE={}", s))?,
            None => DEFAULT_EEPROM_SIZE,
        };

        Ok(Self {
            addr,
            eeprom,
            eeprom_size,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 7379)),
            eeprom: None,
            eeprom_size: DEFAULT_EEPROM_SIZE,
        }
    }
}

/// Build the server for these settings
///
/// Dictionaries: "ROM" (default), "RAM" (mock, for testing), and "EEPROM"
/// when an image file is configured.
pub fn build_server(settings: &Settings) -> Result<Server> {
    let mut dictionaries = vec![
        Dictionary::rom("ROM", Rom::new(VENDOR_INFO)),
        Dictionary::ram("RAM", MockRam::default()),
    ];
    if let Some(path) = &settings.eeprom {
        dictionaries.push(Dictionary::ram("EEPROM", FileEeprom::open(path, settings.eeprom_size)?));
    }

    let keys = KeyIndex::new(KEY_IDS.iter().copied())?;

    let hw_keys = HardwareKeys::default()
        .with("mock0", mock_read, mock_write)
        .with("mock1", mock_read, mock_write);

    Ok(Server::new(
        builtin_commands(),
        Dictionaries::new(dictionaries),
        keys,
        hw_keys,
        PubSub::new(CHANNELS.iter().copied()),
    ))
}

/// Replies with the mock number, the key name after "mock"
fn mock_read(_: &mut Server, req: &mut Request<'_>) {
    let suffix = req.argv[1].get(4..).unwrap_or_default();
    let text = String::from_utf8_lossy(suffix).into_owned();
    req.respond_simple(&text);
}

/// Accepts any value
fn mock_write(_: &mut Server, req: &mut Request<'_>) {
    req.respond_ok();
}
