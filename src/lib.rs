// Core modules for the Embedis dictionary server
pub mod error; // Error taxonomy with stable wire codes
pub mod protocol; // Request framing (RESP + inline) and reply encoders
pub mod backend; // Backend trait + mock RAM
pub mod eeprom; // File-backed EEPROM backend + background writer
pub mod keyindex; // Key name -> compact id table
pub mod storage; // ROM table + RAM record store over a Backend
pub mod dictionary; // Named dictionaries and the current selection
pub mod command; // Command table, Request and reply methods
pub mod hwkeys; // Hardware READ/WRITE key table
pub mod pubsub; // Channels + per-channel subscriber bits
pub mod server; // Server context, exec and built-in commands
pub mod config; // Settings and the deployment tables
pub mod net; // bind + run (event loop)

// Re-export the main public items for easier access
pub use backend::{Backend, MockRam};
pub use command::{CommandTable, Handler, Request};
pub use config::{build_server, Settings, DEFAULT_ADDR};
pub use dictionary::{Dictionaries, Dictionary, Kind};
pub use error::{Error, Result};
pub use hwkeys::{HardwareKeys, KeyHandlers};
pub use keyindex::KeyIndex;
pub use pubsub::{PubSub, Publication, Slot, Subscribers};
pub use server::Server;
pub use storage::{RamStore, Rom};
