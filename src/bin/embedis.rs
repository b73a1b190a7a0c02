/*!
 * Embedis Server Main Entry Point
 *
 * Initializes logging, reads the settings from the environment, builds
 * the dictionary server and runs the event loop.
 */

use anyhow::Result;
use embedis::{build_server, net, Settings};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    // Respects RUST_LOG, e.g. RUST_LOG=debug embedis
    env_logger::init();

    let settings = Settings::from_env()?;
    let server = build_server(&settings)?;

    let listener = net::bind(settings.addr)?;
    println!("embedis running on {}", settings.addr);

    net::run(listener, server)
}
