//! List NDI Sources Example
//!
//! Loads the NDI runtime, waits for sources to appear on the network and
//! prints them.
//!
//! # Prerequisites
//!
//! - The NDI runtime must be installed (`NDI_RUNTIME_DIR_V6` or the system
//!   library path)
//!
//! # Running
//!
//! ```bash
//! cargo run --example list_sources -- [seconds]
//! ```

use std::time::{Duration, Instant};

use ndi_recv::{FinderConfig, LibraryConfig, NdiFinder, NdiLibrary};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("ndi-recv Source Discovery Example");
    println!("=================================");

    let seconds = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u64>().ok())
        .unwrap_or(5);

    let lib_config = LibraryConfig::default();
    println!("Runtime: {}", lib_config.library_path().display());

    let lib = NdiLibrary::load(&lib_config)?;
    println!("NDI runtime {}", lib.version());

    let finder = NdiFinder::new(lib, &FinderConfig::default())?;

    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline {
        if finder.wait_for_sources(Duration::from_millis(500)) {
            println!("\nSources:");
            for source in finder.current_sources() {
                println!("  {}", source);
            }
        }
    }

    println!("\nDone.");
    Ok(())
}
