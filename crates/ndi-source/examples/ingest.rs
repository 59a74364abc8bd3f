//! NDI Ingest Example
//!
//! Connects to the first NDI source whose name contains the given filter,
//! negotiates a mode against an in-memory renderer and reports the staged
//! frames it receives.
//!
//! # Prerequisites
//!
//! - The NDI runtime must be installed
//! - At least one NDI sender on the network
//!
//! # Running
//!
//! ```bash
//! cargo run --example ingest -- [name-filter] [seconds]
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use ndi_recv::{FinderConfig, LibraryConfig, NdiBackend, NdiFinder, NdiLibrary};
use ndi_source::{FirstCompatible, Instance, NdiSource, SourceConfig, SourceDriver};
use ndi_video::MemoryRenderer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("ndi-source Ingest Example");
    println!("=========================");

    let mut args = std::env::args().skip(1);
    let filter = args.next().unwrap_or_default();
    let seconds = args
        .next()
        .and_then(|arg| arg.parse::<u64>().ok())
        .unwrap_or(10);

    let lib = NdiLibrary::load(&LibraryConfig::default())?;
    println!("NDI runtime {}", lib.version());

    // Discovery
    let finder = NdiFinder::new(Arc::clone(&lib), &FinderConfig::default())?;
    let deadline = Instant::now() + Duration::from_secs(5);
    let source = loop {
        finder.wait_for_sources(Duration::from_millis(500));
        let found = finder
            .current_sources()
            .into_iter()
            .find(|s| s.name().is_some_and(|name| name.contains(&filter)));
        if let Some(source) = found {
            break source;
        }
        if Instant::now() > deadline {
            println!("No source matching {:?}", filter);
            return Ok(());
        }
    };
    drop(finder);
    println!("Connecting to {}", source);

    // Ingest
    let instance = Instance::new();
    let renderer = MemoryRenderer::default();
    let ndi_source = NdiSource::new(
        &instance,
        "ingest-example",
        source,
        Arc::new(NdiBackend::new(lib)),
        Arc::new(renderer.clone()),
        SourceConfig::default(),
    )?;
    let (driver, mut frames) =
        SourceDriver::spawn(instance, ndi_source, Box::new(FirstCompatible))?;

    let until = tokio::time::Instant::now() + Duration::from_secs(seconds);
    let mut count = 0u64;
    while let Ok(Some(frame)) = tokio::time::timeout_at(until, frames.recv()).await {
        count += 1;
        if count % 30 == 1 {
            let desc = frame.descriptor();
            println!(
                "Frame {}: {} {} ({} planes)",
                count,
                desc.resolution,
                desc.color_format,
                frame.planes().len()
            );
        }
    }

    println!("\nReceived {} frames", count);
    println!("Driver: {:?}", driver.stats());
    println!("Renderer: {:?}", renderer.stats());
    driver.shutdown()?;
    Ok(())
}
