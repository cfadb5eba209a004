//! Version command implementation.

/// Version information for the CLI.
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("eekv {VERSION}");
    println!();
    println!("Self-healing replicated key-value store for EEPROM devices.");
    println!();
    println!("Build info:");
    println!("  Trailer:      {} bytes", eekv::TRAILER_LEN);
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
}
