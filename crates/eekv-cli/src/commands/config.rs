//! Configuration commands.

use anyhow::Result;

use super::{GlobalOptions, load_config};
use crate::ConfigFormat;
use crate::style::{self, colors::SemanticStyle};

/// Show the merged configuration.
pub fn show(options: &GlobalOptions, format: ConfigFormat) -> Result<()> {
    let config = load_config(options)?;

    match format {
        ConfigFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        ConfigFormat::Toml => print!("{}", toml::to_string_pretty(&config)?),
        ConfigFormat::Text => {
            style::print_header("eekv configuration");
            style::print_spacer();

            println!("Devices:");
            if config.devices.is_empty() {
                println!("  {}", "(none)".muted());
            }
            for device in &config.devices {
                println!(
                    "  {}  block size {}, total size {}",
                    device.path.display().code(),
                    device.block_size,
                    device.total_size
                );
            }
            println!();

            println!("Transfer:");
            println!("  Max attempts: {}", config.transfer.max_attempts);

            if let Err(e) = config.validate() {
                style::print_spacer();
                style::print_warn(&e.to_string());
            }
        }
    }

    Ok(())
}
