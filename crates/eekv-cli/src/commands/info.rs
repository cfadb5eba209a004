//! Info command implementation.

use anyhow::{Context, Result};
use eekv::{PoolInfo, TrailerState};

use super::{GlobalOptions, open_store};
use crate::OutputFormat;
use crate::style::{self, colors::SemanticStyle};

/// Show device geometry and trailer state. Never writes to the devices.
pub fn run(options: &GlobalOptions, format: OutputFormat) -> Result<()> {
    let store = open_store(options)?;
    let info = store.info().context("Failed to read device trailers")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
        OutputFormat::Text => print_text(&info),
    }
    Ok(())
}

fn state_label(state: TrailerState) -> String {
    match state {
        TrailerState::Loaded => "ok".success(),
        TrailerState::Uninitialized => "blank".warning(),
        TrailerState::Corrupt => "corrupt".error(),
        TrailerState::Unloaded => "unread".muted(),
    }
}

fn print_text(info: &PoolInfo) {
    style::print_header("eekv device pool");
    style::print_info_table(&[
        ("Devices", info.devices.len().to_string()),
        ("Data size", format!("{} bytes", info.data_size)),
        (
            "Geometry",
            if info.mixed_geometry { "mixed" } else { "uniform" }.to_string(),
        ),
    ]);
    style::print_spacer();

    let rows: Vec<Vec<String>> = info
        .devices
        .iter()
        .map(|device| {
            vec![
                device.path.display().to_string(),
                device.block_size.to_string(),
                device.block_count.to_string(),
                device.payload_capacity.to_string(),
                device.write_counter.to_string(),
                device
                    .checksum
                    .as_deref()
                    .map_or_else(|| "-".to_string(), |c| c.get(..12).unwrap_or(c).to_string()),
                state_label(device.trailer_state),
            ]
        })
        .collect();
    style::print_data_table(
        &["Path", "Block", "Blocks", "Payload", "Counter", "Checksum", "State"],
        &rows,
    );
}
