//! Clear command implementation.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use dialoguer::Confirm;

use super::{GlobalOptions, open_store};
use crate::style;

/// Reset every device to an empty document.
///
/// Works on a store that cannot be initialized, which makes it the way out
/// when every replica has failed verification.
pub fn run(options: &GlobalOptions, yes: bool) -> Result<()> {
    if !yes {
        if !std::io::stdin().is_terminal() {
            anyhow::bail!("Refusing to clear without confirmation; pass --yes");
        }
        let confirmed = Confirm::new()
            .with_prompt("Erase all data from every device?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            style::print_hint("Cancelled.");
            return Ok(());
        }
    }

    let store = open_store(options)?;
    store.clear().context("Failed to clear devices")?;
    style::print_success("All devices cleared.");
    Ok(())
}
