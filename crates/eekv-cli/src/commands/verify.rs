//! Verify command implementation.

use anyhow::{Context, Result};
use eekv::{StoreError, VerifyOutcome};

use super::{GlobalOptions, open_store};
use crate::style;

/// Check every device and repair the ones that disagree.
pub fn run(options: &GlobalOptions) -> Result<()> {
    let store = open_store(options)?;
    let outcome = store.verify().context("Failed to check devices")?;

    match outcome {
        VerifyOutcome::AllGood => {
            style::print_success("All devices passed verification.");
        }
        VerifyOutcome::SomeRepaired => {
            style::print_warn(
                "One or more devices did not pass verification but have since been corrected.",
            );
            style::print_success("Everything is ok.");
        }
        VerifyOutcome::AllBad => {
            return Err(anyhow::Error::new(StoreError::NoGoodReplica)
                .context("All devices failed verification"));
        }
    }
    Ok(())
}
