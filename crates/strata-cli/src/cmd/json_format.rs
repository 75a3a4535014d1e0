//! `strata json-format`: render the nested demo record as indented JSON.

use anyhow::Result;
use clap::Args;
use strata_core::clock::SystemClock;
use strata_core::format::{EncapsulatedRecord, pretty_json};

use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct JsonFormatArgs {
    #[arg(long, default_value = "Hello")]
    pub text: String,

    #[arg(long, default_value_t = 221)]
    pub number: i64,

    /// Name stored in the nested object.
    #[arg(long, default_value = "Sherlock")]
    pub name: String,
}

/// The record is JSON in every mode; `json` mode prints it compactly.
pub fn run_json_format(args: &JsonFormatArgs, output: OutputMode) -> Result<()> {
    let record = EncapsulatedRecord::new(&args.text, args.number, &args.name, &SystemClock);
    let rendered = if output.is_json() {
        serde_json::to_string(&record)?
    } else {
        pretty_json(&record)?
    };
    println!("{rendered}");
    Ok(())
}
