//! `strata browser`: inspect and change the browser-persisted layer.

use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use strata_core::ExportForm;
use strata_core::store::BrowserStore;

use super::{Host, layer_failure, pretty_layer, render_layer_view, text_layer};
use crate::output::{OutputMode, fail, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct BrowserArgs {
    #[command(subcommand)]
    pub command: BrowserCommand,
}

#[derive(Subcommand, Debug)]
pub enum BrowserCommand {
    /// Print the stored browser layer.
    #[command(
        after_help = "EXAMPLES:\n    # Show the default profile's layer\n    strata browser show\n\n    # Another profile, as JSON\n    strata --profile alice browser show --json"
    )]
    Show,

    /// Randomly change the browser layer and persist it.
    #[command(
        after_help = "EXAMPLES:\n    # Create or change the layer\n    strata browser change\n\n    # Machine-readable output\n    strata browser change --format json"
    )]
    Change,

    /// Delete the stored browser layer.
    Clear,
}

#[derive(Debug, Serialize)]
struct BrowserShow<'a> {
    profile: &'a str,
    key: &'a str,
    initialised: bool,
    state: ExportForm,
    task: String,
}

#[derive(Debug, Serialize)]
struct BrowserClear<'a> {
    profile: &'a str,
    key: &'a str,
    removed: bool,
}

pub fn run_browser(args: &BrowserArgs, output: OutputMode, host: &mut Host) -> Result<()> {
    match args.command {
        BrowserCommand::Show => run_show(output, host),
        BrowserCommand::Change => run_change(output, host),
        BrowserCommand::Clear => run_clear(output, host),
    }
}

fn run_show(output: OutputMode, host: &Host) -> Result<()> {
    let slot = host
        .layers
        .load_browser(&host.store)
        .map_err(|err| layer_failure(output, &err))?;
    let session = host.layers.open_session();
    let task = host.layers.task_outputs(&session, &slot).browser;
    host.layers.close_session(session);

    let report = BrowserShow {
        profile: &host.profile,
        key: host.layers.state_key(),
        initialised: slot.is_populated(),
        state: slot.export(),
        task,
    };
    render_mode(
        output,
        &report,
        |r, w| {
            if r.initialised {
                text_layer(w, "browser", &r.state)
            } else {
                writeln!(w, "browser\t{}", r.task)
            }
        },
        |r, w| {
            pretty_kv(w, "profile", r.profile)?;
            pretty_kv(w, "key", r.key)?;
            writeln!(w)?;
            if r.initialised {
                pretty_layer(w, "browser state", &r.state)
            } else {
                pretty_section(w, "browser state")?;
                writeln!(w, "{}", r.task)
            }
        },
    )
}

fn run_change(output: OutputMode, host: &mut Host) -> Result<()> {
    let session = host.layers.open_session();
    let result = host.layers.change_browser(&session, &mut host.store);
    host.layers.close_session(session);
    let view = result.map_err(|err| layer_failure(output, &err))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render_layer_view(&mut out, output, "browser", &view)
}

fn run_clear(output: OutputMode, host: &mut Host) -> Result<()> {
    let key = host.config.state_key();
    let removed = host
        .store
        .remove(&key)
        .map_err(|err| fail(output, err.code(), err.to_string()))?;

    let report = BrowserClear {
        profile: &host.profile,
        key: &key,
        removed,
    };
    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "removed\t{}", r.removed),
        |r, w| {
            if r.removed {
                writeln!(w, "✓ cleared browser state for profile '{}'", r.profile)
            } else {
                writeln!(w, "nothing stored for profile '{}'", r.profile)
            }
        },
    )
}
