//! `strata demo`: scripted, reproducible walk through all three layers.
//!
//! Several sessions change their own layer every round, take turns changing
//! the global layer, and the first session changes the browser layer. Entropy
//! and time are deterministic, so a seed always produces the same report.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use strata_core::StateLayers;
use strata_core::clock::{ClockSpec, SteppingClock};
use strata_core::entropy::DeterministicRng;
use strata_core::layers::{LayerError, RefreshView};
use strata_core::store::MemoryStore;
use tracing::info;

use super::{layer_failure, render_refresh_view};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Store key the demo persists its browser layer under.
const DEMO_STATE_KEY: &str = "strata-demo-local-state";

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Seed for the deterministic entropy source.
    #[arg(long, default_value = "7")]
    pub seed: u64,

    /// Number of concurrent sessions.
    #[arg(long, default_value = "2")]
    pub sessions: usize,

    /// Number of scripted rounds.
    #[arg(long, default_value = "3")]
    pub rounds: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub session: String,
    pub view: RefreshView,
}

#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub seed: u64,
    pub rounds: usize,
    pub global_changes: usize,
    pub browser_changes: usize,
    /// Every layer of every session reported the same task output.
    pub task_shared: bool,
    pub sessions: Vec<SessionReport>,
}

/// Run the scripted rounds and collect a final refresh of every session.
///
/// # Errors
///
/// Returns an error if the in-memory browser layer cannot be round-tripped.
pub fn simulate(args: &DemoArgs) -> Result<DemoReport, LayerError> {
    let clock = Arc::new(SteppingClock::new(ClockSpec::default()));
    let layers = StateLayers::new(
        DEMO_STATE_KEY,
        Box::new(DeterministicRng::new(args.seed)),
        clock,
    );
    let mut store = MemoryStore::new();
    let mut sessions: Vec<_> = (0..args.sessions).map(|_| layers.open_session()).collect();

    let mut global_changes = 0;
    let mut browser_changes = 0;
    for round in 0..args.rounds {
        for (index, session) in sessions.iter_mut().enumerate() {
            layers.change_session(session);
            if (round + index) % 2 == 0 {
                layers.change_global(session, &store);
                global_changes += 1;
            }
        }
        if let Some(first) = sessions.first() {
            layers.change_browser(first, &mut store)?;
            browser_changes += 1;
        }
        info!(round, "demo round complete");
    }

    let reports = sessions
        .iter()
        .map(|session| {
            layers.refresh(session, &store).map(|view| SessionReport {
                session: session.id().to_string(),
                view,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let task_shared = reports.iter().all(|r| {
        let tasks = &r.view.tasks;
        tasks.global == tasks.session && (r.view.browser.is_none() || tasks.global == tasks.browser)
    });

    for session in sessions {
        layers.close_session(session);
    }

    Ok(DemoReport {
        seed: args.seed,
        rounds: args.rounds,
        global_changes,
        browser_changes,
        task_shared,
        sessions: reports,
    })
}

pub fn run_demo(args: &DemoArgs, output: OutputMode) -> Result<()> {
    let report = simulate(args).map_err(|err| layer_failure(output, &err))?;
    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(
                w,
                "seed={}\trounds={}\tglobal_changes={}\tbrowser_changes={}\ttask_shared={}",
                r.seed, r.rounds, r.global_changes, r.browser_changes, r.task_shared
            )?;
            for session in &r.sessions {
                writeln!(w, "# {}", session.session)?;
                render_refresh_view(w, OutputMode::Text, &session.view)
                    .map_err(std::io::Error::other)?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, "Demo")?;
            pretty_kv(w, "seed", r.seed.to_string())?;
            pretty_kv(w, "rounds", r.rounds.to_string())?;
            pretty_kv(w, "global", format!("{} changes", r.global_changes))?;
            pretty_kv(w, "browser", format!("{} changes", r.browser_changes))?;
            pretty_kv(w, "task shared", if r.task_shared { "yes" } else { "NO" })?;
            for session in &r.sessions {
                writeln!(w, "\n== {} ==\n", session.session)?;
                render_refresh_view(w, OutputMode::Pretty, &session.view)
                    .map_err(std::io::Error::other)?;
            }
            Ok(())
        },
    )
}
