pub mod browser;
pub mod completions;
pub mod dataset;
pub mod demo;
pub mod json_format;
pub mod profile;
pub mod shell;
pub mod transform;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use strata_core::clock::SystemClock;
use strata_core::config::AppConfig;
use strata_core::entropy::{Entropy, SeededEntropy, SystemEntropy};
use strata_core::layers::{LayerError, LayerView, RefreshView, TaskOutputs};
use strata_core::store::FileStore;
use strata_core::{ExportForm, StateLayers};
use tracing::debug;

use crate::output::{OutputMode, pretty_kv, pretty_section};

/// Process-wide state owned by one `strata` invocation.
pub struct Host {
    pub config: AppConfig,
    pub profile: String,
    pub layers: StateLayers,
    pub store: FileStore,
}

/// Seeded generator when `seed` is given, OS-seeded otherwise.
pub fn entropy(seed: Option<u64>) -> Box<dyn Entropy + Send> {
    match seed {
        Some(seed) => {
            debug!(seed, "using seeded entropy");
            Box::new(SeededEntropy::new(seed))
        }
        None => Box::new(SystemEntropy::new()),
    }
}

impl Host {
    /// Global layer backed by [`entropy`] and wall time, with the browser
    /// store of `profile` under the configured storage directory.
    pub fn open(config: AppConfig, profile: &str, seed: Option<u64>) -> Self {
        let store = FileStore::for_profile(&config.resolved_storage_dir(), profile)
            .with_lock_timeout(config.lock_timeout());
        debug!(profile, root = %store.root().display(), "browser store opened");
        let layers = StateLayers::new(
            config.state_key(),
            entropy(seed),
            Arc::new(SystemClock),
        );
        Self {
            config,
            profile: profile.to_string(),
            layers,
            store,
        }
    }
}

/// Report a layer error on stderr with its code and convert it for `main`.
pub fn layer_failure(mode: OutputMode, err: &LayerError) -> anyhow::Error {
    crate::output::fail(mode, err.code(), err.to_string())
}

/// `a b [c...]` summary of a layer's primary value.
fn primary_summary(form: &ExportForm) -> String {
    form.primary.as_ref().map_or_else(
        || "-".to_string(),
        |v| {
            let c = v.c.iter().map(ToString::to_string).collect::<Vec<_>>();
            format!("a={} b={} c=[{}]", v.a, v.b, c.join(","))
        },
    )
}

fn len_or_dash<T>(collection: Option<&[T]>) -> String {
    collection.map_or_else(|| "-".to_string(), |c| c.len().to_string())
}

/// Pretty block for one layer.
pub fn pretty_layer(w: &mut dyn Write, heading: &str, form: &ExportForm) -> io::Result<()> {
    pretty_section(w, heading)?;
    pretty_kv(w, "primary", primary_summary(form))?;
    pretty_kv(w, "items", len_or_dash(form.items.as_deref()))?;
    pretty_kv(
        w,
        "tagged",
        form.tagged
            .as_ref()
            .map_or_else(|| "-".to_string(), |t| t.len().to_string()),
    )?;
    if let Some(last) = form.items.as_ref().and_then(|items| items.last()) {
        pretty_kv(w, "last item", format!("a={} b={}", last.a, last.b))?;
    }
    pretty_kv(w, "task", form.task.as_deref().unwrap_or("-"))?;
    writeln!(w)
}

/// One tab-separated line for one layer.
pub fn text_layer(w: &mut dyn Write, name: &str, form: &ExportForm) -> io::Result<()> {
    writeln!(
        w,
        "{name}\t{}\titems={}\ttagged={}",
        primary_summary(form),
        len_or_dash(form.items.as_deref()),
        form.tagged
            .as_ref()
            .map_or_else(|| "-".to_string(), |t| t.len().to_string()),
    )
}

pub fn pretty_tasks(w: &mut dyn Write, tasks: &TaskOutputs) -> io::Result<()> {
    pretty_section(w, "Task outputs")?;
    pretty_kv(w, "global", &tasks.global)?;
    pretty_kv(w, "session", &tasks.session)?;
    pretty_kv(w, "browser", &tasks.browser)
}

pub fn text_tasks(w: &mut dyn Write, tasks: &TaskOutputs) -> io::Result<()> {
    writeln!(w, "task.global\t{}", tasks.global)?;
    writeln!(w, "task.session\t{}", tasks.session)?;
    writeln!(w, "task.browser\t{}", tasks.browser)
}

pub fn render_layer_view(
    w: &mut dyn Write,
    mode: OutputMode,
    name: &str,
    view: &LayerView,
) -> Result<()> {
    crate::output::render_mode_to(
        w,
        mode,
        view,
        |v, w| {
            text_layer(w, name, &v.state)?;
            text_tasks(w, &v.tasks)
        },
        |v, w| {
            pretty_layer(w, &format!("{name} state"), &v.state)?;
            pretty_tasks(w, &v.tasks)
        },
    )
}

pub fn render_refresh_view(w: &mut dyn Write, mode: OutputMode, view: &RefreshView) -> Result<()> {
    let uninitialised = ExportForm::default();
    crate::output::render_mode_to(
        w,
        mode,
        view,
        |v, w| {
            text_layer(w, "global", &v.global)?;
            text_layer(w, "session", &v.session)?;
            text_layer(w, "browser", v.browser.as_ref().unwrap_or(&uninitialised))?;
            text_tasks(w, &v.tasks)
        },
        |v, w| {
            pretty_layer(w, "global state", &v.global)?;
            pretty_layer(w, "session state", &v.session)?;
            match &v.browser {
                Some(form) => pretty_layer(w, "browser state", form)?,
                None => {
                    pretty_section(w, "browser state")?;
                    writeln!(w, "{}\n", v.tasks.browser)?;
                }
            }
            pretty_tasks(w, &v.tasks)
        },
    )
}
