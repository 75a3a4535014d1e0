//! `strata shell`: line-driven stand-in for the interactive page.
//!
//! Each line is one user action. Several sessions can be open at once; all of
//! them share this process's global layer and the profile's browser store.

use std::collections::BTreeMap;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use strata_core::error::ErrorCode;
use strata_core::{Dataset, StateLayers};
use strata_core::dataset::DatasetError;
use strata_core::layers::{LayerError, LayerView, RefreshView, Session};
use strata_core::store::BrowserStore;

use super::dataset::{DatasetReport, render_report};
use super::{Host, render_layer_view, render_refresh_view};
use crate::output::{CliError, OutputMode, pretty_kv, render_error_to, render_mode_to};

pub const HELP: &str = "\
commands:
  global        randomly change the global state
  session       randomly change the current session's state
  browser       randomly change the browser state and persist it
  refresh       show every layer without changing anything
  new-session   open a session and switch to it
  switch N      switch to session N
  end           close the current session
  sessions      list open sessions
  dataset PATH  load a .csv, .json, or .parquet file into the session
  row N         show row N of the session's dataset
  clear-dataset drop the session's dataset
  help          show this help
  quit          leave the shell";

#[derive(Args, Debug)]
pub struct ShellArgs {
    /// Start without an open session.
    #[arg(long)]
    pub no_session: bool,

    /// Seed random changes so a script replays the same way.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Rows shown when a dataset is loaded or a row is selected.
const PREVIEW_ROWS: usize = 5;

/// One parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Global,
    Session,
    Browser,
    Refresh,
    NewSession,
    Switch(u64),
    End,
    Sessions,
    LoadDataset(PathBuf),
    Row(usize),
    ClearDataset,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        // paths may contain spaces
        if let Some(("dataset", path)) = line.trim().split_once(char::is_whitespace) {
            return Ok(Self::LoadDataset(PathBuf::from(path.trim())));
        }
        let mut words = line.split_whitespace();
        let command = match (words.next(), words.next()) {
            (Some("global"), None) => Self::Global,
            (Some("session"), None) => Self::Session,
            (Some("browser"), None) => Self::Browser,
            (Some("refresh"), None) => Self::Refresh,
            (Some("new-session"), None) => Self::NewSession,
            (Some("switch"), Some(id)) => {
                let id = id
                    .trim_start_matches("session-")
                    .parse()
                    .map_err(|_| format!("`{id}` is not a session number"))?;
                Self::Switch(id)
            }
            (Some("end"), None) => Self::End,
            (Some("sessions"), None) => Self::Sessions,
            (Some("dataset"), None) => return Err("`dataset` needs a file path".to_string()),
            (Some("row"), Some(row)) => {
                Self::Row(row.parse().map_err(|_| format!("`{row}` is not a row number"))?)
            }
            (Some("clear-dataset"), None) => Self::ClearDataset,
            (Some("help" | "?"), None) => Self::Help,
            (Some("quit" | "exit"), None) => Self::Quit,
            _ => return Err(format!("unknown command `{}`; try `help`", line.trim())),
        };
        if words.next().is_some() {
            return Err(format!("too many arguments in `{}`", line.trim()));
        }
        Ok(command)
    }
}

/// Result of one shell command.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Layer {
        layer: &'static str,
        session: String,
        view: LayerView,
    },
    Refresh {
        session: String,
        view: RefreshView,
    },
    Sessions {
        current: Option<String>,
        open: Vec<String>,
    },
    Dataset {
        session: String,
        report: DatasetReport,
    },
    Message {
        text: String,
    },
    Quit,
}

/// Open sessions plus the layers and store they act on.
pub struct Shell<'a> {
    layers: &'a StateLayers,
    store: &'a mut dyn BrowserStore,
    sessions: BTreeMap<u64, Session>,
    datasets: BTreeMap<u64, Dataset>,
    current: Option<u64>,
}

fn layer_error(err: &LayerError) -> CliError {
    CliError::from_code(err.code(), err.to_string())
}

fn dataset_error(err: &DatasetError) -> CliError {
    CliError::from_code(err.code(), err.to_string())
}

fn no_session() -> CliError {
    CliError::from_code(ErrorCode::SessionNotFound, "no open session")
}

impl<'a> Shell<'a> {
    pub fn new(layers: &'a StateLayers, store: &'a mut dyn BrowserStore) -> Self {
        Self {
            layers,
            store,
            sessions: BTreeMap::new(),
            datasets: BTreeMap::new(),
            current: None,
        }
    }

    /// Open a session and make it current.
    pub fn open_session(&mut self) -> String {
        let session = self.layers.open_session();
        let id = session.id();
        self.sessions.insert(id.get(), session);
        self.current = Some(id.get());
        id.to_string()
    }

    /// Run one parsed command.
    ///
    /// # Errors
    ///
    /// Returns the error to report; the shell stays usable afterwards.
    pub fn execute(&mut self, command: ShellCommand) -> Result<Outcome, CliError> {
        match command {
            ShellCommand::Global => {
                let session = self.current_session()?;
                let view = self.layers.change_global(session, &*self.store);
                Ok(Outcome::Layer {
                    layer: "global",
                    session: session.id().to_string(),
                    view,
                })
            }
            ShellCommand::Session => {
                let id = self.current.ok_or_else(no_session)?;
                let session = self.sessions.get_mut(&id).ok_or_else(no_session)?;
                self.layers.change_session(session);
                let view = self.layers.session_view(session, &*self.store);
                Ok(Outcome::Layer {
                    layer: "session",
                    session: session.id().to_string(),
                    view,
                })
            }
            ShellCommand::Browser => {
                let id = self.current.ok_or_else(no_session)?;
                let session = self.sessions.get(&id).ok_or_else(no_session)?;
                let view = self
                    .layers
                    .change_browser(session, &mut *self.store)
                    .map_err(|err| layer_error(&err))?;
                Ok(Outcome::Layer {
                    layer: "browser",
                    session: session.id().to_string(),
                    view,
                })
            }
            ShellCommand::Refresh => {
                let session = self.current_session()?;
                let view = self
                    .layers
                    .refresh(session, &*self.store)
                    .map_err(|err| layer_error(&err))?;
                Ok(Outcome::Refresh {
                    session: session.id().to_string(),
                    view,
                })
            }
            ShellCommand::NewSession => {
                let id = self.open_session();
                Ok(Outcome::Message {
                    text: format!("opened {id}"),
                })
            }
            ShellCommand::Switch(id) => {
                if !self.sessions.contains_key(&id) {
                    return Err(CliError::from_code(
                        ErrorCode::SessionNotFound,
                        format!("session-{id} is not open"),
                    ));
                }
                self.current = Some(id);
                Ok(Outcome::Message {
                    text: format!("switched to session-{id}"),
                })
            }
            ShellCommand::End => {
                let id = self.current.ok_or_else(no_session)?;
                let session = self.sessions.remove(&id).ok_or_else(no_session)?;
                self.datasets.remove(&id);
                self.layers.close_session(session);
                self.current = self.sessions.keys().next().copied();
                Ok(Outcome::Message {
                    text: format!("closed session-{id}"),
                })
            }
            ShellCommand::Sessions => Ok(Outcome::Sessions {
                current: self.current.map(|id| format!("session-{id}")),
                open: self
                    .sessions
                    .keys()
                    .map(|id| format!("session-{id}"))
                    .collect(),
            }),
            ShellCommand::LoadDataset(path) => {
                let id = self.current_session()?.id();
                let dataset = Dataset::load(&path).map_err(|err| dataset_error(&err))?;
                let report = DatasetReport::new(&dataset, PREVIEW_ROWS, None)
                    .map_err(|err| dataset_error(&err))?;
                self.datasets.insert(id.get(), dataset);
                Ok(Outcome::Dataset {
                    session: id.to_string(),
                    report,
                })
            }
            ShellCommand::Row(row) => {
                let id = self.current_session()?.id();
                let dataset = self.datasets.get(&id.get()).ok_or_else(|| {
                    CliError::from_code(
                        ErrorCode::RowOutOfRange,
                        format!("no dataset loaded in {id}"),
                    )
                })?;
                let report = DatasetReport::new(dataset, PREVIEW_ROWS, Some(row))
                    .map_err(|err| dataset_error(&err))?;
                Ok(Outcome::Dataset {
                    session: id.to_string(),
                    report,
                })
            }
            ShellCommand::ClearDataset => {
                let id = self.current_session()?.id();
                let text = if self.datasets.remove(&id.get()).is_some() {
                    format!("cleared dataset of {id}")
                } else {
                    format!("no dataset loaded in {id}")
                };
                Ok(Outcome::Message { text })
            }
            ShellCommand::Help => Ok(Outcome::Message {
                text: HELP.to_string(),
            }),
            ShellCommand::Quit => Ok(Outcome::Quit),
        }
    }

    /// Close every open session.
    pub fn finish(self) {
        for session in self.sessions.into_values() {
            self.layers.close_session(session);
        }
    }

    fn current_session(&self) -> Result<&Session, CliError> {
        self.current
            .and_then(|id| self.sessions.get(&id))
            .ok_or_else(no_session)
    }
}

fn render_outcome(out: &mut dyn Write, mode: OutputMode, outcome: &Outcome) -> Result<()> {
    match (mode, outcome) {
        (OutputMode::Json, _) => render_mode_to(out, mode, outcome, |_, _| Ok(()), |_, _| Ok(())),
        (_, Outcome::Layer { layer, view, .. }) => render_layer_view(out, mode, layer, view),
        (_, Outcome::Refresh { view, .. }) => render_refresh_view(out, mode, view),
        (_, Outcome::Sessions { current, open }) => {
            let current = current.as_deref().unwrap_or("-");
            if mode == OutputMode::Text {
                writeln!(out, "current\t{current}")?;
                writeln!(out, "open\t{}", open.join(" "))?;
            } else {
                pretty_kv(out, "current", current)?;
                pretty_kv(out, "open", open.join(", "))?;
            }
            Ok(())
        }
        (_, Outcome::Dataset { report, .. }) => render_report(out, mode, report),
        (_, Outcome::Message { text }) => Ok(writeln!(out, "{text}")?),
        (_, Outcome::Quit) => Ok(()),
    }
}

/// Feed `input` to `shell` line by line until it ends or `quit` is read.
///
/// Blank lines and `#` comments are skipped. Command errors are reported on
/// `err` and do not stop the shell.
pub fn run_lines(
    shell: &mut Shell<'_>,
    input: impl BufRead,
    out: &mut dyn Write,
    err: &mut dyn Write,
    mode: OutputMode,
    prompt: bool,
) -> Result<()> {
    let mut lines = input.lines();
    loop {
        if prompt {
            write!(out, "strata> ")?;
            out.flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let result = line
            .parse::<ShellCommand>()
            .map_err(CliError::new)
            .and_then(|command| shell.execute(command));
        match result {
            Ok(Outcome::Quit) => break,
            Ok(outcome) => render_outcome(out, mode, &outcome)?,
            Err(error) => render_error_to(err, mode, &error)?,
        }
    }
    Ok(())
}

pub fn run_shell(args: &ShellArgs, output: OutputMode, host: &mut Host) -> Result<()> {
    let stdin = io::stdin();
    let prompt = stdin.is_terminal() && output == OutputMode::Pretty;
    let mut shell = Shell::new(&host.layers, &mut host.store);
    if !args.no_session {
        shell.open_session();
    }
    if prompt {
        println!("{HELP}");
    }

    let stdout = io::stdout();
    let stderr = io::stderr();
    let result = run_lines(
        &mut shell,
        stdin.lock(),
        &mut stdout.lock(),
        &mut stderr.lock(),
        output,
        prompt,
    );
    shell.finish();
    result
}
