//! Coordination of the global, session, and browser-persisted layers.
//!
//! One [`StateLayers`] lives for the whole process and owns the global
//! container. Sessions are created from it and hold their own container
//! seeded with the global task handle. The browser layer is never held in
//! memory between calls: it is materialised from a [`BrowserStore`] on each
//! access and written back after every change.
//!
//! Handlers mirror the user actions of the host:
//!
//! - [`StateLayers::change_global`]
//! - [`StateLayers::change_session`]
//! - [`StateLayers::change_browser`]
//! - [`StateLayers::refresh`], which only reads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::container::{ExportForm, StateContainer, StateError, StateSlot};
use crate::entropy::Entropy;
use crate::error::ErrorCode;
use crate::store::{BrowserStore, StoreError};
use crate::task::TaskHandle;

/// Reported in place of the browser task output before the layer exists.
pub const BROWSER_UNINITIALISED_MSG: &str =
    "uninitialised, click 'Change browser state' to initialise";

/// Errors raised by layer handlers.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("browser layer is invalid: {0}")]
    State(#[from] StateError),

    #[error("browser store failed: {0}")]
    Store(#[from] StoreError),
}

impl LayerError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::State(err) => err.code(),
            Self::Store(err) => err.code(),
        }
    }
}

/// Identifier of one user session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Session-scoped state. Dropping it ends the session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: StateContainer,
}

impl Session {
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> &StateContainer {
        &self.state
    }
}

/// Task outputs as seen through each layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutputs {
    pub global: String,
    pub session: String,
    pub browser: String,
}

/// One layer's export form plus the task outputs of every layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerView {
    pub state: ExportForm,
    pub tasks: TaskOutputs,
}

/// Export forms of all three layers plus their task outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshView {
    pub global: ExportForm,
    pub session: ExportForm,
    /// `None` until the browser layer has been initialised.
    pub browser: Option<ExportForm>,
    pub tasks: TaskOutputs,
}

/// Process-wide coordinator owning the global layer.
pub struct StateLayers {
    global: Mutex<StateContainer>,
    global_task: TaskHandle,
    state_key: String,
    entropy: Mutex<Box<dyn Entropy + Send>>,
    clock: Arc<dyn Clock>,
    next_session: AtomicU64,
}

impl std::fmt::Debug for StateLayers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateLayers")
            .field("state_key", &self.state_key)
            .field("global_task", &self.global_task)
            .field("next_session", &self.next_session)
            .finish_non_exhaustive()
    }
}

impl StateLayers {
    /// Create the global layer. Call once per process.
    ///
    /// `state_key` is the store key the browser layer is persisted under.
    pub fn new(
        state_key: impl Into<String>,
        entropy: Box<dyn Entropy + Send>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let global = StateContainer::new();
        let global_task = global.task().clone();
        let state_key = state_key.into();
        info!(state_key = %state_key, "global state created");
        Self {
            global: Mutex::new(global),
            global_task,
            state_key,
            entropy: Mutex::new(entropy),
            clock,
            next_session: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn state_key(&self) -> &str {
        &self.state_key
    }

    /// Handle to the task result shared by every layer.
    #[must_use]
    pub fn global_task(&self) -> &TaskHandle {
        &self.global_task
    }

    /// Current export form of the global layer.
    #[must_use]
    pub fn global_export(&self) -> ExportForm {
        self.lock_global().export()
    }

    /// Start a session whose container shares the global task.
    pub fn open_session(&self) -> Session {
        let id = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
        info!(session = %id, "session opened");
        Session {
            id,
            state: StateContainer::with_task(self.global_task.clone()),
        }
    }

    /// End a session, discarding its state.
    pub fn close_session(&self, session: Session) {
        info!(session = %session.id, items = session.state.items().len(), "session closed");
        drop(session);
    }

    /// Materialise the browser layer from `store`.
    ///
    /// A missing value yields [`StateSlot::Uninitialised`]; a stored value is
    /// applied onto a fresh container seeded with the global task.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Store`] if the store fails and
    /// [`LayerError::State`] if the stored text is malformed.
    pub fn load_browser(&self, store: &dyn BrowserStore) -> Result<StateSlot, LayerError> {
        match store.get(&self.state_key)? {
            Some(text) => Ok(StateSlot::Populated(self.browser_from_text(&text)?)),
            None => Ok(StateSlot::Uninitialised),
        }
    }

    fn browser_from_text(&self, text: &str) -> Result<StateContainer, StateError> {
        let mut container = StateContainer::with_task(self.global_task.clone());
        container.reset_from_json_str(text)?;
        debug!(items = container.items().len(), "browser state loaded");
        Ok(container)
    }

    /// Task outputs seen through each layer.
    #[must_use]
    pub fn task_outputs(&self, session: &Session, browser: &StateSlot) -> TaskOutputs {
        TaskOutputs {
            global: self.global_task.output(),
            session: session.state.task().output(),
            browser: browser
                .as_populated()
                .map_or_else(|| BROWSER_UNINITIALISED_MSG.to_string(), |c| c.task().output()),
        }
    }

    /// Randomly mutate the global layer.
    ///
    /// The browser layer is read only to report its task output and is
    /// treated as uninitialised if it cannot be loaded.
    pub fn change_global(&self, session: &Session, store: &dyn BrowserStore) -> LayerView {
        let state = {
            let mut global = self.lock_global();
            let mut entropy = self.lock_entropy();
            global.make_random_changes("global", entropy.as_mut(), self.clock.as_ref());
            global.export()
        };
        let browser = self.load_browser_for_display(store);
        LayerView {
            state,
            tasks: self.task_outputs(session, &browser),
        }
    }

    /// Randomly mutate the session layer.
    pub fn change_session(&self, session: &mut Session) -> ExportForm {
        let mut entropy = self.lock_entropy();
        session
            .state
            .make_random_changes("session", entropy.as_mut(), self.clock.as_ref());
        session.state.export()
    }

    /// The session layer as reported after it changes.
    #[must_use]
    pub fn session_view(&self, session: &Session, store: &dyn BrowserStore) -> LayerView {
        let browser = self.load_browser_for_display(store);
        LayerView {
            state: session.state.export(),
            tasks: self.task_outputs(session, &browser),
        }
    }

    /// Randomly mutate the browser layer and write it back to `store`.
    ///
    /// On first use the layer is created around the global task. The read,
    /// the mutation, and the write form one [`BrowserStore::update`], so
    /// concurrent hosts sharing a profile never lose each other's changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored layer is malformed or the store fails.
    /// Nothing is written in either case.
    pub fn change_browser(
        &self,
        session: &Session,
        store: &mut dyn BrowserStore,
    ) -> Result<LayerView, LayerError> {
        let mut browser = StateSlot::Uninitialised;
        let mut rejected = None;
        store.update(&self.state_key, &mut |current| {
            match self.next_browser(current) {
                Ok((container, text)) => {
                    browser = StateSlot::Populated(container);
                    Some(text)
                }
                Err(err) => {
                    rejected = Some(err);
                    None
                }
            }
        })?;
        if let Some(err) = rejected {
            return Err(err.into());
        }
        let items = browser.as_populated().map_or(0, |c| c.items().len());
        debug!(items, "browser state persisted");

        Ok(LayerView {
            state: browser.export(),
            tasks: self.task_outputs(session, &browser),
        })
    }

    /// Browser layer after one random change, with its serialised form.
    fn next_browser(&self, current: Option<&str>) -> Result<(StateContainer, String), StateError> {
        let slot = match current {
            Some(text) => StateSlot::Populated(self.browser_from_text(text)?),
            None => {
                info!("browser state initialised");
                StateSlot::Uninitialised
            }
        };
        let mut container = slot.into_populated(&self.global_task);
        {
            let mut entropy = self.lock_entropy();
            container.make_random_changes("browser", entropy.as_mut(), self.clock.as_ref());
        }
        let text = container.to_json_string()?;
        Ok((container, text))
    }

    /// Re-export every layer without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read. A malformed stored layer
    /// is reported as uninitialised.
    pub fn refresh(
        &self,
        session: &Session,
        store: &dyn BrowserStore,
    ) -> Result<RefreshView, LayerError> {
        let browser = match self.load_browser(store) {
            Ok(slot) => slot,
            Err(LayerError::State(err)) => {
                warn!(error = %err, code = %err.code(), "ignoring malformed browser state");
                StateSlot::Uninitialised
            }
            Err(err) => return Err(err),
        };
        Ok(RefreshView {
            global: self.global_export(),
            session: session.state.export(),
            browser: browser.as_populated().map(StateContainer::export),
            tasks: self.task_outputs(session, &browser),
        })
    }

    fn load_browser_for_display(&self, store: &dyn BrowserStore) -> StateSlot {
        match self.load_browser(store) {
            Ok(slot) => slot,
            Err(err) => {
                warn!(error = %err, code = %err.code(), "browser state unavailable");
                StateSlot::Uninitialised
            }
        }
    }

    fn lock_global(&self) -> MutexGuard<'_, StateContainer> {
        self.global.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_entropy(&self) -> MutexGuard<'_, Box<dyn Entropy + Send>> {
        self.entropy.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
