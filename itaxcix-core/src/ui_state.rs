//! Observable presentation state
//!
//! View models expose their state through [`StateCell`]s; a UI shell holds
//! [`tokio::sync::watch::Receiver`]s and re-renders on change. Writes replace
//! the value wholesale, so concurrent writers resolve as last write wins.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::error::AppError;

/// Outcome of a one-shot request as seen by a screen
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UiState<T> {
    #[default]
    Initial,
    Loading,
    Success(T),
    Error(String),
}

impl<T> UiState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, UiState::Loading)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UiState::Success(_) | UiState::Error(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            UiState::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            UiState::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl<T> From<Result<T, AppError>> for UiState<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(value) => UiState::Success(value),
            Err(e) => UiState::Error(e.user_message()),
        }
    }
}

/// Single-writer observable value
#[derive(Debug)]
pub struct StateCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current value
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replace the value and notify subscribers
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Modify in place and notify subscribers
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        self.tx.send_modify(f);
    }

    /// Read-only view that observes every subsequent write
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Work bound to one screen's lifetime. Dropping the scope aborts every
/// task still running.
#[derive(Debug, Default)]
pub struct ScreenScope {
    tasks: JoinSet<()>,
}

impl ScreenScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` on the current runtime, owned by this scope
    pub fn launch<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Reap finished tasks so the set does not grow unbounded
        while self.tasks.try_join_next().is_some() {}
        self.tasks.spawn(future);
    }

    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Abort all outstanding work, as on screen teardown
    pub fn cancel_all(&mut self) {
        self.tasks.abort_all();
    }
}
