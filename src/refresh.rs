//! Single-flight coordination of access token refreshes
//!
//! At most one refresh call is outstanding at a time. Callers that need a
//! token while a refresh is running queue behind it and receive the same
//! outcome, in the order they arrived.
//!
//! A flight remembers whether any of its callers was a request rejected with
//! 401. The leader's `conclude` step sees that flag, so a failure ends the
//! session even when the flight was started by the proactive timer.
//!
//! ```text
//!             begin() [flag clear]                settle(Ok | Err)
//!   ┌──────┐ ───────────────────────► ┌────────────┐ ─────────────► Idle
//!   │ Idle │                          │ Refreshing │   (drop guard also
//!   └──────┘ ◄─────────────────────── └────────────┘    returns to Idle)
//!                                        │  ▲
//!                   begin() [flag set]   │  │ waiter queued
//!                                        └──┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{DeskError, Result};

type Waiter = oneshot::Sender<Result<String>>;

/// Observable state of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Idle,
    Refreshing,
}

#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    /// A caller of the current flight came from a rejected request
    reactive: bool,
    waiters: VecDeque<Waiter>,
}

/// Owner of the in-flight flag and the waiter queue
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

/// Result of asking to refresh
pub enum Ticket<'a> {
    /// This caller performs the refresh and must settle the guard
    Leader(RefreshGuard<'a>),
    /// A refresh is already running; await its outcome
    Follower(oneshot::Receiver<Result<String>>),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AuthState {
        if self.lock().in_flight {
            AuthState::Refreshing
        } else {
            AuthState::Idle
        }
    }

    /// Number of callers queued behind the running refresh
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Check-and-set the in-flight flag.
    pub fn begin(&self, reactive: bool) -> Ticket<'_> {
        let mut state = self.lock();
        state.reactive |= reactive;
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(waiting = state.waiters.len(), "Refresh in flight, queued caller");
            Ticket::Follower(rx)
        } else {
            state.in_flight = true;
            Ticket::Leader(RefreshGuard {
                coordinator: self,
                settled: false,
            })
        }
    }

    /// Run `refresh` unless one is already running, sharing its outcome.
    ///
    /// The leader passes the raw outcome through `conclude` together with
    /// whether any caller of the flight was reactive; every caller receives
    /// what `conclude` returns. Side effects (storing the token, tearing the
    /// session down) happen in `refresh` or `conclude`, before any waiter
    /// wakes.
    pub async fn run<F, Fut, C>(&self, reactive: bool, refresh: F, conclude: C) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
        C: FnOnce(Result<String>, bool) -> Result<String>,
    {
        match self.begin(reactive) {
            Ticket::Follower(rx) => rx.await.unwrap_or_else(|_| Err(DeskError::refresh_aborted())),
            Ticket::Leader(guard) => {
                let outcome = refresh().await;
                guard.settle(outcome, conclude)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish<C>(&self, outcome: Result<String>, conclude: C) -> Result<String>
    where
        C: FnOnce(Result<String>, bool) -> Result<String>,
    {
        let (waiters, reactive) = {
            let mut state = self.lock();
            state.in_flight = false;
            (
                std::mem::take(&mut state.waiters),
                std::mem::take(&mut state.reactive),
            )
        };

        let outcome = conclude(outcome, reactive);
        debug!(
            waiters = waiters.len(),
            reactive,
            success = outcome.is_ok(),
            "Refresh settled"
        );

        for waiter in waiters {
            // A waiter whose caller went away is skipped
            let _ = waiter.send(outcome.clone());
        }
        outcome
    }
}

/// Proof that the holder is the single refresher
///
/// Dropping it without settling (the refresh future was cancelled) rejects
/// every waiter and returns the coordinator to idle.
pub struct RefreshGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshGuard<'_> {
    pub fn settle<C>(mut self, outcome: Result<String>, conclude: C) -> Result<String>
    where
        C: FnOnce(Result<String>, bool) -> Result<String>,
    {
        self.settled = true;
        self.coordinator.finish(outcome, conclude)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let _ = self
                .coordinator
                .finish(Err(DeskError::refresh_aborted()), |outcome, _| outcome);
        }
    }
}
