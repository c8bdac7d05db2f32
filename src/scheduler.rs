//! Proactive refresh timer
//!
//! Holds at most one armed timer. Arming always cancels whatever was armed
//! before, so repeated logins never stack timers.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use sitedesk_protocol::Claims;

use crate::token::decode_claims;

/// What a scheduling attempt did.
///
/// Scheduling is best effort: every variant other than `Scheduled` means the
/// reactive 401 path will handle expiry instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "scheduling is best effort; discard the outcome explicitly with `let _ =`"]
pub enum ScheduleOutcome {
    Scheduled { delay: Duration },
    /// Token expired or expires within the lead time
    TooLate,
    NoToken,
    /// Token payload could not be decoded
    Undecodable,
}

#[derive(Debug, Default)]
struct TimerSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

#[derive(Debug)]
pub struct ProactiveScheduler {
    lead: Duration,
    slot: Arc<Mutex<TimerSlot>>,
}

/// Time until a refresh is due, or `None` when it is already too late.
pub fn refresh_delay(claims: &Claims, now: DateTime<Utc>, lead: Duration) -> Option<Duration> {
    let lead_ms = i64::try_from(lead.as_millis()).unwrap_or(i64::MAX);
    let refresh_at_ms = claims
        .exp
        .saturating_mul(1000)
        .saturating_sub(now.timestamp_millis())
        .saturating_sub(lead_ms);

    if refresh_at_ms > 0 {
        Some(Duration::from_millis(refresh_at_ms as u64))
    } else {
        None
    }
}

impl ProactiveScheduler {
    pub fn new(lead: Duration) -> Self {
        Self {
            lead,
            slot: Arc::new(Mutex::new(TimerSlot::default())),
        }
    }

    pub fn lead(&self) -> Duration {
        self.lead
    }

    /// Delay before `token` should be refreshed
    pub fn plan(&self, token: Option<&str>) -> Result<Duration, ScheduleOutcome> {
        let token = token.ok_or(ScheduleOutcome::NoToken)?;
        let claims = decode_claims(token).map_err(|_| ScheduleOutcome::Undecodable)?;
        refresh_delay(&claims, Utc::now(), self.lead).ok_or(ScheduleOutcome::TooLate)
    }

    /// Cancel any armed timer and arm a new one running `task` after `delay`.
    pub fn arm<Fut>(&self, delay: Duration, task: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if let Some(previous) = slot.handle.take() {
            previous.abort();
        }
        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        let timer_slot = Arc::clone(&self.slot);

        slot.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                // Once fired, the timer is no longer cancellable by a re-arm;
                // the task itself may re-arm after refreshing.
                let mut slot = lock(&timer_slot);
                if slot.generation == generation {
                    slot.handle = None;
                }
            }
            task.await;
        }));

        debug!(delay_secs = delay.as_secs(), "Proactive refresh armed");
    }

    pub fn cancel(&self) {
        if let Some(handle) = lock(&self.slot).handle.take() {
            handle.abort();
            debug!("Proactive refresh cancelled");
        }
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.slot).handle.is_some()
    }
}

impl Drop for ProactiveScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(slot: &Mutex<TimerSlot>) -> MutexGuard<'_, TimerSlot> {
    slot.lock().unwrap_or_else(|p| p.into_inner())
}
