//! Day-Sync Orchestration
//!
//! Ties the scheduler and the API client together: every day shown by a
//! surface is refreshed and synced through jobs on a shared [`WorkQueue`],
//! and every state change is pushed to the surface as a typed [`DayEvent`]
//! over an injected channel. The core never touches UI state; surfaces
//! render what they're told.
//!
//! Passive refreshes are submitted at [`Priority::Normal`]; user-triggered
//! refreshes and syncs at [`Priority::High`], so a click jumps ahead of a
//! backlog of background loads without ever interrupting the job currently
//! running.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveTime, TimeZone};
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::api::{DayDiff, DiffService};
use crate::scheduler::{JobHandle, Priority, WorkQueue};

// =============================================================================
// Events
// =============================================================================

/// State changes pushed to whichever surface is listening.
#[derive(Clone, Debug)]
pub enum DayEvent {
    /// A refresh job started fetching the day's diff.
    RefreshStarted {
        /// Day being refreshed.
        date: NaiveDate,
    },
    /// A refresh job finished; carries the fresh diff.
    Refreshed {
        /// Day that was refreshed.
        date: NaiveDate,
        /// The reconciliation result.
        diff: DayDiff,
    },
    /// A refresh job failed.
    RefreshFailed {
        /// Day whose refresh failed.
        date: NaiveDate,
        /// Failure rendered as text, for display.
        error: String,
    },
    /// A sync job started executing the day's pending writes.
    SyncStarted {
        /// Day being synced.
        date: NaiveDate,
    },
    /// A sync progress record arrived.
    SyncProgress {
        /// Day being synced.
        date: NaiveDate,
        /// Completion percentage in `[0, 100]`.
        percent: u8,
    },
    /// A sync job finished; a priority refresh of the day follows.
    SyncFinished {
        /// Day that was synced.
        date: NaiveDate,
    },
    /// A sync job failed.
    SyncFailed {
        /// Day whose sync failed.
        date: NaiveDate,
        /// Failure rendered as text, for display.
        error: String,
    },
}

// =============================================================================
// Orchestration
// =============================================================================

/// Schedules per-day refresh and sync jobs and reports their lifecycle.
///
/// All collaborators are injected: the service to call, the session's shared
/// queue, and the channel events are delivered on. Clones share state, so a
/// surface component can hold its own handle.
#[derive(Clone)]
pub struct DaySync {
    service: Arc<dyn DiffService>,
    queue: WorkQueue,
    events: mpsc::Sender<DayEvent>,
    /// Days with a job in flight; the re-entry guard that keeps a day from
    /// being refreshed and synced at the same time.
    in_flight: Arc<DashMap<NaiveDate, ()>>,
}

impl DaySync {
    /// Create the orchestrator.
    pub fn new(
        service: Arc<dyn DiffService>,
        queue: WorkQueue,
        events: mpsc::Sender<DayEvent>,
    ) -> Self {
        Self {
            service,
            queue,
            events,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Whether a refresh or sync job for `date` is queued or running.
    #[must_use]
    pub fn is_loading(&self, date: NaiveDate) -> bool {
        self.in_flight.contains_key(&date)
    }

    /// Submit a job that fetches the day's diff and emits
    /// [`DayEvent::Refreshed`] or [`DayEvent::RefreshFailed`].
    ///
    /// Returns `None` without submitting when the day already has a job in
    /// flight. The job settles as a failure when the fetch fails, but the
    /// failure is fully reported through the event channel first; holding
    /// the returned handle is optional.
    pub fn refresh(&self, date: NaiveDate, priority: Priority) -> Option<JobHandle> {
        if !self.begin(date) {
            tracing::debug!(%date, "refresh suppressed, day already loading");
            return None;
        }
        let this = self.clone();
        Some(self.queue.submit(
            async move {
                this.send(DayEvent::RefreshStarted { date }).await;
                let (min, max) = day_range(date);
                let result = this.service.fetch_diff(&min, &max).await;
                this.in_flight.remove(&date);
                match result {
                    Ok(diff) => {
                        this.send(DayEvent::Refreshed { date, diff }).await;
                        Ok(())
                    }
                    Err(err) => {
                        this.send(DayEvent::RefreshFailed {
                            date,
                            error: err.to_string(),
                        })
                        .await;
                        Err(err)
                    }
                }
            },
            priority,
        ))
    }

    /// Submit a high-priority job that executes the day's pending writes,
    /// emitting [`DayEvent::SyncProgress`] per record.
    ///
    /// On success the job emits [`DayEvent::SyncFinished`] and chases with a
    /// priority refresh of the same day, so the surface ends up showing the
    /// post-sync diff. Returns `None` when the day already has a job in
    /// flight.
    pub fn sync(&self, date: NaiveDate) -> Option<JobHandle> {
        if !self.begin(date) {
            tracing::debug!(%date, "sync suppressed, day already loading");
            return None;
        }
        let this = self.clone();
        Some(self.queue.submit(
            async move {
                this.send(DayEvent::SyncStarted { date }).await;
                let (min, max) = day_range(date);

                // The progress callback is synchronous; ticks are forwarded
                // with try_send so a slow surface drops ticks instead of
                // stalling the stream.
                let events = this.events.clone();
                let mut report = move |percent: u8| {
                    let _ = events.try_send(DayEvent::SyncProgress { date, percent });
                };

                let result = this.service.sync_day(&min, &max, &mut report).await;
                this.in_flight.remove(&date);
                match result {
                    Ok(()) => {
                        this.send(DayEvent::SyncFinished { date }).await;
                        let _ = this.refresh(date, Priority::High);
                        Ok(())
                    }
                    Err(err) => {
                        this.send(DayEvent::SyncFailed {
                            date,
                            error: err.to_string(),
                        })
                        .await;
                        Err(err)
                    }
                }
            },
            Priority::High,
        ))
    }

    /// Mark `date` in flight; `false` when it already was.
    fn begin(&self, date: NaiveDate) -> bool {
        self.in_flight.insert(date, ()).is_none()
    }

    /// Deliver an event. A surface that has gone away must not fail
    /// background work, so send errors are ignored.
    async fn send(&self, event: DayEvent) {
        let _ = self.events.send(event).await;
    }
}

// =============================================================================
// Day Ranges
// =============================================================================

/// The half-open local-time range covering one calendar day: local midnight
/// of `date` to local midnight of the next day.
#[must_use]
pub fn day_range(date: NaiveDate) -> (DateTime<Local>, DateTime<Local>) {
    (local_midnight(date), local_midnight(date + Days::new(1)))
}

/// Local midnight of `date`. DST can skip or double midnight; the earliest
/// valid instant wins, falling back to the UTC reading of the same wall
/// time when the zone has no valid instant at all.
fn local_midnight(date: NaiveDate) -> DateTime<Local> {
    let naive = date.and_time(NaiveTime::MIN);
    naive
        .and_local_timezone(Local)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

// =============================================================================
// Day Window
// =============================================================================

/// The rolling set of days a surface shows, walked backwards from today.
///
/// The window only plans dates; callers pass each handed-out date to
/// [`DaySync::refresh`] as they add it to the display.
#[derive(Clone, Debug)]
pub struct DayWindow {
    today: NaiveDate,
    /// Days already handed out; 0 means the window is empty.
    offset: u64,
}

impl DayWindow {
    /// Create an empty window anchored at `today`.
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self { today, offset: 0 }
    }

    /// Hand out the next `n` days: today first, then walking backwards.
    pub fn extend(&mut self, n: usize) -> Vec<NaiveDate> {
        (0..n).map(|_| self.next_day()).collect()
    }

    /// Hand out days until the window covers the first of a month.
    ///
    /// Always hands out at least one day, so when the window already ends
    /// on a 1st this extends through the whole previous month.
    pub fn extend_until_month_start(&mut self) -> Vec<NaiveDate> {
        let mut added = Vec::new();
        loop {
            let date = self.next_day();
            added.push(date);
            if date.day0() == 0 {
                return added;
            }
        }
    }

    /// The most recently handed-out day, if any.
    #[must_use]
    pub fn last(&self) -> Option<NaiveDate> {
        (self.offset > 0).then(|| self.today - Days::new(self.offset - 1))
    }

    fn next_day(&mut self) -> NaiveDate {
        let date = self.today - Days::new(self.offset);
        self.offset += 1;
        date
    }
}

// =============================================================================
// Tests
// =============================================================================
