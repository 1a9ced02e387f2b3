//! Debounced refresh of the history and video regions.
//!
//! Refreshes are triggered by channel notifications (debounced), explicit
//! operator actions (immediate), the console becoming visible again, and the
//! initial connection. All state lives in one coordinator instance; every
//! method must be called from inside a tokio runtime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ConsoleError;
use crate::records::{HistoryRow, VideoRow};

use super::channel::{ChannelConnection, NotificationChannel, Subscription};
use super::executor::QueryExecutor;
use super::filter::{FilterContext, FilterSource};
use super::view::{Region, RegionState, ViewSurface};

/// Timing knobs for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    /// Quiet period after the last notification before a refresh runs.
    pub debounce: Duration,
    /// Upper bound between the first notification of a burst and its refresh.
    pub max_wait: Duration,
    /// Delay of the catch-up refresh after the console becomes visible.
    pub visibility_delay: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(600),
            max_wait: Duration::from_millis(3000),
            visibility_delay: Duration::from_millis(300),
        }
    }
}

/// Owns the notification channel and decides when to re-fetch.
///
/// Cheap to clone; clones share the same state. Call [`dispose`](Self::dispose)
/// when done, background tasks keep the shared state alive until then.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    executor: Arc<dyn QueryExecutor>,
    channel: Arc<dyn NotificationChannel>,
    filters: Arc<dyn FilterSource>,
    view: Arc<dyn ViewSurface>,
    settings: RefreshSettings,
    state: Mutex<State>,
}

struct State {
    disposed: bool,
    connection: ChannelConnection,
    /// Bumped on every connect attempt so a stale listener cannot mark a
    /// newer connection as dropped.
    connection_epoch: u64,
    listener: Option<JoinHandle<()>>,
    pending: Option<PendingRefresh>,
    visibility_timer: Option<JoinHandle<()>>,
    last_cycle: u64,
    history: Slot<HistoryRow>,
    videos: Slot<VideoRow>,
}

struct PendingRefresh {
    deadline: Instant,
    latest: Instant,
    /// Held for abort on dispose; the timer task clears `pending` itself.
    timer: JoinHandle<()>,
}

struct Slot<T> {
    state: RegionState<T>,
    /// Cycle that produced `state`; results from older cycles are dropped.
    applied_cycle: u64,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            state: RegionState::Loading,
            applied_cycle: 0,
        }
    }
}

enum TimerStep {
    Wait(Instant),
    Fire,
    Cancelled,
}

impl RefreshCoordinator {
    pub fn create(
        executor: Arc<dyn QueryExecutor>,
        channel: Arc<dyn NotificationChannel>,
        filters: Arc<dyn FilterSource>,
        view: Arc<dyn ViewSurface>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                channel,
                filters,
                view,
                settings,
                state: Mutex::new(State {
                    disposed: false,
                    connection: ChannelConnection::Unsubscribed,
                    connection_epoch: 0,
                    listener: None,
                    pending: None,
                    visibility_timer: None,
                    last_cycle: 0,
                    history: Slot::default(),
                    videos: Slot::default(),
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connection(&self) -> ChannelConnection {
        self.lock().connection
    }

    pub fn history(&self) -> RegionState<HistoryRow> {
        self.lock().history.state.clone()
    }

    pub fn videos(&self) -> RegionState<VideoRow> {
        self.lock().videos.state.clone()
    }

    /// True while a debounced refresh is waiting to fire.
    pub fn is_refresh_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Request a refresh once notifications have been quiet for the debounce
    /// window. Bursts share one timer; each call pushes its deadline out, but
    /// never past `max_wait` after the burst started.
    pub fn schedule_refresh(&self) {
        let now = Instant::now();
        let settings = self.inner.settings;
        let mut state = self.lock();
        if state.disposed {
            return;
        }

        if let Some(pending) = state.pending.as_mut() {
            pending.deadline = (now + settings.debounce).min(pending.latest);
            debug!("Refresh already pending, deadline moved");
            return;
        }

        let this = self.clone();
        let timer = tokio::spawn(async move { this.run_pending_timer().await });
        state.pending = Some(PendingRefresh {
            deadline: now + settings.debounce,
            latest: now + settings.max_wait.max(settings.debounce),
            timer,
        });
        debug!("Refresh scheduled in {:?}", settings.debounce);
    }

    async fn run_pending_timer(&self) {
        loop {
            let step = {
                let mut state = self.lock();
                match state.pending.as_ref() {
                    None => TimerStep::Cancelled,
                    Some(p) if p.deadline > Instant::now() => TimerStep::Wait(p.deadline),
                    Some(_) => {
                        // Cleared before the refresh body so a notification
                        // arriving mid-refresh schedules a fresh cycle.
                        state.pending = None;
                        TimerStep::Fire
                    }
                }
            };

            match step {
                TimerStep::Wait(deadline) => tokio::time::sleep_until(deadline).await,
                TimerStep::Fire => break,
                TimerStep::Cancelled => return,
            }
        }

        let context = self.inner.filters.current();
        self.run_refresh_now(context).await;
    }

    /// Fetch history and videos for `context` right away, bypassing the debounce.
    ///
    /// Each region is replaced independently when its fetch succeeds. A failed
    /// fetch keeps whatever the region already showed and reports the error.
    pub async fn run_refresh_now(&self, context: FilterContext) {
        let cycle = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.last_cycle += 1;
            state.last_cycle
        };

        info!(
            "Refresh cycle {} (date: {:?}, user: {:?}, video user: {:?})",
            cycle, context.date, context.user, context.video_user
        );

        let executor = &self.inner.executor;
        let history = async {
            let result = executor.fetch_history(&context).await;
            self.apply_history(cycle, result);
        };
        let videos = async {
            let result = executor.fetch_videos(context.video_user.as_deref()).await;
            self.apply_videos(cycle, result);
        };
        tokio::join!(history, videos);
    }

    fn apply_history(&self, cycle: u64, result: Result<Vec<HistoryRow>, ConsoleError>) {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        let view = &*self.inner.view;
        match apply(&mut state.history, Region::History, cycle, result) {
            Applied::Render => view.render_history(&state.history.state),
            Applied::Indicator(message) => view.report_error(Region::History, &message),
            Applied::Stale => {}
        }
    }

    fn apply_videos(&self, cycle: u64, result: Result<Vec<VideoRow>, ConsoleError>) {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        let view = &*self.inner.view;
        match apply(&mut state.videos, Region::Videos, cycle, result) {
            Applied::Render => view.render_videos(&state.videos.state),
            Applied::Indicator(message) => view.report_error(Region::Videos, &message),
            Applied::Stale => {}
        }
    }

    /// Subscribe to the notification channel unless a connection already
    /// exists or is being established. Returns the resulting connection state.
    ///
    /// On success every inbound event schedules a refresh and one refresh runs
    /// immediately. On failure the coordinator stays `Unsubscribed` until the
    /// next call.
    pub async fn ensure_connected(&self) -> ChannelConnection {
        let epoch = {
            let mut state = self.lock();
            if state.disposed {
                return state.connection;
            }
            match state.connection {
                ChannelConnection::Subscribed | ChannelConnection::Subscribing => {
                    return state.connection;
                }
                ChannelConnection::Unsubscribed | ChannelConnection::Disconnected => {}
            }
            state.connection = ChannelConnection::Subscribing;
            state.connection_epoch += 1;
            state.connection_epoch
        };

        info!("Subscribing to notification channel");
        match self.inner.channel.connect().await {
            Ok(subscription) => {
                {
                    let mut state = self.lock();
                    if state.disposed || state.connection_epoch != epoch {
                        return state.connection;
                    }
                    state.connection = ChannelConnection::Subscribed;
                    let this = self.clone();
                    state.listener = Some(tokio::spawn(async move {
                        this.listen(epoch, subscription).await;
                    }));
                }
                info!("Notification channel subscribed");

                let context = self.inner.filters.current();
                self.run_refresh_now(context).await;
                self.connection()
            }
            Err(e) => {
                warn!("Channel subscribe failed: {}", e);
                let mut state = self.lock();
                if !state.disposed && state.connection_epoch == epoch {
                    state.connection = ChannelConnection::Unsubscribed;
                }
                state.connection
            }
        }
    }

    async fn listen(&self, epoch: u64, mut subscription: Subscription) {
        while let Some(event) = subscription.next_event().await {
            debug!("[broadcast] event={}", event.event);
            self.schedule_refresh();
        }

        let mut state = self.lock();
        if state.connection_epoch == epoch && state.connection == ChannelConnection::Subscribed {
            warn!("Notification channel dropped");
            state.connection = ChannelConnection::Disconnected;
            state.listener = None;
        }
    }

    /// The console became visible again: reconnect if the channel dropped and
    /// run a catch-up refresh after the visibility delay.
    pub async fn on_visible(&self) {
        {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            if let Some(previous) = state.visibility_timer.take() {
                previous.abort();
            }
            let this = self.clone();
            let delay = self.inner.settings.visibility_delay;
            state.visibility_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                this.lock().visibility_timer = None;
                let context = this.inner.filters.current();
                this.run_refresh_now(context).await;
            }));
        }

        self.ensure_connected().await;
    }

    /// Stop timers, close the channel and turn every later call into a no-op.
    pub fn dispose(&self) {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        if let Some(pending) = state.pending.take() {
            pending.timer.abort();
        }
        if let Some(timer) = state.visibility_timer.take() {
            timer.abort();
        }
        if let Some(listener) = state.listener.take() {
            listener.abort();
        }
        state.connection = ChannelConnection::Unsubscribed;
        info!("Refresh coordinator disposed");
    }
}

enum Applied {
    Render,
    Indicator(String),
    Stale,
}

fn apply<T>(
    slot: &mut Slot<T>,
    region: Region,
    cycle: u64,
    result: Result<Vec<T>, ConsoleError>,
) -> Applied {
    if cycle < slot.applied_cycle {
        debug!(
            "Discarding {} result from cycle {} (showing cycle {})",
            region, cycle, slot.applied_cycle
        );
        return Applied::Stale;
    }

    match result {
        Ok(rows) => {
            info!("Loaded {} {} rows (cycle {})", rows.len(), region, cycle);
            slot.applied_cycle = cycle;
            slot.state = if rows.is_empty() {
                RegionState::Empty
            } else {
                RegionState::Rows(rows)
            };
            Applied::Render
        }
        Err(e) => {
            warn!("Failed to load {}: {}", region, e);
            if slot.state.has_content() {
                Applied::Indicator(e.to_string())
            } else {
                slot.applied_cycle = cycle;
                slot.state = RegionState::Error(region.error_placeholder().to_string());
                Applied::Render
            }
        }
    }
}
