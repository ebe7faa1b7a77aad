//! Generic polling loop shared by every source.
//!
//! A [`Source`] knows how to fetch one batch and how to identify and render the
//! items worth reporting. [`Poller`] adds the seen-set and the notifier, and
//! [`run_forever`] drives any [`PollTask`] on its own schedule, catching both
//! errors and panics at the cycle boundary.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, error, info, warn};

use crate::config::PollerConfig;
use crate::notifier::Notifier;
use crate::seen::SeenSet;

/// Sleep after a good cycle and after a failed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub interval: Duration,
    pub backoff: Duration,
}

impl From<PollerConfig> for Schedule {
    fn from(c: PollerConfig) -> Self {
        Self {
            interval: c.interval(),
            backoff: c.backoff(),
        }
    }
}

/// One external source of reportable items.
#[async_trait]
pub trait Source: Send + Sync {
    type Item: Send + Sync;

    fn name(&self) -> &'static str;

    /// Fetch one batch. Transport failures are errors; an unexpected shape
    /// should come back as an empty batch.
    async fn fetch(&mut self) -> Result<Vec<Self::Item>>;

    /// Identifier of an item that should be reported, or `None` to skip it.
    fn select(&self, item: &Self::Item) -> Option<String>;

    /// Render the notification text. Called once per newly seen item and may
    /// perform enrichment lookups.
    async fn render(&self, item: &Self::Item) -> String;
}

/// A unit of periodic work driven by [`run_forever`].
#[async_trait]
pub trait PollTask: Send {
    fn name(&self) -> &'static str;

    fn schedule(&self) -> Schedule;

    /// Run one cycle, returning how many items were acted on.
    async fn poll_once(&mut self) -> Result<usize>;
}

/// Binds a [`Source`] to a seen-set and a notifier.
pub struct Poller<S: Source> {
    source: S,
    seen: SeenSet,
    schedule: Schedule,
    notifier: Arc<Notifier>,
}

impl<S: Source> Poller<S> {
    pub fn new(
        source: S,
        schedule: Schedule,
        seen_capacity: usize,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            source,
            seen: SeenSet::new(seen_capacity),
            schedule,
            notifier,
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }
}

#[async_trait]
impl<S: Source> PollTask for Poller<S> {
    fn name(&self) -> &'static str {
        self.source.name()
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Items are handled in the order the source returned them.
    async fn poll_once(&mut self) -> Result<usize> {
        let items = self.source.fetch().await?;
        let mut reported = 0;
        for item in &items {
            let Some(id) = self.source.select(item) else {
                continue;
            };
            if !self.seen.insert(&id) {
                continue;
            }
            debug!(source = self.source.name(), id = %id, "New item");
            let text = self.source.render(item).await;
            self.notifier.notify(&text).await;
            reported += 1;
        }
        Ok(reported)
    }
}

/// Drive `task` until the process stops.
///
/// Errors and panics inside a cycle are logged and followed by the task's
/// back-off; the task's state (including its seen-set) survives them.
pub async fn run_forever(mut task: Box<dyn PollTask>) {
    let name = task.name();
    let schedule = task.schedule();
    info!(
        source = name,
        "Poller started (interval {:?}, backoff {:?})", schedule.interval, schedule.backoff
    );

    loop {
        let outcome = AssertUnwindSafe(task.poll_once()).catch_unwind().await;
        let pause = match outcome {
            Ok(Ok(0)) => {
                debug!(source = name, "Nothing new");
                schedule.interval
            }
            Ok(Ok(n)) => {
                info!(source = name, "Reported {n} new item(s)");
                schedule.interval
            }
            Ok(Err(e)) => {
                warn!(source = name, "Poll failed: {e:#}");
                schedule.backoff
            }
            Err(panic) => {
                error!(source = name, "Poll cycle panicked: {}", panic_message(&*panic));
                schedule.backoff
            }
        };
        tokio::time::sleep(pause).await;
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
