//! Runs poll loops for many applications at once.

use super::poll_loop::{PollContext, PollLoop};
use super::{ConfigChange, Listeners, NotificationState, RawResponse};
use crate::core::ConfigSnapshot;
use crate::error::{ApolloError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Barrier;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How the poll loops of a watch are scheduled relative to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Every application polls on its own schedule.
    #[default]
    Independent,
    /// All applications finish a cycle before any of them starts the next one.
    ///
    /// Cancelling one application stops the whole watch in this mode.
    Lockstep,
}

/// Builder and runner for a set of application poll loops.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_watch::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let client = ApolloClient::builder()
///     .with_server_url("http://localhost:8080")
///     .build()?;
///
/// client
///     .watcher()
///     .app_namespaces("orders", ["application", "db.yml"])
///     .app("billing", [("application", 42)])
///     .on_change(|change| {
///         println!(
///             "{}/{} moved {:?} -> {}",
///             change.app_id, change.namespace, change.old_notification_id, change.new_notification_id
///         );
///     })
///     .run()
///     .await
/// # }
/// ```
pub struct Watcher {
    context: PollContext,
    apps: BTreeMap<String, NotificationState>,
    listeners: Listeners,
    mode: ScheduleMode,
    root: CancellationToken,
    app_tokens: HashMap<String, CancellationToken>,
    snapshot: ConfigSnapshot,
}

impl Watcher {
    pub(crate) fn new(context: PollContext) -> Self {
        Self {
            context,
            apps: BTreeMap::new(),
            listeners: Listeners::new(),
            mode: ScheduleMode::default(),
            root: CancellationToken::new(),
            app_tokens: HashMap::new(),
            snapshot: ConfigSnapshot::new(),
        }
    }

    /// Watch `app_id` starting from a `namespace → notification id` mapping.
    ///
    /// Registering the same application again replaces its mapping.
    pub fn app<I, S>(mut self, app_id: impl Into<String>, mapping: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let app_id = app_id.into();
        self.app_tokens
            .entry(app_id.clone())
            .or_insert_with(|| self.root.child_token());
        self.apps
            .insert(app_id, NotificationState::from_mapping(mapping));
        self
    }

    /// Watch `app_id` with every namespace starting unseen.
    pub fn app_namespaces<I, S>(self, app_id: impl Into<String>, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.app(app_id, super::notice_mapping(namespaces))
    }

    /// Register a change callback.
    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ConfigChange) + Send + Sync + 'static,
    {
        self.listeners = self.listeners.on_change(callback);
        self
    }

    /// Register a raw-response callback.
    pub fn on_raw_response<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RawResponse) + Send + Sync + 'static,
    {
        self.listeners = self.listeners.on_raw_response(callback);
        self
    }

    /// Replace the listener set.
    pub fn with_listeners(mut self, listeners: Listeners) -> Self {
        self.listeners = listeners;
        self
    }

    /// Choose how loops are scheduled. Default is [`ScheduleMode::Independent`].
    pub fn schedule(mut self, mode: ScheduleMode) -> Self {
        self.mode = mode;
        self
    }

    /// Number of registered applications.
    pub fn app_count(&self) -> usize {
        self.apps.len()
    }

    /// Snapshot updated by this watch's loops.
    pub fn snapshot(&self) -> ConfigSnapshot {
        self.snapshot.clone()
    }

    /// Cancellation handle for the applications registered so far.
    pub fn control(&self) -> WatchControl {
        WatchControl {
            root: self.root.clone(),
            apps: Arc::new(self.app_tokens.clone()),
        }
    }

    /// Run every poll loop until all are cancelled or one hits a failure storm.
    ///
    /// On a failure storm every other loop is cancelled and the storm error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the first error a loop stopped with.
    pub async fn run(self) -> Result<()> {
        let Watcher {
            context,
            apps,
            listeners,
            mode,
            root,
            app_tokens,
            snapshot,
        } = self;

        if apps.is_empty() {
            warn!("no applications to watch");
            return Ok(());
        }

        info!(apps = apps.len(), mode = ?mode, "starting watch");
        let barrier = match mode {
            ScheduleMode::Lockstep => Some(Arc::new(Barrier::new(apps.len()))),
            ScheduleMode::Independent => None,
        };

        let mut tasks = JoinSet::new();
        for (app_id, state) in apps {
            let token = app_tokens
                .get(&app_id)
                .cloned()
                .unwrap_or_else(|| root.child_token());
            let poll = PollLoop::new(
                app_id,
                state,
                context.clone(),
                listeners.clone(),
                snapshot.clone(),
            );
            let barrier = barrier.clone();
            let root = root.clone();

            tasks.spawn(async move {
                let lockstep = barrier.is_some();
                let result = poll.run_with_barrier(token, barrier).await;
                if lockstep {
                    // A loop leaving the round would stall the others at the barrier
                    root.cancel();
                }
                result
            });
        }

        let mut result = Ok(());
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| ApolloError::Other(format!("Poll loop task failed: {}", e)))
                .and_then(|r| r);

            if let Err(err) = outcome {
                error!(error = %err, "poll loop stopped, cancelling watch");
                root.cancel();
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }

        info!("watch finished");
        result
    }

    /// Spawn [`Watcher::run`] onto the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(self) -> WatchHandle {
        let control = self.control();
        let snapshot = self.snapshot();
        let task = tokio::spawn(self.run());
        WatchHandle {
            control,
            snapshot,
            task,
        }
    }

    /// Run on a dedicated multi-threaded runtime, blocking the calling thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created, or whatever
    /// [`Watcher::run`] returns.
    pub fn run_blocking(self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApolloError::Other(format!("Failed to create runtime: {}", e)))?;
        runtime.block_on(self.run())
    }
}

/// Cancels a running watch, as a whole or per application.
#[derive(Clone)]
pub struct WatchControl {
    root: CancellationToken,
    apps: Arc<HashMap<String, CancellationToken>>,
}

impl WatchControl {
    /// Stop polling one application. Returns `false` for an unknown app id.
    pub fn cancel_app(&self, app_id: &str) -> bool {
        match self.apps.get(app_id) {
            Some(token) => {
                info!(app_id, "cancelling application");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop every loop.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    /// Whether the whole watch has been cancelled.
    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }
}

/// A watch spawned onto the runtime.
pub struct WatchHandle {
    control: WatchControl,
    snapshot: ConfigSnapshot,
    task: JoinHandle<Result<()>>,
}

impl WatchHandle {
    /// Cancellation handle.
    pub fn control(&self) -> &WatchControl {
        &self.control
    }

    /// Stop polling one application.
    pub fn cancel_app(&self, app_id: &str) -> bool {
        self.control.cancel_app(app_id)
    }

    /// Stop every loop.
    pub fn shutdown(&self) {
        self.control.shutdown();
    }

    /// Latest fetched configurations.
    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    /// Whether the watch has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the watch to stop.
    ///
    /// # Errors
    ///
    /// Returns the error the watch stopped with, e.g. [`ApolloError::FailureStorm`].
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| ApolloError::Other(format!("Watch task failed: {}", e)))?
    }
}
