//! Per-application long-poll loop.
//!
//! Each cycle builds the pending notification list, issues a long poll and,
//! on a 200 response, applies the id changes before re-fetching every changed
//! namespace and invoking the change listeners. The next cycle starts as soon
//! as the previous one is fully processed; the server-side hold time of the
//! long poll is the only pacing.
//!
//! Failed polls are remembered in a [`FailureWindow`]. When the window fills
//! with failures bunched into a couple of seconds the loop stops with
//! [`ApolloError::FailureStorm`], which the [`Watcher`](super::Watcher) turns
//! into a stop of every loop.

use super::{
    ConfigChange, FailureWindow, Listeners, Notification, NotificationChange, NotificationState,
    RawResponse, StormPolicy,
};
use crate::core::ConfigSnapshot;
use crate::error::{ApolloError, Result};
use crate::fetch::{ConfigFetcher, Endpoints, FetchOutcome, NamespaceConfig, SignedRequester};
use crate::transport::HttpResponse;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::PollMetrics;

/// Source of the current unix time in seconds.
pub(crate) type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub(crate) fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp())
}

/// Everything a poll loop shares with the client and its sibling loops.
#[derive(Clone)]
pub(crate) struct PollContext {
    pub(crate) requester: SignedRequester,
    pub(crate) endpoints: Arc<Endpoints>,
    pub(crate) fetcher: ConfigFetcher,
    pub(crate) long_poll_timeout: Duration,
    pub(crate) storm: StormPolicy,
    pub(crate) clock: Clock,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<PollMetrics>,
}

/// What one poll cycle produced.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The server reported changes; this many namespaces were re-fetched.
    Changed(usize),
    /// The poll completed without any namespace changing.
    Unchanged,
    /// The poll failed; the failure was recorded but is not a storm yet.
    Failed(ApolloError),
}

/// Long-poll state machine for a single application.
pub struct PollLoop {
    app_id: String,
    state: NotificationState,
    window: FailureWindow,
    context: PollContext,
    listeners: Listeners,
    snapshot: ConfigSnapshot,
}

impl PollLoop {
    pub(crate) fn new(
        app_id: impl Into<String>,
        state: NotificationState,
        context: PollContext,
        listeners: Listeners,
        snapshot: ConfigSnapshot,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            window: FailureWindow::new(context.storm),
            state,
            context,
            listeners,
            snapshot,
        }
    }

    /// Application id this loop polls for.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Current notification ids.
    pub fn state(&self) -> &NotificationState {
        &self.state
    }

    /// Recent consecutive failures.
    pub fn failure_window(&self) -> &FailureWindow {
        &self.window
    }

    /// Configurations fetched by this loop after change notifications.
    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    /// Run one poll cycle.
    ///
    /// # Errors
    ///
    /// Returns [`ApolloError::FailureStorm`] when this cycle's failure completes
    /// a storm. Every other failure is reported as [`CycleOutcome::Failed`].
    pub async fn cycle(&mut self) -> Result<CycleOutcome> {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.context.metrics {
            metrics.record_poll(&self.app_id);
        }

        let pending = self.state.request_list();
        let url = self
            .context
            .endpoints
            .notifications_url(&self.app_id, &pending)?;
        debug!(app_id = %self.app_id, namespaces = pending.len(), "long polling");

        match self
            .context
            .requester
            .get(&self.app_id, url, self.context.long_poll_timeout)
            .await
        {
            Ok(response) => self.handle_response(response).await,
            Err(err) => self.record_failure(err),
        }
    }

    async fn handle_response(&mut self, response: HttpResponse) -> Result<CycleOutcome> {
        self.listeners.notify_raw(&RawResponse {
            app_id: self.app_id.clone(),
            status: response.status,
            body: response.body.clone(),
        });

        match response.status {
            200 => {
                let parsed = serde_json::from_str::<Vec<Notification>>(&response.body);
                let notifications = match parsed {
                    Ok(notifications) => notifications,
                    Err(e) => return self.record_failure(e.into()),
                };
                self.window.clear();

                let changes = self.state.diff(&notifications);
                self.state.apply(&changes);
                if changes.is_empty() {
                    return Ok(CycleOutcome::Unchanged);
                }

                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.context.metrics {
                    metrics.record_changes(&self.app_id, changes.len());
                }

                let count = changes.len();
                for change in changes {
                    self.dispatch_change(change).await;
                }
                Ok(CycleOutcome::Changed(count))
            }
            304 => {
                debug!(app_id = %self.app_id, "no namespace changed");
                self.window.clear();
                Ok(CycleOutcome::Unchanged)
            }
            status => {
                warn!(app_id = %self.app_id, status, "unexpected long-poll status");
                self.record_failure(ApolloError::UnexpectedStatus {
                    status,
                    body: response.body,
                })
            }
        }
    }

    async fn dispatch_change(&mut self, change: NotificationChange) {
        info!(
            app_id = %self.app_id,
            namespace = %change.namespace,
            old_id = ?change.old_id,
            new_id = change.new_id,
            "namespace changed"
        );

        let config = self.fetch_changed(&change.namespace).await;
        if let Ok(config) = &config {
            self.snapshot.store(config.clone());
        }

        self.listeners.notify_change(&ConfigChange {
            app_id: self.app_id.clone(),
            namespace: change.namespace,
            old_notification_id: change.old_id,
            new_notification_id: change.new_id,
            config,
            messages: change.messages,
            notifications: self.state.to_mapping(),
        });
    }

    async fn fetch_changed(&self, namespace: &str) -> Result<NamespaceConfig> {
        #[cfg(feature = "metrics")]
        let started = self.context.metrics.as_ref().map(|m| m.start_fetch());

        let result = self
            .context
            .fetcher
            .fetch_config(&self.app_id, namespace, false, "")
            .await
            .and_then(|outcome| match outcome {
                FetchOutcome::Updated(config) => Ok(config),
                FetchOutcome::NotModified => Err(ApolloError::Other(format!(
                    "namespace '{namespace}' reported not modified after a change"
                ))),
            });

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(started)) = (&self.context.metrics, started) {
            match &result {
                Ok(_) => metrics.record_fetch_success(&self.app_id, started),
                Err(_) => metrics.record_fetch_failure(&self.app_id, started),
            }
        }

        result
    }

    fn record_failure(&mut self, err: ApolloError) -> Result<CycleOutcome> {
        self.window.record((self.context.clock)());

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.context.metrics {
            metrics.record_poll_failure(&self.app_id);
        }

        if self.window.is_storm() {
            error!(
                app_id = %self.app_id,
                failures = self.window.len(),
                distinct_instants = self.window.distinct_instants(),
                error = %err,
                "failure storm detected, stopping"
            );

            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.context.metrics {
                metrics.record_failure_storm(&self.app_id);
            }

            return Err(ApolloError::FailureStorm {
                app_id: self.app_id.clone(),
                failures: self.window.len(),
                distinct_instants: self.window.distinct_instants(),
                last_error: err.to_string(),
            });
        }

        warn!(
            app_id = %self.app_id,
            failures = self.window.len(),
            error = %err,
            "long poll failed"
        );
        Ok(CycleOutcome::Failed(err))
    }

    /// Poll until `token` is cancelled or a failure storm occurs.
    ///
    /// # Errors
    ///
    /// Returns [`ApolloError::FailureStorm`] (or an error building the request URL).
    pub async fn run(self, token: CancellationToken) -> Result<()> {
        self.run_with_barrier(token, None).await
    }

    /// Poll until cancelled, meeting the other loops at `barrier` after each cycle.
    pub(crate) async fn run_with_barrier(
        mut self,
        token: CancellationToken,
        barrier: Option<Arc<Barrier>>,
    ) -> Result<()> {
        info!(app_id = %self.app_id, namespaces = self.state.len(), "starting poll loop");

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                outcome = self.cycle() => {
                    outcome?;
                }
            }

            if let Some(barrier) = &barrier {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = barrier.wait() => {}
                }
            }
        }

        info!(app_id = %self.app_id, "poll loop cancelled");
        Ok(())
    }
}
