//! Callbacks invoked by poll loops.

use crate::error::Result;
use crate::fetch::NamespaceConfig;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A namespace changed on the server and was re-fetched.
#[derive(Debug)]
pub struct ConfigChange {
    /// Application id.
    pub app_id: String,
    /// Namespace name.
    pub namespace: String,
    /// Notification id before the change; `None` if it was not tracked.
    pub old_notification_id: Option<i64>,
    /// Notification id reported by the server.
    pub new_notification_id: i64,
    /// Result of the uncached re-fetch of the namespace.
    pub config: Result<NamespaceConfig>,
    /// Server `messages` payload for this namespace.
    pub messages: Option<JsonValue>,
    /// Every tracked `namespace → notification id` of the application, with
    /// all changes of the current response already applied.
    pub notifications: BTreeMap<String, i64>,
}

impl ConfigChange {
    /// The new configuration, if the re-fetch succeeded with data.
    pub fn new_config(&self) -> Option<&NamespaceConfig> {
        self.config.as_ref().ok()
    }
}

/// A long-poll response as received, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Application id the poll was issued for.
    pub app_id: String,
    /// HTTP status code.
    pub status: u16,
    /// Raw body.
    pub body: String,
}

type ChangeCallback = Arc<dyn Fn(&ConfigChange) + Send + Sync>;
type RawResponseCallback = Arc<dyn Fn(&RawResponse) + Send + Sync>;

/// Callbacks shared by every poll loop of a watch.
///
/// Callbacks run inline on the poll loop, in registration order, so the next
/// poll for an application is not issued until they return.
///
/// # Examples
///
/// ```rust
/// use apollo_watch::notify::Listeners;
///
/// let listeners = Listeners::new()
///     .on_change(|change| println!("{} / {} changed", change.app_id, change.namespace))
///     .on_raw_response(|raw| println!("{} -> {}", raw.app_id, raw.status));
/// assert_eq!(listeners.change_listener_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct Listeners {
    change: Vec<ChangeCallback>,
    raw: Vec<RawResponseCallback>,
}

impl Listeners {
    /// Create an empty listener set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a change callback.
    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ConfigChange) + Send + Sync + 'static,
    {
        self.change.push(Arc::new(callback));
        self
    }

    /// Register a raw-response callback.
    pub fn on_raw_response<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RawResponse) + Send + Sync + 'static,
    {
        self.raw.push(Arc::new(callback));
        self
    }

    /// Invoke every change callback.
    pub fn notify_change(&self, change: &ConfigChange) {
        for callback in &self.change {
            callback(change);
        }
    }

    /// Invoke every raw-response callback.
    pub fn notify_raw(&self, response: &RawResponse) {
        for callback in &self.raw {
            callback(response);
        }
    }

    /// Number of change callbacks.
    pub fn change_listener_count(&self) -> usize {
        self.change.len()
    }

    /// Number of raw-response callbacks.
    pub fn raw_listener_count(&self) -> usize {
        self.raw.len()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("change", &self.change.len())
            .field("raw", &self.raw.len())
            .finish()
    }
}
