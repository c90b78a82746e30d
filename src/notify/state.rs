//! Per-application namespace → notification id bookkeeping.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

/// Notification id of a namespace that has never been observed.
pub const UNSEEN_NOTIFICATION_ID: i64 = -1;

/// One `{namespaceName, notificationId}` entry, as sent in the long-poll
/// request and returned in its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Namespace name.
    pub namespace_name: String,
    /// Server-assigned version of the namespace.
    #[serde(deserialize_with = "deserialize_notification_id")]
    pub notification_id: i64,
    /// Opaque `messages` payload the server attaches to responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<JsonValue>,
}

impl Notification {
    /// Create a notification entry without messages.
    pub fn new(namespace_name: impl Into<String>, notification_id: i64) -> Self {
        Self {
            namespace_name: namespace_name.into(),
            notification_id,
            messages: None,
        }
    }
}

/// Accept both `100` and `"100"` for notification ids.
fn deserialize_notification_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Float(f64),
        Str(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(id) => Ok(id),
        RawId::Float(id) if id.fract() == 0.0 => Ok(id as i64),
        RawId::Float(id) => Err(serde::de::Error::custom(format!(
            "notification id {id} is not an integer"
        ))),
        RawId::Str(raw) => raw.trim().parse::<i64>().map_err(|e| {
            serde::de::Error::custom(format!("invalid notification id '{raw}': {e}"))
        }),
    }
}

/// A namespace whose notification id moved.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationChange {
    /// Namespace name.
    pub namespace: String,
    /// Id before the change; `None` if the namespace was not tracked.
    pub old_id: Option<i64>,
    /// Id reported by the server.
    pub new_id: i64,
    /// Server `messages` payload for this entry.
    pub messages: Option<JsonValue>,
}

/// Last-seen notification id per namespace for one application.
///
/// Owned by a single poll loop and only mutated after a successful poll.
///
/// # Examples
///
/// ```rust
/// use apollo_watch::notify::{Notification, NotificationState};
///
/// let mut state = NotificationState::with_namespaces(["app.yml"]);
/// let changes = state.diff(&[Notification::new("app.yml", 100)]);
/// assert_eq!(changes.len(), 1);
/// assert_eq!(changes[0].old_id, Some(-1));
///
/// state.apply(&changes);
/// assert_eq!(state.get("app.yml"), Some(100));
/// assert!(state.diff(&[Notification::new("app.yml", 100)]).is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    versions: BTreeMap<String, i64>,
}

impl NotificationState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state from a `namespace → notification id` mapping.
    pub fn from_mapping<I, S>(mapping: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            versions: mapping
                .into_iter()
                .map(|(namespace, id)| (namespace.into(), id))
                .collect(),
        }
    }

    /// Create a state where every namespace starts unseen (`-1`).
    pub fn with_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_mapping(notice_mapping(namespaces))
    }

    /// Current id of a namespace.
    pub fn get(&self, namespace: &str) -> Option<i64> {
        self.versions.get(namespace).copied()
    }

    /// Number of tracked namespaces.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether no namespace is tracked.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Iterate over `(namespace, id)` pairs in namespace order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.versions.iter().map(|(ns, id)| (ns.as_str(), *id))
    }

    /// Copy of the `namespace → notification id` mapping.
    ///
    /// Feeding it back into [`NotificationState::from_mapping`] resumes polling
    /// from the same point.
    pub fn to_mapping(&self) -> BTreeMap<String, i64> {
        self.versions.clone()
    }

    /// Build the long-poll request body from the current state.
    pub fn request_list(&self) -> Vec<Notification> {
        self.versions
            .iter()
            .map(|(namespace, id)| Notification::new(namespace.clone(), *id))
            .collect()
    }

    /// Compare server notifications against the current state.
    ///
    /// Emits a change for each entry whose namespace is untracked or tracked
    /// with a different id. Entries are evaluated in order, so a namespace
    /// repeated in one response is compared against its previous entry.
    pub fn diff(&self, server: &[Notification]) -> Vec<NotificationChange> {
        let mut seen: HashMap<&str, i64> = HashMap::new();
        let mut changes = Vec::new();

        for entry in server {
            let namespace = entry.namespace_name.as_str();
            let current = seen
                .get(namespace)
                .copied()
                .or_else(|| self.get(namespace));

            if current != Some(entry.notification_id) {
                changes.push(NotificationChange {
                    namespace: namespace.to_string(),
                    old_id: current,
                    new_id: entry.notification_id,
                    messages: entry.messages.clone(),
                });
                seen.insert(namespace, entry.notification_id);
            }
        }

        changes
    }

    /// Record the new ids from `changes`.
    pub fn apply(&mut self, changes: &[NotificationChange]) {
        for change in changes {
            self.versions.insert(change.namespace.clone(), change.new_id);
        }
    }
}

/// Build a `namespace → -1` mapping for namespaces that have not been seen yet.
///
/// # Examples
///
/// ```rust
/// use apollo_watch::notify::notice_mapping;
///
/// let mapping = notice_mapping(["application", "app.yml"]);
/// assert_eq!(mapping.get("app.yml"), Some(&-1));
/// ```
pub fn notice_mapping<I, S>(namespaces: I) -> BTreeMap<String, i64>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    namespaces
        .into_iter()
        .map(|namespace| (namespace.into(), UNSEEN_NOTIFICATION_ID))
        .collect()
}

/// Build initial mappings for several applications at once.
pub fn app_notice_mapping<I, A, N, S>(apps: I) -> BTreeMap<String, BTreeMap<String, i64>>
where
    I: IntoIterator<Item = (A, N)>,
    A: Into<String>,
    N: IntoIterator<Item = S>,
    S: Into<String>,
{
    apps.into_iter()
        .map(|(app_id, namespaces)| (app_id.into(), notice_mapping(namespaces)))
        .collect()
}
