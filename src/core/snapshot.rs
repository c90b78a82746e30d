//! Lock-free view of the latest fetched namespaces.

use crate::fetch::NamespaceConfig;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

type NamespaceMap = HashMap<String, HashMap<String, Arc<NamespaceConfig>>>;

/// Latest configuration per `(app_id, namespace)` seen by the poll loops.
///
/// Uses `arc-swap` internally: readers never block and never observe a
/// partially applied update. Cloning is cheap; clones share the same view.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_watch::prelude::*;
///
/// # async fn example(client: ApolloClient) -> Result<()> {
/// let handle = client.watcher().app_namespaces("A1", ["application"]).spawn();
///
/// // Zero-cost read from any thread
/// if let Some(config) = handle.snapshot().get("A1", "application") {
///     println!("timeout = {:?}", config.get_str("timeout"));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct ConfigSnapshot {
    current: Arc<ArcSwap<NamespaceMap>>,
}

impl ConfigSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest configuration of a namespace, if one has been fetched.
    pub fn get(&self, app_id: &str, namespace: &str) -> Option<Arc<NamespaceConfig>> {
        self.current
            .load()
            .get(app_id)
            .and_then(|namespaces| namespaces.get(namespace))
            .cloned()
    }

    /// Names of the namespaces held for `app_id`, sorted.
    pub fn namespaces(&self, app_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .current
            .load()
            .get(app_id)
            .map(|namespaces| namespaces.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Total number of namespaces held.
    pub fn len(&self) -> usize {
        self.current.load().values().map(HashMap::len).sum()
    }

    /// Whether nothing has been fetched yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically replace the entry for `config`'s app and namespace.
    pub fn store(&self, config: NamespaceConfig) -> Arc<NamespaceConfig> {
        let config = Arc::new(config);
        self.current.rcu(|current| {
            let mut next = NamespaceMap::clone(current);
            next.entry(config.app_id().to_string())
                .or_default()
                .insert(config.namespace().to_string(), Arc::clone(&config));
            next
        });
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResult;

    fn config(app: &str, ns: &str, body: &str) -> NamespaceConfig {
        FetchResult::new(200, body)
            .into_outcome(app, "default", ns, true)
            .unwrap()
            .into_config()
            .unwrap()
    }

    #[test]
    fn test_store_and_read() {
        let snapshot = ConfigSnapshot::new();
        assert!(snapshot.is_empty());

        snapshot.store(config("A1", "application", r#"{"k":"v1"}"#));
        snapshot.store(config("A1", "app.yml", r#"{"content":"x"}"#));
        snapshot.store(config("A2", "application", r#"{"k":"other"}"#));

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.namespaces("A1"), vec!["app.yml", "application"]);
        assert_eq!(
            snapshot.get("A1", "application").unwrap().get_str("k"),
            Some("v1")
        );
        assert!(snapshot.get("A3", "application").is_none());
    }

    #[test]
    fn test_store_replaces() {
        let snapshot = ConfigSnapshot::new();
        let before = snapshot.store(config("A1", "application", r#"{"k":"v1"}"#));
        snapshot.store(config("A1", "application", r#"{"k":"v2"}"#));

        // Readers holding the old Arc keep a consistent value
        assert_eq!(before.get_str("k"), Some("v1"));
        assert_eq!(
            snapshot.get("A1", "application").unwrap().get_str("k"),
            Some("v2")
        );
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_clone_shares_view() {
        let snapshot = ConfigSnapshot::new();
        let reader = snapshot.clone();
        snapshot.store(config("A1", "application", "{}"));
        assert_eq!(reader.len(), 1);
    }
}
