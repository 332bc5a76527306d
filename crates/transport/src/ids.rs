use std::{collections::BTreeSet, sync::RwLock};

use tracing::warn;

/// Connection IDs multiplexed onto one transport.
///
/// Guarded by its own lock so a receive loop can tag payloads while a
/// control call adds or removes IDs.
#[derive(Debug, Default)]
pub struct ConnectionIds {
    inner: RwLock<BTreeSet<String>>,
}

impl ConnectionIds {
    pub fn with_first(id: &str) -> Self {
        let ids = Self::default();
        ids.add(id);
        ids
    }

    /// Add an ID and return the resulting count. Empty IDs are ignored.
    pub fn add(&self, id: &str) -> usize {
        let mut ids = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if id.is_empty() {
            warn!("ignoring empty connection id");
        } else {
            ids.insert(id.to_string());
        }
        ids.len()
    }

    /// Remove an ID and return how many remain.
    pub fn remove(&self, id: &str) -> usize {
        let mut ids = self.inner.write().unwrap_or_else(|e| e.into_inner());
        ids.remove(id);
        ids.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    /// Snapshot of the current IDs, sorted.
    pub fn list(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_report_counts() {
        let ids = ConnectionIds::with_first("conn-a");
        assert_eq!(ids.add("conn-b"), 2);
        assert_eq!(ids.add("conn-b"), 2);
        assert_eq!(ids.remove("conn-a"), 1);
        assert_eq!(ids.remove("conn-a"), 1);
        assert_eq!(ids.list(), vec!["conn-b".to_string()]);
        assert_eq!(ids.remove("conn-b"), 0);
        assert!(ids.is_empty());
    }

    #[test]
    fn empty_id_is_ignored() {
        let ids = ConnectionIds::default();
        assert_eq!(ids.add(""), 0);
        assert!(!ids.contains(""));
    }
}
