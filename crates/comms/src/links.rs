use std::{collections::HashMap, sync::RwLock};

use {
    wisp_common::{LinkProperties, LinkType},
    wisp_transport::LinkProfile,
};

#[cfg(feature = "metrics")]
use wisp_metrics::{comms as comms_metrics, gauge};

/// A created or loaded link.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: String,
    pub channel_gid: String,
    pub link_type: LinkType,
    pub profile: LinkProfile,
    pub properties: LinkProperties,
}

/// Link ID → link, shared by control calls and receive-loop failure handling.
#[derive(Debug, Default)]
pub struct LinkStore {
    links: RwLock<HashMap<String, Link>>,
}

impl LinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, link: Link) {
        let mut links = self.links.write().unwrap_or_else(|e| e.into_inner());
        links.insert(link.id.clone(), link);
        #[cfg(feature = "metrics")]
        gauge!(comms_metrics::LINKS_ACTIVE).set(links.len() as f64);
    }

    pub fn get(&self, link_id: &str) -> Option<Link> {
        self.links
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(link_id)
            .cloned()
    }

    pub fn contains(&self, link_id: &str) -> bool {
        self.links
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(link_id)
    }

    pub fn properties(&self, link_id: &str) -> Option<LinkProperties> {
        self.links
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(link_id)
            .map(|l| l.properties.clone())
    }

    /// Mutate a link's properties in place and return the updated copy.
    pub fn update_properties<F>(&self, link_id: &str, update: F) -> Option<LinkProperties>
    where
        F: FnOnce(&mut LinkProperties),
    {
        let mut links = self.links.write().unwrap_or_else(|e| e.into_inner());
        let link = links.get_mut(link_id)?;
        update(&mut link.properties);
        Some(link.properties.clone())
    }

    pub fn remove(&self, link_id: &str) -> Option<Link> {
        let mut links = self.links.write().unwrap_or_else(|e| e.into_inner());
        let removed = links.remove(link_id);
        #[cfg(feature = "metrics")]
        gauge!(comms_metrics::LINKS_ACTIVE).set(links.len() as f64);
        removed
    }

    pub fn link_ids_for_channel(&self, channel_gid: &str) -> Vec<String> {
        self.links
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|l| l.channel_gid == channel_gid)
            .map(|l| l.id.clone())
            .collect()
    }

    /// Drop every link, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut links = self.links.write().unwrap_or_else(|e| e.into_inner());
        let count = links.len();
        links.clear();
        #[cfg(feature = "metrics")]
        gauge!(comms_metrics::LINKS_ACTIVE).set(0.0);
        count
    }

    pub fn len(&self) -> usize {
        self.links.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
