//! Recording host SDK shared by the integration tests.

#![allow(dead_code)]

use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    tokio::sync::mpsc,
    wisp_common::{
        ChannelProperties, ChannelStatus, CommsSdk, ConnectionStatus, LinkProperties, LinkStatus,
        LinkType, PackageStatus, RaceHandle, SdkResponse, SdkStatus, UserDisplayType,
    },
};

pub const DIRECT: &str = "wispDirect";
pub const INDIRECT: &str = "wispIndirect";

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Package {
        handle: RaceHandle,
        status: PackageStatus,
    },
    Connection {
        handle: RaceHandle,
        connection_id: String,
        status: ConnectionStatus,
    },
    Link {
        handle: RaceHandle,
        link_id: String,
        status: LinkStatus,
        link_type: LinkType,
    },
    Channel {
        channel_gid: String,
        status: ChannelStatus,
    },
    PropertiesPushed {
        link_id: String,
    },
    Displayed(String),
}

pub struct MockSdk {
    persona: String,
    events: Mutex<Vec<Event>>,
    requests: Mutex<Vec<(String, RaceHandle)>>,
    next_id: AtomicU64,
    next_handle: AtomicU64,
    fail_hostname_request: AtomicBool,
    connection_delay_ms: AtomicU64,
    received: mpsc::UnboundedSender<(Vec<u8>, Vec<String>)>,
}

impl MockSdk {
    pub fn new(persona: &str) -> (Self, mpsc::UnboundedReceiver<(Vec<u8>, Vec<String>)>) {
        let (received, rx) = mpsc::unbounded_channel();
        let sdk = Self {
            persona: persona.to_string(),
            events: Mutex::default(),
            requests: Mutex::default(),
            next_id: AtomicU64::new(0),
            next_handle: AtomicU64::new(100),
            fail_hostname_request: AtomicBool::new(false),
            connection_delay_ms: AtomicU64::new(0),
            received,
        };
        (sdk, rx)
    }

    pub fn fail_hostname_requests(&self) {
        self.fail_hostname_request.store(true, Ordering::SeqCst);
    }

    /// Make every connection status callback take `delay` before returning.
    pub fn delay_connection_events(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap();
        self.connection_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Handle of the most recent input request for `key`.
    pub fn request_handle(&self, key: &str) -> RaceHandle {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, h)| *h)
            .unwrap_or_else(|| panic!("no {key} request issued"))
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn channel_statuses(&self, channel_gid: &str) -> Vec<ChannelStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Channel {
                    channel_gid: gid,
                    status,
                } if gid == channel_gid => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn connection_events(&self) -> Vec<(String, ConnectionStatus)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Connection {
                    connection_id,
                    status,
                    ..
                } => Some((connection_id, status)),
                _ => None,
            })
            .collect()
    }

    pub fn link_events(&self) -> Vec<(String, LinkStatus, LinkType)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Link {
                    link_id,
                    status,
                    link_type,
                    ..
                } => Some((link_id, status, link_type)),
                _ => None,
            })
            .collect()
    }

    pub fn package_statuses(&self) -> Vec<PackageStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Package { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) -> SdkResponse {
        self.events.lock().unwrap().push(event);
        SdkResponse::ok()
    }

    fn issue_request(&self, key: &str) -> SdkResponse {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((key.to_string(), handle));
        SdkResponse::with_handle(handle)
    }
}

#[async_trait]
impl CommsSdk for MockSdk {
    fn active_persona(&self) -> String {
        self.persona.clone()
    }

    fn generate_link_id(&self, channel_gid: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{channel_gid}/link-{n}")
    }

    fn generate_connection_id(&self, link_id: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{link_id}/conn-{n}")
    }

    fn channel_properties(&self, channel_gid: &str) -> ChannelProperties {
        ChannelProperties {
            channel_gid: channel_gid.to_string(),
            ..ChannelProperties::default()
        }
    }

    async fn receive_enc_pkg(&self, payload: &[u8], connection_ids: &[String]) -> SdkResponse {
        let _ = self.received.send((payload.to_vec(), connection_ids.to_vec()));
        SdkResponse::ok()
    }

    async fn on_package_status_changed(
        &self,
        handle: RaceHandle,
        status: PackageStatus,
    ) -> SdkResponse {
        self.record(Event::Package { handle, status })
    }

    async fn on_connection_status_changed(
        &self,
        handle: RaceHandle,
        connection_id: &str,
        status: ConnectionStatus,
        _properties: &LinkProperties,
    ) -> SdkResponse {
        let delay = self.connection_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.record(Event::Connection {
            handle,
            connection_id: connection_id.to_string(),
            status,
        })
    }

    async fn on_link_status_changed(
        &self,
        handle: RaceHandle,
        link_id: &str,
        status: LinkStatus,
        properties: &LinkProperties,
    ) -> SdkResponse {
        self.record(Event::Link {
            handle,
            link_id: link_id.to_string(),
            status,
            link_type: properties.link_type,
        })
    }

    async fn on_channel_status_changed(
        &self,
        _handle: RaceHandle,
        channel_gid: &str,
        status: ChannelStatus,
        _properties: &ChannelProperties,
    ) -> SdkResponse {
        self.record(Event::Channel {
            channel_gid: channel_gid.to_string(),
            status,
        })
    }

    async fn update_link_properties(
        &self,
        link_id: &str,
        _properties: &LinkProperties,
    ) -> SdkResponse {
        self.record(Event::PropertiesPushed {
            link_id: link_id.to_string(),
        })
    }

    async fn request_common_user_input(&self, key: &str) -> SdkResponse {
        if key == "hostname" && self.fail_hostname_request.load(Ordering::SeqCst) {
            return SdkResponse::failed(SdkStatus::Invalid);
        }
        self.issue_request(key)
    }

    async fn request_plugin_user_input(
        &self,
        key: &str,
        _prompt: &str,
        _cache: bool,
    ) -> SdkResponse {
        self.issue_request(key)
    }

    async fn display_info_to_user(&self, data: &str, _display: UserDisplayType) -> SdkResponse {
        self.record(Event::Displayed(data.to_string()))
    }
}

/// A localhost port nothing is listening on right now.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
