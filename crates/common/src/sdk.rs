use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::types::{
    ChannelProperties, ChannelStatus, ConnectionStatus, LinkProperties, LinkStatus, PackageStatus,
    RaceHandle,
};

/// Outcome of a call into the host SDK.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdkStatus {
    #[default]
    Ok,
    Invalid,
    InvalidArgument,
    PluginMissing,
    QueueFull,
    Shutting,
    Failure,
}

/// Host reply: a status plus, for asynchronous requests, the correlation handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SdkResponse {
    pub status: SdkStatus,
    pub handle: RaceHandle,
}

impl SdkResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_handle(handle: RaceHandle) -> Self {
        Self {
            status: SdkStatus::Ok,
            handle,
        }
    }

    pub fn failed(status: SdkStatus) -> Self {
        Self { status, handle: 0 }
    }

    pub fn is_ok(&self) -> bool {
        self.status == SdkStatus::Ok
    }
}

/// How a message shown to the user is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserDisplayType {
    Qr,
    Dialog,
    Toast,
    Notification,
}

/// Directories the host assigns to the plugin at init time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub etc_directory: String,
    pub logging_directory: String,
    pub aux_data_directory: String,
    pub tmp_directory: String,
    pub plugin_directory: String,
}

/// Interface the host runtime exposes to a comms plugin.
///
/// Every inbound payload, lifecycle transition, and user-input request goes
/// through this trait; the host provides the concrete implementation.
#[async_trait]
pub trait CommsSdk: Send + Sync {
    /// Persona this node runs as.
    fn active_persona(&self) -> String;

    /// Allocate a fresh link ID for a channel. Empty on failure.
    fn generate_link_id(&self, channel_gid: &str) -> String;

    /// Allocate a fresh connection ID for a link. Empty on failure.
    fn generate_connection_id(&self, link_id: &str) -> String;

    /// Host-side properties of a channel.
    fn channel_properties(&self, channel_gid: &str) -> ChannelProperties;

    /// Deliver an inbound payload, tagged with every connection ID that shares
    /// the transport it arrived on.
    async fn receive_enc_pkg(&self, payload: &[u8], connection_ids: &[String]) -> SdkResponse;

    async fn on_package_status_changed(
        &self,
        handle: RaceHandle,
        status: PackageStatus,
    ) -> SdkResponse;

    async fn on_connection_status_changed(
        &self,
        handle: RaceHandle,
        connection_id: &str,
        status: ConnectionStatus,
        properties: &LinkProperties,
    ) -> SdkResponse;

    async fn on_link_status_changed(
        &self,
        handle: RaceHandle,
        link_id: &str,
        status: LinkStatus,
        properties: &LinkProperties,
    ) -> SdkResponse;

    async fn on_channel_status_changed(
        &self,
        handle: RaceHandle,
        channel_gid: &str,
        status: ChannelStatus,
        properties: &ChannelProperties,
    ) -> SdkResponse;

    async fn update_link_properties(
        &self,
        link_id: &str,
        properties: &LinkProperties,
    ) -> SdkResponse;

    /// Ask for a value shared across plugins (e.g. `hostname`). The answer
    /// arrives later through `on_user_input_received` keyed by the returned handle.
    async fn request_common_user_input(&self, key: &str) -> SdkResponse;

    /// Ask for a plugin-specific value. `cache` lets the host remember the answer.
    async fn request_plugin_user_input(&self, key: &str, prompt: &str, cache: bool)
    -> SdkResponse;

    async fn display_info_to_user(&self, data: &str, display: UserDisplayType) -> SdkResponse;
}
