//! The comms plugin context object.
//!
//! [`CommsPlugin`] owns every piece of plugin state and exposes the
//! operations the host invokes. Each failed operation both returns `Err` and
//! reports the matching failure status to the host.

use std::{
    path::Path,
    sync::{Arc, RwLock},
    time::Duration,
};

use {
    tracing::{debug, error, info, warn},
    wisp_common::{
        ChannelStatus, CommsSdk, ConnectionStatus, LinkProperties, LinkStatus, LinkType,
        NULL_HANDLE, PackageStatus, PluginConfig, RaceHandle, SdkResponse, UserDisplayType,
    },
    wisp_config::{CommsConfig, discover_and_load, load_config},
    wisp_transport::{LinkProfile, TransportKind, TransportSettings, open_transport},
};

#[cfg(feature = "metrics")]
use wisp_metrics::{comms as comms_metrics, counter, labels, transport as transport_metrics};

use crate::{
    Error, Result,
    channels::{Activation, ChannelManager, InputOutcome, InputPurpose},
    dispatch::ReceiveDispatcher,
    error::Context,
    links::{Link, LinkStore},
    properties::default_link_properties,
    registry::ConnectionRegistry,
};

/// How long shutdown waits for receive loops to notice their transport closed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const START_PORT_PROMPT: &str = "What is the first available port?";

/// Where a new link's address comes from.
#[derive(Debug, Clone, Copy)]
enum LinkSource<'a> {
    /// Allocate a fresh address on this node.
    Create,
    /// Listen on an address chosen elsewhere.
    CreateFromAddress(&'a str),
    /// Talk to a peer's address.
    Load(&'a str),
}

impl LinkSource<'_> {
    fn status(self) -> LinkStatus {
        match self {
            Self::Create | Self::CreateFromAddress(_) => LinkStatus::Created,
            Self::Load(_) => LinkStatus::Loaded,
        }
    }

    fn link_type(self, kind: TransportKind) -> LinkType {
        match (self, kind) {
            (_, TransportKind::Whiteboard) => LinkType::Bidi,
            (Self::Load(_), TransportKind::Direct) => LinkType::Send,
            (_, TransportKind::Direct) => LinkType::Recv,
        }
    }
}

fn check_response(call: &'static str, response: SdkResponse) {
    if !response.is_ok() {
        warn!(call, status = ?response.status, "host returned non-ok status");
    }
}

pub struct CommsPlugin {
    sdk: Arc<dyn CommsSdk>,
    settings: TransportSettings,
    persona: RwLock<String>,
    channels: ChannelManager,
    links: Arc<LinkStore>,
    registry: Arc<ConnectionRegistry>,
    dispatcher: ReceiveDispatcher,
}

impl CommsPlugin {
    pub fn new(sdk: Arc<dyn CommsSdk>, config: CommsConfig) -> Self {
        let links = Arc::new(LinkStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher =
            ReceiveDispatcher::new(Arc::clone(&sdk), Arc::clone(&registry), Arc::clone(&links));
        Self {
            settings: TransportSettings::from_config(&config),
            channels: ChannelManager::new(&config),
            persona: RwLock::new(String::new()),
            sdk,
            links,
            registry,
            dispatcher,
        }
    }

    /// Build with the config file found in `dir`, or defaults if there is none.
    pub fn from_config_dir(sdk: Arc<dyn CommsSdk>, dir: &Path) -> Self {
        Self::new(sdk, discover_and_load(dir))
    }

    /// Build with an explicit config file. Unlike [`Self::from_config_dir`],
    /// an unreadable or invalid file is an error.
    pub fn from_config_file(sdk: Arc<dyn CommsSdk>, path: &Path) -> Result<Self> {
        let config =
            load_config(path).with_context(|| format!("failed to load {}", path.display()))?;
        Ok(Self::new(sdk, config))
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    pub async fn init(&self, plugin_config: &PluginConfig) -> Result<()> {
        info!("initializing comms plugin");
        debug!(
            etc_directory = %plugin_config.etc_directory,
            logging_directory = %plugin_config.logging_directory,
            aux_data_directory = %plugin_config.aux_data_directory,
            tmp_directory = %plugin_config.tmp_directory,
            plugin_directory = %plugin_config.plugin_directory,
            "plugin directories"
        );

        let persona = self.sdk.active_persona();
        debug!(persona = %persona, "active persona");
        *self.persona.write().unwrap_or_else(|e| e.into_inner()) = persona;

        self.channels.reset();
        Ok(())
    }

    /// Close every connection, drop every link, and wait for receive loops.
    pub async fn shutdown(&self) -> Result<()> {
        info!(
            connections = self.registry.len(),
            links = self.links.len(),
            "shutting down comms plugin"
        );
        for connection_id in self.registry.connection_ids() {
            if let Err(e) = self.close_connection(NULL_HANDLE, &connection_id).await {
                debug!(connection_id = %connection_id, error = %e, "connection already gone");
            }
        }
        self.links.clear();
        self.channels.reset();
        self.dispatcher.shutdown(SHUTDOWN_GRACE).await;
        info!("comms plugin shut down");
        Ok(())
    }

    // ── Packages ────────────────────────────────────────────────────────────

    pub async fn send_package(
        &self,
        handle: RaceHandle,
        connection_id: &str,
        payload: &[u8],
    ) -> Result<()> {
        debug!(handle, connection_id, bytes = payload.len(), "send package");

        let Some(transport) = self.registry.get(connection_id) else {
            error!(handle, connection_id, "cannot send on unknown connection");
            self.report_package(handle, PackageStatus::FailedGeneric).await;
            return Err(Error::unknown_connection(connection_id));
        };

        let link_type = self
            .links
            .get(transport.link_id())
            .map_or(transport.link_type(), |l| l.link_type);
        if !link_type.sends() {
            error!(handle, connection_id, %link_type, "cannot send on a receive-only link");
            self.report_package(handle, PackageStatus::FailedGeneric).await;
            return Err(Error::SendNotPermitted {
                connection_id: connection_id.to_string(),
                link_type,
            });
        }

        match self.registry.send(connection_id, payload).await {
            Ok(()) => {
                #[cfg(feature = "metrics")]
                counter!(transport_metrics::PACKAGES_SENT_TOTAL, labels::KIND => transport.kind().as_str())
                    .increment(1);
                self.report_package(handle, PackageStatus::Sent).await;
                Ok(())
            },
            Err(e) => {
                warn!(handle, connection_id, error = %e, "send failed");
                #[cfg(feature = "metrics")]
                counter!(transport_metrics::PACKAGES_FAILED_TOTAL, labels::KIND => transport.kind().as_str())
                    .increment(1);
                self.report_package(handle, PackageStatus::FailedGeneric).await;
                Err(e)
            },
        }
    }

    // ── Connections ─────────────────────────────────────────────────────────

    /// Open a connection on a link and return its ID.
    ///
    /// Connections with the same link and link type share one transport.
    pub async fn open_connection(
        &self,
        handle: RaceHandle,
        link_type: LinkType,
        link_id: &str,
        link_hints: &str,
    ) -> Result<String> {
        debug!(handle, link_id, %link_type, link_hints, "open connection");
        let connection_id = self.sdk.generate_connection_id(link_id);

        let Some(link) = self.links.get(link_id) else {
            error!(handle, link_id, "no link with this ID");
            self.report_connection(
                handle,
                &connection_id,
                ConnectionStatus::Closed,
                &LinkProperties::default(),
            )
            .await;
            return Err(Error::unknown_link(link_id));
        };

        let opened = if connection_id.is_empty() {
            Err(Error::EmptyId { what: "connection" })
        } else if !link.link_type.accepts(link_type) {
            Err(Error::IncompatibleLinkType {
                link_id: link_id.to_string(),
                link_type: link.link_type,
                requested: link_type,
            })
        } else {
            self.registry
                .reuse_or_open(link_id, link_type, &connection_id, || {
                    open_transport(
                        link_id,
                        link_type,
                        &link.profile,
                        &connection_id,
                        &self.settings,
                    )
                })
        };

        let opened = match opened {
            Ok(opened) => opened,
            Err(e) => {
                error!(handle, link_id, connection_id = %connection_id, error = %e, "cannot open connection");
                self.report_connection(
                    handle,
                    &connection_id,
                    ConnectionStatus::Closed,
                    &link.properties,
                )
                .await;
                return Err(e);
            },
        };

        if opened.created && link_type.receives() {
            self.dispatcher.start(Arc::clone(&opened.transport));
        }
        info!(handle, link_id, connection_id = %connection_id, %link_type, "connection open");
        self.report_connection(
            handle,
            &connection_id,
            ConnectionStatus::Open,
            &link.properties,
        )
        .await;
        Ok(connection_id)
    }

    pub async fn close_connection(&self, handle: RaceHandle, connection_id: &str) -> Result<()> {
        debug!(handle, connection_id, "close connection");
        let closed = match self.registry.close(connection_id) {
            Ok(closed) => closed,
            Err(e) => {
                error!(handle, connection_id, "cannot close unknown connection");
                return Err(e);
            },
        };
        let properties = self.links.properties(&closed.link_id).unwrap_or_default();
        self.report_connection(handle, connection_id, ConnectionStatus::Closed, &properties)
            .await;
        Ok(())
    }

    // ── Links ───────────────────────────────────────────────────────────────

    /// Destroy a link and close every connection on it.
    pub async fn destroy_link(&self, handle: RaceHandle, link_id: &str) -> Result<()> {
        debug!(handle, link_id, "destroy link");
        let Some(properties) = self.links.properties(link_id) else {
            error!(handle, link_id, "cannot destroy unknown link");
            return Err(Error::unknown_link(link_id));
        };

        self.report_link(handle, link_id, LinkStatus::Destroyed, &properties)
            .await;
        for connection_id in self.registry.connection_ids_for_link(link_id) {
            if let Err(e) = self.close_connection(NULL_HANDLE, &connection_id).await {
                debug!(connection_id = %connection_id, error = %e, "connection already gone");
            }
        }
        self.links.remove(link_id);
        info!(link_id, "link destroyed");
        Ok(())
    }

    /// Create a link at a freshly allocated address and return its ID.
    pub async fn create_link(&self, handle: RaceHandle, channel_gid: &str) -> Result<String> {
        self.add_link(handle, channel_gid, LinkSource::Create).await
    }

    /// Create a link listening on an address produced elsewhere.
    pub async fn create_link_from_address(
        &self,
        handle: RaceHandle,
        channel_gid: &str,
        link_address: &str,
    ) -> Result<String> {
        self.add_link(
            handle,
            channel_gid,
            LinkSource::CreateFromAddress(link_address),
        )
        .await
    }

    /// Load a peer's link address.
    pub async fn load_link_address(
        &self,
        handle: RaceHandle,
        channel_gid: &str,
        link_address: &str,
    ) -> Result<String> {
        self.add_link(handle, channel_gid, LinkSource::Load(link_address))
            .await
    }

    /// Multi-address links are not supported by either channel.
    pub async fn load_link_addresses(
        &self,
        handle: RaceHandle,
        channel_gid: &str,
        link_addresses: &[String],
    ) -> Result<()> {
        warn!(
            handle,
            channel_gid,
            addresses = ?link_addresses,
            "loading multiple link addresses is not supported"
        );
        self.report_link(
            handle,
            "",
            LinkStatus::Destroyed,
            &LinkProperties::default(),
        )
        .await;
        Err(Error::Unsupported {
            operation: "load_link_addresses",
        })
    }

    async fn add_link(
        &self,
        handle: RaceHandle,
        channel_gid: &str,
        source: LinkSource<'_>,
    ) -> Result<String> {
        debug!(handle, channel_gid, ?source, "add link");
        let link_id = self.sdk.generate_link_id(channel_gid);

        let link = match self.prepare_link(channel_gid, &link_id, source) {
            Ok(link) => link,
            Err(e) => {
                error!(handle, channel_gid, link_id = %link_id, error = %e, "link rejected");
                self.report_link(
                    handle,
                    &link_id,
                    LinkStatus::Destroyed,
                    &LinkProperties::default(),
                )
                .await;
                return Err(e);
            },
        };

        let inserted = self
            .channels
            .while_available(channel_gid, || self.links.insert(link.clone()));
        if let Err(e) = inserted {
            error!(handle, channel_gid, link_id = %link.id, error = %e, "channel deactivated while adding link");
            self.report_link(
                handle,
                &link.id,
                LinkStatus::Destroyed,
                &LinkProperties::default(),
            )
            .await;
            return Err(e);
        }
        self.report_link(handle, &link.id, source.status(), &link.properties)
            .await;
        self.push_link_properties(&link.id, &link.properties).await;
        info!(
            link_id = %link.id,
            channel_gid,
            link_type = %link.link_type,
            address = %link.properties.link_address,
            "link added"
        );
        Ok(link.id)
    }

    fn prepare_link(&self, channel_gid: &str, link_id: &str, source: LinkSource<'_>) -> Result<Link> {
        let kind = self.channels.require_available(channel_gid)?;
        if link_id.is_empty() {
            return Err(Error::EmptyId { what: "link" });
        }

        let (profile, address) = match source {
            LinkSource::Create => {
                let profile = match kind {
                    TransportKind::Direct => {
                        LinkProfile::from(self.channels.allocate_direct_profile()?)
                    },
                    TransportKind::Whiteboard => LinkProfile::from(
                        self.channels.allocate_whiteboard_profile(&self.persona()),
                    ),
                };
                let address = profile.to_address()?;
                (profile, address)
            },
            LinkSource::CreateFromAddress(address) | LinkSource::Load(address) => {
                (LinkProfile::parse(kind, address)?, address.to_string())
            },
        };

        let link_type = source.link_type(kind);
        let mut properties = default_link_properties(
            &self.sdk.channel_properties(channel_gid),
            channel_gid,
            kind,
        );
        properties.link_type = link_type;
        properties.link_address = address;

        Ok(Link {
            id: link_id.to_string(),
            channel_gid: channel_gid.to_string(),
            link_type,
            profile,
            properties,
        })
    }

    /// Mutate a link's properties and push the result to the host.
    pub async fn update_link_properties<F>(&self, link_id: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut LinkProperties),
    {
        let properties = self
            .links
            .update_properties(link_id, update)
            .ok_or_else(|| Error::unknown_link(link_id))?;
        self.push_link_properties(link_id, &properties).await;
        Ok(())
    }

    // ── Channels ────────────────────────────────────────────────────────────

    pub async fn activate_channel(
        &self,
        handle: RaceHandle,
        channel_gid: &str,
        role_name: &str,
    ) -> Result<()> {
        debug!(handle, channel_gid, role_name, "activate channel");
        let activation = match self.channels.begin_activation(channel_gid) {
            Ok(activation) => activation,
            Err(e) => {
                warn!(handle, channel_gid, error = %e, "activation refused");
                if let Ok(status) = self.channels.status(channel_gid) {
                    self.report_channel(handle, channel_gid, status).await;
                }
                return Err(e);
            },
        };

        match activation {
            Activation::Available | Activation::AlreadyAvailable => {
                self.announce_available(handle, channel_gid).await;
            },
            Activation::AwaitingInput => self.request_direct_input(handle, channel_gid).await,
        }
        Ok(())
    }

    /// Ask the user for the hostname and start port of the direct channel.
    async fn request_direct_input(&self, handle: RaceHandle, channel_gid: &str) {
        let response = self
            .sdk
            .request_common_user_input(InputPurpose::Hostname.key())
            .await;
        if response.is_ok() {
            self.channels
                .track_request(response.handle, InputPurpose::Hostname);
        } else {
            error!(status = ?response.status, "hostname request failed, direct channel cannot be used");
            self.channels.request_failed(InputPurpose::Hostname);
            self.report_channel(handle, channel_gid, ChannelStatus::Failed)
                .await;
            return;
        }

        let response = self
            .sdk
            .request_plugin_user_input(InputPurpose::StartPort.key(), START_PORT_PROMPT, true)
            .await;
        if response.is_ok() {
            self.channels
                .track_request(response.handle, InputPurpose::StartPort);
        } else if self.channels.request_failed(InputPurpose::StartPort) == InputOutcome::Available {
            self.announce_available(handle, channel_gid).await;
        }
    }

    /// Deactivate a channel and destroy every link it owns.
    pub async fn deactivate_channel(&self, handle: RaceHandle, channel_gid: &str) -> Result<()> {
        debug!(handle, channel_gid, "deactivate channel");
        if !self.channels.deactivate(channel_gid)? {
            debug!(channel_gid, "channel already unavailable");
            return Ok(());
        }
        self.report_channel(handle, channel_gid, ChannelStatus::Unavailable)
            .await;

        for link_id in self.links.link_ids_for_channel(channel_gid) {
            if let Err(e) = self.destroy_link(handle, &link_id).await {
                debug!(link_id = %link_id, error = %e, "link already gone");
            }
        }
        Ok(())
    }

    /// Apply the user's answer to a hostname or start-port request.
    pub async fn on_user_input_received(
        &self,
        handle: RaceHandle,
        answered: bool,
        response: &str,
    ) -> Result<()> {
        debug!(handle, answered, "user input received");
        let outcome = self
            .channels
            .on_user_input(handle, answered, response)
            .inspect_err(|e| warn!(handle, error = %e, "ignoring user input"))?;

        let channel_gid = self.channels.direct_gid().to_string();
        match outcome {
            InputOutcome::Pending => {},
            InputOutcome::Available => self.announce_available(NULL_HANDLE, &channel_gid).await,
            InputOutcome::Disabled => {
                self.report_channel(NULL_HANDLE, &channel_gid, ChannelStatus::Disabled)
                    .await;
            },
            InputOutcome::Failed => {
                self.report_channel(NULL_HANDLE, &channel_gid, ChannelStatus::Failed)
                    .await;
            },
        }
        Ok(())
    }

    pub async fn flush_channel(
        &self,
        handle: RaceHandle,
        channel_gid: &str,
        batch_id: u64,
    ) -> Result<()> {
        error!(handle, channel_gid, batch_id, "flushing is not supported");
        Err(Error::Unsupported {
            operation: "flush_channel",
        })
    }

    pub async fn on_user_acknowledgment_received(&self, handle: RaceHandle) -> Result<()> {
        debug!(handle, "user acknowledgment received");
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn link_properties(&self, link_id: &str) -> Option<LinkProperties> {
        self.links.properties(link_id)
    }

    pub fn connection_properties(&self, connection_id: &str) -> Option<LinkProperties> {
        let transport = self.registry.get(connection_id)?;
        self.links.properties(transport.link_id())
    }

    pub fn channel_status(&self, channel_gid: &str) -> Option<ChannelStatus> {
        self.channels.status(channel_gid).ok()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Receive loops still running.
    pub fn receive_loops(&self) -> usize {
        self.dispatcher.running()
    }

    fn persona(&self) -> String {
        let cached = self
            .persona
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if !cached.is_empty() {
            return cached;
        }
        let persona = self.sdk.active_persona();
        *self.persona.write().unwrap_or_else(|e| e.into_inner()) = persona.clone();
        persona
    }

    // ── Host notifications ──────────────────────────────────────────────────

    async fn announce_available(&self, handle: RaceHandle, channel_gid: &str) {
        self.report_channel(handle, channel_gid, ChannelStatus::Available)
            .await;
        let response = self
            .sdk
            .display_info_to_user(&format!("{channel_gid} is ready"), UserDisplayType::Toast)
            .await;
        check_response("display_info_to_user", response);
    }

    async fn report_channel(&self, handle: RaceHandle, channel_gid: &str, status: ChannelStatus) {
        #[cfg(feature = "metrics")]
        counter!(
            comms_metrics::CHANNEL_TRANSITIONS_TOTAL,
            labels::CHANNEL => channel_gid.to_string(),
            labels::STATUS => status.to_string()
        )
        .increment(1);
        let properties = self.sdk.channel_properties(channel_gid);
        let response = self
            .sdk
            .on_channel_status_changed(handle, channel_gid, status, &properties)
            .await;
        check_response("on_channel_status_changed", response);
    }

    async fn report_link(
        &self,
        handle: RaceHandle,
        link_id: &str,
        status: LinkStatus,
        properties: &LinkProperties,
    ) {
        let response = self
            .sdk
            .on_link_status_changed(handle, link_id, status, properties)
            .await;
        check_response("on_link_status_changed", response);
    }

    async fn report_connection(
        &self,
        handle: RaceHandle,
        connection_id: &str,
        status: ConnectionStatus,
        properties: &LinkProperties,
    ) {
        let response = self
            .sdk
            .on_connection_status_changed(handle, connection_id, status, properties)
            .await;
        check_response("on_connection_status_changed", response);
    }

    async fn report_package(&self, handle: RaceHandle, status: PackageStatus) {
        let response = self.sdk.on_package_status_changed(handle, status).await;
        check_response("on_package_status_changed", response);
    }

    async fn push_link_properties(&self, link_id: &str, properties: &LinkProperties) {
        let response = self.sdk.update_link_properties(link_id, properties).await;
        check_response("update_link_properties", response);
    }
}
