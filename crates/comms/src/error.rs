use {
    wisp_common::{ChannelStatus, FromMessage, LinkType, RaceHandle},
    wisp_transport::TransportKind,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown channel: {channel_gid}")]
    UnknownChannel { channel_gid: String },

    #[error("channel {channel_gid} is {status}, not available")]
    ChannelUnavailable {
        channel_gid: String,
        status: ChannelStatus,
    },

    #[error("channel {channel_gid} cannot be activated while {status}")]
    ActivationRejected {
        channel_gid: String,
        status: ChannelStatus,
    },

    #[error("unknown link: {link_id}")]
    UnknownLink { link_id: String },

    #[error("unknown connection: {connection_id}")]
    UnknownConnection { connection_id: String },

    #[error("link {link_id} is {link_type}, cannot carry a {requested} connection")]
    IncompatibleLinkType {
        link_id: String,
        link_type: LinkType,
        requested: LinkType,
    },

    #[error("connection {connection_id} is on a {link_type} link and cannot send")]
    SendNotPermitted {
        connection_id: String,
        link_type: LinkType,
    },

    #[error("user input handle {handle} is not pending")]
    UnrecognizedHandle { handle: RaceHandle },

    #[error("host returned an empty {what} ID")]
    EmptyId { what: &'static str },

    #[error("no ports left to allocate for {kind} links")]
    PortsExhausted { kind: TransportKind },

    #[error("{operation} is not supported")]
    Unsupported { operation: &'static str },

    #[error(transparent)]
    Transport(#[from] wisp_transport::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn unknown_channel(channel_gid: impl Into<String>) -> Self {
        Self::UnknownChannel {
            channel_gid: channel_gid.into(),
        }
    }

    #[must_use]
    pub fn unknown_link(link_id: impl Into<String>) -> Self {
        Self::UnknownLink {
            link_id: link_id.into(),
        }
    }

    #[must_use]
    pub fn unknown_connection(connection_id: impl Into<String>) -> Self {
        Self::UnknownConnection {
            connection_id: connection_id.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

wisp_common::impl_context!();
