//! Metric name and label definitions.
//!
//! Centralizing these keeps names consistent between the transport and the
//! plugin layer.

/// Transport-level metrics
pub mod transport {
    /// Total number of packages written to a transport
    pub const PACKAGES_SENT_TOTAL: &str = "wisp_transport_packages_sent_total";
    /// Total number of failed transport writes
    pub const PACKAGES_FAILED_TOTAL: &str = "wisp_transport_packages_failed_total";
    /// Total number of payloads forwarded upward by receive loops
    pub const PACKAGES_RECEIVED_TOTAL: &str = "wisp_transport_packages_received_total";
    /// Size of received payloads in bytes
    pub const PAYLOAD_BYTES: &str = "wisp_transport_payload_bytes";
    /// Receive loops that ended with an error
    pub const RECEIVE_LOOP_FAILURES_TOTAL: &str = "wisp_transport_receive_loop_failures_total";
}

/// Whiteboard (indirect transport) polling metrics
pub mod whiteboard {
    /// Completed poll cycles
    pub const POLLS_TOTAL: &str = "wisp_whiteboard_polls_total";
    /// Poll cycles skipped because the request failed
    pub const POLL_ERRORS_TOTAL: &str = "wisp_whiteboard_poll_errors_total";
    /// Messages the server reported but did not return
    pub const LOST_MESSAGES_TOTAL: &str = "wisp_whiteboard_lost_messages_total";
}

/// Plugin lifecycle metrics
pub mod comms {
    /// Number of registered connection IDs
    pub const CONNECTIONS_ACTIVE: &str = "wisp_comms_connections_active";
    /// Number of links in the link store
    pub const LINKS_ACTIVE: &str = "wisp_comms_links_active";
    /// Channel status transitions
    pub const CHANNEL_TRANSITIONS_TOTAL: &str = "wisp_comms_channel_transitions_total";
}

/// Common label keys
pub mod labels {
    pub const KIND: &str = "kind";
    pub const CHANNEL: &str = "channel";
    pub const STATUS: &str = "status";
}
