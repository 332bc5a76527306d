use {
    wisp_common::{
        ChannelProperties, LinkProperties, LinkPropertyPair, LinkPropertySet, TransmissionType,
    },
    wisp_transport::TransportKind,
};

/// Measured performance envelope of each transport.
fn estimates(kind: TransportKind) -> (LinkPropertySet, LinkPropertySet) {
    match kind {
        TransportKind::Direct => (
            LinkPropertySet::new(28_270_000, 14, -1.0),
            LinkPropertySet::new(23_130_000, 17, -1.0),
        ),
        TransportKind::Whiteboard => (
            LinkPropertySet::new(338_800, 2610, 0.1),
            LinkPropertySet::new(277_200, 3190, 0.1),
        ),
    }
}

/// Starting properties for a new link on `channel_gid`.
///
/// Channel-level fields come from the host; best and worst estimates are
/// fixed per transport. The caller sets the link type and address.
pub fn default_link_properties(
    channel: &ChannelProperties,
    channel_gid: &str,
    kind: TransportKind,
) -> LinkProperties {
    let (best, worst) = estimates(kind);
    let transmission_type = match channel.transmission_type {
        TransmissionType::Undef => kind.transmission_type(),
        declared => declared,
    };
    LinkProperties {
        transmission_type,
        connection_type: channel.connection_type,
        send_type: channel.send_type,
        reliable: channel.reliable,
        is_flushable: channel.is_flushable,
        duration_s: channel.duration_s,
        period_s: channel.period_s,
        mtu: channel.mtu,
        best: LinkPropertyPair::symmetric(best),
        worst: LinkPropertyPair::symmetric(worst),
        expected: channel.creator_expected,
        supported_hints: channel.supported_hints.clone(),
        channel_gid: channel_gid.to_string(),
        ..LinkProperties::default()
    }
}
