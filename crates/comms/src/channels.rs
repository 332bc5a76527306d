//! Channel activation state machine and address allocation.
//!
//! ```text
//! Unavailable ──activate──▶ Starting ──inputs cleared──▶ Available
//!      ▲                       │                            │
//!      │                       ├─hostname declined─▶ Disabled
//!      │                       └─hostname request failed─▶ Failed
//!      └──────────────deactivate (from any other state)─────┘
//! ```
//!
//! The whiteboard channel needs no input and goes straight to Available.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use {
    tracing::{info, warn},
    wisp_common::{ChannelStatus, RaceHandle},
    wisp_config::CommsConfig,
    wisp_transport::{DirectProfile, TransportKind, WhiteboardProfile},
};

use crate::{Error, Result};

/// Why a user-input request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPurpose {
    Hostname,
    StartPort,
}

impl InputPurpose {
    /// Key passed to the host when requesting the input.
    pub fn key(self) -> &'static str {
        match self {
            Self::Hostname => "hostname",
            Self::StartPort => "startPort",
        }
    }
}

/// What the caller must do after [`ChannelManager::begin_activation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The channel became Available.
    Available,
    /// The channel was already Available; announce it again.
    AlreadyAvailable,
    /// The channel is Starting; request the hostname and start port.
    AwaitingInput,
}

/// Effect of an input answer or a failed input request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Other requests are still outstanding.
    Pending,
    Available,
    Disabled,
    Failed,
}

struct ChannelState {
    statuses: HashMap<String, ChannelStatus>,
    pending: HashMap<RaceHandle, InputPurpose>,
    hostname: String,
    next_port: u32,
    next_hashtag: u64,
}

pub struct ChannelManager {
    direct_gid: String,
    indirect_gid: String,
    whiteboard_hostname: String,
    whiteboard_port: u16,
    check_frequency_ms: u64,
    hashtag_prefix: String,
    state: Mutex<ChannelState>,
}

impl ChannelManager {
    pub fn new(config: &CommsConfig) -> Self {
        let statuses = [&config.direct.channel_gid, &config.indirect.channel_gid]
            .into_iter()
            .map(|gid| (gid.clone(), ChannelStatus::Unavailable))
            .collect();
        Self {
            direct_gid: config.direct.channel_gid.clone(),
            indirect_gid: config.indirect.channel_gid.clone(),
            whiteboard_hostname: config.indirect.whiteboard_hostname.clone(),
            whiteboard_port: config.indirect.whiteboard_port,
            check_frequency_ms: config.indirect.check_frequency_ms,
            hashtag_prefix: config.indirect.hashtag_prefix.clone(),
            state: Mutex::new(ChannelState {
                statuses,
                pending: HashMap::new(),
                hostname: config.direct.default_hostname.clone(),
                next_port: u32::from(config.direct.start_port),
                next_hashtag: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn direct_gid(&self) -> &str {
        &self.direct_gid
    }

    pub fn indirect_gid(&self) -> &str {
        &self.indirect_gid
    }

    /// Transport kind backing a channel GID.
    pub fn kind_of(&self, channel_gid: &str) -> Result<TransportKind> {
        if channel_gid == self.direct_gid {
            Ok(TransportKind::Direct)
        } else if channel_gid == self.indirect_gid {
            Ok(TransportKind::Whiteboard)
        } else {
            Err(Error::unknown_channel(channel_gid))
        }
    }

    pub fn status(&self, channel_gid: &str) -> Result<ChannelStatus> {
        self.state()
            .statuses
            .get(channel_gid)
            .copied()
            .ok_or_else(|| Error::unknown_channel(channel_gid))
    }

    /// Fail unless the channel exists and is Available.
    pub fn require_available(&self, channel_gid: &str) -> Result<TransportKind> {
        let kind = self.kind_of(channel_gid)?;
        match self.status(channel_gid)? {
            ChannelStatus::Available => Ok(kind),
            status => Err(Error::ChannelUnavailable {
                channel_gid: channel_gid.to_string(),
                status,
            }),
        }
    }

    /// Mark every channel Unavailable and forget outstanding input requests.
    /// Run `f` while holding the channel table, only if the channel is
    /// Available. A concurrent deactivation either happens before (and `f`
    /// is skipped) or after (and sees whatever `f` did).
    pub fn while_available<T>(&self, channel_gid: &str, f: impl FnOnce() -> T) -> Result<T> {
        self.kind_of(channel_gid)?;
        let state = self.state();
        match state.statuses.get(channel_gid).copied() {
            Some(ChannelStatus::Available) => Ok(f()),
            Some(status) => Err(Error::ChannelUnavailable {
                channel_gid: channel_gid.to_string(),
                status,
            }),
            None => Err(Error::unknown_channel(channel_gid)),
        }
    }

    pub fn reset(&self) {
        let mut state = self.state();
        for status in state.statuses.values_mut() {
            *status = ChannelStatus::Unavailable;
        }
        state.pending.clear();
    }

    pub fn begin_activation(&self, channel_gid: &str) -> Result<Activation> {
        let kind = self.kind_of(channel_gid)?;
        let mut state = self.state();
        let status = state
            .statuses
            .get(channel_gid)
            .copied()
            .ok_or_else(|| Error::unknown_channel(channel_gid))?;

        let (next, activation) = match (status, kind) {
            (ChannelStatus::Available, _) => return Ok(Activation::AlreadyAvailable),
            (ChannelStatus::Unavailable, TransportKind::Whiteboard) => {
                (ChannelStatus::Available, Activation::Available)
            },
            (ChannelStatus::Unavailable, TransportKind::Direct) => {
                (ChannelStatus::Starting, Activation::AwaitingInput)
            },
            (status, _) => {
                return Err(Error::ActivationRejected {
                    channel_gid: channel_gid.to_string(),
                    status,
                });
            },
        };
        state.statuses.insert(channel_gid.to_string(), next);
        info!(channel_gid, from = %status, to = %next, "channel activation");
        Ok(activation)
    }

    /// Remember an issued input request.
    pub fn track_request(&self, handle: RaceHandle, purpose: InputPurpose) {
        self.state().pending.insert(handle, purpose);
    }

    /// Record that the host refused to issue an input request.
    pub fn request_failed(&self, purpose: InputPurpose) -> InputOutcome {
        let mut state = self.state();
        match purpose {
            InputPurpose::Hostname => {
                warn!(channel_gid = %self.direct_gid, "hostname request failed, channel cannot be used");
                state.pending.clear();
                state
                    .statuses
                    .insert(self.direct_gid.clone(), ChannelStatus::Failed);
                InputOutcome::Failed
            },
            InputPurpose::StartPort => {
                warn!(
                    channel_gid = %self.direct_gid,
                    port = state.next_port,
                    "start port request failed, keeping current start port"
                );
                self.finish_if_cleared(&mut state)
            },
        }
    }

    /// Apply a user answer to a pending request.
    pub fn on_user_input(
        &self,
        handle: RaceHandle,
        answered: bool,
        response: &str,
    ) -> Result<InputOutcome> {
        let mut state = self.state();
        let purpose = state
            .pending
            .remove(&handle)
            .ok_or(Error::UnrecognizedHandle { handle })?;

        match (purpose, answered) {
            (InputPurpose::Hostname, true) => {
                info!(hostname = response, "using hostname");
                state.hostname = response.to_string();
            },
            (InputPurpose::Hostname, false) => {
                warn!(channel_gid = %self.direct_gid, "no hostname given, disabling channel");
                state.pending.clear();
                state
                    .statuses
                    .insert(self.direct_gid.clone(), ChannelStatus::Disabled);
                return Ok(InputOutcome::Disabled);
            },
            (InputPurpose::StartPort, true) => match response.trim().parse::<u16>() {
                Ok(port) => {
                    info!(port, "using start port");
                    state.next_port = u32::from(port);
                },
                Err(e) => {
                    warn!(response, error = %e, "invalid start port, keeping default");
                },
            },
            (InputPurpose::StartPort, false) => {
                warn!(port = state.next_port, "no start port given, keeping default");
            },
        }

        Ok(self.finish_if_cleared(&mut state))
    }

    fn finish_if_cleared(&self, state: &mut ChannelState) -> InputOutcome {
        let starting = state.statuses.get(&self.direct_gid) == Some(&ChannelStatus::Starting);
        if !state.pending.is_empty() || !starting {
            return InputOutcome::Pending;
        }
        state
            .statuses
            .insert(self.direct_gid.clone(), ChannelStatus::Available);
        info!(channel_gid = %self.direct_gid, "channel available");
        InputOutcome::Available
    }

    /// Move a channel to Unavailable. Returns `false` when it already was.
    pub fn deactivate(&self, channel_gid: &str) -> Result<bool> {
        self.kind_of(channel_gid)?;
        let mut state = self.state();
        let previous = state
            .statuses
            .insert(channel_gid.to_string(), ChannelStatus::Unavailable);
        if previous == Some(ChannelStatus::Unavailable) {
            return Ok(false);
        }
        if channel_gid == self.direct_gid {
            state.pending.clear();
        }
        info!(channel_gid, from = ?previous, "channel deactivated");
        Ok(true)
    }

    /// Next direct endpoint: the current hostname and the next free port.
    pub fn allocate_direct_profile(&self) -> Result<DirectProfile> {
        let mut state = self.state();
        let port = u16::try_from(state.next_port).map_err(|_| Error::PortsExhausted {
            kind: TransportKind::Direct,
        })?;
        state.next_port += 1;
        Ok(DirectProfile::new(state.hostname.clone(), port))
    }

    /// Next whiteboard mailbox, tagged `<prefix>_<persona>_<n>`.
    pub fn allocate_whiteboard_profile(&self, persona: &str) -> WhiteboardProfile {
        let mut state = self.state();
        let hashtag = format!("{}_{persona}_{}", self.hashtag_prefix, state.next_hashtag);
        state.next_hashtag += 1;
        WhiteboardProfile {
            hostname: self.whiteboard_hostname.clone(),
            port: self.whiteboard_port,
            hashtag,
            check_frequency_ms: self.check_frequency_ms,
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.state().pending.len()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn manager() -> ChannelManager {
        ChannelManager::new(&CommsConfig::default())
    }

    /// Activate the direct channel with hostname handle 1 and port handle 2.
    fn start_direct(channels: &ChannelManager) {
        assert_eq!(
            channels.begin_activation("wispDirect").unwrap(),
            Activation::AwaitingInput
        );
        channels.track_request(1, InputPurpose::Hostname);
        channels.track_request(2, InputPurpose::StartPort);
    }

    #[test]
    fn whiteboard_channel_is_available_at_once() {
        let channels = manager();
        assert_eq!(
            channels.begin_activation("wispIndirect").unwrap(),
            Activation::Available
        );
        assert_eq!(
            channels.status("wispIndirect").unwrap(),
            ChannelStatus::Available
        );
        assert_eq!(
            channels.begin_activation("wispIndirect").unwrap(),
            Activation::AlreadyAvailable
        );
    }

    #[test]
    fn unknown_channel_rejected() {
        let channels = manager();
        assert!(matches!(
            channels.begin_activation("nope"),
            Err(Error::UnknownChannel { .. })
        ));
        assert!(channels.status("nope").is_err());
    }

    #[test]
    fn hostname_answered_and_port_unanswered_uses_default_port() {
        let channels = manager();
        start_direct(&channels);
        assert_eq!(
            channels.status("wispDirect").unwrap(),
            ChannelStatus::Starting
        );

        assert_eq!(
            channels.on_user_input(1, true, "node-a.local").unwrap(),
            InputOutcome::Pending
        );
        assert_eq!(
            channels.on_user_input(2, false, "").unwrap(),
            InputOutcome::Available
        );
        assert_eq!(
            channels.allocate_direct_profile().unwrap(),
            DirectProfile::new("node-a.local", 10000)
        );
        assert_eq!(
            channels.allocate_direct_profile().unwrap().port,
            10001
        );
    }

    #[rstest]
    #[case::answered_first(true)]
    #[case::unanswered_first(false)]
    fn declined_hostname_disables_regardless_of_port(#[case] port_answered: bool) {
        let channels = manager();
        start_direct(&channels);
        channels.on_user_input(2, port_answered, "20000").unwrap();

        assert_eq!(
            channels.on_user_input(1, false, "").unwrap(),
            InputOutcome::Disabled
        );
        assert_eq!(
            channels.status("wispDirect").unwrap(),
            ChannelStatus::Disabled
        );
        assert!(matches!(
            channels.begin_activation("wispDirect"),
            Err(Error::ActivationRejected { .. })
        ));

        assert!(channels.deactivate("wispDirect").unwrap());
        assert_eq!(
            channels.begin_activation("wispDirect").unwrap(),
            Activation::AwaitingInput
        );
    }

    #[test]
    fn declined_hostname_drops_port_request() {
        let channels = manager();
        start_direct(&channels);
        channels.on_user_input(1, false, "").unwrap();
        assert_eq!(channels.pending_requests(), 0);
        assert!(matches!(
            channels.on_user_input(2, true, "20000"),
            Err(Error::UnrecognizedHandle { handle: 2 })
        ));
    }

    #[test]
    fn answered_port_moves_allocation() {
        let channels = manager();
        start_direct(&channels);
        channels.on_user_input(2, true, " 20000 ").unwrap();
        channels.on_user_input(1, true, "10.1.1.1").unwrap();
        assert_eq!(
            channels.allocate_direct_profile().unwrap(),
            DirectProfile::new("10.1.1.1", 20000)
        );
    }

    #[test]
    fn unparseable_port_keeps_default() {
        let channels = manager();
        start_direct(&channels);
        channels.on_user_input(2, true, "not-a-port").unwrap();
        channels.on_user_input(1, true, "host").unwrap();
        assert_eq!(channels.allocate_direct_profile().unwrap().port, 10000);
    }

    #[test]
    fn starting_channel_rejects_second_activation() {
        let channels = manager();
        start_direct(&channels);
        assert!(matches!(
            channels.begin_activation("wispDirect"),
            Err(Error::ActivationRejected {
                status: ChannelStatus::Starting,
                ..
            })
        ));
    }

    #[test]
    fn failed_hostname_request_fails_channel() {
        let channels = manager();
        channels.begin_activation("wispDirect").unwrap();
        assert_eq!(
            channels.request_failed(InputPurpose::Hostname),
            InputOutcome::Failed
        );
        assert_eq!(
            channels.status("wispDirect").unwrap(),
            ChannelStatus::Failed
        );
    }

    #[test]
    fn failed_port_request_counts_as_cleared() {
        let channels = manager();
        channels.begin_activation("wispDirect").unwrap();
        channels.track_request(1, InputPurpose::Hostname);
        assert_eq!(
            channels.request_failed(InputPurpose::StartPort),
            InputOutcome::Pending
        );
        assert_eq!(
            channels.on_user_input(1, true, "host").unwrap(),
            InputOutcome::Available
        );
    }

    #[test]
    fn deactivating_unavailable_channel_is_noop() {
        let channels = manager();
        assert!(!channels.deactivate("wispIndirect").unwrap());
        channels.begin_activation("wispIndirect").unwrap();
        assert!(channels.deactivate("wispIndirect").unwrap());
        assert_eq!(
            channels.status("wispIndirect").unwrap(),
            ChannelStatus::Unavailable
        );
    }

    #[test]
    fn work_guarded_by_availability_is_skipped_after_deactivation() {
        let channels = manager();
        channels.begin_activation("wispIndirect").unwrap();

        let mut runs = 0;
        channels.while_available("wispIndirect", || runs += 1).unwrap();
        assert!(channels.deactivate("wispIndirect").unwrap());
        let err = channels
            .while_available("wispIndirect", || runs += 1)
            .unwrap_err();

        assert_eq!(runs, 1);
        assert!(matches!(err, Error::ChannelUnavailable { .. }));
        assert!(matches!(
            channels.while_available("nope", || ()),
            Err(Error::UnknownChannel { .. })
        ));
    }

    #[test]
    fn unavailable_channel_cannot_allocate_links() {
        let channels = manager();
        assert!(matches!(
            channels.require_available("wispDirect"),
            Err(Error::ChannelUnavailable { .. })
        ));
    }

    #[test]
    fn hashtags_count_up_per_persona() {
        let channels = manager();
        let first = channels.allocate_whiteboard_profile("alice");
        let second = channels.allocate_whiteboard_profile("alice");
        assert_eq!(first.hashtag, "wisp_alice_0");
        assert_eq!(second.hashtag, "wisp_alice_1");
        assert_eq!(first.hostname, "whiteboard");
        assert_eq!(first.port, 5000);
        assert_eq!(first.check_frequency_ms, 1000);
    }

    #[test]
    fn port_allocation_stops_at_u16_max() {
        let mut config = CommsConfig::default();
        config.direct.start_port = u16::MAX;
        let channels = ChannelManager::new(&config);
        assert_eq!(channels.allocate_direct_profile().unwrap().port, u16::MAX);
        assert!(matches!(
            channels.allocate_direct_profile(),
            Err(Error::PortsExhausted { .. })
        ));
    }
}
