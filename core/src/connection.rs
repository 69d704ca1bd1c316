//! Connection intervals — the lifecycle of one client/peripheral link.
//!
//! Each endpoint records its own view of the link. A link is active at `t`
//! when the chosen role's channel was up at or before `t` and had not gone
//! down by `t`: the interval is `[channel_up_us, channel_down_us)`.

use crate::{
    error::{TraceError, TraceResult},
    types::{ConnInfoId, DeviceId, Micros},
};
use serde::{Deserialize, Serialize};

/// Which endpoint's timestamps define when a link is active.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    Client,
    #[default]
    Peripheral,
}

impl ChannelRole {
    pub fn parse(s: &str) -> TraceResult<Self> {
        match s {
            "client"     => Ok(Self::Client),
            "peripheral" => Ok(Self::Peripheral),
            other => Err(TraceError::MalformedInput(format!("unknown channel role '{other}'"))),
        }
    }
}

/// One endpoint's view of a link.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndpointTimeline {
    pub rx_bytes:              Option<i64>,
    pub tx_bytes:              Option<i64>,
    pub channel_up_us:         Option<Micros>,
    pub channel_down_us:       Option<Micros>,
    pub connection_success_us: Option<Micros>,
    pub connection_failure_us: Option<Micros>,
    pub disconnect_us:         Option<Micros>,
    pub idle_disconnect_us:    Option<Micros>,
}

impl EndpointTimeline {
    /// A timeline whose channel came up at `up` and went down at `down`, if ever.
    pub fn channel(up: Micros, down: Option<Micros>) -> Self {
        Self {
            channel_up_us: Some(up),
            channel_down_us: down,
            ..Self::default()
        }
    }

    fn check(&self, role: ChannelRole) -> TraceResult<()> {
        if let (Some(up), Some(down)) = (self.channel_up_us, self.channel_down_us) {
            if down < up {
                return Err(TraceError::IntegrityViolation(format!(
                    "{role:?} channel goes down at {down}us before it comes up at {up}us"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionInterval {
    pub id:                  Option<ConnInfoId>,
    pub client:              DeviceId,
    pub peripheral:          DeviceId,
    pub client_conn_init_us: Option<Micros>,
    pub client_side:         EndpointTimeline,
    pub peripheral_side:     EndpointTimeline,
    /// Free-form reason reported by the client stack.
    pub client_disconnect_reason:     Option<String>,
    /// Numeric status code reported by the peripheral controller.
    pub peripheral_disconnect_reason: Option<i64>,
}

impl ConnectionInterval {
    /// A link whose client and peripheral agree on the channel interval.
    pub fn new(client: DeviceId, peripheral: DeviceId, up: Micros, down: Option<Micros>) -> Self {
        Self {
            id: None,
            client,
            peripheral,
            client_conn_init_us: None,
            client_side: EndpointTimeline::channel(up, down),
            peripheral_side: EndpointTimeline::channel(up, down),
            client_disconnect_reason: None,
            peripheral_disconnect_reason: None,
        }
    }

    pub fn timeline(&self, role: ChannelRole) -> &EndpointTimeline {
        match role {
            ChannelRole::Client     => &self.client_side,
            ChannelRole::Peripheral => &self.peripheral_side,
        }
    }

    /// Both endpoints must satisfy `channel_up_us <= channel_down_us`.
    pub fn check(&self) -> TraceResult<()> {
        self.client_side.check(ChannelRole::Client)?;
        self.peripheral_side.check(ChannelRole::Peripheral)
    }

    /// Half-open membership test: up-inclusive, down-exclusive.
    pub fn is_active_at(&self, role: ChannelRole, t: Micros) -> TraceResult<bool> {
        let timeline = self.timeline(role);
        timeline.check(role)?;
        Ok(match timeline.channel_up_us {
            Some(up) => up <= t && timeline.channel_down_us.map_or(true, |down| down > t),
            None => false,
        })
    }

    pub fn endpoints(&self) -> (DeviceId, DeviceId) {
        (self.client, self.peripheral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_up_inclusive_down_exclusive() {
        let conn = ConnectionInterval::new(1, 2, 10, Some(20));
        let role = ChannelRole::Peripheral;
        assert!(!conn.is_active_at(role, 9).unwrap());
        assert!(conn.is_active_at(role, 10).unwrap());
        assert!(conn.is_active_at(role, 19).unwrap());
        assert!(!conn.is_active_at(role, 20).unwrap());
    }

    #[test]
    fn open_interval_stays_active() {
        let conn = ConnectionInterval::new(1, 2, 10, None);
        assert!(conn.is_active_at(ChannelRole::Client, i64::MAX).unwrap());
    }

    #[test]
    fn never_up_is_never_active() {
        let mut conn = ConnectionInterval::new(1, 2, 10, None);
        conn.peripheral_side = EndpointTimeline::default();
        assert!(!conn.is_active_at(ChannelRole::Peripheral, 100).unwrap());
        assert!(conn.is_active_at(ChannelRole::Client, 100).unwrap());
    }

    #[test]
    fn inverted_interval_is_rejected() {
        let conn = ConnectionInterval::new(1, 2, 30, Some(20));
        assert!(matches!(conn.check(), Err(TraceError::IntegrityViolation(_))));
        assert!(matches!(
            conn.is_active_at(ChannelRole::Peripheral, 25),
            Err(TraceError::IntegrityViolation(_))
        ));
    }
}
