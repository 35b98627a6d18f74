use std::time::Duration;

use docwire_frame::FrameConfig;
use docwire_value::WireType;

pub const DEFAULT_PROTOCOL: &str = "docwire";
pub const DEFAULT_PROTOCOL_VERSION: &str = "1.0";
pub const DEFAULT_MAX_REDIRECTS: usize = 4;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
/// How long a send may wait on a peer that is not reading.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for header negotiation.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Deadline for one handshake exchange, per connection attempt.
    pub timeout: Duration,
    /// Expected protocol name.
    pub protocol_name: String,
    /// Local protocol version, `<major>.<minor>`.
    pub protocol_version: String,
    /// Redirects a client follows before giving up.
    pub max_redirects: usize,
    /// Maximum handshake document size in bytes.
    pub max_handshake_payload: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            protocol_name: DEFAULT_PROTOCOL.to_string(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_handshake_payload: 16 * 1024,
        }
    }
}

impl HandshakeConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_protocol(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.protocol_name = name.into();
        self.protocol_version = version.into();
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_max_handshake_payload(mut self, max: usize) -> Self {
        self.max_handshake_payload = max;
        self
    }

    /// Frame settings used while negotiating: the handshake payload cap and
    /// the handshake timeout on both directions.
    pub(crate) fn frame_config(&self, base: &FrameConfig) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_handshake_payload,
            read_timeout: Some(self.timeout),
            write_timeout: Some(self.timeout),
            ..base.clone()
        }
    }
}

/// Configuration for an open channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Wire used for documents after the handshake. The connecting side
    /// announces it; the accepting side adopts it.
    pub wire_type: WireType,
    /// Minimum spacing of heartbeats sent by [`Channel::heartbeat`](crate::Channel::heartbeat).
    pub heartbeat_interval: Duration,
    /// Framing limits once the channel is open. The write timeout bounds how
    /// long a send waits for a peer that stopped reading.
    pub frame: FrameConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            wire_type: WireType::Binary,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            frame: FrameConfig::default().with_write_timeout(Some(DEFAULT_WRITE_TIMEOUT)),
        }
    }
}

impl ChannelConfig {
    pub fn with_wire_type(mut self, wire_type: WireType) -> Self {
        self.wire_type = wire_type;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }
}
