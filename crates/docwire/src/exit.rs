use std::fmt;
use std::io;

use docwire_channel::ChannelError;
use docwire_frame::FrameError;
use docwire_transport::TransportError;
use docwire_value::WireError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HANDSHAKE_REJECTED: i32 = 20;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const FRAME_CORRUPT: i32 = 61;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Wire(err) => wire_error(context, err),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::NotComplete { .. }
        | FrameError::Corrupt(_)
        | FrameError::UnrecoverableTimeout { .. } => {
            CliError::new(FRAME_CORRUPT, format!("{context}: {err}"))
        }
        FrameError::WriteTimeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Transport(err) => transport_error(context, err),
        ChannelError::Frame(err) => frame_error(context, err),
        ChannelError::Wire(err) => wire_error(context, err),
        ChannelError::Rejected(_)
        | ChannelError::TooManyRedirects { .. }
        | ChannelError::HandshakeFailed(_) => {
            CliError::new(HANDSHAKE_REJECTED, format!("{context}: {err}"))
        }
        ChannelError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ChannelError::Disconnected(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn handshake_failures_map_to_rejected() {
        let err = channel_error("connect failed", ChannelError::Rejected("busy".into()));
        assert_eq!(err.code, HANDSHAKE_REJECTED);
        assert!(err.message.contains("busy"));
        assert_eq!(
            channel_error("x", ChannelError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
    }

    #[test]
    fn stalled_peer_is_a_timeout() {
        let err = channel_error(
            "send failed",
            ChannelError::Frame(FrameError::WriteTimeout {
                timeout: Duration::from_millis(200),
            }),
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn corrupt_frames_have_their_own_code() {
        let err = frame_error("read failed", FrameError::Corrupt("bad header".into()));
        assert_eq!(err.code, FRAME_CORRUPT);
        let err = channel_error("read failed", ChannelError::Frame(FrameError::ConnectionClosed));
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn missing_socket_is_a_transport_error() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                endpoint: "unix:/nope".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
