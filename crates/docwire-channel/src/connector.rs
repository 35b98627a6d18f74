use docwire_frame::{FrameReader, FrameWriter};
use docwire_transport::Endpoint;

use crate::channel::Channel;
use crate::config::{ChannelConfig, HandshakeConfig};
use crate::error::{ChannelError, Result};
use crate::handshake::handshake_client;
use crate::header::{ChannelHeader, ChannelState};

/// Connect to a listening peer with default configuration.
pub fn connect(endpoint: &Endpoint) -> Result<Channel> {
    connect_with_config(endpoint, &HandshakeConfig::default(), ChannelConfig::default())
}

/// Connect and negotiate, following redirects.
///
/// A [`ChannelHeader::Redirect`] is followed transparently, up to
/// `handshake.max_redirects` times; [`ChannelHeader::Error`] surfaces as
/// [`ChannelError::Rejected`]. Each connection attempt has its own
/// handshake deadline.
pub fn connect_with_config(
    endpoint: &Endpoint,
    handshake: &HandshakeConfig,
    config: ChannelConfig,
) -> Result<Channel> {
    let mut target = endpoint.clone();
    let mut redirects = 0usize;

    loop {
        tracing::debug!(endpoint = %target, state = %ChannelState::Connecting, "connecting");
        let stream = docwire_transport::connect(&target, Some(handshake.timeout))?;
        let reader_stream = stream.try_clone()?;

        let frame_config = handshake.frame_config(&config.frame);
        let mut reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
        let mut writer = FrameWriter::with_config_stream(stream, frame_config)?;

        tracing::debug!(endpoint = %target, state = %ChannelState::Negotiating, "negotiating");
        match handshake_client(&mut reader, &mut writer, handshake, config.wire_type)? {
            ChannelHeader::Ok => {
                return Channel::open(target, reader, writer, ChannelHeader::Ok, config);
            }
            ChannelHeader::Error(message) => {
                tracing::debug!(endpoint = %target, %message, "channel rejected");
                return Err(ChannelError::Rejected(message));
            }
            ChannelHeader::Redirect(next) => {
                if redirects >= handshake.max_redirects {
                    return Err(ChannelError::TooManyRedirects {
                        limit: handshake.max_redirects,
                        last: next.to_string(),
                    });
                }
                redirects += 1;
                tracing::debug!(from = %target, to = %next, redirects, "following redirect");
                if let Err(err) = writer.get_ref().shutdown() {
                    tracing::trace!(error = %err, "shutdown of redirected connection");
                }
                target = next;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::thread;
    use std::time::Duration;

    use docwire_transport::Endpoint;

    use super::*;
    use crate::listener::{Accepted, ChannelListener};

    fn make_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "dwcn-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn redirect_is_followed_transparently() {
        let dir = make_dir("redirect");
        let first = Endpoint::unix(dir.join("first.sock"));
        let second = Endpoint::unix(dir.join("second.sock"));

        let target = second.clone();
        let redirector = ChannelListener::bind(&first)
            .expect("first listener should bind")
            .with_policy(move |_: &crate::handshake::Hello| ChannelHeader::Redirect(target.clone()));
        let destination = ChannelListener::bind(&second).expect("second listener should bind");

        let servers = thread::spawn(move || {
            let declined = redirector.accept().expect("first accept should succeed");
            assert!(matches!(declined, Accepted::Declined(ChannelHeader::Redirect(_))));
            destination
                .accept()
                .expect("second accept should succeed")
                .into_channel()
                .expect("destination should open")
        });

        let client = connect(&first).expect("redirect should be followed");
        let server = servers.join().expect("server thread should finish");

        assert_eq!(client.endpoint(), &second);
        assert_eq!(client.state(), ChannelState::Open);
        assert_eq!(server.state(), ChannelState::Open);

        drop(client);
        drop(server);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn error_header_is_rejected() {
        let dir = make_dir("reject");
        let endpoint = Endpoint::unix(dir.join("r.sock"));
        let listener = ChannelListener::bind(&endpoint)
            .expect("listener should bind")
            .with_policy(|_: &crate::handshake::Hello| ChannelHeader::Error("maintenance".into()));

        let server = thread::spawn(move || listener.accept().expect("accept should succeed"));
        let err = connect(&endpoint).unwrap_err();
        assert!(matches!(err, ChannelError::Rejected(ref message) if message == "maintenance"));
        assert!(matches!(
            server.join().unwrap(),
            Accepted::Declined(ChannelHeader::Error(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn redirect_loop_is_bounded() {
        let dir = make_dir("loop");
        let endpoint = Endpoint::unix(dir.join("loop.sock"));
        let me = endpoint.clone();
        let listener = ChannelListener::bind(&endpoint)
            .expect("listener should bind")
            .with_policy(move |_: &crate::handshake::Hello| ChannelHeader::Redirect(me.clone()));

        let server = thread::spawn(move || {
            for _ in 0..3 {
                listener.accept().expect("accept should succeed");
            }
        });

        let handshake = HandshakeConfig::default().with_max_redirects(2);
        let err = connect_with_config(&endpoint, &handshake, ChannelConfig::default()).unwrap_err();
        assert!(matches!(err, ChannelError::TooManyRedirects { limit: 2, .. }));
        server.join().unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn silent_peer_times_out() {
        let dir = make_dir("silent");
        let endpoint = Endpoint::unix(dir.join("s.sock"));
        let raw = docwire_transport::WireListener::bind(&endpoint).expect("raw listener should bind");

        let server = thread::spawn(move || {
            let stream = raw.accept().expect("raw accept should succeed");
            thread::sleep(Duration::from_millis(300));
            drop(stream);
        });

        let handshake = HandshakeConfig::default().with_timeout(Duration::from_millis(50));
        let err = connect_with_config(&endpoint, &handshake, ChannelConfig::default()).unwrap_err();
        assert!(matches!(err, ChannelError::Timeout(_)), "{err}");
        server.join().unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn nothing_listening_is_transport_error() {
        let dir = make_dir("none");
        let err = connect(&Endpoint::unix(dir.join("absent.sock"))).unwrap_err();
        assert!(matches!(err, ChannelError::Transport(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
