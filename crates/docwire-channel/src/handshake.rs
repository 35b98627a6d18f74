//! Header negotiation.
//!
//! The connecting side opens with one metadata document announcing its
//! protocol, version, and the wire it will use afterwards; the accepting
//! side answers with one metadata document carrying its protocol, version
//! and the [`ChannelHeader`] for this connection. Handshake documents always
//! use the binary wire, whatever the channel uses later.

use std::io::{Read, Write};
use std::time::Instant;

use bytes::Bytes;
use docwire_frame::{FrameError, FrameReader, FrameWriter};
use docwire_value::{
    scratch, BinaryWire, Event, EventKey, FromValue, ToValue, Value, ValueIn, Wire, WireType,
};

use crate::config::HandshakeConfig;
use crate::error::{ChannelError, Result};
use crate::header::ChannelHeader;

const MAX_PROTOCOL_LEN: usize = 32;
const MAX_VERSION_LEN: usize = 16;

const PROTOCOL: &str = "protocol";
const VERSION: &str = "version";
const WIRE: &str = "wire";
const HEADER: &str = "header";

/// What a connecting peer announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub protocol: String,
    pub version: String,
    pub wire_type: WireType,
}

/// Client side: announce, then wait for the peer's header.
///
/// Protocol or version problems in the reply are
/// [`ChannelError::HandshakeFailed`]; the header itself is returned as-is
/// for the caller to act on.
pub fn handshake_client<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    config: &HandshakeConfig,
    wire_type: WireType,
) -> Result<ChannelHeader> {
    validate_protocol_name(&config.protocol_name)?;
    validate_version(&config.protocol_version)?;

    send_meta(
        writer,
        &[
            Event::new(PROTOCOL, config.protocol_name.as_str()),
            Event::new(VERSION, config.protocol_version.as_str()),
            Event::new(WIRE, wire_type.name()),
        ],
    )?;

    let deadline = Instant::now() + config.timeout;
    let events = recv_meta(reader, deadline, config)?;
    let protocol: String = required(&events, PROTOCOL)?;
    let version: String = required(&events, VERSION)?;
    let header: ChannelHeader = required(&events, HEADER)?;

    validate_protocol_name(&protocol)?;
    validate_version(&version)?;
    if protocol != config.protocol_name {
        return Err(ChannelError::HandshakeFailed(format!(
            "unknown protocol '{protocol}' (expected '{}')",
            config.protocol_name
        )));
    }
    if !is_version_compatible(&config.protocol_version, &version)? {
        return Err(ChannelError::HandshakeFailed(format!(
            "incompatible version '{version}' (local '{}')",
            config.protocol_version
        )));
    }

    tracing::debug!(%header, %protocol, %version, "handshake reply received");
    Ok(header)
}

/// Server side: read the announcement, decide the header, reply.
///
/// A foreign protocol or incompatible version is answered with an
/// [`ChannelHeader::Error`] without consulting `decide`.
pub fn handshake_server<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    config: &HandshakeConfig,
    decide: impl FnOnce(&Hello) -> ChannelHeader,
) -> Result<(Hello, ChannelHeader)> {
    validate_protocol_name(&config.protocol_name)?;
    validate_version(&config.protocol_version)?;

    let deadline = Instant::now() + config.timeout;
    let events = recv_meta(reader, deadline, config)?;
    let wire: String = required(&events, WIRE)?;
    let hello = Hello {
        protocol: required(&events, PROTOCOL)?,
        version: required(&events, VERSION)?,
        wire_type: wire
            .parse()
            .map_err(|_| ChannelError::HandshakeFailed(format!("unknown wire '{wire}'")))?,
    };
    validate_protocol_name(&hello.protocol)?;
    validate_version(&hello.version)?;

    let header = if hello.protocol != config.protocol_name {
        ChannelHeader::Error(format!(
            "unknown protocol '{}' (expected '{}')",
            hello.protocol, config.protocol_name
        ))
    } else if !is_version_compatible(&hello.version, &config.protocol_version)? {
        ChannelHeader::Error(format!(
            "incompatible version '{}' (server '{}')",
            hello.version, config.protocol_version
        ))
    } else {
        decide(&hello)
    };

    send_meta(
        writer,
        &[
            Event::new(PROTOCOL, config.protocol_name.as_str()),
            Event::new(VERSION, config.protocol_version.as_str()),
            Event::new(HEADER, header.to_value()),
        ],
    )?;
    tracing::debug!(%header, wire = %hello.wire_type, "handshake reply sent");
    Ok((hello, header))
}

fn send_meta<W: Write>(writer: &mut FrameWriter<W>, events: &[Event]) -> Result<()> {
    let wire = BinaryWire::new();
    scratch::with_scratch(|buf| -> Result<()> {
        for event in events {
            wire.encode_event(&event.key, &event.value, buf)?;
        }
        writer.send(true, buf)?;
        Ok(())
    })
}

fn recv_meta<R: Read>(
    reader: &mut FrameReader<R>,
    deadline: Instant,
    config: &HandshakeConfig,
) -> Result<Vec<Event>> {
    loop {
        if Instant::now() >= deadline {
            return Err(ChannelError::Timeout(config.timeout));
        }

        match reader.poll_frame() {
            Ok(Some(frame)) => {
                if !frame.meta_data {
                    return Err(ChannelError::HandshakeFailed(
                        "expected a metadata document".to_string(),
                    ));
                }
                if frame.payload.len() > config.max_handshake_payload {
                    return Err(ChannelError::HandshakeFailed(format!(
                        "handshake payload too large: {} (max {})",
                        frame.payload.len(),
                        config.max_handshake_payload
                    )));
                }
                return decode_events(frame.payload);
            }
            Ok(None) => continue,
            Err(FrameError::ConnectionClosed) => {
                return Err(ChannelError::Disconnected(
                    "connection closed during handshake".to_string(),
                ));
            }
            Err(err) => return Err(ChannelError::Frame(err)),
        }
    }
}

fn decode_events(mut payload: Bytes) -> Result<Vec<Event>> {
    let wire = BinaryWire::new();
    let mut events = Vec::new();
    while let Some(event) = wire.decode_event(&mut payload)? {
        events.push(event);
    }
    Ok(events)
}

fn required<T: FromValue>(events: &[Event], name: &str) -> Result<T> {
    let key = EventKey::name(name);
    let value = events
        .iter()
        .find(|event| event.key == key)
        .map(|event| &event.value)
        .ok_or_else(|| ChannelError::HandshakeFailed(format!("missing '{name}' in handshake")))?;
    read_value(value)
}

fn read_value<T: FromValue>(value: &Value) -> Result<T> {
    Ok(ValueIn::new(value).read()?)
}

fn validate_protocol_name(protocol: &str) -> Result<()> {
    if protocol.is_empty() || protocol.len() > MAX_PROTOCOL_LEN {
        return Err(ChannelError::HandshakeFailed(format!(
            "invalid protocol name length: {}",
            protocol.len()
        )));
    }
    Ok(())
}

fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() || version.len() > MAX_VERSION_LEN {
        return Err(ChannelError::HandshakeFailed(format!(
            "invalid protocol version length: {}",
            version.len()
        )));
    }
    parse_version(version).map(|_| ())
}

/// Same major, and the client at least as new as the server's minor.
fn is_version_compatible(client_version: &str, server_version: &str) -> Result<bool> {
    let (client_major, client_minor) = parse_version(client_version)?;
    let (server_major, server_minor) = parse_version(server_version)?;

    Ok(client_major == server_major && client_minor >= server_minor)
}

fn parse_version(version: &str) -> Result<(u16, u16)> {
    let invalid =
        |why: &str| ChannelError::HandshakeFailed(format!("invalid version '{version}': {why}"));

    let (major, minor) = version
        .split_once('.')
        .ok_or_else(|| invalid("expected '<major>.<minor>'"))?;
    let major = major.parse::<u16>().map_err(|_| invalid("non-numeric major"))?;
    let minor = minor.parse::<u16>().map_err(|_| invalid("non-numeric minor"))?;

    Ok((major, minor))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind, Read};
    use std::thread;
    use std::time::Duration;

    use docwire_transport::{Endpoint, WireStream};

    use super::*;

    fn ends(stream: WireStream) -> (FrameReader<WireStream>, FrameWriter<WireStream>) {
        let config = HandshakeConfig::default().frame_config(&Default::default());
        let reader = FrameReader::with_config_stream(stream.try_clone().unwrap(), config.clone())
            .unwrap();
        let writer = FrameWriter::with_config_stream(stream, config).unwrap();
        (reader, writer)
    }

    #[test]
    fn successful_handshake_announces_wire() {
        let (left, right) = WireStream::pair().unwrap();

        let server = thread::spawn(move || {
            let (mut reader, mut writer) = ends(left);
            handshake_server(&mut reader, &mut writer, &HandshakeConfig::default(), |_| {
                ChannelHeader::Ok
            })
            .unwrap()
        });

        let (mut reader, mut writer) = ends(right);
        let header =
            handshake_client(&mut reader, &mut writer, &HandshakeConfig::default(), WireType::Json)
                .unwrap();
        let (hello, sent) = server.join().unwrap();

        assert_eq!(header, ChannelHeader::Ok);
        assert_eq!(sent, ChannelHeader::Ok);
        assert_eq!(hello.wire_type, WireType::Json);
        assert_eq!(hello.protocol, "docwire");
    }

    #[test]
    fn redirect_header_reaches_client() {
        let (left, right) = WireStream::pair().unwrap();
        let target = Endpoint::tcp("127.0.0.1:9");
        let expected = target.clone();

        let server = thread::spawn(move || {
            let (mut reader, mut writer) = ends(left);
            handshake_server(&mut reader, &mut writer, &HandshakeConfig::default(), |_| {
                ChannelHeader::Redirect(target)
            })
            .unwrap()
        });

        let (mut reader, mut writer) = ends(right);
        let header = handshake_client(
            &mut reader,
            &mut writer,
            &HandshakeConfig::default(),
            WireType::Binary,
        )
        .unwrap();
        server.join().unwrap();

        assert_eq!(header, ChannelHeader::Redirect(expected));
    }

    #[test]
    fn wrong_protocol_is_answered_with_error_header() {
        let (left, right) = WireStream::pair().unwrap();

        let server = thread::spawn(move || {
            let (mut reader, mut writer) = ends(left);
            handshake_server(&mut reader, &mut writer, &HandshakeConfig::default(), |_| {
                panic!("policy must not run for a foreign protocol")
            })
            .unwrap()
        });

        let (mut reader, mut writer) = ends(right);
        let config = HandshakeConfig::default().with_protocol("other", "1.0");
        let result = handshake_client(&mut reader, &mut writer, &config, WireType::Binary);
        let (_, sent) = server.join().unwrap();

        assert!(matches!(sent, ChannelHeader::Error(_)));
        // The reply names the server's protocol, which this client does not speak.
        assert!(matches!(result, Err(ChannelError::HandshakeFailed(_))));
    }

    #[test]
    fn version_mismatch_is_answered_with_error_header() {
        let (left, right) = WireStream::pair().unwrap();

        let server = thread::spawn(move || {
            let (mut reader, mut writer) = ends(left);
            let config = HandshakeConfig::default().with_protocol("docwire", "2.0");
            handshake_server(&mut reader, &mut writer, &config, |_| ChannelHeader::Ok).unwrap()
        });

        let (mut reader, mut writer) = ends(right);
        let config = HandshakeConfig::default().with_protocol("docwire", "2.3");
        let header = handshake_client(&mut reader, &mut writer, &config, WireType::Binary).unwrap();
        let (_, sent) = server.join().unwrap();

        // 2.3 client against a 2.0 server is compatible.
        assert_eq!(sent, ChannelHeader::Ok);
        assert_eq!(header, ChannelHeader::Ok);

        let (left, right) = WireStream::pair().unwrap();
        let server = thread::spawn(move || {
            let (mut reader, mut writer) = ends(left);
            let config = HandshakeConfig::default().with_protocol("docwire", "2.0");
            handshake_server(&mut reader, &mut writer, &config, |_| ChannelHeader::Ok).unwrap()
        });
        let (mut reader, mut writer) = ends(right);
        let result = handshake_client(
            &mut reader,
            &mut writer,
            &HandshakeConfig::default(),
            WireType::Binary,
        );
        let (_, sent) = server.join().unwrap();

        assert!(matches!(sent, ChannelHeader::Error(_)));
        assert!(matches!(result, Err(ChannelError::HandshakeFailed(_))));
    }

    #[test]
    fn data_document_during_handshake_rejected() {
        let (left, right) = WireStream::pair().unwrap();
        let mut raw = FrameWriter::new(left);
        raw.send(false, b"not a handshake").unwrap();

        let (mut reader, mut writer) = ends(right);
        let result = handshake_server(
            &mut reader,
            &mut writer,
            &HandshakeConfig::default(),
            |_| ChannelHeader::Ok,
        );
        assert!(matches!(result, Err(ChannelError::HandshakeFailed(_))));
    }

    #[test]
    fn handshake_timeout() {
        let mut reader = FrameReader::new(AlwaysTimedOutReader);
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let config = HandshakeConfig::default().with_timeout(Duration::from_millis(25));

        let result = handshake_client(&mut reader, &mut writer, &config, WireType::Binary);
        assert!(matches!(result, Err(ChannelError::Timeout(_))));
    }

    #[test]
    fn peer_hangup_is_disconnected() {
        let (left, right) = WireStream::pair().unwrap();
        drop(left);
        let (mut reader, mut writer) = ends(right);
        let result = handshake_server(
            &mut reader,
            &mut writer,
            &HandshakeConfig::default(),
            |_| ChannelHeader::Ok,
        );
        assert!(matches!(result, Err(ChannelError::Disconnected(_))));
    }

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version("1.0").unwrap(), (1, 0));
        assert!(parse_version("1").is_err());
        assert!(parse_version("1.x").is_err());
        assert!(parse_version("1.0.0").is_err());
        assert!(is_version_compatible("1.2", "1.1").unwrap());
        assert!(!is_version_compatible("1.0", "1.1").unwrap());
        assert!(!is_version_compatible("2.0", "1.0").unwrap());
    }

    struct AlwaysTimedOutReader;

    impl Read for AlwaysTimedOutReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::TimedOut))
        }
    }
}
