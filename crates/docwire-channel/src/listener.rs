use std::sync::atomic::{AtomicU64, Ordering};

use docwire_frame::{FrameReader, FrameWriter};
use docwire_transport::{Endpoint, WireListener};

use crate::channel::Channel;
use crate::config::{ChannelConfig, HandshakeConfig};
use crate::error::Result;
use crate::handshake::{handshake_server, Hello};
use crate::header::{ChannelHeader, ChannelState};

/// Decides the header each incoming connection is answered with.
pub trait HeaderPolicy: Send + Sync {
    fn header_for(&self, hello: &Hello) -> ChannelHeader;
}

impl<F> HeaderPolicy for F
where
    F: Fn(&Hello) -> ChannelHeader + Send + Sync,
{
    fn header_for(&self, hello: &Hello) -> ChannelHeader {
        self(hello)
    }
}

/// Answers every compatible connection with [`ChannelHeader::Ok`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl HeaderPolicy for AcceptAll {
    fn header_for(&self, _hello: &Hello) -> ChannelHeader {
        ChannelHeader::Ok
    }
}

/// Result of one [`ChannelListener::accept`].
#[derive(Debug)]
pub enum Accepted {
    /// The peer was answered `Ok` and the channel is open.
    Open(Channel),
    /// The peer was answered with an error or a redirect and disconnected.
    Declined(ChannelHeader),
}

impl Accepted {
    pub fn into_channel(self) -> Option<Channel> {
        match self {
            Self::Open(channel) => Some(channel),
            Self::Declined(_) => None,
        }
    }
}

/// Listens for and negotiates incoming channels.
pub struct ChannelListener {
    listener: WireListener,
    handshake: HandshakeConfig,
    config: ChannelConfig,
    policy: Box<dyn HeaderPolicy>,
    accepted: AtomicU64,
}

impl ChannelListener {
    /// Bind to `endpoint`, accepting every compatible peer.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        Ok(Self {
            listener: WireListener::bind(endpoint)?,
            handshake: HandshakeConfig::default(),
            config: ChannelConfig::default(),
            policy: Box::new(AcceptAll),
            accepted: AtomicU64::new(0),
        })
    }

    pub fn with_handshake_config(mut self, config: HandshakeConfig) -> Self {
        self.handshake = config;
        self
    }

    /// Runtime settings for accepted channels. The wire type is taken from
    /// each peer's announcement instead.
    pub fn with_channel_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_policy(mut self, policy: impl HeaderPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Accept the next connection (blocking) and negotiate it.
    pub fn accept(&self) -> Result<Accepted> {
        let stream = self.listener.accept()?;
        let reader_stream = stream.try_clone()?;
        let serial = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;

        let frame_config = self.handshake.frame_config(&self.config.frame);
        let mut reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
        let mut writer = FrameWriter::with_config_stream(stream, frame_config)?;

        tracing::debug!(serial, state = %ChannelState::Negotiating, "negotiating");
        let (hello, header) =
            handshake_server(&mut reader, &mut writer, &self.handshake, |hello| {
                self.policy.header_for(hello)
            })?;

        if !header.is_ok() {
            tracing::debug!(serial, %header, "connection declined");
            if let Err(err) = writer.get_ref().shutdown() {
                tracing::trace!(error = %err, "shutdown of declined connection");
            }
            return Ok(Accepted::Declined(header));
        }

        let config = self.config.clone().with_wire_type(hello.wire_type);
        let channel = Channel::open(self.local_endpoint(), reader, writer, header, config)?;
        Ok(Accepted::Open(channel))
    }

    /// Endpoint peers should connect to.
    pub fn local_endpoint(&self) -> Endpoint {
        self.listener.local_endpoint()
    }
}

impl std::fmt::Debug for ChannelListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelListener")
            .field("endpoint", &self.local_endpoint())
            .field("accepted", &self.accepted.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
