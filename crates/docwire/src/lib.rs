//! Format-agnostic document streams.
//!
//! docwire writes self-describing documents once and carries them as
//! compact binary or line-delimited JSON, in memory or over sockets, with
//! typed method dispatch and live reductions on top.
//!
//! # Crate Structure
//!
//! - [`value`]: Value model and the binary/JSON wires
//! - [`frame`]: Document framing, in-memory streams and tailers
//! - [`transport`]: Unix domain socket and TCP byte streams
//! - [`rpc`]: Method calls as named events, and their dispatch
//! - [`reduce`]: Extractors, collectors and live reductions
//! - [`channel`]: Negotiated socket channels (behind `channel` feature)

/// Re-export value model types.
pub mod value {
    pub use docwire_value::*;
}

/// Re-export frame types.
pub mod frame {
    pub use docwire_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use docwire_transport::*;
}

/// Re-export dispatch types.
pub mod rpc {
    pub use docwire_rpc::*;
}

/// Re-export reduction types.
pub mod reduce {
    pub use docwire_reduce::*;
}

/// Re-export channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use docwire_channel::*;
}
