use std::fmt;

use docwire_transport::Endpoint;
use docwire_value::{FromValue, Object, Result, ToValue, Value, ValueIn, WireError};

/// Lifecycle of a channel.
///
/// `Connecting` and `Negotiating` only exist while [`connect`](crate::connect)
/// or [`ChannelListener::accept`](crate::ChannelListener::accept) run; a
/// [`Channel`](crate::Channel) value is `Open` until it is closed or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Negotiating,
    Open,
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Negotiating => "negotiating",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

/// Outcome of the handshake, fixed for the life of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelHeader {
    /// Proceed on this connection.
    Ok,
    /// Refused, with a reason for the caller.
    Error(String),
    /// Reconnect to another endpoint and negotiate there instead.
    Redirect(Endpoint),
}

impl ChannelHeader {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    fn tag(&self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::Error(_) => "Error",
            Self::Redirect(_) => "Redirect",
        }
    }
}

impl fmt::Display for ChannelHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Error(message) => write!(f, "error: {message}"),
            Self::Redirect(endpoint) => write!(f, "redirect to {endpoint}"),
        }
    }
}

impl ToValue for ChannelHeader {
    fn to_value(&self) -> Value {
        let object = Object::new(self.tag());
        Value::Object(match self {
            Self::Ok => object,
            Self::Error(message) => object.with_field("message", message.as_str()),
            Self::Redirect(endpoint) => object.with_field("endpoint", endpoint.to_string()),
        })
    }
}

impl FromValue for ChannelHeader {
    fn from_value(input: ValueIn<'_>) -> Result<Self> {
        let object = input.object()?;
        match object.type_name() {
            "Ok" => Ok(Self::Ok),
            "Error" => Ok(Self::Error(object.read("message")?)),
            "Redirect" => {
                let text: String = object.read("endpoint")?;
                let endpoint = text.parse().map_err(|err| WireError::Unrepresentable {
                    wire: "header",
                    reason: format!("bad redirect endpoint: {err}"),
                })?;
                Ok(Self::Redirect(endpoint))
            }
            other => Err(WireError::Unrepresentable {
                wire: "header",
                reason: format!("unknown channel header '{other}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_survive_value_mapping() {
        for header in [
            ChannelHeader::Ok,
            ChannelHeader::Error("maintenance".into()),
            ChannelHeader::Redirect(Endpoint::tcp("127.0.0.1:7400")),
        ] {
            let value = header.to_value();
            assert_eq!(ChannelHeader::from_value(ValueIn::new(&value)).unwrap(), header);
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        let value = Value::Object(Object::new("Maybe"));
        assert!(ChannelHeader::from_value(ValueIn::new(&value)).is_err());
    }

    #[test]
    fn bad_redirect_target_rejected() {
        let value = Value::Object(Object::new("Redirect").with_field("endpoint", "tcp:nohost"));
        assert!(ChannelHeader::from_value(ValueIn::new(&value)).is_err());
    }
}
