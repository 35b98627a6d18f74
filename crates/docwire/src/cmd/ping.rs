use std::time::{Instant, SystemTime, UNIX_EPOCH};

use docwire_channel::{connect_with_config, ChannelConfig, HandshakeConfig};
use serde::Serialize;

use crate::cmd::{parse_duration, PingArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_fields, OutputFormat};

#[derive(Serialize)]
struct PingOutput {
    requested: String,
    endpoint: String,
    redirected: bool,
    wire: &'static str,
    header: String,
    handshake_ms: f64,
    test_message: Option<i64>,
}

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;

    let started = Instant::now();
    let mut channel = connect_with_config(
        &args.endpoint,
        &HandshakeConfig::default().with_timeout(timeout),
        ChannelConfig::default().with_wire_type(args.wire),
    )
    .map_err(|err| channel_error("connect failed", err))?;
    let handshake_ms = (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;

    channel
        .test_message(unix_nanos())
        .map_err(|err| channel_error("heartbeat failed", err))?;

    let out = PingOutput {
        requested: args.endpoint.to_string(),
        endpoint: channel.endpoint().to_string(),
        redirected: channel.endpoint() != &args.endpoint,
        wire: channel.wire_type().name(),
        header: channel.header().to_string(),
        handshake_ms,
        test_message: channel.last_test_message(),
    };
    channel
        .close()
        .map_err(|err| channel_error("close failed", err))?;

    let rows = [
        ("endpoint", out.endpoint.clone()),
        ("redirected", out.redirected.to_string()),
        ("wire", out.wire.to_string()),
        ("header", out.header.clone()),
        ("handshake_ms", out.handshake_ms.to_string()),
        (
            "test_message",
            out.test_message
                .map_or_else(|| "-".to_string(), |t| t.to_string()),
        ),
    ];
    print_fields(&out, &rows, format);
    Ok(SUCCESS)
}

fn unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
