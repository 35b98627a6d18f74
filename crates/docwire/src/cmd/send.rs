use docwire_channel::{connect_with_config, ChannelConfig, HandshakeConfig};
use docwire_frame::DocumentSink;
use docwire_value::{Event, JsonWire, Value};
use serde::Serialize;

use crate::cmd::{parse_duration, parse_event_key, SendArgs};
use crate::exit::{channel_error, frame_error, wire_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_fields, OutputFormat};

#[derive(Serialize)]
struct SendOutput {
    endpoint: String,
    wire: &'static str,
    key: String,
    meta_data: bool,
    sent: bool,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let key = parse_event_key(&args.key)?;
    let value = resolve_value(&args)?;

    let mut channel = connect_with_config(
        &args.endpoint,
        &HandshakeConfig::default().with_timeout(timeout),
        ChannelConfig::default().with_wire_type(args.wire),
    )
    .map_err(|err| channel_error("connect failed", err))?;

    channel
        .write_document(args.meta, &[Event::new(key.clone(), value)])
        .map_err(|err| frame_error("send failed", err))?;
    channel
        .close()
        .map_err(|err| channel_error("close failed", err))?;

    let out = SendOutput {
        endpoint: channel.endpoint().to_string(),
        wire: channel.wire_type().name(),
        key: key.to_string(),
        meta_data: args.meta,
        sent: true,
    };
    let rows = [
        ("endpoint", out.endpoint.clone()),
        ("wire", out.wire.to_string()),
        ("key", out.key.clone()),
        ("meta_data", out.meta_data.to_string()),
    ];
    print_fields(&out, &rows, format);
    Ok(SUCCESS)
}

fn resolve_value(args: &SendArgs) -> CliResult<Value> {
    if let Some(json) = &args.json {
        let parsed = serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return JsonWire::new()
            .from_json_value(&parsed)
            .map_err(|err| wire_error("--json cannot be sent", err));
    }
    if let Some(text) = &args.text {
        return Ok(Value::from(text.as_str()));
    }
    Ok(Value::Null)
}
