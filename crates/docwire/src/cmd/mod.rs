use std::time::Duration;

use clap::{Args, Subcommand};
use docwire_transport::Endpoint;
use docwire_value::{EventKey, WireType};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod ping;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept channels and print every document received.
    Listen(ListenArgs),
    /// Connect and write a single event.
    Send(SendArgs),
    /// Handshake with a peer and send one heartbeat.
    Ping(PingArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Ping(args) => ping::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint to bind (path, unix:<path> or tcp:<host>:<port>).
    pub endpoint: Endpoint,
    /// Exit after printing N documents.
    #[arg(long)]
    pub count: Option<usize>,
    /// Also print metadata documents.
    #[arg(long)]
    pub include_meta: bool,
    /// Answer every handshake with a redirect to this endpoint.
    #[arg(long, value_name = "ENDPOINT", conflicts_with = "reject")]
    pub redirect: Option<Endpoint>,
    /// Answer every handshake with this error message.
    #[arg(long, value_name = "MESSAGE")]
    pub reject: Option<String>,
    /// Handshake timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to.
    pub endpoint: Endpoint,
    /// Event key: a name, or `#<id>` for a numeric key.
    pub key: String,
    /// JSON value payload.
    #[arg(long, conflicts_with = "text")]
    pub json: Option<String>,
    /// Text value payload.
    #[arg(long, conflicts_with = "json")]
    pub text: Option<String>,
    /// Send as a metadata document.
    #[arg(long)]
    pub meta: bool,
    /// Wire for the channel's documents.
    #[arg(long, default_value = "binary", env = "DOCWIRE_WIRE")]
    pub wire: WireType,
    /// Handshake timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Endpoint to connect to.
    pub endpoint: Endpoint,
    /// Handshake timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Wire to announce.
    #[arg(long, default_value = "binary", env = "DOCWIRE_WIRE")]
    pub wire: WireType,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub(crate) fn parse_event_key(input: &str) -> CliResult<EventKey> {
    match input.strip_prefix('#') {
        Some(id) => id
            .parse::<u32>()
            .map(EventKey::Id)
            .map_err(|_| CliError::new(USAGE, format!("invalid numeric event key: {input}"))),
        None if input.is_empty() => Err(CliError::new(USAGE, "event key must not be empty")),
        None => Ok(EventKey::name(input)),
    }
}
