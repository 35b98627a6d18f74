use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use docwire_channel::{
    Accepted, Channel, ChannelError, ChannelHeader, ChannelListener, HandshakeConfig, Hello,
};
use docwire_frame::{BackoffPauser, Pauser};
use tracing::{debug, info, warn};

use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{channel_error, CliError, CliResult, SUCCESS};
use crate::output::{print_document, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut listener = ChannelListener::bind(&args.endpoint)
        .map_err(|err| channel_error("bind failed", err))?
        .with_handshake_config(HandshakeConfig::default().with_timeout(timeout));

    if let Some(target) = args.redirect.clone() {
        listener = listener.with_policy(move |_: &Hello| ChannelHeader::Redirect(target.clone()));
    } else if let Some(message) = args.reject.clone() {
        listener = listener.with_policy(move |_: &Hello| ChannelHeader::Error(message.clone()));
    }
    info!(endpoint = %listener.local_endpoint(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut channel = match listener.accept() {
            Ok(Accepted::Open(channel)) => channel,
            Ok(Accepted::Declined(header)) => {
                info!(%header, "connection declined");
                continue;
            }
            Err(err @ ChannelError::Transport(_)) => return Err(channel_error("accept failed", err)),
            Err(err) => {
                warn!(error = %err, "handshake failed");
                continue;
            }
        };

        if serve(&mut channel, &args, format, &running, &mut printed)? {
            return Ok(SUCCESS);
        }
    }

    Ok(SUCCESS)
}

/// Print documents until the peer goes away. Returns `true` once `--count`
/// is reached.
fn serve(
    channel: &mut Channel,
    args: &ListenArgs,
    format: OutputFormat,
    running: &AtomicBool,
    printed: &mut usize,
) -> CliResult<bool> {
    let endpoint = channel.endpoint().to_string();
    let mut pauser = BackoffPauser::default();

    while running.load(Ordering::SeqCst) {
        let session = match channel.reading_document() {
            Ok(Some(session)) => session,
            Ok(None) => {
                pauser.pause();
                continue;
            }
            Err(err) => {
                debug!(error = %err, "channel closed");
                return Ok(false);
            }
        };
        pauser.reset();

        if session.is_meta_data() && !args.include_meta {
            continue;
        }

        print_document(&session, &endpoint, format)?;
        *printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if *printed >= count {
                return Ok(true);
            }
        }
    }

    Ok(false)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
