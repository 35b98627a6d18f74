use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use docwire_frame::ReadSession;
use docwire_value::{Event, JsonWire};
use serde::Serialize;

use crate::exit::{frame_error, CliResult};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EventOutput {
    key: String,
    value: serde_json::Value,
}

#[derive(Serialize)]
struct DocumentOutput<'a> {
    endpoint: &'a str,
    index: u64,
    meta_data: bool,
    events: Vec<EventOutput>,
    timestamp: String,
}

pub fn print_document(session: &ReadSession, endpoint: &str, format: OutputFormat) -> CliResult<()> {
    let events = session
        .events()
        .map_err(|err| frame_error("decode failed", err))?
        .iter()
        .map(event_output)
        .collect();
    let out = DocumentOutput {
        endpoint,
        index: session.index(),
        meta_data: session.is_meta_data(),
        events,
        timestamp: now_unix_seconds(),
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INDEX", "KIND", "KEY", "VALUE"]);
            for event in &out.events {
                table.add_row(vec![
                    out.index.to_string(),
                    kind(out.meta_data).to_string(),
                    event.key.clone(),
                    event.value.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let rendered: Vec<String> = out
                .events
                .iter()
                .map(|event| format!("{}={}", event.key, event.value))
                .collect();
            println!(
                "#{} {} from {}: {}",
                out.index,
                kind(out.meta_data),
                endpoint,
                rendered.join(" ")
            );
        }
    }
    Ok(())
}

/// Print a flat list of labelled values.
pub fn print_fields<T: Serialize>(out: &T, rows: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (label, value) in rows {
                table.add_row(vec![label.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (label, value) in rows {
                println!("{label}: {value}");
            }
        }
    }
}

fn event_output(event: &Event) -> EventOutput {
    let value = JsonWire::new()
        .to_json_value(&event.value)
        .unwrap_or_else(|err| serde_json::Value::String(format!("<{err}>")));
    EventOutput {
        key: event.key.to_string(),
        value,
    }
}

fn kind(meta_data: bool) -> &'static str {
    if meta_data {
        "meta"
    } else {
        "data"
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
