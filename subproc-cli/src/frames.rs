//! `subproc reply`, `subproc event` and `subproc signals`.

use anyhow::{Context, Result};
use serde::Serialize;
use subproc_proto::{ErrorCode, Event, EventKind, Reply};

use crate::OutputFormat;
use crate::input::InputArgs;

/// Reply operations.
#[derive(clap::Subcommand)]
pub enum ReplyAction {
    /// Encode a positive acknowledgment.
    Ack {
        /// Child id.
        id: u64,
    },

    /// Encode a request-rejected nack.
    Nack {
        /// Error code, by name (`bad-option`) or number (`-6`).
        #[arg(allow_negative_numbers = true)]
        code: ErrorCode,
    },

    /// Encode an OS-error nack.
    NackOs {
        /// OS error number.
        #[arg(allow_negative_numbers = true)]
        errno: i32,
    },

    /// Decode a reply frame.
    Decode(InputArgs),
}

/// Serializable view of a reply.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplyView {
    Ack {
        id: u64,
    },
    Nack {
        code: i8,
        name: &'static str,
    },
    NackOs {
        errno: i32,
        message: String,
    },
}

impl TryFrom<Reply> for ReplyView {
    type Error = anyhow::Error;

    fn try_from(reply: Reply) -> Result<Self> {
        Ok(match reply {
            Reply::Ack(id) => Self::Ack { id },
            Reply::Nack(code) => Self::Nack {
                code: code.as_i8(),
                name: code.name(),
            },
            Reply::NackOs(errno) => Self::NackOs {
                errno,
                message: std::io::Error::from_raw_os_error(errno).to_string(),
            },
            other => anyhow::bail!("unsupported reply {other:?}"),
        })
    }
}

/// `subproc reply`.
pub fn reply(action: ReplyAction, format: OutputFormat) -> Result<()> {
    let reply = match action {
        ReplyAction::Ack { id } => Reply::Ack(id),
        ReplyAction::Nack { code } => Reply::Nack(code),
        ReplyAction::NackOs { errno } => Reply::NackOs(errno),
        ReplyAction::Decode(input) => {
            let bytes = input.read()?;
            let reply = Reply::decode(&bytes).context("decoding reply")?;
            let view = ReplyView::try_from(reply)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
                OutputFormat::Table => println!("{}", describe_reply(&view)),
            }
            return Ok(());
        }
    };

    let bytes = reply.encode();
    match format {
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "hex": hex::encode(bytes),
                "reply": ReplyView::try_from(reply)?,
            });
            println!("{}", serde_json::to_string_pretty(&obj)?);
        }
        OutputFormat::Table => println!("{}", hex::encode(bytes)),
    }
    Ok(())
}

/// One-line description of a reply.
fn describe_reply(view: &ReplyView) -> String {
    match view {
        ReplyView::Ack { id } => format!("ack id={id}"),
        ReplyView::Nack { code, name } => format!("nack {name} ({code})"),
        ReplyView::NackOs { errno, message } => format!("nack os errno={errno} ({message})"),
    }
}

/// Serializable view of an event.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EventView {
    Spawn {
        id: u64,
        pid: i32,
        stdio_mode: String,
    },
    SpawnError {
        id: u64,
        stage: String,
        errno: i32,
        message: String,
    },
    Exit {
        id: u64,
        code: i32,
    },
    Signal {
        id: u64,
        signal: i32,
        name: Option<&'static str>,
    },
}

impl TryFrom<Event> for EventView {
    type Error = anyhow::Error;

    fn try_from(event: Event) -> Result<Self> {
        let id = event.id;
        Ok(match event.kind {
            EventKind::Spawn { pid, stdio_mode } => Self::Spawn {
                id,
                pid,
                stdio_mode: stdio_mode.to_string(),
            },
            EventKind::SpawnError { stage, errno } => Self::SpawnError {
                id,
                stage: stage.to_string(),
                errno,
                message: std::io::Error::from_raw_os_error(errno).to_string(),
            },
            EventKind::Exit(code) => Self::Exit { id, code },
            EventKind::Signal(signal) => Self::Signal {
                id,
                signal,
                name: subproc_proto::signal_name(signal),
            },
            other => anyhow::bail!("unsupported event {other:?}"),
        })
    }
}

/// One-line description of an event.
fn describe_event(view: &EventView) -> String {
    match view {
        EventView::Spawn {
            id,
            pid,
            stdio_mode,
        } => format!("child {id}: spawned pid {pid} (stdio {stdio_mode})"),
        EventView::SpawnError {
            id,
            stage,
            errno,
            message,
        } => format!("child {id}: {stage} failed, errno {errno} ({message})"),
        EventView::Exit { id, code } => format!("child {id}: exited with {code}"),
        EventView::Signal { id, signal, name } => {
            format!("child {id}: killed by signal {signal} ({})", name.unwrap_or("?"))
        }
    }
}

/// `subproc event`.
pub fn event(bytes: &[u8], format: OutputFormat) -> Result<()> {
    let event = Event::decode(bytes).context("decoding event")?;
    tracing::debug!(id = event.id, "decoded event");
    let view = EventView::try_from(event)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Table => println!("{}", describe_event(&view)),
    }
    Ok(())
}

/// `subproc signals`.
pub fn signals(format: OutputFormat) -> Result<()> {
    #[derive(Serialize)]
    struct Row {
        number: i32,
        name: &'static str,
        short: &'static str,
    }

    let mut rows: Vec<Row> = subproc_proto::signals()
        .map(|s| Row {
            number: s.number,
            name: s.name,
            short: s.short,
        })
        .collect();
    rows.sort_by_key(|r| r.number);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Table => {
            for r in &rows {
                println!("{:>3}  {:<10} {}", r.number, r.name, r.short);
            }
        }
    }
    Ok(())
}
