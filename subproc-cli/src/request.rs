//! `subproc decode` and `subproc encode`.

use std::ffi::{OsStr, OsString};
use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::Serialize;
use subproc_proto::{Argv0, Command, ExecCommand, MAX_SIGNAL, Reply, StdioMode};

use crate::OutputFormat;

/// Request kinds accepted by `subproc encode`.
#[derive(clap::Subcommand)]
pub enum EncodeRequest {
    /// Start a process.
    Exec(Box<ExecArgs>),

    /// Signal a child by id.
    Kill {
        /// Child id from the exec ack.
        id: u64,
        /// Signal name or number (0-32).
        #[arg(short, long, default_value = "0", value_parser = parse_signal)]
        signal: u8,
    },

    /// Shut the channel down.
    Shutdown,
}

/// Arguments for `subproc encode exec`.
#[derive(clap::Args)]
#[command(trailing_var_arg = true)]
pub struct ExecArgs {
    /// Which stdio streams are connected back.
    #[arg(long, default_value = "bidirectional")]
    stdio: StdioMode,

    /// Use a socket pair instead of pipes.
    #[arg(long)]
    socket: bool,

    /// Merge stderr into stdout.
    #[arg(long)]
    stderr_to_stdout: bool,

    /// Spawn in a new process group.
    #[arg(long)]
    pgroup: bool,

    /// Signal the child receives when the supervisor shuts down.
    #[arg(long, value_parser = parse_signal)]
    termsig: Option<u8>,

    /// Niceness.
    #[arg(long, allow_negative_numbers = true)]
    nice: Option<i8>,

    /// Numeric user id (0-65535).
    #[arg(long)]
    uid: Option<u16>,

    /// Numeric group id (0-65535).
    #[arg(long)]
    gid: Option<u16>,

    /// Working directory.
    #[arg(short = 'w', long)]
    cwd: Option<OsString>,

    /// argv[0] as seen by the child.
    #[arg(long)]
    argv0: Option<OsString>,

    /// Program to execute.
    command: OsString,

    /// Arguments passed to the program.
    #[arg(allow_hyphen_values = true)]
    args: Vec<OsString>,
}

impl ExecArgs {
    /// Builds the request value.
    fn into_command(self) -> ExecCommand {
        let mut exec = ExecCommand::new(self.command).args(self.args);
        exec.stdio_mode = self.stdio;
        exec.stdio_socket = self.socket;
        exec.stderr_to_stdout = self.stderr_to_stdout;
        exec.pgroup = self.pgroup;
        exec.termsig = self.termsig;
        exec.priority = self.nice;
        exec.uid = self.uid.map(u32::from);
        exec.gid = self.gid.map(u32::from);
        exec.cwd = self.cwd;
        if let Some(name) = self.argv0 {
            exec = exec.argv0(name);
        }
        exec
    }
}

/// Parses a signal given by name or number, limited to the wire range.
pub fn parse_signal(s: &str) -> Result<u8, String> {
    let number = match s.parse::<i32>() {
        Ok(n) => n,
        Err(_) => subproc_proto::signal_number(s).ok_or_else(|| format!("unknown signal: {s}"))?,
    };
    u8::try_from(number)
        .ok()
        .filter(|n| *n <= MAX_SIGNAL)
        .ok_or_else(|| format!("signal {number} out of range 0..={MAX_SIGNAL}"))
}

/// Serializable view of a decoded request.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CommandView {
    Exec {
        command: String,
        argv: Vec<String>,
        argv0_override: bool,
        stdio_mode: String,
        stdio_socket: bool,
        stderr_to_stdout: bool,
        pgroup: bool,
        termsig: Option<u8>,
        priority: Option<i8>,
        uid: Option<u32>,
        gid: Option<u32>,
        cwd: Option<String>,
    },
    Kill {
        signal: u8,
        signal_name: Option<&'static str>,
        id: u64,
    },
    Shutdown,
}

/// Lossy UTF-8 rendering of a wire string.
fn lossy(s: &OsStr) -> String {
    s.to_string_lossy().into_owned()
}

impl TryFrom<&Command> for CommandView {
    type Error = anyhow::Error;

    fn try_from(cmd: &Command) -> Result<Self> {
        Ok(match cmd {
            Command::Exec(exec) => Self::Exec {
                command: lossy(&exec.command),
                argv: exec.argv().into_iter().flatten().map(lossy).collect(),
                argv0_override: matches!(exec.argv0, Argv0::Owned(_)),
                stdio_mode: exec.stdio_mode.to_string(),
                stdio_socket: exec.stdio_socket,
                stderr_to_stdout: exec.stderr_to_stdout,
                pgroup: exec.pgroup,
                termsig: exec.termsig,
                priority: exec.priority,
                uid: exec.uid,
                gid: exec.gid,
                cwd: exec.cwd.as_deref().map(lossy),
            },
            Command::Kill { signal, id } => Self::Kill {
                signal: *signal,
                signal_name: subproc_proto::signal_name(i32::from(*signal)),
                id: *id,
            },
            Command::Shutdown => Self::Shutdown,
            other => anyhow::bail!("unsupported request {:?}", other.tag()),
        })
    }
}

/// Formats an optional value for the table view.
fn or_dash<T: ToString>(v: Option<T>) -> String {
    v.map_or_else(|| "-".to_owned(), |v| v.to_string())
}

/// Renders a decoded request as aligned `key: value` lines.
fn render_table(view: &CommandView) -> String {
    let mut rows: Vec<(&str, String)> = Vec::new();
    match view {
        CommandView::Exec {
            command,
            argv,
            stdio_mode,
            stdio_socket,
            stderr_to_stdout,
            pgroup,
            termsig,
            priority,
            uid,
            gid,
            cwd,
            ..
        } => {
            let transport = if *stdio_socket { "socket" } else { "pipe" };
            rows.push(("type", "exec".to_owned()));
            rows.push(("command", command.clone()));
            rows.push(("argv", format!("{argv:?}")));
            rows.push(("stdio", format!("{stdio_mode} ({transport})")));
            rows.push(("stderr", (if *stderr_to_stdout { "merged" } else { "separate" }).to_owned()));
            rows.push(("pgroup", (if *pgroup { "yes" } else { "no" }).to_owned()));
            rows.push(("termsig", or_dash(*termsig)));
            rows.push(("priority", or_dash(*priority)));
            rows.push(("uid", or_dash(*uid)));
            rows.push(("gid", or_dash(*gid)));
            rows.push(("cwd", or_dash(cwd.as_ref())));
        }
        CommandView::Kill {
            signal,
            signal_name,
            id,
        } => {
            rows.push(("type", "kill".to_owned()));
            rows.push(("signal", format!("{signal} ({})", signal_name.unwrap_or("none"))));
            rows.push(("id", id.to_string()));
        }
        CommandView::Shutdown => rows.push(("type", "shutdown".to_owned())),
    }
    let mut out = String::new();
    for (key, value) in rows {
        let _ = writeln!(out, "{:<10}{value}", format!("{key}:"));
    }
    out
}

/// `subproc decode`: decodes a request, or reports the nack it earns.
pub fn decode(bytes: &[u8], format: OutputFormat) -> Result<()> {
    match subproc_proto::decode(bytes) {
        Ok(cmd) => {
            let view = CommandView::try_from(&cmd)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
                OutputFormat::Table => print!("{}", render_table(&view)),
            }
            Ok(())
        }
        Err(e) => {
            let nack = hex::encode(Reply::from_error(&e).encode());
            match format {
                OutputFormat::Json => {
                    let obj = serde_json::json!({
                        "error": e.to_string(),
                        "code": e.code().as_i8(),
                        "nack": nack,
                    });
                    println!("{}", serde_json::to_string_pretty(&obj)?);
                }
                OutputFormat::Table => println!("nack:     {nack}"),
            }
            Err(anyhow::Error::new(e).context("request rejected"))
        }
    }
}

/// `subproc encode`: builds a request and prints it in hex.
pub fn encode(request: EncodeRequest, format: OutputFormat) -> Result<()> {
    let cmd = match request {
        EncodeRequest::Exec(args) => Command::from(args.into_command()),
        EncodeRequest::Kill { id, signal } => Command::Kill { signal, id },
        EncodeRequest::Shutdown => Command::Shutdown,
    };
    let bytes = cmd.encode().context("encoding request")?;
    tracing::debug!(size = bytes.len(), tag = ?cmd.tag(), "encoded request");

    match format {
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "hex": hex::encode(&bytes),
                "size": bytes.len(),
            });
            println!("{}", serde_json::to_string_pretty(&obj)?);
        }
        OutputFormat::Table => println!("{}", hex::encode(&bytes)),
    }
    Ok(())
}
