//! Request message types and the client-side encoder.
//!
//! Wire layout (all integers big-endian, strings are a 2-byte length
//! followed by that many bytes, never empty):
//!
//! ```text
//! exec:     0x01 flags command:str nargs:u16 arg:str*nargs (opt-tag payload)*
//! kill:     0x02 signal:u8 id:u64
//! shutdown: 0xFF reserved:u8
//! ```

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::os::unix::ffi::OsStrExt;

use crate::error::EncodeError;

/// Largest signal number accepted in kill requests and the termsig option.
pub const MAX_SIGNAL: u8 = 32;

/// Exact size of a kill request.
pub const KILL_MESSAGE_SIZE: usize = 10;

/// Exact size of a shutdown request.
pub const SHUTDOWN_MESSAGE_SIZE: usize = 2;

/// Flag bits 0–1: stdio mode.
pub(crate) const FLAG_STDIO_MODE: u8 = 0x03;
/// Flag bit 2: socket instead of pipe.
pub(crate) const FLAG_STDIO_SOCKET: u8 = 0x04;
/// Flag bit 3: merge stderr into stdout.
pub(crate) const FLAG_STDERR_TO_STDOUT: u8 = 0x08;
/// Flag bit 4: spawn in a new process group.
pub(crate) const FLAG_PGROUP: u8 = 0x10;

/// Leading byte of a request message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum MessageTag {
    /// Start a process.
    Exec = 0x01,
    /// Signal a process.
    Kill = 0x02,
    /// Shut the channel down.
    Shutdown = 0xFF,
}

impl MessageTag {
    /// Parses a tag byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Exec),
            0x02 => Some(Self::Kill),
            0xFF => Some(Self::Shutdown),
            _ => None,
        }
    }

    /// Returns the wire byte.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Tag byte of an exec option entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum OptionTag {
    /// Signal sent to the child when the supervisor shuts down (1 byte).
    TermSig = 0x74,
    /// Niceness (1 signed byte).
    Priority = 0x70,
    /// Numeric uid (2 bytes).
    Uid = 0x75,
    /// Numeric gid (2 bytes).
    Gid = 0x67,
    /// User name, resolved to a uid (string).
    User = 0x55,
    /// Group name, resolved to a gid (string).
    Group = 0x47,
    /// Working directory (string).
    Cwd = 0x43,
    /// Replacement for argv\[0\] (string).
    Argv0 = 0x30,
}

impl OptionTag {
    /// Parses an option tag byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x74 => Some(Self::TermSig),
            0x70 => Some(Self::Priority),
            0x75 => Some(Self::Uid),
            0x67 => Some(Self::Gid),
            0x55 => Some(Self::User),
            0x47 => Some(Self::Group),
            0x43 => Some(Self::Cwd),
            0x30 => Some(Self::Argv0),
            _ => None,
        }
    }

    /// Returns the wire byte.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for OptionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TermSig => "termsig",
            Self::Priority => "priority",
            Self::Uid => "uid",
            Self::Gid => "gid",
            Self::User => "user",
            Self::Group => "group",
            Self::Cwd => "cwd",
            Self::Argv0 => "argv0",
        })
    }
}

/// Which standard streams of the child are connected back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
#[repr(u8)]
pub enum StdioMode {
    /// One bidirectional channel for stdin and stdout.
    #[default]
    Bidirectional = 0,
    /// Only the child's stdin.
    In = 1,
    /// Only the child's stdout.
    Out = 2,
    /// Separate channels for stdin and stdout.
    InOut = 3,
}

impl StdioMode {
    /// Decodes the low two bits of the exec flag byte.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Bidirectional),
            1 => Some(Self::In),
            2 => Some(Self::Out),
            3 => Some(Self::InOut),
            _ => None,
        }
    }

    /// Returns the two-bit wire value.
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for StdioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bidirectional => "bidirectional",
            Self::In => "in",
            Self::Out => "out",
            Self::InOut => "in-out",
        })
    }
}

impl std::str::FromStr for StdioMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bidirectional" | "bidir" => Ok(Self::Bidirectional),
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "in-out" | "in_out" | "inout" => Ok(Self::InOut),
            _ => Err(format!("unknown stdio mode: {s}")),
        }
    }
}

/// Ownership state of argv\[0\].
///
/// Without an override, argv\[0\] is the command path itself and owns
/// nothing of its own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Argv0 {
    /// Same string as [`ExecCommand::command`].
    #[default]
    Command,
    /// Independently owned replacement (cosmetic; the command path is still
    /// what gets executed).
    Owned(OsString),
}

/// A request to start a process.
///
/// Options absent from the wire message are `None`; `0` is a legal value
/// for every numeric option.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ExecCommand {
    /// Which stdio streams are connected back.
    pub stdio_mode: StdioMode,
    /// Use a socket pair instead of pipes.
    pub stdio_socket: bool,
    /// Redirect stderr into stdout.
    pub stderr_to_stdout: bool,
    /// Place the child in its own process group.
    pub pgroup: bool,
    /// Program to execute.
    pub command: OsString,
    /// argv\[0\] as seen by the child.
    pub argv0: Argv0,
    /// Arguments after argv\[0\].
    pub args: Vec<OsString>,
    /// Niceness.
    pub priority: Option<i8>,
    /// User to run as.
    pub uid: Option<u32>,
    /// Group to run as.
    pub gid: Option<u32>,
    /// Signal to terminate the child with on shutdown.
    pub termsig: Option<u8>,
    /// Working directory.
    pub cwd: Option<OsString>,
}

impl ExecCommand {
    /// Creates a request for `command` with no arguments and no options.
    pub fn new(command: impl Into<OsString>) -> Self {
        Self {
            stdio_mode: StdioMode::default(),
            stdio_socket: false,
            stderr_to_stdout: false,
            pgroup: false,
            command: command.into(),
            argv0: Argv0::Command,
            args: Vec::new(),
            priority: None,
            uid: None,
            gid: None,
            termsig: None,
            cwd: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn cwd(mut self, dir: impl Into<OsString>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Replaces argv\[0\].
    #[must_use]
    pub fn argv0(mut self, name: impl Into<OsString>) -> Self {
        self.argv0 = Argv0::Owned(name.into());
        self
    }

    /// argv\[0\] as the child will see it.
    pub fn program_name(&self) -> &OsStr {
        match &self.argv0 {
            Argv0::Command => &self.command,
            Argv0::Owned(name) => name,
        }
    }

    /// The full argument vector in `execv` shape: argv\[0\], the supplied
    /// arguments, and a trailing `None` terminator.
    pub fn argv(&self) -> Vec<Option<&OsStr>> {
        let mut argv = Vec::with_capacity(self.args.len() + 2);
        argv.push(Some(self.program_name()));
        argv.extend(self.args.iter().map(|a| Some(a.as_os_str())));
        argv.push(None);
        argv
    }

    /// Packs the stdio mode and boolean flags into the header flag byte.
    pub const fn flags(&self) -> u8 {
        let mut flags = self.stdio_mode.bits() & FLAG_STDIO_MODE;
        if self.stdio_socket {
            flags |= FLAG_STDIO_SOCKET;
        }
        if self.stderr_to_stdout {
            flags |= FLAG_STDERR_TO_STDOUT;
        }
        if self.pgroup {
            flags |= FLAG_PGROUP;
        }
        flags
    }

    /// Serializes this request onto the wire.
    ///
    /// uid and gid go out as the numeric options, so they must fit in
    /// 16 bits.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = vec![MessageTag::Exec.as_byte(), self.flags()];
        put_string(&mut out, "command", &self.command)?;

        let nargs =
            u16::try_from(self.args.len()).map_err(|_| EncodeError::TooManyArgs(self.args.len()))?;
        out.extend_from_slice(&nargs.to_be_bytes());
        for arg in &self.args {
            put_string(&mut out, "argument", arg)?;
        }

        if let Some(sig) = self.termsig {
            if sig > MAX_SIGNAL {
                return Err(EncodeError::BadSignal(sig));
            }
            out.extend_from_slice(&[OptionTag::TermSig.as_byte(), sig]);
        }
        if let Some(nice) = self.priority {
            out.push(OptionTag::Priority.as_byte());
            out.extend_from_slice(&nice.to_be_bytes());
        }
        if let Some(uid) = self.uid {
            put_id(&mut out, OptionTag::Uid, "uid", uid)?;
        }
        if let Some(gid) = self.gid {
            put_id(&mut out, OptionTag::Gid, "gid", gid)?;
        }
        if let Some(cwd) = &self.cwd {
            out.push(OptionTag::Cwd.as_byte());
            put_string(&mut out, "cwd", cwd)?;
        }
        if let Argv0::Owned(name) = &self.argv0 {
            out.push(OptionTag::Argv0.as_byte());
            put_string(&mut out, "argv0", name)?;
        }
        Ok(out)
    }
}

/// A decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    /// Start a process.
    Exec(Box<ExecCommand>),
    /// Send `signal` to the child registered under `id`.
    Kill {
        /// Signal number, `0..=32`.
        signal: u8,
        /// Supervisor-assigned child id.
        id: u64,
    },
    /// Shut the channel down.
    Shutdown,
}

impl Command {
    /// The message tag this command is sent under.
    pub const fn tag(&self) -> MessageTag {
        match self {
            Self::Exec(_) => MessageTag::Exec,
            Self::Kill { .. } => MessageTag::Kill,
            Self::Shutdown => MessageTag::Shutdown,
        }
    }

    /// Serializes this request onto the wire.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        match self {
            Self::Exec(exec) => exec.encode(),
            Self::Kill { signal, id } => {
                if *signal > MAX_SIGNAL {
                    return Err(EncodeError::BadSignal(*signal));
                }
                let mut out = Vec::with_capacity(KILL_MESSAGE_SIZE);
                out.extend_from_slice(&[MessageTag::Kill.as_byte(), *signal]);
                out.extend_from_slice(&id.to_be_bytes());
                Ok(out)
            }
            Self::Shutdown => Ok(vec![MessageTag::Shutdown.as_byte(), 0x00]),
        }
    }
}

impl From<ExecCommand> for Command {
    fn from(exec: ExecCommand) -> Self {
        Self::Exec(Box::new(exec))
    }
}

/// Appends a length-prefixed string.
fn put_string(out: &mut Vec<u8>, what: &'static str, s: &OsStr) -> Result<(), EncodeError> {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return Err(EncodeError::Empty(what));
    }
    if bytes.contains(&0) {
        return Err(EncodeError::Nul(what));
    }
    let len = u16::try_from(bytes.len()).map_err(|_| EncodeError::TooLong {
        what,
        len: bytes.len(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

/// Appends a numeric uid/gid option.
fn put_id(out: &mut Vec<u8>, tag: OptionTag, what: &'static str, id: u32) -> Result<(), EncodeError> {
    let id16 = u16::try_from(id).map_err(|_| EncodeError::IdRange { what, id })?;
    out.push(tag.as_byte());
    out.extend_from_slice(&id16.to_be_bytes());
    Ok(())
}
