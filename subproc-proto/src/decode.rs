//! Request decoder.
//!
//! Turns one already-delimited message into a fully owned [`Command`].
//! On any rejection every string built so far is dropped before the error
//! reaches the caller; argv\[0\] borrows the command path through
//! [`Argv0::Command`] rather than holding a second copy, so there is
//! exactly one owner per string.

use crate::command::{
    Argv0, Command, ExecCommand, FLAG_PGROUP, FLAG_STDERR_TO_STDOUT, FLAG_STDIO_MODE,
    FLAG_STDIO_SOCKET, KILL_MESSAGE_SIZE, MAX_SIGNAL, MessageTag, OptionTag,
    SHUTDOWN_MESSAGE_SIZE, StdioMode,
};
use crate::cursor::Cursor;
use crate::error::{Error, Field, Result};
use crate::ident::{IdentityResolver, SystemIdentities};

/// Smallest possible encoded string: 2-byte length plus one byte.
const MIN_STRING_SIZE: usize = 3;

/// Decodes a request, resolving user and group names against the system
/// databases.
pub fn decode(buf: &[u8]) -> Result<Command> {
    decode_with(buf, &SystemIdentities)
}

/// Decodes a request with a caller-supplied identity resolver.
pub fn decode_with(buf: &[u8], ids: &impl IdentityResolver) -> Result<Command> {
    let result = dispatch(buf, ids);
    if let Err(ref e) = result {
        tracing::debug!(
            tag = ?buf.first(),
            size = buf.len(),
            code = e.code().as_i8(),
            error = %e,
            "rejected request"
        );
    }
    result
}

/// Selects the message variant from the tag byte and total size.
fn dispatch(buf: &[u8], ids: &impl IdentityResolver) -> Result<Command> {
    let size = buf.len();
    let bad_header = Error::BadHeader {
        tag: buf.first().copied(),
        size,
    };
    let Some(&tag) = buf.first() else {
        return Err(bad_header);
    };

    match MessageTag::from_byte(tag) {
        Some(MessageTag::Exec) if size > 2 => decode_exec(buf, ids).map(Command::from),
        Some(MessageTag::Kill) if size == KILL_MESSAGE_SIZE => decode_kill(buf),
        Some(MessageTag::Shutdown) if size == SHUTDOWN_MESSAGE_SIZE => Ok(Command::Shutdown),
        _ => Err(bad_header),
    }
}

/// Decodes a kill request. `buf` is exactly [`KILL_MESSAGE_SIZE`] bytes.
fn decode_kill(buf: &[u8]) -> Result<Command> {
    let signal = buf[1];
    if signal > MAX_SIGNAL {
        return Err(Error::BadSignal(Some(signal)));
    }
    let mut id = [0u8; 8];
    id.copy_from_slice(&buf[2..KILL_MESSAGE_SIZE]);
    Ok(Command::Kill {
        signal,
        id: u64::from_be_bytes(id),
    })
}

/// Decodes an exec request: header flags, command, arguments, options.
fn decode_exec(buf: &[u8], ids: &impl IdentityResolver) -> Result<ExecCommand> {
    let flags = buf[1];
    let stdio_mode = StdioMode::from_bits(flags & FLAG_STDIO_MODE)
        .ok_or(Error::Undefined("stdio mode outside its 2-bit field"))?;

    let mut cur = Cursor::new(buf, 2);
    let command = cur.read_string().ok_or(Error::Parse(Field::Command))?;
    let nargs = cur.read_u16().ok_or(Error::Parse(Field::ArgCount))?;

    let mut exec = ExecCommand::new(command);
    exec.stdio_mode = stdio_mode;
    exec.stdio_socket = flags & FLAG_STDIO_SOCKET != 0;
    exec.stderr_to_stdout = flags & FLAG_STDERR_TO_STDOUT != 0;
    exec.pgroup = flags & FLAG_PGROUP != 0;

    // The count is untrusted; never reserve more than the buffer can hold.
    exec.args.reserve(usize::from(nargs).min(cur.remaining() / MIN_STRING_SIZE));
    for n in 1..=nargs {
        let arg = cur.read_string().ok_or(Error::Parse(Field::Argument(n)))?;
        exec.args.push(arg);
    }

    while !cur.is_empty() {
        apply_option(&mut cur, &mut exec, ids)?;
    }
    Ok(exec)
}

/// Reads one option entry at the cursor and applies it to `exec`.
fn apply_option(
    cur: &mut Cursor<'_>,
    exec: &mut ExecCommand,
    ids: &impl IdentityResolver,
) -> Result<()> {
    let at = cur.position();
    let byte = cur
        .read_u8()
        .ok_or(Error::Undefined("option read past end of message"))?;
    let tag = OptionTag::from_byte(byte).ok_or(Error::BadOption(byte))?;
    let malformed = Error::Parse(Field::Option(tag));

    match tag {
        OptionTag::TermSig => {
            let signal = cur.read_u8().ok_or(Error::BadSignal(None))?;
            if signal > MAX_SIGNAL {
                return Err(Error::BadSignal(Some(signal)));
            }
            exec.termsig = Some(signal);
        }
        OptionTag::Priority => {
            let raw = cur.read_u8().ok_or(malformed)?;
            exec.priority = Some(i8::from_be_bytes([raw]));
        }
        OptionTag::Uid => exec.uid = Some(u32::from(cur.read_u16().ok_or(malformed)?)),
        OptionTag::Gid => exec.gid = Some(u32::from(cur.read_u16().ok_or(malformed)?)),
        OptionTag::User => {
            let name = cur.read_string().ok_or(malformed)?;
            let uid = ids.user_id(&name);
            drop(name);
            exec.uid = Some(uid.ok_or(Error::NoSuchUser)?);
        }
        OptionTag::Group => {
            let name = cur.read_string().ok_or(malformed)?;
            let gid = ids.group_id(&name);
            drop(name);
            exec.gid = Some(gid.ok_or(Error::NoSuchGroup)?);
        }
        OptionTag::Cwd => exec.cwd = Some(cur.read_string().ok_or(malformed)?),
        OptionTag::Argv0 => exec.argv0 = Argv0::Owned(cur.read_string().ok_or(malformed)?),
    }

    tracing::trace!(option = %tag, offset = at, "applied exec option");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    /// Resolver with one known user and group.
    struct Fixed;

    impl IdentityResolver for Fixed {
        fn user_id(&self, name: &OsStr) -> Option<u32> {
            (name == "alice").then_some(1001)
        }

        fn group_id(&self, name: &OsStr) -> Option<u32> {
            (name == "staff").then_some(50)
        }
    }

    /// Exec header for `cmd` with no arguments.
    fn exec_prefix(cmd: &str) -> Vec<u8> {
        let mut buf = vec![0x01, 0x00];
        buf.extend_from_slice(&u16::try_from(cmd.len()).unwrap().to_be_bytes());
        buf.extend_from_slice(cmd.as_bytes());
        buf.extend_from_slice(&[0x00, 0x00]);
        buf
    }

    /// Appends a string option entry.
    fn push_str_opt(buf: &mut Vec<u8>, tag: u8, s: &str) {
        buf.push(tag);
        buf.extend_from_slice(&u16::try_from(s.len()).unwrap().to_be_bytes());
        buf.extend_from_slice(s.as_bytes());
    }

    #[test]
    fn decodes_ping() {
        let buf = [0x01, 0x00, 0x00, 0x04, b'p', b'i', b'n', b'g', 0x00, 0x00];
        let Command::Exec(exec) = decode_with(&buf, &Fixed).unwrap() else {
            panic!("expected Exec");
        };
        assert_eq!(exec.stdio_mode, StdioMode::Bidirectional);
        assert_eq!(exec.argv(), vec![Some(OsStr::new("ping")), None]);
        assert_eq!(exec.argv0, Argv0::Command);
        assert_eq!(exec.uid, None);
        assert_eq!(exec.termsig, None);
    }

    #[test]
    fn decodes_flags() {
        let mut buf = exec_prefix("x");
        buf[1] = 0x1E;
        let Command::Exec(exec) = decode_with(&buf, &Fixed).unwrap() else {
            panic!("expected Exec");
        };
        assert_eq!(exec.stdio_mode, StdioMode::Out);
        assert!(exec.stdio_socket && exec.stderr_to_stdout && exec.pgroup);
    }

    #[test]
    fn decodes_kill_and_shutdown() {
        assert_eq!(
            decode_with(&[0x02, 0x09, 0, 0, 0, 0, 0, 0, 0, 42], &Fixed),
            Ok(Command::Kill { signal: 9, id: 42 })
        );
        assert_eq!(decode_with(&[0xFF, 0x7A], &Fixed), Ok(Command::Shutdown));
    }

    #[test]
    fn bad_headers() {
        let cases: [&[u8]; 8] = [
            &[],
            &[0x01],
            &[0x01, 0x00],
            &[0x02, 0x09, 0, 0],
            &[0x02, 0x09, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            &[0xFF],
            &[0xFF, 0x00, 0x00],
            &[0x03, 0x00, 0x00],
        ];
        for buf in cases {
            assert!(
                matches!(decode_with(buf, &Fixed), Err(Error::BadHeader { .. })),
                "{buf:?}"
            );
        }
    }

    #[test]
    fn kill_signal_bound() {
        let mut buf = [0x02, 32, 0, 0, 0, 0, 0, 0, 0, 1];
        assert!(decode_with(&buf, &Fixed).is_ok());
        buf[1] = 33;
        assert_eq!(decode_with(&buf, &Fixed), Err(Error::BadSignal(Some(33))));
    }

    #[test]
    fn truncated_argument_list() {
        let mut buf = exec_prefix("ls");
        let n = buf.len();
        buf[n - 1] = 2;
        buf.extend_from_slice(&[0x00, 0x02, b'-', b'l']);
        assert_eq!(
            decode_with(&buf, &Fixed),
            Err(Error::Parse(Field::Argument(2)))
        );
    }

    #[test]
    fn missing_arg_count() {
        let buf = [0x01, 0x00, 0x00, 0x01, b'x', 0x00];
        assert_eq!(decode_with(&buf, &Fixed), Err(Error::Parse(Field::ArgCount)));
    }

    #[test]
    fn zero_length_command() {
        let buf = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(decode_with(&buf, &Fixed), Err(Error::Parse(Field::Command)));
    }

    #[test]
    fn numeric_options() {
        let mut buf = exec_prefix("x");
        buf.extend_from_slice(&[0x74, 15, 0x70, 0xEC, 0x75, 0x00, 0x00, 0x67, 0x01, 0x02]);
        let Command::Exec(exec) = decode_with(&buf, &Fixed).unwrap() else {
            panic!("expected Exec");
        };
        assert_eq!(exec.termsig, Some(15));
        assert_eq!(exec.priority, Some(-20));
        assert_eq!(exec.uid, Some(0));
        assert_eq!(exec.gid, Some(0x0102));
    }

    #[test]
    fn named_identities() {
        let mut buf = exec_prefix("x");
        push_str_opt(&mut buf, 0x55, "alice");
        push_str_opt(&mut buf, 0x47, "staff");
        let Command::Exec(exec) = decode_with(&buf, &Fixed).unwrap() else {
            panic!("expected Exec");
        };
        assert_eq!(exec.uid, Some(1001));
        assert_eq!(exec.gid, Some(50));

        let mut unknown_user = exec_prefix("x");
        push_str_opt(&mut unknown_user, 0x55, "mallory");
        assert_eq!(decode_with(&unknown_user, &Fixed), Err(Error::NoSuchUser));

        let mut unknown_group = exec_prefix("x");
        push_str_opt(&mut unknown_group, 0x47, "wheel");
        assert_eq!(decode_with(&unknown_group, &Fixed), Err(Error::NoSuchGroup));
    }

    #[test]
    fn repeated_cwd_last_wins() {
        let mut buf = exec_prefix("x");
        push_str_opt(&mut buf, 0x43, "/tmp");
        push_str_opt(&mut buf, 0x43, "/var");
        let Command::Exec(exec) = decode_with(&buf, &Fixed).unwrap() else {
            panic!("expected Exec");
        };
        assert_eq!(exec.cwd.as_deref(), Some(OsStr::new("/var")));
    }

    #[test]
    fn argv0_override_keeps_command() {
        let mut buf = exec_prefix("/bin/busybox");
        push_str_opt(&mut buf, 0x30, "sh");
        push_str_opt(&mut buf, 0x30, "ash");
        let Command::Exec(exec) = decode_with(&buf, &Fixed).unwrap() else {
            panic!("expected Exec");
        };
        assert_eq!(exec.command, "/bin/busybox");
        assert_eq!(exec.argv0, Argv0::Owned("ash".into()));
        assert_eq!(exec.argv()[0], Some(OsStr::new("ash")));
    }

    #[test]
    fn option_failures() {
        let cases: &[(&[u8], Error)] = &[
            (&[0x74], Error::BadSignal(None)),
            (&[0x74, 33], Error::BadSignal(Some(33))),
            (&[0x70], Error::Parse(Field::Option(OptionTag::Priority))),
            (&[0x75, 0x01], Error::Parse(Field::Option(OptionTag::Uid))),
            (&[0x67], Error::Parse(Field::Option(OptionTag::Gid))),
            (&[0x43, 0x00, 0x00], Error::Parse(Field::Option(OptionTag::Cwd))),
            (&[0x30, 0x00, 0x09, b'a'], Error::Parse(Field::Option(OptionTag::Argv0))),
            (&[0x55, 0x00], Error::Parse(Field::Option(OptionTag::User))),
            (&[0x47], Error::Parse(Field::Option(OptionTag::Group))),
            (&[0x99, 0x43, 0x00, 0x01, b'/'], Error::BadOption(0x99)),
        ];
        for (tail, expected) in cases {
            let mut buf = exec_prefix("x");
            buf.extend_from_slice(tail);
            assert_eq!(decode_with(&buf, &Fixed), Err(*expected), "{tail:?}");
        }
    }

    #[test]
    fn failure_after_owned_fields() {
        let mut buf = exec_prefix("x");
        push_str_opt(&mut buf, 0x43, "/tmp");
        push_str_opt(&mut buf, 0x30, "y");
        buf.push(0x00);
        assert_eq!(decode_with(&buf, &Fixed), Err(Error::BadOption(0x00)));
    }
}
