//! Child lifecycle events sent from the supervisor to the requester.
//!
//! Each event is exactly [`EVENT_SIZE`] bytes:
//!
//! ```text
//! spawn:       's' stdio-mode id:u64 pid:i32
//! spawn error: 'e' stage      id:u64 errno:i32
//! exit:        'x' 0          id:u64 code:i32
//! signal:      'k' 0          id:u64 signal:i32
//! ```

use std::fmt;

use crate::command::StdioMode;

/// Size of every event frame.
pub const EVENT_SIZE: usize = 14;

/// Child started.
const TAG_SPAWN: u8 = 0x73;
/// Child could not be started.
const TAG_SPAWN_ERROR: u8 = 0x65;
/// Child exited normally.
const TAG_EXIT: u8 = 0x78;
/// Child was killed by a signal.
const TAG_SIGNAL: u8 = 0x6b;

/// Step of child setup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum SpawnStage {
    /// `fork()`.
    Fork = 0,
    /// `setpriority()`.
    SetPriority = 1,
    /// `setgid()`.
    SetGid = 2,
    /// `setuid()`.
    SetUid = 3,
    /// `chdir()`.
    Chdir = 4,
    /// `execve()`.
    Exec = 5,
}

impl SpawnStage {
    /// Parses a stage byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Fork),
            1 => Some(Self::SetPriority),
            2 => Some(Self::SetGid),
            3 => Some(Self::SetUid),
            4 => Some(Self::Chdir),
            5 => Some(Self::Exec),
            _ => None,
        }
    }
}

impl fmt::Display for SpawnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fork => "fork",
            Self::SetPriority => "setpriority",
            Self::SetGid => "setgid",
            Self::SetUid => "setuid",
            Self::Chdir => "chdir",
            Self::Exec => "exec",
        })
    }
}

/// What happened to the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventKind {
    /// Child is running. Its stdio descriptors travel alongside the frame.
    Spawn {
        /// Process id.
        pid: i32,
        /// Which descriptors were passed.
        stdio_mode: StdioMode,
    },
    /// Child setup failed at `stage` with `errno`.
    SpawnError {
        /// Failed step.
        stage: SpawnStage,
        /// OS error number.
        errno: i32,
    },
    /// Child exited with `code`.
    Exit(i32),
    /// Child was terminated by `signal`.
    Signal(i32),
}

/// A lifecycle event for the child registered under `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Event {
    /// Supervisor-assigned child id (the id from the exec ack).
    pub id: u64,
    /// What happened.
    pub kind: EventKind,
}

/// Reasons an event frame cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EventError {
    /// Frame is not [`EVENT_SIZE`] bytes.
    #[error("event must be {EVENT_SIZE} bytes, got {0}")]
    Size(usize),
    /// Unknown event tag.
    #[error("unknown event tag {0:#04x}")]
    Tag(u8),
    /// Unknown spawn-error stage.
    #[error("unknown spawn stage {0}")]
    Stage(u8),
    /// Spawn event with an invalid stdio mode.
    #[error("invalid stdio mode {0}")]
    StdioMode(u8),
}

impl Event {
    /// Creates an event.
    pub const fn new(id: u64, kind: EventKind) -> Self {
        Self { id, kind }
    }

    /// Serializes the event.
    pub fn encode(&self) -> [u8; EVENT_SIZE] {
        let (tag, byte1, value) = match self.kind {
            EventKind::Spawn { pid, stdio_mode } => (TAG_SPAWN, stdio_mode.bits(), pid),
            EventKind::SpawnError { stage, errno } => (TAG_SPAWN_ERROR, stage as u8, errno),
            EventKind::Exit(code) => (TAG_EXIT, 0, code),
            EventKind::Signal(signal) => (TAG_SIGNAL, 0, signal),
        };
        let mut buf = [0u8; EVENT_SIZE];
        buf[0] = tag;
        buf[1] = byte1;
        buf[2..10].copy_from_slice(&self.id.to_be_bytes());
        buf[10..].copy_from_slice(&value.to_be_bytes());
        buf
    }

    /// Parses an event frame.
    pub fn decode(buf: &[u8]) -> Result<Self, EventError> {
        if buf.len() != EVENT_SIZE {
            return Err(EventError::Size(buf.len()));
        }
        let mut id = [0u8; 8];
        id.copy_from_slice(&buf[2..10]);
        let id = u64::from_be_bytes(id);
        let value = i32::from_be_bytes([buf[10], buf[11], buf[12], buf[13]]);

        let kind = match buf[0] {
            TAG_SPAWN => EventKind::Spawn {
                pid: value,
                stdio_mode: StdioMode::from_bits(buf[1]).ok_or(EventError::StdioMode(buf[1]))?,
            },
            TAG_SPAWN_ERROR => EventKind::SpawnError {
                stage: SpawnStage::from_byte(buf[1]).ok_or(EventError::Stage(buf[1]))?,
                errno: value,
            },
            TAG_EXIT => EventKind::Exit(value),
            TAG_SIGNAL => EventKind::Signal(value),
            other => return Err(EventError::Tag(other)),
        };
        Ok(Self { id, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_layout() {
        let ev = Event::new(
            7,
            EventKind::Spawn {
                pid: 0x1234,
                stdio_mode: StdioMode::InOut,
            },
        );
        assert_eq!(
            ev.encode(),
            [b's', 3, 0, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0x12, 0x34]
        );
    }

    #[test]
    fn decode_all_kinds() {
        let events = [
            Event::new(
                1,
                EventKind::SpawnError {
                    stage: SpawnStage::Chdir,
                    errno: libc::ENOENT,
                },
            ),
            Event::new(u64::MAX, EventKind::Exit(-1)),
            Event::new(0, EventKind::Signal(libc::SIGKILL)),
        ];
        for ev in events {
            assert_eq!(Event::decode(&ev.encode()), Ok(ev));
        }
    }

    #[test]
    fn reserved_byte_ignored() {
        let mut buf = Event::new(3, EventKind::Exit(0)).encode();
        buf[1] = 0xAB;
        assert_eq!(Event::decode(&buf), Ok(Event::new(3, EventKind::Exit(0))));
    }

    #[test]
    fn decode_rejects() {
        assert_eq!(Event::decode(&[b'x'; 3]), Err(EventError::Size(3)));
        let mut buf = [0u8; EVENT_SIZE];
        buf[0] = b'?';
        assert_eq!(Event::decode(&buf), Err(EventError::Tag(b'?')));
        buf[0] = b'e';
        buf[1] = 9;
        assert_eq!(Event::decode(&buf), Err(EventError::Stage(9)));
        buf[0] = b's';
        buf[1] = 4;
        assert_eq!(Event::decode(&buf), Err(EventError::StdioMode(4)));
    }
}
