//! Acknowledgment replies.
//!
//! Every reply is exactly [`REPLY_SIZE`] bytes; unused tail bytes are zero.
//!
//! ```text
//! ack:          0x01 0x00 id:u64
//! nack request: 0x02 0x01 code:i8  0*7
//! nack os:      0x02 0x02 errno:i32 0*4
//! ```

use std::io;

use crate::error::{Error, ErrorCode};

/// Size of every reply frame.
pub const REPLY_SIZE: usize = 10;

/// Positive acknowledgment tag.
const TAG_ACK: u8 = 0x01;
/// Negative acknowledgment tag.
const TAG_NACK: u8 = 0x02;
/// Sub-kind of a positive acknowledgment.
const SUB_ACK: u8 = 0x00;
/// Nack sub-kind: the request itself was rejected.
const SUB_REQUEST: u8 = 0x01;
/// Nack sub-kind: an operating system call failed.
const SUB_OS: u8 = 0x02;

/// Reply to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Reply {
    /// Request accepted; carries the id assigned to the child.
    Ack(u64),
    /// Request rejected before anything was attempted.
    Nack(ErrorCode),
    /// Request failed with an OS error (`errno`).
    NackOs(i32),
}

/// Reasons a reply frame cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ReplyError {
    /// Frame is not [`REPLY_SIZE`] bytes.
    #[error("reply must be {REPLY_SIZE} bytes, got {0}")]
    Size(usize),
    /// Unknown tag/sub-kind pair.
    #[error("unknown reply kind {0:#04x}/{1:#04x}")]
    Kind(u8, u8),
    /// Request nack carrying an unknown error code.
    #[error("unknown error code {0}")]
    Code(i8),
}

impl Reply {
    /// Builds the request-rejected nack for a decode error.
    pub const fn from_error(err: &Error) -> Self {
        Self::Nack(err.code())
    }

    /// Builds the OS nack for an I/O error, falling back to `EIO` when the
    /// error carries no errno.
    pub fn from_io_error(err: &io::Error) -> Self {
        Self::NackOs(err.raw_os_error().unwrap_or(libc::EIO))
    }

    /// Serializes the reply.
    pub fn encode(&self) -> [u8; REPLY_SIZE] {
        let mut buf = [0u8; REPLY_SIZE];
        match self {
            Self::Ack(id) => {
                buf[0] = TAG_ACK;
                buf[1] = SUB_ACK;
                buf[2..].copy_from_slice(&id.to_be_bytes());
            }
            Self::Nack(code) => {
                buf[0] = TAG_NACK;
                buf[1] = SUB_REQUEST;
                buf[2..3].copy_from_slice(&code.as_i8().to_be_bytes());
            }
            Self::NackOs(errno) => {
                buf[0] = TAG_NACK;
                buf[1] = SUB_OS;
                buf[2..6].copy_from_slice(&errno.to_be_bytes());
            }
        }
        buf
    }

    /// Parses a reply frame. Padding bytes are not checked.
    pub fn decode(buf: &[u8]) -> Result<Self, ReplyError> {
        if buf.len() != REPLY_SIZE {
            return Err(ReplyError::Size(buf.len()));
        }
        match (buf[0], buf[1]) {
            (TAG_ACK, SUB_ACK) => {
                let mut id = [0u8; 8];
                id.copy_from_slice(&buf[2..]);
                Ok(Self::Ack(u64::from_be_bytes(id)))
            }
            (TAG_NACK, SUB_REQUEST) => {
                let raw = i8::from_be_bytes([buf[2]]);
                ErrorCode::from_i8(raw)
                    .map(Self::Nack)
                    .ok_or(ReplyError::Code(raw))
            }
            (TAG_NACK, SUB_OS) => Ok(Self::NackOs(i32::from_be_bytes([
                buf[2], buf[3], buf[4], buf[5],
            ]))),
            (tag, sub) => Err(ReplyError::Kind(tag, sub)),
        }
    }
}

impl From<&Error> for Reply {
    fn from(err: &Error) -> Self {
        Self::from_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Field;

    #[test]
    fn ack_layout() {
        assert_eq!(
            Reply::Ack(0x0102_0304_0506_0708).encode(),
            [0x01, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
    }

    #[test]
    fn nack_request_layout() {
        let reply = Reply::from_error(&Error::Parse(Field::Command));
        assert_eq!(reply.encode(), [0x02, 0x01, 0xFF, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            Reply::Nack(ErrorCode::Undefined).encode()[2],
            0x80,
            "-128 is 0x80 on the wire"
        );
    }

    #[test]
    fn nack_os_layout() {
        let err = io::Error::from_raw_os_error(libc::ENOENT);
        let reply = Reply::from_io_error(&err);
        assert_eq!(reply, Reply::NackOs(libc::ENOENT));
        let mut expected = [0u8; REPLY_SIZE];
        expected[..2].copy_from_slice(&[0x02, 0x02]);
        expected[2..6].copy_from_slice(&libc::ENOENT.to_be_bytes());
        assert_eq!(reply.encode(), expected);
    }

    #[test]
    fn io_error_without_errno_maps_to_eio() {
        let err = io::Error::other("synthetic");
        assert_eq!(Reply::from_io_error(&err), Reply::NackOs(libc::EIO));
    }

    #[test]
    fn decode_replies() {
        for reply in [
            Reply::Ack(0),
            Reply::Ack(u64::MAX),
            Reply::Nack(ErrorCode::NoSuchChild),
            Reply::NackOs(-1),
        ] {
            assert_eq!(Reply::decode(&reply.encode()), Ok(reply));
        }
    }

    #[test]
    fn decode_rejects() {
        assert_eq!(Reply::decode(&[0x01, 0x00]), Err(ReplyError::Size(2)));
        assert_eq!(
            Reply::decode(&[0x01, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]),
            Err(ReplyError::Kind(0x01, 0x01))
        );
        assert_eq!(
            Reply::decode(&[0x02, 0x01, 0x05, 0, 0, 0, 0, 0, 0, 0]),
            Err(ReplyError::Code(5))
        );
    }
}
