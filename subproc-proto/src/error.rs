//! Error types for request decoding and encoding.

use std::fmt;

use crate::command::OptionTag;

/// Alias for `Result<T, subproc_proto::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a request message is rejected.
///
/// Every variant is terminal for the message being parsed. The dispatch
/// layer turns it into a request-rejected nack via [`Error::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Unknown message tag, or a size that does not match the tag's frame.
    #[error("bad request header: {}, {size} bytes", tag_label(.tag))]
    BadHeader {
        /// Leading byte of the message (`None` for an empty buffer).
        tag: Option<u8>,
        /// Total message size.
        size: usize,
    },

    /// A field was truncated or otherwise malformed.
    #[error("malformed {0}")]
    Parse(Field),

    /// Signal number outside `0..=32` (or missing entirely).
    #[error("{}", signal_label(.0))]
    BadSignal(Option<u8>),

    /// Unrecognized option tag inside an exec message.
    #[error("unrecognized exec option tag {0:#04x}")]
    BadOption(u8),

    /// The named user does not exist in the identity database.
    #[error("no such user")]
    NoSuchUser,

    /// The named group does not exist in the identity database.
    #[error("no such group")]
    NoSuchGroup,

    /// Internal invariant violation. Indicates a defect, not bad input.
    #[error("internal error: {0}")]
    Undefined(&'static str),
}

impl Error {
    /// Returns the one-byte wire code for a request-rejected nack.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BadHeader { .. } => ErrorCode::BadHeader,
            Self::Parse(_) => ErrorCode::Parse,
            Self::BadSignal(_) => ErrorCode::BadSignal,
            Self::BadOption(_) => ErrorCode::BadOption,
            Self::NoSuchUser => ErrorCode::NoSuchUser,
            Self::NoSuchGroup => ErrorCode::NoSuchGroup,
            Self::Undefined(_) => ErrorCode::Undefined,
        }
    }
}

/// Formats the tag of a [`Error::BadHeader`].
fn tag_label(tag: &Option<u8>) -> String {
    tag.map_or_else(|| "empty message".to_owned(), |t| format!("tag {t:#04x}"))
}

/// Formats the payload of a [`Error::BadSignal`].
fn signal_label(signal: &Option<u8>) -> String {
    match signal {
        Some(n) => format!("signal {n} out of range 0..=32"),
        None => "missing signal number".to_owned(),
    }
}

/// The field that failed to parse in an [`Error::Parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Field {
    /// The command path string.
    Command,
    /// The 2-byte argument count.
    ArgCount,
    /// The n-th supplied argument (1-based, matching its argv slot).
    Argument(u16),
    /// The payload of an exec option.
    Option(OptionTag),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => f.write_str("command path"),
            Self::ArgCount => f.write_str("argument count"),
            Self::Argument(n) => write!(f, "argument #{n}"),
            Self::Option(tag) => write!(f, "{tag} option"),
        }
    }
}

/// Signed one-byte error codes carried by a request-rejected nack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(i8)]
pub enum ErrorCode {
    /// Internal invariant violation.
    Undefined = -128,
    /// Malformed field.
    Parse = -1,
    /// Bad message header.
    BadHeader = -2,
    /// Signal number out of range.
    BadSignal = -3,
    /// Unknown user name.
    NoSuchUser = -4,
    /// Unknown group name.
    NoSuchGroup = -5,
    /// Unknown exec option tag.
    BadOption = -6,
    /// Kill request for an id the supervisor does not track.
    NoSuchChild = -7,
}

impl ErrorCode {
    /// All known codes.
    pub const ALL: [Self; 8] = [
        Self::Undefined,
        Self::Parse,
        Self::BadHeader,
        Self::BadSignal,
        Self::NoSuchUser,
        Self::NoSuchGroup,
        Self::BadOption,
        Self::NoSuchChild,
    ];

    /// Returns the signed wire value.
    pub const fn as_i8(self) -> i8 {
        self as i8
    }

    /// Looks up a code by its signed wire value.
    pub fn from_i8(value: i8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_i8() == value)
    }

    /// Short lowercase name, used by the CLI.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Parse => "parse",
            Self::BadHeader => "bad-header",
            Self::BadSignal => "bad-signal",
            Self::NoSuchUser => "no-such-user",
            Self::NoSuchGroup => "no-such-group",
            Self::BadOption => "bad-option",
            Self::NoSuchChild => "no-such-child",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_i8())
    }
}

impl std::str::FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<i8>() {
            return Self::from_i8(n).ok_or_else(|| format!("unknown error code: {n}"));
        }
        let wanted = s.to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| format!("unknown error code: {s}"))
    }
}

/// Reasons a command cannot be encoded onto the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// A string field is empty; the wire format has no empty strings.
    #[error("{0} is empty")]
    Empty(&'static str),

    /// A string field exceeds the 2-byte length prefix.
    #[error("{what} is {len} bytes, the limit is 65535")]
    TooLong {
        /// Which field.
        what: &'static str,
        /// Its length in bytes.
        len: usize,
    },

    /// A string field contains a NUL byte.
    #[error("{0} contains a NUL byte")]
    Nul(&'static str),

    /// More arguments than the 2-byte count can describe.
    #[error("{0} arguments exceed the limit of 65535")]
    TooManyArgs(usize),

    /// A uid or gid does not fit the 2-byte numeric option.
    #[error("{what} {id} does not fit the 2-byte wire field")]
    IdRange {
        /// `"uid"` or `"gid"`.
        what: &'static str,
        /// The offending id.
        id: u32,
    },

    /// Signal number outside `0..=32`.
    #[error("signal {0} out of range 0..=32")]
    BadSignal(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_wire_values() {
        assert_eq!(Error::Parse(Field::Command).code().as_i8(), -1);
        assert_eq!(Error::BadHeader { tag: None, size: 0 }.code().as_i8(), -2);
        assert_eq!(Error::BadSignal(Some(33)).code().as_i8(), -3);
        assert_eq!(Error::NoSuchUser.code().as_i8(), -4);
        assert_eq!(Error::NoSuchGroup.code().as_i8(), -5);
        assert_eq!(Error::BadOption(0x99).code().as_i8(), -6);
        assert_eq!(Error::Undefined("x").code().as_i8(), -128);
    }

    #[test]
    fn code_lookup() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_i8(code.as_i8()), Some(code));
            assert_eq!(code.name().parse::<ErrorCode>(), Ok(code));
        }
        assert_eq!(ErrorCode::from_i8(0), None);
        assert_eq!("-7".parse::<ErrorCode>(), Ok(ErrorCode::NoSuchChild));
        assert_eq!("NO_SUCH_USER".parse::<ErrorCode>(), Ok(ErrorCode::NoSuchUser));
        assert!("nope".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(
            Error::BadHeader {
                tag: Some(0x07),
                size: 3
            }
            .to_string(),
            "bad request header: tag 0x07, 3 bytes"
        );
        assert_eq!(
            Error::Parse(Field::Argument(2)).to_string(),
            "malformed argument #2"
        );
        assert_eq!(
            Error::Parse(Field::Option(OptionTag::Cwd)).to_string(),
            "malformed cwd option"
        );
        assert_eq!(
            Error::BadSignal(Some(40)).to_string(),
            "signal 40 out of range 0..=32"
        );
        assert_eq!(Error::BadSignal(None).to_string(), "missing signal number");
    }
}
