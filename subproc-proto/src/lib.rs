//! Wire protocol for the subproc privileged command channel.
//!
//! A requester asks a trusted supervisor to start processes, signal them,
//! or shut the channel down. This crate decodes those requests into fully
//! owned, validated [`Command`] values and encodes the fixed-size replies
//! and lifecycle events the supervisor sends back. It performs no I/O and
//! no process control; message framing belongs to the transport.
//!
//! # Example
//!
//! ```
//! use subproc_proto::{Command, ExecCommand, Reply};
//!
//! let request = ExecCommand::new("/bin/echo").arg("hello").cwd("/tmp");
//! let bytes = Command::from(request).encode().expect("encodable request");
//!
//! let reply = match subproc_proto::decode(&bytes) {
//!     Ok(Command::Exec(exec)) => {
//!         assert_eq!(exec.args, ["hello"]);
//!         Reply::Ack(1)
//!     }
//!     Ok(_) => unreachable!(),
//!     Err(e) => Reply::from_error(&e),
//! };
//! assert_eq!(reply.encode()[..2], [0x01, 0x00]);
//! ```

mod command;
mod cursor;
mod decode;
mod error;
mod event;
mod ident;
mod reply;
mod signal;

pub use command::{
    Argv0, Command, ExecCommand, KILL_MESSAGE_SIZE, MAX_SIGNAL, MessageTag, OptionTag,
    SHUTDOWN_MESSAGE_SIZE, StdioMode,
};
pub use decode::{decode, decode_with};
pub use error::{EncodeError, Error, ErrorCode, Field, Result};
pub use event::{EVENT_SIZE, Event, EventError, EventKind, SpawnStage};
pub use ident::{IdentityResolver, SystemIdentities};
pub use reply::{REPLY_SIZE, Reply, ReplyError};
pub use signal::{SignalName, signal_name, signal_number, signals};
